//! Named, ordered pipelines of steps.
//!
//! A [`Transaction`] threads one state value through its stages. The first
//! failing stage ends the run and its [`Failure`](crate::Failure) is the transaction's
//! result. Side effects run afterwards, only on success.

mod step;

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{Instrument, debug_span, error, trace, warn};

pub use step::{AroundStep, FnStep, SideEffect, Step, StepResult};

enum Stage<S: Send + Sync + 'static> {
    Step(Arc<dyn Step<S>>),
    Around(Arc<dyn AroundStep<S>>),
}

impl<S: Send + Sync + 'static> Stage<S> {
    fn name(&self) -> &'static str {
        match self {
            Stage::Step(step) => step.name(),
            Stage::Around(around) => around.name(),
        }
    }
}

/// Continuation handed to an [`AroundStep`]: every stage after it.
pub struct Next<'a, S: Send + Sync + 'static> {
    transaction: &'static str,
    stages: &'a [Stage<S>],
}

impl<S: Send + Sync + 'static> fmt::Debug for Next<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("transaction", &self.transaction)
            .field("remaining", &self.stages.len())
            .finish()
    }
}

impl<S: Send + Sync + 'static> Next<'_, S> {
    pub async fn run(self, state: S) -> StepResult<S> {
        run_stages(self.transaction, self.stages, state).await
    }
}

fn run_stages<'a, S: Send + Sync + 'static>(
    transaction: &'static str,
    stages: &'a [Stage<S>],
    mut state: S,
) -> BoxFuture<'a, StepResult<S>> {
    Box::pin(async move {
        for (index, stage) in stages.iter().enumerate() {
            trace!(target: "reliquary::transaction", transaction, step = stage.name(), "step");
            match stage {
                Stage::Step(step) => {
                    state = step.call(state).await.inspect_err(|failure| {
                        warn!(
                            target: "reliquary::transaction",
                            transaction,
                            step = step.name(),
                            code = %failure.code,
                            "step failed: {}",
                            failure.message()
                        );
                    })?;
                }
                Stage::Around(around) => {
                    let next = Next {
                        transaction,
                        stages: &stages[index + 1..],
                    };
                    return around.around(state, next).await;
                }
            }
        }
        Ok(state)
    })
}

pub struct Transaction<S: Send + Sync + 'static> {
    name: &'static str,
    stages: Vec<Stage<S>>,
    side_effects: Vec<Arc<dyn SideEffect<S>>>,
}

impl<S: Send + Sync + 'static> Transaction<S> {
    pub fn named(name: &'static str) -> TransactionBuilder<S> {
        TransactionBuilder {
            name,
            stages: Vec::new(),
            side_effects: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stage names in execution order, followed by side-effect names.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.stages
            .iter()
            .map(Stage::name)
            .chain(self.side_effects.iter().map(|effect| effect.name()))
            .collect()
    }

    pub async fn call(&self, state: S) -> StepResult<S> {
        let name = self.name;
        let span = debug_span!(target: "reliquary::transaction", "transaction", name);
        async move {
            let state = run_stages(name, &self.stages, state).await?;
            for effect in &self.side_effects {
                if let Err(err) = effect.run(&state).await {
                    error!(
                        target: "reliquary::transaction",
                        transaction = name,
                        side_effect = effect.name(),
                        error = %err,
                        "side effect failed"
                    );
                }
            }
            Ok(state)
        }
        .instrument(span)
        .await
    }
}

impl<S: Send + Sync + 'static> fmt::Debug for Transaction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}

pub struct TransactionBuilder<S: Send + Sync + 'static> {
    name: &'static str,
    stages: Vec<Stage<S>>,
    side_effects: Vec<Arc<dyn SideEffect<S>>>,
}

impl<S: Send + Sync + 'static> TransactionBuilder<S> {
    pub fn step(mut self, step: impl Step<S> + 'static) -> Self {
        self.stages.push(Stage::Step(Arc::new(step)));
        self
    }

    /// Synchronous step from a closure.
    pub fn pure<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(S) -> StepResult<S> + Send + Sync + 'static,
    {
        self.step(FnStep::new(name, f))
    }

    /// Wrap every stage added after this one.
    pub fn around(mut self, around: impl AroundStep<S> + 'static) -> Self {
        self.stages.push(Stage::Around(Arc::new(around)));
        self
    }

    pub fn side_effect(mut self, effect: impl SideEffect<S> + 'static) -> Self {
        self.side_effects.push(Arc::new(effect));
        self
    }

    pub fn build(self) -> Transaction<S> {
        Transaction {
            name: self.name,
            stages: self.stages,
            side_effects: self.side_effects,
        }
    }
}

impl<S: Send + Sync + 'static> fmt::Debug for TransactionBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, Failure, FailureCode};
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<String>>>;

    #[derive(Default)]
    struct Counter {
        trace: Trace,
        value: u32,
    }

    fn record(state: &Counter, entry: &str) {
        state.trace.lock().unwrap().push(entry.to_string());
    }

    struct Guard;

    #[async_trait]
    impl AroundStep<Counter> for Guard {
        fn name(&self) -> &'static str {
            "guard"
        }

        async fn around(&self, state: Counter, next: Next<'_, Counter>) -> StepResult<Counter> {
            let trace = state.trace.clone();
            trace.lock().unwrap().push("enter".into());
            let result = next.run(state).await;
            let outcome = if result.is_ok() { "exit ok" } else { "exit err" };
            trace.lock().unwrap().push(outcome.into());
            result
        }
    }

    struct Notify;

    #[async_trait]
    impl SideEffect<Counter> for Notify {
        fn name(&self) -> &'static str {
            "notify"
        }

        async fn run(&self, state: &Counter) -> crate::error::Result<()> {
            record(state, "notify");
            Err(CoreError::Unavailable("mailer".into()))
        }
    }

    fn increment(mut state: Counter) -> StepResult<Counter> {
        state.value += 1;
        record(&state, "increment");
        Ok(state)
    }

    #[tokio::test]
    async fn steps_run_in_order_and_side_effect_errors_are_swallowed() {
        let tx = Transaction::<Counter>::named("demo")
            .pure("one", increment)
            .around(Guard)
            .pure("two", increment)
            .side_effect(Notify)
            .build();

        let state = tx.call(Counter::default()).await.unwrap();
        assert_eq!(state.value, 2);
        assert_eq!(
            *state.trace.lock().unwrap(),
            vec!["increment", "enter", "increment", "exit ok", "notify"]
        );
        assert_eq!(tx.step_names(), vec!["one", "guard", "two", "notify"]);
    }

    #[tokio::test]
    async fn failure_stops_pipeline_and_skips_side_effects() {
        let tx = Transaction::<Counter>::named("demo")
            .around(Guard)
            .pure("fail", |_state| Err(Failure::new(FailureCode::MissingUpdatedBy)))
            .pure("never", increment)
            .side_effect(Notify)
            .build();

        let counter = Counter::default();
        let trace = counter.trace.clone();
        let failure = tx.call(counter).await.err().unwrap();
        assert_eq!(failure.code, FailureCode::MissingUpdatedBy);
        assert_eq!(*trace.lock().unwrap(), vec!["enter", "exit err"]);
    }
}
