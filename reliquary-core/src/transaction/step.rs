use async_trait::async_trait;

use crate::error::{Failure, Result};

use super::Next;

pub type StepResult<S> = std::result::Result<S, Failure>;

/// One stage of a transaction: takes the state, returns the next state or
/// a failure that stops the pipeline.
#[async_trait]
pub trait Step<S: Send + 'static>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn call(&self, state: S) -> StepResult<S>;
}

/// A stage that wraps every stage after it.
///
/// Implementations do setup, call `next.run(state)` exactly once, and then
/// clean up regardless of the outcome before returning it.
#[async_trait]
pub trait AroundStep<S: Send + Sync + 'static>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn around(&self, state: S, next: Next<'_, S>) -> StepResult<S>;
}

/// Work that runs only after every stage has succeeded.
///
/// Errors are logged by the engine and never change the transaction's
/// outcome.
#[async_trait]
pub trait SideEffect<S: Send + Sync + 'static>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, state: &S) -> Result<()>;
}

/// Adapter turning a synchronous closure into a [`Step`].
pub struct FnStep<F> {
    name: &'static str,
    f: F,
}

impl<F> FnStep<F> {
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> std::fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStep").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<S, F> Step<S> for FnStep<F>
where
    S: Send + 'static,
    F: Fn(S) -> StepResult<S> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn call(&self, state: S) -> StepResult<S> {
        (self.f)(state)
    }
}
