//! Steps shared by every resource transaction.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reliquary_model::{Resource, ResourceId};

use crate::change_set::{ChangeSet, ChangeSetError};
use crate::error::{Failure, FailureCode};
use crate::ports::RepositoryStore;
use crate::state::MutationState;
use crate::transaction::{Step, StepResult};

fn require_id<R: Resource, W>(state: &MutationState<R, W>) -> Result<ResourceId, Failure> {
    state
        .id
        .ok_or_else(|| Failure::new(FailureCode::ResourceNotFound).with_detail("no id given"))
}

/// Load the resource named by `state.id`.
pub struct FindResource {
    store: Arc<dyn RepositoryStore>,
}

impl fmt::Debug for FindResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindResource")
            .finish_non_exhaustive()
    }
}

impl FindResource {
    pub fn new(store: Arc<dyn RepositoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<R, W> Step<MutationState<R, W>> for FindResource
where
    R: Resource,
    W: Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "find_resource"
    }

    async fn call(&self, mut state: MutationState<R, W>) -> StepResult<MutationState<R, W>> {
        let id = require_id(&state)?;
        let record = self
            .store
            .find(id)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorLoadingResource, err))?
            .ok_or_else(|| Failure::not_found(R::KIND, id))?;
        let found = record.kind();
        let resource = R::from_record(record).ok_or_else(|| {
            Failure::not_found(R::KIND, id).with_detail(format!("{id} is a {found}"))
        })?;
        state.resource = Some(resource);
        Ok(state)
    }
}

/// Stage caller attributes on the loaded resource, or on a blank one when
/// nothing was loaded.
#[derive(Debug)]
pub struct CreateChangeSet;

#[async_trait]
impl<R, W> Step<MutationState<R, W>> for CreateChangeSet
where
    R: Resource,
    W: Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "create_change_set"
    }

    async fn call(&self, mut state: MutationState<R, W>) -> StepResult<MutationState<R, W>> {
        let mut change_set = match state.resource.clone() {
            Some(resource) => ChangeSet::for_existing(resource),
            None => ChangeSet::for_new(R::blank(state.id.unwrap_or_default())),
        };
        change_set.apply(&state.attributes);
        if let Some(actor) = state.updated_by.as_deref().filter(|a| !a.trim().is_empty()) {
            let is_new = change_set.is_new();
            change_set.stage().assign_actor(actor, is_new);
        }
        state.change_set = Some(change_set);
        Ok(state)
    }
}

pub fn require_updated_by<R: Resource, W>(
    state: MutationState<R, W>,
) -> StepResult<MutationState<R, W>> {
    if state
        .updated_by
        .as_deref()
        .is_none_or(|actor| actor.trim().is_empty())
    {
        return Err(Failure::new(FailureCode::MissingUpdatedBy)
            .with_detail("updated_by must be provided"));
    }
    Ok(state)
}

pub fn validate<R: Resource, W>(mut state: MutationState<R, W>) -> StepResult<MutationState<R, W>> {
    let change_set = state.change_set_mut()?;
    if let Err(errors) = change_set.validate() {
        return Err(Failure::validation(errors, change_set.snapshot()));
    }
    Ok(state)
}

/// Persist the validated change set and replace `state.resource` with the
/// saved revision.
pub struct SaveResource {
    store: Arc<dyn RepositoryStore>,
}

impl fmt::Debug for SaveResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveResource")
            .finish_non_exhaustive()
    }
}

impl SaveResource {
    pub fn new(store: Arc<dyn RepositoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<R, W> Step<MutationState<R, W>> for SaveResource
where
    R: Resource,
    W: Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "save"
    }

    async fn call(&self, mut state: MutationState<R, W>) -> StepResult<MutationState<R, W>> {
        let change_set = state
            .change_set
            .take()
            .ok_or_else(|| Failure::internal("no change set staged"))?;
        let is_new = change_set.is_new();
        let expected = change_set.expected_lock_token();
        let snapshot = change_set.snapshot();
        let mut resource = change_set.sync().map_err(|err| match err {
            ChangeSetError::Invalid(errors) => Failure::validation(errors, snapshot.clone()),
            ChangeSetError::NotValidated => {
                Failure::internal(ChangeSetError::NotValidated.to_string())
                    .with_change_set(snapshot.clone())
            }
        })?;
        resource.touch(Utc::now(), is_new);

        let saved = self
            .store
            .save(resource.into_record(), expected)
            .await
            .map_err(|err| {
                Failure::from_core(FailureCode::ErrorSavingResource, err)
                    .with_change_set(snapshot.clone())
            })?;
        let saved = R::from_record(saved)
            .ok_or_else(|| Failure::internal("store returned a different resource kind"))?;
        state.resource = Some(saved);
        Ok(state)
    }
}

/// Remove the loaded resource from the store.
pub struct DeleteResource {
    store: Arc<dyn RepositoryStore>,
}

impl fmt::Debug for DeleteResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteResource")
            .finish_non_exhaustive()
    }
}

impl DeleteResource {
    pub fn new(store: Arc<dyn RepositoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<R, W> Step<MutationState<R, W>> for DeleteResource
where
    R: Resource,
    W: Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "delete_resource"
    }

    async fn call(&self, state: MutationState<R, W>) -> StepResult<MutationState<R, W>> {
        let id = state.loaded()?.id();
        self.store
            .delete(id)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorDeletingResource, err))?;
        Ok(state)
    }
}
