//! Staged, unsaved edits to a resource.
//!
//! A [`ChangeSet`] pairs the resource as it was loaded with the proposed
//! revision. Steps mutate the proposal, ask what changed, and validate; only
//! a validated change set can be synced back into a resource for saving.

use reliquary_model::{FieldError, LockToken, Resource, ResourceRecord};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChangeSetError {
    #[error("change set must be validated after its last edit before syncing")]
    NotValidated,
    #[error("change set is invalid: {0:?}")]
    Invalid(Vec<FieldError>),
}

#[derive(Debug, Clone)]
pub struct ChangeSet<R: Resource> {
    original: R,
    proposed: R,
    persisted: bool,
    validated: bool,
    errors: Vec<FieldError>,
}

impl<R: Resource> ChangeSet<R> {
    /// Change set for a resource that has never been saved. Every field set
    /// on the proposal counts as changed.
    pub fn for_new(resource: R) -> Self {
        Self {
            original: R::blank(resource.id()),
            proposed: resource,
            persisted: false,
            validated: false,
            errors: Vec::new(),
        }
    }

    pub fn for_existing(resource: R) -> Self {
        Self {
            original: resource.clone(),
            proposed: resource,
            persisted: true,
            validated: false,
            errors: Vec::new(),
        }
    }

    pub fn is_new(&self) -> bool {
        !self.persisted
    }

    pub fn original(&self) -> &R {
        &self.original
    }

    pub fn proposed(&self) -> &R {
        &self.proposed
    }

    /// Mutable access to the proposal. Any edit invalidates a previous
    /// validation.
    pub fn stage(&mut self) -> &mut R {
        self.validated = false;
        &mut self.proposed
    }

    pub fn apply(&mut self, attributes: &R::Attributes) {
        self.stage().apply(attributes);
    }

    pub fn is_changed(&self, field: R::Field) -> bool {
        self.original.differs(&self.proposed, field)
    }

    pub fn changed_fields(&self) -> Vec<R::Field> {
        R::FIELDS
            .iter()
            .copied()
            .filter(|field| self.is_changed(*field))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        R::FIELDS.iter().any(|field| self.is_changed(*field))
    }

    /// Run the resource's rules against the proposal.
    pub fn validate(&mut self) -> Result<(), Vec<FieldError>> {
        self.errors = self.proposed.validate();
        self.validated = self.errors.is_empty();
        if self.validated {
            Ok(())
        } else {
            Err(self.errors.clone())
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validated
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Lock token the store must still hold when this change set is saved.
    pub fn expected_lock_token(&self) -> Option<LockToken> {
        if self.persisted {
            self.original.lock_token()
        } else {
            None
        }
    }

    /// Snapshot of the proposal, attached to failures.
    pub fn snapshot(&self) -> ResourceRecord {
        self.proposed.clone().into_record()
    }

    /// Consume the change set, yielding the proposed resource.
    pub fn sync(self) -> Result<R, ChangeSetError> {
        if !self.errors.is_empty() {
            return Err(ChangeSetError::Invalid(self.errors));
        }
        if !self.validated {
            return Err(ChangeSetError::NotValidated);
        }
        Ok(self.proposed)
    }
}
