//! # Reliquary Core
//!
//! Mutation pipeline for a digital preservation repository.
//!
//! Every change to an item or asset runs through a named
//! [`Transaction`](transaction::Transaction): an ordered list of steps that
//! stage a [`ChangeSet`](change_set::ChangeSet), validate it, record
//! preservation events and persist it under an optimistic lock. Side effects
//! such as derivative generation and backups are queued as background jobs
//! and executed by the [`JobRunner`].
//!
//! ## Architecture
//!
//! - [`ports`]: traits for every external collaborator
//! - [`infra`]: in-memory and local filesystem adapters
//! - [`transaction`]: the step engine
//! - [`steps`] and [`transactions`]: the concrete asset and item pipelines
//! - [`import`]: bulk import with compensation
//! - [`jobs`]: job payloads and the runner

#![allow(missing_docs)]

pub mod change_set;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod import;
pub mod infra;
pub mod jobs;
pub mod ports;
pub mod preservation;
pub mod services;
pub mod state;
pub mod steps;
pub mod transaction;
pub mod transactions;

pub use reliquary_model as model;

pub use change_set::{ChangeSet, ChangeSetError};
pub use collaborators::{Collaborators, CollaboratorsBuilder};
pub use config::{DerivativeConfig, PipelineConfig, RetryConfig};
pub use error::{CoreError, Failure, FailureClass, FailureCode, Result};
pub use import::{BulkImportRecord, BulkImportService, BulkImportState, ImportFailure, ImportSummary};
pub use jobs::{DispatchStatus, JobDispatcher, JobHandle, JobId, JobKind, JobPayload, JobRecord, JobRunner, JobState};
pub use services::Reliquary;
pub use state::{AssetState, FileUpload, ItemState, MutationState};
pub use transaction::{StepResult, Transaction};
pub use transactions::{ResourceTransactions, TransactionName};
