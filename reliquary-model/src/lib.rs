//! Core data model definitions shared across Reliquary crates.
//!
//! Everything here is plain data: resources, the records they own, and the
//! rules that decide whether a staged resource is valid. Nothing in this
//! crate performs I/O.
#![allow(missing_docs)]

pub use ::chrono;

pub mod asset;
pub mod derivative;
pub mod error;
pub mod event;
pub mod ids;
pub mod import;
pub mod item;
pub mod metadata;
pub mod resource;

// Intentionally curated re-exports for downstream consumers.
pub use asset::{Asset, AssetAttributes, AssetField};
pub use derivative::{DerivativeRecord, DerivativeType};
pub use error::{FieldError, ModelError, Result as ModelResult};
pub use event::{EventOutcome, PreservationEvent, PreservationEventType};
pub use ids::{BlobId, ImportId, LockToken, ResourceId};
pub use import::{AssetEntry, AssetsDescription, ImportAction, ImportJobDescription};
pub use item::{Item, ItemAttributes, ItemField, StructuralAttributes};
pub use metadata::{
    DescriptiveMetadata, StructuralMetadata, TechnicalMetadata,
    ViewingDirection, ViewingHint,
};
pub use resource::{Resource, ResourceKind, ResourceRecord};
