//! State threaded through resource transactions.

use std::mem;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use reliquary_model::{
    Asset, BlobId, Item, PreservationEvent, Resource, ResourceId,
};

use crate::change_set::ChangeSet;
use crate::error::Failure;

/// Blob ids uploaded during one transaction, kept outside the state so an
/// [`crate::transaction::AroundStep`] can still see them after a failure has
/// consumed the state.
#[derive(Debug, Clone, Default)]
pub struct UploadLedger(Arc<Mutex<Vec<BlobId>>>);

impl UploadLedger {
    pub fn record(&self, id: BlobId) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }

    pub fn take(&self) -> Vec<BlobId> {
        mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// State shared by every resource transaction.
///
/// `W` carries the per-kind working data (file payloads, parent lookups).
#[derive(Debug)]
pub struct MutationState<R: Resource, W> {
    pub id: Option<ResourceId>,
    pub attributes: R::Attributes,
    pub updated_by: Option<String>,
    /// The resource as loaded, replaced by the saved revision after a save.
    pub resource: Option<R>,
    pub change_set: Option<ChangeSet<R>>,
    pub uploads: UploadLedger,
    /// Derivative blobs replaced by this transaction; deleted after success.
    pub superseded_derivatives: Vec<BlobId>,
    pub work: W,
}

impl<R: Resource, W: Default> MutationState<R, W> {
    pub fn for_new(attributes: R::Attributes, updated_by: Option<String>) -> Self {
        Self::build(None, attributes, updated_by)
    }

    pub fn for_existing(
        id: ResourceId,
        attributes: R::Attributes,
        updated_by: Option<String>,
    ) -> Self {
        Self::build(Some(id), attributes, updated_by)
    }

    /// State for a transaction that only needs to know which resource to
    /// act on.
    pub fn for_id(id: ResourceId, updated_by: Option<String>) -> Self {
        Self::build(Some(id), R::Attributes::default(), updated_by)
    }

    fn build(id: Option<ResourceId>, attributes: R::Attributes, updated_by: Option<String>) -> Self {
        Self {
            id,
            attributes,
            updated_by,
            resource: None,
            change_set: None,
            uploads: UploadLedger::default(),
            superseded_derivatives: Vec::new(),
            work: W::default(),
        }
    }
}

impl<R: Resource, W> MutationState<R, W> {
    pub fn with_work(mut self, work: W) -> Self {
        self.work = work;
        self
    }

    pub fn loaded(&self) -> Result<&R, Failure> {
        self.resource
            .as_ref()
            .ok_or_else(|| Failure::internal(format!("{} was not loaded", R::KIND)))
    }

    pub fn change_set(&self) -> Result<&ChangeSet<R>, Failure> {
        self.change_set
            .as_ref()
            .ok_or_else(|| Failure::internal("no change set staged"))
    }

    pub fn change_set_mut(&mut self) -> Result<&mut ChangeSet<R>, Failure> {
        self.change_set
            .as_mut()
            .ok_or_else(|| Failure::internal("no change set staged"))
    }

    /// The saved (or loaded) resource once the transaction has finished.
    pub fn into_resource(self) -> Option<R> {
        self.resource
    }
}

/// A file handed to Update Asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub original_filename: String,
    pub content: Vec<u8>,
}

impl FileUpload {
    pub fn new(original_filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            original_filename: original_filename.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct AssetWork {
    pub file: Option<FileUpload>,
    /// Name of the system an asset is being migrated from.
    pub migrated_from: Option<String>,
    /// Events recorded earlier in the pipeline (e.g. the virus check) that
    /// the event deriver appends with the transaction's shared timestamp.
    pub preceding_events: Vec<PreservationEvent>,
    /// sha256 of the uploaded file, computed by the core.
    pub checksum: Option<String>,
    /// Backup copies detached because the preservation file changed.
    pub superseded_backups: Vec<BlobId>,
    pub parent_item: Option<Item>,
    pub workspace: Option<PathBuf>,
    pub source_path: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ItemWork {
    /// Assets that belonged to a deleted item.
    pub removed_asset_ids: Vec<ResourceId>,
}

pub type AssetState = MutationState<Asset, AssetWork>;
pub type ItemState = MutationState<Item, ItemWork>;

impl AssetState {
    /// Update with a new preservation file.
    pub fn with_file(mut self, file: FileUpload) -> Self {
        self.work.file = Some(file);
        self
    }

    pub fn migrated_from(mut self, source: impl Into<String>) -> Self {
        self.work.migrated_from = Some(source.into());
        self
    }
}
