use std::fmt;

use uuid::Uuid;

/// Identifier shared by every resource kept in the repository store.
///
/// Items and assets live in one id space so that a lookup by id can fail
/// with "wrong kind" rather than silently resolving to another table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ResourceId(pub Uuid);

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceId {
    pub fn new() -> Self {
        ResourceId(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl AsRef<Uuid> for ResourceId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ResourceId {
    fn from(value: Uuid) -> Self {
        ResourceId(value)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle returned by a blob store upload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct BlobId(pub String);

impl BlobId {
    pub fn new(value: impl Into<String>) -> Self {
        BlobId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optimistic-lock token. Incremented by the store on every successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct LockToken(pub u64);

impl LockToken {
    pub const INITIAL: LockToken = LockToken(1);

    pub fn next(self) -> LockToken {
        LockToken(self.0 + 1)
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier of a bulk import ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ImportId(pub Uuid);

impl Default for ImportId {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportId {
    pub fn new() -> Self {
        ImportId(Uuid::now_v7())
    }
}

impl fmt::Display for ImportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
