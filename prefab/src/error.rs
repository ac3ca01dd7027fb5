//! Error taxonomy and the load summary.
//!
//! Only structural corruption of the stream being parsed aborts an
//! operation. Unresolvable references, stale overrides, and membership
//! exclusions degrade to per-record warnings, tallied in a
//! [`LoadSummary`] so a corrupted fragment never blocks the rest of a
//! large document.

use std::fmt;

use thiserror::Error;

/// Fatal malformation of a document stream. Loading aborts and the live
/// graph is left unchanged.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("document truncated: needed {needed} more bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("bad document magic {found:?}")]
    BadMagic { found: [u8; 4] },
    #[error("unsupported document version {major}.{minor}.{patch}")]
    UnsupportedVersion { major: u16, minor: u16, patch: u16 },
    #[error("invalid length prefix {len} at offset {offset}")]
    InvalidLength { offset: usize, len: i32 },
    #[error("invalid utf-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },
    #[error("unknown wire tag {tag} at offset {offset}")]
    UnknownTag { offset: usize, tag: u8 },
    #[error("{remaining} trailing bytes after document end")]
    TrailingBytes { remaining: usize },
    #[error("sub-prefab nesting exceeds maximum depth {max}")]
    RecursionOverflow { max: usize },
}

/// Errors aborting a save.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("root object is not alive")]
    DeadRoot,
    #[error("root object is not an actor")]
    NotAnActor,
    #[error("cannot encode dead object {0}")]
    DeadObject(amaranth_scene::ObjectId),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serialize-ron")]
    #[error("format error: {0}")]
    Format(String),
}

/// Errors aborting a load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error("prefab asset not found: {path}")]
    MissingAsset { path: String },
    #[error("asset '{path}' carries no prefab data")]
    NotAPrefabAsset { path: String },
    #[error("load parent is not a live actor")]
    DeadParent,
    #[error("{0} is not a sub-prefab root of this instance")]
    NotASubPrefabRoot(amaranth_scene::ObjectId),
    #[cfg(feature = "serialize-ron")]
    #[error("format error: {0}")]
    Format(String),
}

/// Errors aborting a duplicate, which composes a save and a load.
#[derive(Debug, Error)]
pub enum DuplicateError {
    #[error(transparent)]
    Save(#[from] SaveError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Per-load tallies of recoverable degradations.
///
/// Nested sub-prefab loads fold their counts into the enclosing load's
/// summary, so the top-level summary covers the whole operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    /// Objects created or matched across all passes.
    pub objects_created: usize,
    /// Records degraded to `MissingClass` stubs.
    pub missing_class_stubs: usize,
    /// GUID/class/asset indices that resolved to nothing and decoded as null.
    pub unresolved_references: usize,
    /// Override records (or individual overridden properties) skipped
    /// because the target object or property no longer exists.
    pub skipped_overrides: usize,
    /// Property blobs that failed to decode and were left at defaults.
    pub malformed_blobs: usize,
}

impl LoadSummary {
    pub fn merge(&mut self, other: &LoadSummary) {
        self.objects_created += other.objects_created;
        self.missing_class_stubs += other.missing_class_stubs;
        self.unresolved_references += other.unresolved_references;
        self.skipped_overrides += other.skipped_overrides;
        self.malformed_blobs += other.malformed_blobs;
    }

    /// `true` when nothing degraded during the load.
    pub fn is_clean(&self) -> bool {
        self.missing_class_stubs == 0
            && self.unresolved_references == 0
            && self.skipped_overrides == 0
            && self.malformed_blobs == 0
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} objects, {} stubs, {} unresolved refs, {} skipped overrides, {} malformed blobs",
            self.objects_created,
            self.missing_class_stubs,
            self.unresolved_references,
            self.skipped_overrides,
            self.malformed_blobs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_accumulates() {
        let mut a = LoadSummary {
            objects_created: 3,
            missing_class_stubs: 1,
            ..Default::default()
        };
        let b = LoadSummary {
            objects_created: 2,
            skipped_overrides: 4,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.objects_created, 5);
        assert_eq!(a.missing_class_stubs, 1);
        assert_eq!(a.skipped_overrides, 4);
        assert!(!a.is_clean());
    }

    #[test]
    fn clean_summary() {
        let s = LoadSummary {
            objects_created: 10,
            ..Default::default()
        };
        assert!(s.is_clean());
    }
}
