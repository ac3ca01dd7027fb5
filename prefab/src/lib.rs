//! # Amaranth Prefab
//!
//! GUID-addressed prefab serialization for the Amaranth scene model: a
//! live actor hierarchy becomes a portable binary document and back,
//! including prefabs nested inside prefabs with per-instance property
//! overrides.
//!
//! ## Core Types
//!
//! - [`PrefabDocument`] — the transient document: reference tables,
//!   object/component records, recursive actor-node tree
//! - [`PrefabWriter`] / [`GraphCollector`] — live graph → document, with
//!   unit-membership filtering and stable GUID assignment
//! - [`PrefabReader`] / [`LoadContext`] — the four-pass loader
//!   (pre-generate, populate, attach, overrides), forward- and
//!   cycle-tolerant by construction
//! - [`PrefabHelper`] — one per live instance: Save / Load / Revert,
//!   sub-prefab instantiation, override tracking
//! - [`PropertyCodec`] / [`BinaryPropertyCodec`] — the property blob
//!   boundary where object references become GUIDs and table indices
//! - [`duplicate_actor`] / [`duplicate_actor_for_editor`] — writer and
//!   reader composed against an in-memory document
//!
//! ## Concurrency
//!
//! Everything here is single-threaded, synchronous, and cooperative:
//! Save, Load, Duplicate, and Revert run to completion on the execution
//! context that owns the [`Scene`](amaranth_scene::Scene), which is not
//! safe to mutate concurrently with a walk over it. Reference tables are
//! fresh per save call; the GUID maps of a load belong exclusively to
//! the caller. Overlapping operations on one instance are ruled out by
//! `&mut` access rather than recovered from.

mod codec;
mod collect;
mod document;
mod duplicate;
mod error;
mod helper;
mod overrides;
mod reader;
mod subprefab;
mod tables;
mod wire;
mod writer;

pub use codec::{BinaryPropertyCodec, PropertyCodec, ReferenceSink, ReferenceSource};
pub use collect::GraphCollector;
pub use document::{
    ActorNode, ComponentRecord, ObjectRecord, OverrideRecord, PrefabDocument, FORMAT_VERSION,
    PREFAB_MAGIC,
};
pub use duplicate::{duplicate_actor, duplicate_actor_for_editor};
pub use error::{DuplicateError, LoadError, LoadSummary, SaveError, StructuralError};
pub use helper::PrefabHelper;
pub use overrides::OverrideTracker;
pub use reader::{LoadContext, LoadedPrefab, PrefabReader, MAX_SUB_PREFAB_DEPTH};
pub use subprefab::{SubPrefabInstance, SubPrefabMap};
pub use tables::{ReferenceTables, NONE_INDEX};
pub use writer::{PrefabWriter, SaveTarget, SavedPrefab};

use std::collections::HashMap;

use amaranth_scene::{AssetId, AssetStore, ObjectId, Scene};

/// Serialize the hierarchy rooted at `root` to document bytes, without
/// retaining any GUID state. For repeated saves of one live instance,
/// use a [`PrefabHelper`] so GUIDs stay stable.
pub fn save_prefab(
    scene: &Scene,
    assets: &AssetStore,
    codec: &dyn PropertyCodec,
    root: ObjectId,
    target: SaveTarget,
) -> Result<Vec<u8>, SaveError> {
    let writer = PrefabWriter::new(scene, assets, codec, target);
    let (bytes, _) = writer.save_to_bytes(root, &HashMap::new())?;
    Ok(bytes)
}

/// Load a prefab asset, attaching the root under `parent` when given.
/// The returned [`LoadedPrefab`] carries the GUID maps the caller keeps
/// for later saves and reverts.
pub fn load_prefab(
    scene: &mut Scene,
    assets: &AssetStore,
    codec: &dyn PropertyCodec,
    asset: AssetId,
    parent: Option<ObjectId>,
) -> Result<LoadedPrefab, LoadError> {
    let mut reader = PrefabReader::new(scene, assets, codec);
    reader.load_asset(asset, parent, &LoadContext::new())
}
