//! Subtree duplication: the writer composed with the reader against an
//! in-memory document.
//!
//! A duplicate shares no live object, GUID, or mutable reference with
//! the original — only assets and classes are shared by reference. This
//! falls out of the composition: serialization already replaces every
//! pointer with a GUID, and loading in fresh-GUID mode re-creates every
//! object under newly minted identities.

use std::collections::HashMap;

use amaranth_scene::{AssetStore, Guid, ObjectId, Scene};

use crate::codec::PropertyCodec;
use crate::error::DuplicateError;
use crate::reader::{LoadContext, LoadedPrefab, PrefabReader};
use crate::subprefab::SubPrefabMap;
use crate::writer::{PrefabWriter, SaveTarget};

/// Duplicate an actor hierarchy, attaching the copy under `new_parent`.
///
/// Nested prefab instances are flattened into concrete actors; use
/// [`duplicate_actor_for_editor`] to preserve them as references.
pub fn duplicate_actor(
    scene: &mut Scene,
    assets: &AssetStore,
    codec: &dyn PropertyCodec,
    root: ObjectId,
    new_parent: Option<ObjectId>,
) -> Result<ObjectId, DuplicateError> {
    let writer = PrefabWriter::new(scene, assets, codec, SaveTarget::Runtime);
    let saved = writer.save(root, &HashMap::new())?;

    let mut reader = PrefabReader::new(scene, assets, codec);
    let loaded = reader.load_document(&saved.document, new_parent, &LoadContext::fresh_guids())?;
    Ok(loaded.root)
}

/// Editor duplication: sub-prefab instances stay references, override
/// sets carry over, and the returned maps seed a helper for the copy.
///
/// `sub_prefabs` and `object_to_guid` are the original instance's
/// serialization state; the duplicate gets freshly minted GUIDs
/// throughout, with overrides translated onto the new instances.
pub fn duplicate_actor_for_editor(
    scene: &mut Scene,
    assets: &AssetStore,
    codec: &dyn PropertyCodec,
    root: ObjectId,
    new_parent: Option<ObjectId>,
    sub_prefabs: &SubPrefabMap,
    object_to_guid: &HashMap<ObjectId, Guid>,
) -> Result<LoadedPrefab, DuplicateError> {
    let writer = PrefabWriter::new(scene, assets, codec, SaveTarget::Editor)
        .with_sub_prefabs(sub_prefabs);
    let saved = writer.save(root, object_to_guid)?;

    let mut reader = PrefabReader::new(scene, assets, codec);
    let loaded = reader.load_document(&saved.document, new_parent, &LoadContext::fresh_guids())?;
    Ok(loaded)
}
