//! Sub-prefab instances and GUID remapping.
//!
//! A nested prefab loads standalone in its own GUID space, then every
//! internal GUID is rewritten through a remap into GUIDs unique within
//! the parent. The remap is a bijection persisted with the reference
//! node, so an unchanged instance keeps its parent-space GUIDs across
//! save/load cycles, while two sibling instances of the same asset can
//! never share a GUID or a live object.

use std::collections::HashMap;

use amaranth_scene::{AssetId, Guid, ObjectId};

use crate::error::LoadSummary;
use crate::overrides::OverrideTracker;

/// Live state of one nested prefab instance inside a parent hierarchy,
/// keyed by the instance's root actor.
#[derive(Debug, Clone)]
pub struct SubPrefabInstance {
    pub asset: AssetId,
    /// Asset-internal GUID → parent-space GUID, covering every object of
    /// the nested load (transitively, for deeper nesting).
    pub guid_remap: HashMap<Guid, Guid>,
    pub overrides: OverrideTracker,
}

impl SubPrefabInstance {
    pub fn new(asset: AssetId) -> Self {
        Self {
            asset,
            guid_remap: HashMap::new(),
            overrides: OverrideTracker::new(),
        }
    }
}

/// Sub-prefab instances of one loaded prefab, keyed by root actor.
pub type SubPrefabMap = HashMap<ObjectId, SubPrefabInstance>;

/// Result of loading and remapping one nested instance.
pub(crate) struct RemappedLoad {
    pub root: ObjectId,
    /// Parent-space GUID → live object for every nested object.
    pub guid_to_object: HashMap<Guid, ObjectId>,
    pub instance: SubPrefabInstance,
    /// Document-recorded parent-space GUID → final parent-space GUID.
    /// Identity unless the load minted fresh GUIDs; override records are
    /// translated through this before resolution.
    pub alias: HashMap<Guid, Guid>,
    pub summary: LoadSummary,
}

/// Rewrite a nested load's GUID space into the parent's.
///
/// `stored` seeds targets from the reference node's persisted remap;
/// internal GUIDs it does not cover (objects added to the asset since the
/// parent was saved) mint fresh parent-space GUIDs. With `fresh`, every
/// target is minted anew and `alias` records where each stored
/// parent-space GUID went.
pub(crate) fn remap_guid_space(
    nested: &HashMap<Guid, ObjectId>,
    stored: &[(Guid, Guid)],
    fresh: bool,
) -> (HashMap<Guid, Guid>, HashMap<Guid, Guid>, HashMap<Guid, ObjectId>) {
    let stored_map: HashMap<Guid, Guid> = stored.iter().copied().collect();
    let mut remap = HashMap::with_capacity(nested.len());
    let mut alias = HashMap::new();
    let mut guid_to_object = HashMap::with_capacity(nested.len());

    for (&internal, &object) in nested {
        let target = match stored_map.get(&internal) {
            Some(&recorded) => {
                let target = if fresh { Guid::new() } else { recorded };
                alias.insert(recorded, target);
                target
            }
            None => Guid::new(),
        };
        remap.insert(internal, target);
        guid_to_object.insert(target, object);
    }
    (remap, alias, guid_to_object)
}
