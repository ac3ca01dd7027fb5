//! Per-instance prefab management.
//!
//! A [`PrefabHelper`] owns the live result of loading one prefab asset:
//! the root actor, the GUID maps retained for stable re-saves, and the
//! sub-prefab instances with their override trackers. One helper exists
//! per live instance; Save, Load, and Revert all go through it.
//!
//! Exclusive access is enforced by `&mut self`, so overlapping
//! Save/Load/Revert calls against one instance are unrepresentable
//! rather than a runtime assertion.

use std::collections::HashMap;

use amaranth_scene::{AssetId, AssetStore, Guid, ObjectId, Scene};

use crate::codec::PropertyCodec;
use crate::error::{LoadError, LoadSummary, SaveError};
use crate::reader::{LoadContext, PrefabReader};
use crate::subprefab::SubPrefabMap;
use crate::writer::{PrefabWriter, SaveTarget};

/// Owns one live prefab instance and its serialization state.
pub struct PrefabHelper {
    asset: AssetId,
    root: Option<ObjectId>,
    guid_to_object: HashMap<Guid, ObjectId>,
    object_to_guid: HashMap<ObjectId, Guid>,
    sub_prefabs: SubPrefabMap,
    last_summary: Option<LoadSummary>,
}

impl PrefabHelper {
    pub fn new(asset: AssetId) -> Self {
        Self {
            asset,
            root: None,
            guid_to_object: HashMap::new(),
            object_to_guid: HashMap::new(),
            sub_prefabs: SubPrefabMap::new(),
            last_summary: None,
        }
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn root(&self) -> Option<ObjectId> {
        self.root
    }

    pub fn guid_of(&self, object: ObjectId) -> Option<Guid> {
        self.object_to_guid.get(&object).copied()
    }

    pub fn object_by_guid(&self, guid: Guid) -> Option<ObjectId> {
        self.guid_to_object.get(&guid).copied()
    }

    pub fn sub_prefabs(&self) -> &SubPrefabMap {
        &self.sub_prefabs
    }

    /// The full retained `object → GUID` map, e.g. to seed an editor
    /// duplication.
    pub fn object_to_guid(&self) -> &HashMap<ObjectId, Guid> {
        &self.object_to_guid
    }

    /// The degradation tally of the most recent load or revert.
    pub fn last_load_summary(&self) -> Option<&LoadSummary> {
        self.last_summary.as_ref()
    }

    /// Adopt a live actor as this helper's root, e.g. when authoring a
    /// new prefab asset from an existing hierarchy. GUIDs are assigned
    /// on the first save.
    pub fn adopt_root(&mut self, root: ObjectId) {
        self.root = Some(root);
    }

    // -----------------------------------------------------------------------
    // Load / Save / Revert
    // -----------------------------------------------------------------------

    /// Load the helper's asset, attaching the root under `parent`.
    /// No-op when an instance is already loaded and alive.
    pub fn load(
        &mut self,
        scene: &mut Scene,
        assets: &AssetStore,
        codec: &dyn PropertyCodec,
        parent: Option<ObjectId>,
    ) -> Result<ObjectId, LoadError> {
        if let Some(root) = self.root.filter(|&r| scene.is_alive(r)) {
            log::debug!("prefab instance already loaded, keeping {root}");
            return Ok(root);
        }
        let mut reader = PrefabReader::new(scene, assets, codec);
        let loaded = reader.load_asset(self.asset, parent, &LoadContext::new())?;
        self.root = Some(loaded.root);
        self.guid_to_object = loaded.guid_to_object;
        self.object_to_guid = loaded.object_to_guid;
        self.sub_prefabs = loaded.sub_prefabs;
        self.last_summary = Some(loaded.summary);
        Ok(loaded.root)
    }

    /// Serialize the live instance back into its asset, returning the
    /// document bytes. GUIDs assigned during the save are retained, so an
    /// unchanged instance saves byte-identically next time.
    pub fn save(
        &mut self,
        scene: &Scene,
        assets: &mut AssetStore,
        codec: &dyn PropertyCodec,
    ) -> Result<Vec<u8>, SaveError> {
        let root = self
            .root
            .filter(|&r| scene.is_alive(r))
            .ok_or(SaveError::DeadRoot)?;

        let writer = PrefabWriter::new(scene, assets, codec, SaveTarget::Editor)
            .with_sub_prefabs(&self.sub_prefabs);
        let (bytes, object_to_guid) = writer.save_to_bytes(root, &self.object_to_guid)?;

        assets.set_prefab_bytes(self.asset, bytes.clone());
        self.guid_to_object = object_to_guid
            .iter()
            .map(|(&id, &guid)| (guid, id))
            .collect();
        self.object_to_guid = object_to_guid;
        Ok(bytes)
    }

    /// Discard the live instance and reload it fresh from the asset,
    /// keeping its place in the actor tree.
    pub fn revert(
        &mut self,
        scene: &mut Scene,
        assets: &AssetStore,
        codec: &dyn PropertyCodec,
    ) -> Result<ObjectId, LoadError> {
        let parent = self
            .root
            .filter(|&r| scene.is_alive(r))
            .and_then(|r| scene.actor_parent(r));
        self.clear_loaded(scene);
        self.load(scene, assets, codec, parent)
    }

    /// Discard one sub-prefab instance's overrides and reload it fresh
    /// from its nested asset, under its old parent and with its old
    /// parent-space GUIDs.
    pub fn revert_sub_prefab(
        &mut self,
        scene: &mut Scene,
        assets: &AssetStore,
        codec: &dyn PropertyCodec,
        sub_root: ObjectId,
    ) -> Result<ObjectId, LoadError> {
        let Some(instance) = self.sub_prefabs.remove(&sub_root) else {
            return Err(LoadError::NotASubPrefabRoot(sub_root));
        };
        let parent = scene.actor_parent(sub_root);

        // Drop the old subtree and every map entry that pointed into it.
        let stored_remap: Vec<(Guid, Guid)> = instance
            .guid_remap
            .iter()
            .map(|(&from, &to)| (from, to))
            .collect();
        scene.destroy_object(sub_root);
        self.prune_dead(scene);

        let mut reader = PrefabReader::new(scene, assets, codec);
        let loaded = match reader.load_sub_prefab(
            instance.asset,
            &stored_remap,
            parent,
            &LoadContext::new(),
        ) {
            Ok(loaded) => loaded,
            Err(err) => {
                self.last_summary = None;
                return Err(err);
            }
        };

        for (&guid, &object) in &loaded.guid_to_object {
            self.guid_to_object.insert(guid, object);
            self.object_to_guid.insert(object, guid);
        }
        self.last_summary = Some(loaded.summary);
        // The reverted instance starts with an empty tracked set.
        self.sub_prefabs.insert(loaded.root, loaded.instance);
        Ok(loaded.root)
    }

    /// Destroy the loaded instance and forget all serialization state.
    pub fn clear_loaded(&mut self, scene: &mut Scene) {
        if let Some(root) = self.root.take() {
            scene.destroy_object(root);
        }
        self.guid_to_object.clear();
        self.object_to_guid.clear();
        self.sub_prefabs.clear();
        self.last_summary = None;
    }

    // -----------------------------------------------------------------------
    // Sub-prefab management
    // -----------------------------------------------------------------------

    /// Instantiate `asset` as a new sub-prefab under `parent_actor`,
    /// registering it for reference-node serialization. Every call
    /// produces a disjoint GUID set, so sibling instances of one asset
    /// never alias.
    pub fn instantiate_sub_prefab(
        &mut self,
        scene: &mut Scene,
        assets: &AssetStore,
        codec: &dyn PropertyCodec,
        asset: AssetId,
        parent_actor: ObjectId,
    ) -> Result<ObjectId, LoadError> {
        let mut reader = PrefabReader::new(scene, assets, codec);
        let loaded = reader.load_sub_prefab(asset, &[], Some(parent_actor), &LoadContext::new())?;

        for (&guid, &object) in &loaded.guid_to_object {
            self.guid_to_object.insert(guid, object);
            self.object_to_guid.insert(object, guid);
        }
        self.sub_prefabs.insert(loaded.root, loaded.instance);
        Ok(loaded.root)
    }

    /// Demote a sub-prefab instance to plain actors: the reference node
    /// is forgotten and the next save embeds the subtree concretely.
    pub fn unlink_sub_prefab(&mut self, sub_root: ObjectId) -> bool {
        self.sub_prefabs.remove(&sub_root).is_some()
    }

    /// The sub-prefab root actor whose instance owns `object`, if any.
    pub fn sub_prefab_root_of(&self, scene: &Scene, object: ObjectId) -> Option<ObjectId> {
        let mut actor = scene.owning_actor(object)?;
        loop {
            if self.sub_prefabs.contains_key(&actor) {
                return Some(actor);
            }
            actor = scene.actor_parent(actor)?;
        }
    }

    pub fn is_in_sub_prefab(&self, scene: &Scene, object: ObjectId) -> bool {
        self.sub_prefab_root_of(scene, object).is_some()
    }

    // -----------------------------------------------------------------------
    // Override tracking
    // -----------------------------------------------------------------------

    /// Track `property` of `object` as overridden on its enclosing
    /// sub-prefab instance. Idempotent. Returns `false` (with a warning)
    /// when the object is not inside a sub-prefab or has no GUID.
    pub fn add_override(&mut self, scene: &Scene, object: ObjectId, property: &str) -> bool {
        let Some(sub_root) = self.sub_prefab_root_of(scene, object) else {
            log::warn!("add_override: {object} is not part of a sub-prefab instance");
            return false;
        };
        let Some(guid) = self.guid_of(object) else {
            log::warn!("add_override: {object} has no assigned GUID");
            return false;
        };
        if let Some(instance) = self.sub_prefabs.get_mut(&sub_root) {
            instance.overrides.add(guid, property);
            return true;
        }
        false
    }

    /// Stop tracking `property` of `object`. Idempotent.
    pub fn remove_override(&mut self, scene: &Scene, object: ObjectId, property: &str) -> bool {
        let Some(sub_root) = self.sub_prefab_root_of(scene, object) else {
            return false;
        };
        let Some(guid) = self.guid_of(object) else {
            return false;
        };
        self.sub_prefabs
            .get_mut(&sub_root)
            .map(|instance| instance.overrides.remove(guid, property))
            .unwrap_or(false)
    }

    /// Stop tracking every override on `object`.
    pub fn remove_object_overrides(&mut self, scene: &Scene, object: ObjectId) {
        let Some(sub_root) = self.sub_prefab_root_of(scene, object) else {
            return;
        };
        let Some(guid) = self.guid_of(object) else {
            return;
        };
        if let Some(instance) = self.sub_prefabs.get_mut(&sub_root) {
            instance.overrides.remove_object(guid);
        }
    }

    fn prune_dead(&mut self, scene: &Scene) {
        self.object_to_guid.retain(|&id, _| scene.is_alive(id));
        self.guid_to_object.retain(|_, &mut id| scene.is_alive(id));
        self.sub_prefabs.retain(|&root, _| scene.is_alive(root));
    }
}
