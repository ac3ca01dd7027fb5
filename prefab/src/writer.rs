//! The prefab writer: live graph → [`PrefabDocument`] → bytes.
//!
//! Concrete actors emit class, flags, property blob, root-component GUID
//! and recurse into children; a sub-prefab instance emits only a
//! reference node (asset index, GUID remap, current override records) —
//! nested defaults are never re-embedded, keeping nested-prefab edits
//! centralized in the nested asset.
//!
//! Saving is idempotent: an unchanged graph with a seeded GUID map
//! produces byte-identical output, because every walk and table is in
//! deterministic order.

use std::collections::{HashMap, HashSet};

use amaranth_scene::{AssetId, AssetStore, ClassId, Guid, ObjectId, Scene};

use crate::codec::{PropertyCodec, ReferenceSink};
use crate::collect::GraphCollector;
use crate::document::{
    ActorNode, ComponentRecord, ObjectRecord, OverrideRecord, PrefabDocument, FORMAT_VERSION,
};
use crate::error::SaveError;
use crate::subprefab::{SubPrefabInstance, SubPrefabMap};
use crate::tables::{ReferenceTables, NONE_INDEX};

/// What a save is for. Runtime saves drop editor-only objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    Editor,
    Runtime,
}

/// A completed save: the transient document plus the GUID map the caller
/// retains for stable re-saves.
pub struct SavedPrefab {
    pub document: PrefabDocument,
    pub object_to_guid: HashMap<ObjectId, Guid>,
}

/// Mutable save-call state: the collector and the reference tables. Also
/// the [`ReferenceSink`] handed to the property codec, which is where
/// encoded object references are intercepted and substituted with GUIDs
/// and table indices.
struct SaveState<'a> {
    scene: &'a Scene,
    assets: &'a AssetStore,
    collector: GraphCollector<'a>,
    tables: ReferenceTables,
}

impl ReferenceSink for SaveState<'_> {
    fn object_to_guid(&mut self, id: ObjectId) -> Guid {
        self.collector.collect_object(id).unwrap_or(Guid::NIL)
    }

    fn asset_to_index(&mut self, id: AssetId) -> i32 {
        match self.assets.path(id) {
            Some(path) => {
                let path = path.to_owned();
                self.tables.find_or_add_asset(&path)
            }
            None => {
                log::warn!("encoding unknown asset handle {} as null", id.index());
                NONE_INDEX
            }
        }
    }

    fn class_to_index(&mut self, id: ClassId) -> i32 {
        match self.scene.registry().try_get(id) {
            Some(info) => {
                let name = info.name.clone();
                self.tables.find_or_add_class(&name)
            }
            None => NONE_INDEX,
        }
    }

    fn name_to_index(&mut self, name: &str) -> i32 {
        self.tables.find_or_add_name(name)
    }
}

/// Serializes one actor hierarchy into a prefab document.
pub struct PrefabWriter<'a> {
    scene: &'a Scene,
    assets: &'a AssetStore,
    codec: &'a dyn PropertyCodec,
    target: SaveTarget,
    sub_prefabs: Option<&'a SubPrefabMap>,
}

impl<'a> PrefabWriter<'a> {
    pub fn new(
        scene: &'a Scene,
        assets: &'a AssetStore,
        codec: &'a dyn PropertyCodec,
        target: SaveTarget,
    ) -> Self {
        Self {
            scene,
            assets,
            codec,
            target,
            sub_prefabs: None,
        }
    }

    /// Emit reference nodes for the given nested prefab instances
    /// instead of serializing their subtrees.
    pub fn with_sub_prefabs(mut self, map: &'a SubPrefabMap) -> Self {
        self.sub_prefabs = Some(map);
        self
    }

    /// Serialize the hierarchy rooted at `root` into a document.
    ///
    /// `seed` is the caller's retained `object → GUID` map (empty for a
    /// first save); all GUIDs assigned during this save are returned so
    /// the caller can keep identity stable across re-saves.
    pub fn save(
        &self,
        root: ObjectId,
        seed: &HashMap<ObjectId, Guid>,
    ) -> Result<SavedPrefab, SaveError> {
        let root_obj = self.scene.get(root).ok_or(SaveError::DeadRoot)?;
        if !root_obj.is_actor() {
            return Err(SaveError::NotAnActor);
        }

        let sub_roots: HashSet<ObjectId> = self
            .sub_prefabs
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();
        // Live object → parent-space GUID, for override snapshots.
        let guid_to_object: HashMap<Guid, ObjectId> =
            seed.iter().map(|(&id, &guid)| (guid, id)).collect();

        let mut state = SaveState {
            scene: self.scene,
            assets: self.assets,
            collector: GraphCollector::new(self.scene, self.target, seed.clone()),
            tables: ReferenceTables::new(),
        };
        state.collector.collect_actors(root, &sub_roots);

        let root_node = self.serialize_actor_recursive(root, &guid_to_object, &mut state)?;

        // Emit object and component records. Encoding can discover new
        // property-referenced objects, so iterate by index while the
        // list grows.
        let mut objects = Vec::new();
        let mut components = Vec::new();
        let mut index = 0;
        while index < state.collector.objects_len() {
            let id = state.collector.object_at(index);
            index += 1;
            let Some(obj) = self.scene.get(id) else {
                continue;
            };
            if obj.is_component() {
                let record = self.serialize_component(id, &mut state)?;
                components.push(record);
            } else {
                let record = self.serialize_object(id, &mut state)?;
                objects.push(record);
            }
        }

        Ok(SavedPrefab {
            document: PrefabDocument {
                version: FORMAT_VERSION,
                tables: state.tables,
                objects,
                components,
                root: root_node,
            },
            object_to_guid: state.collector.into_guids(),
        })
    }

    /// [`save`](Self::save) flushed to bytes.
    pub fn save_to_bytes(
        &self,
        root: ObjectId,
        seed: &HashMap<ObjectId, Guid>,
    ) -> Result<(Vec<u8>, HashMap<ObjectId, Guid>), SaveError> {
        let saved = self.save(root, seed)?;
        let bytes = saved.document.to_bytes()?;
        Ok((bytes, saved.object_to_guid))
    }

    fn serialize_actor_recursive(
        &self,
        actor: ObjectId,
        guid_to_object: &HashMap<Guid, ObjectId>,
        state: &mut SaveState<'a>,
    ) -> Result<ActorNode, SaveError> {
        if let Some(instance) = self.sub_prefabs.and_then(|m| m.get(&actor)) {
            return self.serialize_prefab_reference(actor, instance, guid_to_object, state);
        }

        let obj = self.scene.get(actor).ok_or(SaveError::DeadRoot)?;
        let data = obj.as_actor().ok_or(SaveError::NotAnActor)?.clone();

        let guid = state.collector.assign_guid(actor);
        let class_index = state.class_to_index(obj.class());
        let flags = obj.flags();
        let property_blob = self.codec.encode(self.scene, actor, None, state)?;
        let root_component_guid = data
            .root_component
            .map(|c| state.object_to_guid(c))
            .unwrap_or(Guid::NIL);
        let (default_subobject_guids, default_subobject_names) =
            self.default_subobject_arrays(actor, state);

        let mut children = Vec::with_capacity(data.children.len());
        for child in &data.children {
            children.push(self.serialize_actor_recursive(*child, guid_to_object, state)?);
        }

        Ok(ActorNode::Concrete {
            guid,
            class_index,
            flags,
            property_blob,
            root_component_guid,
            default_subobject_guids,
            default_subobject_names,
            children,
        })
    }

    fn serialize_prefab_reference(
        &self,
        actor: ObjectId,
        instance: &SubPrefabInstance,
        guid_to_object: &HashMap<Guid, ObjectId>,
        state: &mut SaveState<'a>,
    ) -> Result<ActorNode, SaveError> {
        let asset_index = state.asset_to_index(instance.asset);
        let root_guid = state.collector.assign_guid(actor);

        let mut overrides = Vec::new();
        for (object_guid, names) in instance.overrides.iter() {
            let target = guid_to_object.get(&object_guid).copied();
            let alive = target.map(|id| self.scene.is_alive(id)).unwrap_or(false);
            let Some(target) = target.filter(|_| alive) else {
                log::warn!("dropping stale override records for object {object_guid}");
                continue;
            };
            let property_names = names
                .iter()
                .map(|name| state.name_to_index(name))
                .collect();
            let property_blob = self.codec.encode(self.scene, target, Some(names), state)?;
            overrides.push(OverrideRecord {
                object_guid,
                property_names,
                property_blob,
            });
        }

        // Sorted for byte-identical re-saves.
        let mut guid_remap: Vec<(Guid, Guid)> = instance
            .guid_remap
            .iter()
            .map(|(&from, &to)| (from, to))
            .collect();
        guid_remap.sort();

        Ok(ActorNode::Prefab {
            asset_index,
            root_guid,
            overrides,
            guid_remap,
        })
    }

    fn serialize_object(
        &self,
        id: ObjectId,
        state: &mut SaveState<'a>,
    ) -> Result<ObjectRecord, SaveError> {
        let obj = self.scene.get(id).ok_or(SaveError::DeadObject(id))?;
        let guid = state.collector.guid_for(id).unwrap_or(Guid::NIL);
        let class_index = state.class_to_index(obj.class());
        let flags = obj.flags();
        let outer_guid = obj
            .outer()
            .and_then(|o| state.collector.guid_for(o))
            .unwrap_or(Guid::NIL);
        let property_blob = self.codec.encode(self.scene, id, None, state)?;
        let (default_subobject_guids, default_subobject_names) =
            self.default_subobject_arrays(id, state);

        Ok(ObjectRecord {
            guid,
            class_index,
            flags,
            outer_guid,
            property_blob,
            default_subobject_guids,
            default_subobject_names,
        })
    }

    fn serialize_component(
        &self,
        id: ObjectId,
        state: &mut SaveState<'a>,
    ) -> Result<ComponentRecord, SaveError> {
        let obj = self.scene.get(id).ok_or(SaveError::DeadObject(id))?;
        let guid = state.collector.guid_for(id).unwrap_or(Guid::NIL);
        let class_index = state.class_to_index(obj.class());
        let flags = obj.flags();
        let name = obj.name().to_owned();
        let outer_guid = obj
            .outer()
            .and_then(|o| state.collector.guid_for(o))
            .unwrap_or(Guid::NIL);
        let scene_parent = obj.as_component().and_then(|c| c.scene_parent);
        let component_name = state.name_to_index(&name);
        // May point at a component on another actor of the unit, or into
        // a sub-prefab instance (resolved through the seeded map).
        let scene_parent_guid = scene_parent
            .map(|p| state.object_to_guid(p))
            .unwrap_or(Guid::NIL);
        let property_blob = self.codec.encode(self.scene, id, None, state)?;
        let (default_subobject_guids, default_subobject_names) =
            self.default_subobject_arrays(id, state);

        Ok(ComponentRecord {
            guid,
            class_index,
            flags,
            outer_guid,
            component_name,
            scene_parent_guid,
            property_blob,
            default_subobject_guids,
            default_subobject_names,
        })
    }

    /// The parallel `(GUID, name index)` arrays for `owner`'s collected
    /// constructor-created sub-objects, letting the reader match them by
    /// name instead of re-creating them.
    fn default_subobject_arrays(
        &self,
        owner: ObjectId,
        state: &mut SaveState<'a>,
    ) -> (Vec<Guid>, Vec<i32>) {
        let mut guids = Vec::new();
        let mut names = Vec::new();
        let mut index = 0;
        while index < state.collector.objects_len() {
            let id = state.collector.object_at(index);
            index += 1;
            let Some(obj) = self.scene.get(id) else {
                continue;
            };
            if obj.outer() != Some(owner) || !obj.is_default_subobject() {
                continue;
            }
            let Some(guid) = state.collector.guid_for(id) else {
                continue;
            };
            let name = obj.name().to_owned();
            guids.push(guid);
            names.push(state.name_to_index(&name));
        }
        (guids, names)
    }
}
