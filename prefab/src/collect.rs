//! Graph collection: unit membership and stable GUID assignment.
//!
//! The collector walks a live hierarchy and decides what belongs to the
//! serialized unit. Membership follows the ownership (outer) chain: an
//! object belongs iff its chain terminates at one of the actors being
//! serialized. Assets, transient objects, editor-only objects in runtime
//! saves, and non-instantiable classes are excluded. Objects owned by an
//! unrelated actor are excluded silently — partial-subtree serialization
//! is expected. Only a chain that ends at no actor at all is an
//! ambiguous-ownership warning.
//!
//! GUID assignment reuses a caller-seeded `object → GUID` map, so an
//! unchanged live instance re-saves with the same GUIDs and a minimal
//! diff.

use std::collections::{HashMap, HashSet};

use amaranth_scene::{Guid, ObjectId, Scene};

use crate::writer::SaveTarget;

enum Membership {
    Unit,
    Foreign,
    Orphan,
}

/// Collects the actors and owned objects of one save call.
pub struct GraphCollector<'a> {
    scene: &'a Scene,
    target: SaveTarget,
    actors: Vec<ObjectId>,
    actor_set: HashSet<ObjectId>,
    objects: Vec<ObjectId>,
    object_set: HashSet<ObjectId>,
    /// Every assigned GUID, including seeded entries for objects outside
    /// the unit (sub-prefab internals from a previous load).
    guids: HashMap<ObjectId, Guid>,
    excluded: usize,
}

impl<'a> GraphCollector<'a> {
    pub fn new(scene: &'a Scene, target: SaveTarget, seed: HashMap<ObjectId, Guid>) -> Self {
        Self {
            scene,
            target,
            actors: Vec::new(),
            actor_set: HashSet::new(),
            objects: Vec::new(),
            object_set: HashSet::new(),
            guids: seed,
            excluded: 0,
        }
    }

    /// Reuse a previously assigned GUID if present, else mint one.
    pub fn assign_guid(&mut self, id: ObjectId) -> Guid {
        *self.guids.entry(id).or_insert_with(Guid::new)
    }

    /// The GUID assigned to `id`, if any.
    pub fn guid_for(&self, id: ObjectId) -> Option<Guid> {
        self.guids.get(&id).copied()
    }

    /// Walk the actor tree from `root`, recording unit actors. Actors in
    /// `sub_prefab_roots` get a GUID (they are referenced from the
    /// parent document) but neither they nor their subtrees join the
    /// unit — a reference node stands in for them.
    pub fn collect_actors(&mut self, root: ObjectId, sub_prefab_roots: &HashSet<ObjectId>) {
        self.assign_guid(root);
        if sub_prefab_roots.contains(&root) {
            return;
        }
        self.actors.push(root);
        self.actor_set.insert(root);

        let Some(data) = self.scene.get(root).and_then(|o| o.as_actor()).cloned() else {
            return;
        };
        for component in &data.components {
            if self.collect_object(*component).is_some() {
                self.collect_owned_defaults(*component);
            }
        }
        self.collect_owned_defaults(root);
        for child in &data.children {
            self.collect_actors(*child, sub_prefab_roots);
        }
    }

    /// Eagerly collect constructor-created sub-objects of `owner`, so
    /// identity-bearing defaults serialize even when nothing references
    /// them.
    fn collect_owned_defaults(&mut self, owner: ObjectId) {
        let defaults: Vec<ObjectId> = self
            .scene
            .iter()
            .filter(|(_, o)| o.outer() == Some(owner) && o.is_default_subobject())
            .map(|(id, _)| id)
            .collect();
        for id in defaults {
            if self.collect_object(id).is_some() {
                self.collect_owned_defaults(id);
            }
        }
    }

    /// Decide membership for `id` and return the GUID it is addressed by
    /// in this document, collecting it if it belongs to the unit.
    ///
    /// Returns `None` when the object is excluded and has no seeded GUID
    /// either; the caller encodes a null reference.
    pub fn collect_object(&mut self, id: ObjectId) -> Option<Guid> {
        if self.object_set.contains(&id) {
            return self.guid_for(id);
        }
        let obj = self.scene.get(id)?;
        if obj.is_actor() {
            // Actors are addressed through the actor tree, never as
            // object records; only already-assigned GUIDs resolve.
            return self.guid_for(id);
        }
        if obj.is_transient() {
            return None;
        }
        if obj.is_editor_only() && self.target == SaveTarget::Runtime {
            return None;
        }
        let instantiable = self
            .scene
            .registry()
            .try_get(obj.class())
            .map(|c| c.instantiable)
            .unwrap_or(false);
        if !instantiable {
            return None;
        }

        match self.membership(id) {
            Membership::Unit => {}
            Membership::Foreign => {
                // Outside the unit; a seeded GUID (sub-prefab internal)
                // still resolves as a reference.
                return self.guid_for(id);
            }
            Membership::Orphan => {
                log::warn!("excluding object '{}' with ambiguous ownership", obj.name());
                self.excluded += 1;
                return None;
            }
        }

        // Outers serialize before the objects they own.
        if let Some(outer) = obj.outer() {
            let outer_is_actor = self
                .scene
                .get(outer)
                .map(|o| o.is_actor())
                .unwrap_or(false);
            if !outer_is_actor {
                self.collect_object(outer);
            }
        }

        let guid = self.assign_guid(id);
        self.objects.push(id);
        self.object_set.insert(id);
        Some(guid)
    }

    fn membership(&self, id: ObjectId) -> Membership {
        let mut current = self.scene.get(id).and_then(|o| o.outer());
        while let Some(outer_id) = current {
            let Some(outer) = self.scene.get(outer_id) else {
                return Membership::Orphan;
            };
            if outer.is_transient() {
                return Membership::Foreign;
            }
            if outer.is_actor() {
                return if self.actor_set.contains(&outer_id) {
                    Membership::Unit
                } else {
                    Membership::Foreign
                };
            }
            current = outer.outer();
        }
        Membership::Orphan
    }

    pub fn actors(&self) -> &[ObjectId] {
        &self.actors
    }

    pub fn objects_len(&self) -> usize {
        self.objects.len()
    }

    pub fn object_at(&self, index: usize) -> ObjectId {
        self.objects[index]
    }

    pub fn is_unit_actor(&self, id: ObjectId) -> bool {
        self.actor_set.contains(&id)
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded
    }

    /// All assigned GUIDs, consumed when the save completes.
    pub fn into_guids(self) -> HashMap<ObjectId, Guid> {
        self.guids
    }
}
