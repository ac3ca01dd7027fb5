//! The live object arena and hierarchy operations.
//!
//! A [`Scene`] owns every live object: actors, their components, and
//! plain owned sub-objects. It realizes the object-model interface the
//! prefab engine consumes: construction with class defaults and default
//! sub-objects, recursive destruction, actor-tree parenting, component
//! scene attachment, and default-sub-object lookup by name.
//!
//! All operations are synchronous and take `&mut Scene`; the engine makes
//! no parallel progress while walking the graph.

use std::sync::Arc;

use crate::class::{ClassId, ClassKind, ClassRegistry};
use crate::object::{ActorData, ComponentData, ObjectId, ObjectKind, SceneObject};

struct Slot {
    object: Option<SceneObject>,
    spawn_tick: u64,
}

/// The central container owning all live scene objects.
pub struct Scene {
    registry: Arc<ClassRegistry>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    tick: u64,
    count: usize,
}

impl Scene {
    pub fn new(registry: Arc<ClassRegistry>) -> Self {
        Self {
            registry,
            slots: Vec::new(),
            free: Vec::new(),
            tick: 0,
            count: 0,
        }
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn registry_handle(&self) -> Arc<ClassRegistry> {
        Arc::clone(&self.registry)
    }

    fn alloc(&mut self, object: SceneObject) -> ObjectId {
        self.tick += 1;
        self.count += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            slot.spawn_tick = self.tick;
            ObjectId::new(index, self.tick)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                object: Some(object),
                spawn_tick: self.tick,
            });
            ObjectId::new(index, self.tick)
        }
    }

    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.spawn_tick != id.spawn_tick() {
            return None;
        }
        slot.object.as_ref()
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.spawn_tick != id.spawn_tick() {
            return None;
        }
        slot.object.as_mut()
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.count
    }

    /// Iterate all live objects in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &SceneObject)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.object
                .as_ref()
                .map(|obj| (ObjectId::new(index as u32, slot.spawn_tick), obj))
        })
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Create an object of `class` owned by `outer`, running the class
    /// "constructor": default properties are applied and default
    /// sub-objects are created (flagged [`SceneObject::DEFAULT_SUBOBJECT`]).
    ///
    /// Components created under an actor outer are appended to the
    /// actor's component list; the first one becomes the root component.
    pub fn create_object(&mut self, class: ClassId, outer: Option<ObjectId>, name: &str) -> ObjectId {
        self.create_object_flagged(class, outer, name, 0)
    }

    fn create_object_flagged(
        &mut self,
        class: ClassId,
        outer: Option<ObjectId>,
        name: &str,
        flags: u32,
    ) -> ObjectId {
        let info = self.registry.get(class);
        let kind = match info.kind {
            ClassKind::Actor => ObjectKind::Actor(ActorData::default()),
            ClassKind::Component => ObjectKind::Component(ComponentData::default()),
            ClassKind::Object => ObjectKind::Object,
        };
        let properties = info.defaults.clone();
        let specs: Vec<_> = info.default_subobjects.clone();

        let id = self.alloc(SceneObject {
            name: name.to_owned(),
            class,
            outer,
            flags,
            properties,
            kind,
        });
        self.register_with_outer(id, outer);

        for spec in specs {
            self.create_object_flagged(
                spec.class,
                Some(id),
                &spec.name,
                SceneObject::DEFAULT_SUBOBJECT,
            );
        }
        id
    }

    fn register_with_outer(&mut self, id: ObjectId, outer: Option<ObjectId>) {
        let Some(outer) = outer else {
            return;
        };
        let is_component = self.get(id).map(|o| o.is_component()).unwrap_or(false);
        if !is_component {
            return;
        }
        if let Some(actor) = self.get_mut(outer).and_then(|o| o.as_actor_mut()) {
            actor.components.push(id);
            if actor.root_component.is_none() {
                actor.root_component = Some(id);
            }
        }
    }

    /// Create an actor of `class` and parent it under `parent` (if any).
    /// The actor's name defaults to its class name.
    pub fn spawn_actor(&mut self, class: ClassId, parent: Option<ObjectId>) -> ObjectId {
        let name = self.registry.get(class).name.clone();
        let actor = self.create_object(class, None, &name);
        if let Some(parent) = parent {
            self.set_actor_parent(actor, parent);
        }
        actor
    }

    /// Create a stub standing in for a record whose class could not be
    /// resolved. The stub carries [`ClassRegistry::MISSING`] but the kind
    /// the record demanded, so attachment still works around it.
    pub fn create_missing_stub(
        &mut self,
        kind: ClassKind,
        outer: Option<ObjectId>,
        name: &str,
    ) -> ObjectId {
        let kind = match kind {
            ClassKind::Actor => ObjectKind::Actor(ActorData::default()),
            ClassKind::Component => ObjectKind::Component(ComponentData::default()),
            ClassKind::Object => ObjectKind::Object,
        };
        let id = self.alloc(SceneObject {
            name: name.to_owned(),
            class: ClassRegistry::MISSING,
            outer,
            flags: 0,
            properties: crate::PropertyBag::new(),
            kind,
        });
        self.register_with_outer(id, outer);
        id
    }

    // -----------------------------------------------------------------------
    // Destruction
    // -----------------------------------------------------------------------

    /// Destroy an object and everything it transitively owns (child
    /// actors, components, owned sub-objects), detaching it from the
    /// actor tree and scene hierarchy first.
    pub fn destroy_object(&mut self, id: ObjectId) {
        if !self.is_alive(id) {
            return;
        }
        // Unhook from the structures that reference this object.
        if self.get(id).map(|o| o.is_actor()).unwrap_or(false) {
            self.clear_actor_parent(id);
        }
        if self.get(id).map(|o| o.is_component()).unwrap_or(false) {
            self.detach(id);
            if let Some(outer) = self.get(id).and_then(|o| o.outer()) {
                if let Some(actor) = self.get_mut(outer).and_then(|o| o.as_actor_mut()) {
                    actor.components.retain(|&c| c != id);
                    if actor.root_component == Some(id) {
                        actor.root_component = None;
                    }
                }
            }
        }
        self.destroy_subtree(id);
    }

    fn destroy_subtree(&mut self, id: ObjectId) {
        let Some(object) = self.get(id) else {
            return;
        };

        let mut doomed: Vec<ObjectId> = Vec::new();
        if let Some(actor) = object.as_actor() {
            doomed.extend(actor.children.iter().copied());
            doomed.extend(actor.components.iter().copied());
        }
        if object.is_component() {
            // Unhook from a scene parent that may survive this subtree.
            self.detach(id);
            // Orphan scene-attached children that are not owned below us.
            let attach_children = self
                .get(id)
                .and_then(|o| o.as_component())
                .map(|c| c.attach_children.clone())
                .unwrap_or_default();
            for child in attach_children {
                if let Some(c) = self.get_mut(child).and_then(|o| o.as_component_mut()) {
                    c.scene_parent = None;
                }
            }
        }
        // Plain owned objects are only discoverable by outer scan.
        let owned: Vec<ObjectId> = self
            .iter()
            .filter(|(_, o)| o.outer() == Some(id) && !o.is_component())
            .map(|(oid, _)| oid)
            .collect();
        doomed.extend(owned);

        for child in doomed {
            self.destroy_subtree(child);
        }

        let slot = &mut self.slots[id.index() as usize];
        if slot.spawn_tick == id.spawn_tick() && slot.object.is_some() {
            slot.object = None;
            self.free.push(id.index());
            self.count -= 1;
        }
    }

    // -----------------------------------------------------------------------
    // Ownership queries
    // -----------------------------------------------------------------------

    pub fn outer_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.get(id)?.outer()
    }

    /// Walk the outer chain to the first actor, or `None` if the chain
    /// ends without reaching one. An actor is its own owning actor.
    pub fn owning_actor(&self, id: ObjectId) -> Option<ObjectId> {
        let mut current = Some(id);
        while let Some(obj_id) = current {
            let obj = self.get(obj_id)?;
            if obj.is_actor() {
                return Some(obj_id);
            }
            current = obj.outer();
        }
        None
    }

    // -----------------------------------------------------------------------
    // Actor tree
    // -----------------------------------------------------------------------

    /// Parent `actor` under `parent` in the actor tree, keeping both
    /// sides of the relationship consistent.
    ///
    /// # Panics
    ///
    /// Panics if `actor == parent` or either is not an actor.
    pub fn set_actor_parent(&mut self, actor: ObjectId, parent: ObjectId) {
        assert_ne!(actor, parent, "cannot parent actor {actor} to itself");
        assert!(
            self.get(actor).map(|o| o.is_actor()).unwrap_or(false),
            "{actor} is not a live actor"
        );
        assert!(
            self.get(parent).map(|o| o.is_actor()).unwrap_or(false),
            "{parent} is not a live actor"
        );

        let old_parent = self.get(actor).and_then(|o| o.as_actor()).and_then(|a| a.parent);
        if old_parent == Some(parent) {
            return;
        }
        if let Some(old) = old_parent {
            if let Some(data) = self.get_mut(old).and_then(|o| o.as_actor_mut()) {
                data.children.retain(|&c| c != actor);
            }
        }
        if let Some(data) = self.get_mut(actor).and_then(|o| o.as_actor_mut()) {
            data.parent = Some(parent);
        }
        if let Some(data) = self.get_mut(parent).and_then(|o| o.as_actor_mut()) {
            if !data.children.contains(&actor) {
                data.children.push(actor);
            }
        }
    }

    /// Remove `actor` from its parent's children. No-op without a parent.
    pub fn clear_actor_parent(&mut self, actor: ObjectId) {
        let Some(parent) = self
            .get(actor)
            .and_then(|o| o.as_actor())
            .and_then(|a| a.parent)
        else {
            return;
        };
        if let Some(data) = self.get_mut(actor).and_then(|o| o.as_actor_mut()) {
            data.parent = None;
        }
        if let Some(data) = self.get_mut(parent).and_then(|o| o.as_actor_mut()) {
            data.children.retain(|&c| c != actor);
        }
    }

    pub fn actor_parent(&self, actor: ObjectId) -> Option<ObjectId> {
        self.get(actor)?.as_actor()?.parent
    }

    /// Set the component an actor presents to the scene hierarchy.
    pub fn set_root_component(&mut self, actor: ObjectId, component: Option<ObjectId>) {
        if let Some(data) = self.get_mut(actor).and_then(|o| o.as_actor_mut()) {
            data.root_component = component;
        }
    }

    // -----------------------------------------------------------------------
    // Component scene attachment
    // -----------------------------------------------------------------------

    /// Attach `child` under `parent` in the scene hierarchy. The two may
    /// be owned by different actors.
    ///
    /// # Panics
    ///
    /// Panics if `child == parent` or either is not a component.
    pub fn attach_child(&mut self, parent: ObjectId, child: ObjectId) {
        assert_ne!(child, parent, "cannot attach component {child} to itself");
        assert!(
            self.get(parent).map(|o| o.is_component()).unwrap_or(false),
            "{parent} is not a live component"
        );
        assert!(
            self.get(child).map(|o| o.is_component()).unwrap_or(false),
            "{child} is not a live component"
        );

        let old = self
            .get(child)
            .and_then(|o| o.as_component())
            .and_then(|c| c.scene_parent);
        if old == Some(parent) {
            return;
        }
        if let Some(old) = old {
            if let Some(data) = self.get_mut(old).and_then(|o| o.as_component_mut()) {
                data.attach_children.retain(|&c| c != child);
            }
        }
        if let Some(data) = self.get_mut(child).and_then(|o| o.as_component_mut()) {
            data.scene_parent = Some(parent);
        }
        if let Some(data) = self.get_mut(parent).and_then(|o| o.as_component_mut()) {
            if !data.attach_children.contains(&child) {
                data.attach_children.push(child);
            }
        }
    }

    /// Detach a component from its scene parent. No-op when unattached.
    pub fn detach(&mut self, component: ObjectId) {
        let Some(parent) = self
            .get(component)
            .and_then(|o| o.as_component())
            .and_then(|c| c.scene_parent)
        else {
            return;
        };
        if let Some(data) = self.get_mut(component).and_then(|o| o.as_component_mut()) {
            data.scene_parent = None;
        }
        if let Some(data) = self.get_mut(parent).and_then(|o| o.as_component_mut()) {
            data.attach_children.retain(|&c| c != component);
        }
    }

    pub fn scene_parent(&self, component: ObjectId) -> Option<ObjectId> {
        self.get(component)?.as_component()?.scene_parent
    }

    // -----------------------------------------------------------------------
    // Default sub-object lookup
    // -----------------------------------------------------------------------

    /// Find a constructor-created sub-object of `owner` by name.
    pub fn find_default_subobject_by_name(&self, owner: ObjectId, name: &str) -> Option<ObjectId> {
        self.iter()
            .find(|(_, o)| {
                o.outer() == Some(owner) && o.is_default_subobject() && o.name() == name
            })
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassInfo;
    use crate::PropertyValue;

    fn test_registry() -> Arc<ClassRegistry> {
        let mut registry = ClassRegistry::new();
        let body = registry.register(
            ClassInfo::new("Body", ClassKind::Component)
                .with_default("depth", PropertyValue::I64(0)),
        );
        registry.register(
            ClassInfo::new("Panel", ClassKind::Actor)
                .with_default("width", PropertyValue::I64(100))
                .with_subobject("Body", body),
        );
        registry.register(ClassInfo::new("Gadget", ClassKind::Component));
        registry.register(ClassInfo::new("Doodad", ClassKind::Object));
        Arc::new(registry)
    }

    fn class(scene: &Scene, name: &str) -> ClassId {
        scene.registry().find_by_name(name).unwrap()
    }

    #[test]
    fn constructor_applies_defaults_and_subobjects() {
        let mut scene = Scene::new(test_registry());
        let panel = scene.spawn_actor(class(&scene, "Panel"), None);

        let obj = scene.get(panel).unwrap();
        assert_eq!(obj.properties().get("width"), Some(&PropertyValue::I64(100)));

        let body = scene.find_default_subobject_by_name(panel, "Body").unwrap();
        let body_obj = scene.get(body).unwrap();
        assert!(body_obj.is_default_subobject());
        assert!(body_obj.is_component());
        assert_eq!(obj.as_actor().unwrap().root_component, Some(body));
        assert_eq!(obj.as_actor().unwrap().components, vec![body]);
    }

    #[test]
    fn stale_handle_does_not_resolve() {
        let mut scene = Scene::new(test_registry());
        let doodad = scene.create_object(class(&scene, "Doodad"), None, "d");
        scene.destroy_object(doodad);
        assert!(scene.get(doodad).is_none());

        // Slot reuse mints a different spawn tick.
        let other = scene.create_object(class(&scene, "Doodad"), None, "e");
        assert_eq!(other.index(), doodad.index());
        assert!(scene.get(doodad).is_none());
        assert!(scene.get(other).is_some());
    }

    #[test]
    fn actor_parenting_is_consistent() {
        let mut scene = Scene::new(test_registry());
        let a = scene.spawn_actor(class(&scene, "Panel"), None);
        let b = scene.spawn_actor(class(&scene, "Panel"), Some(a));

        assert_eq!(scene.actor_parent(b), Some(a));
        assert_eq!(scene.get(a).unwrap().as_actor().unwrap().children, vec![b]);

        scene.clear_actor_parent(b);
        assert!(scene.actor_parent(b).is_none());
        assert!(scene.get(a).unwrap().as_actor().unwrap().children.is_empty());
    }

    #[test]
    #[should_panic(expected = "cannot parent actor")]
    fn self_parent_panics() {
        let mut scene = Scene::new(test_registry());
        let a = scene.spawn_actor(class(&scene, "Panel"), None);
        scene.set_actor_parent(a, a);
    }

    #[test]
    fn attach_reattach_detach() {
        let mut scene = Scene::new(test_registry());
        let a = scene.spawn_actor(class(&scene, "Panel"), None);
        let b = scene.spawn_actor(class(&scene, "Panel"), None);
        let body_a = scene.find_default_subobject_by_name(a, "Body").unwrap();
        let body_b = scene.find_default_subobject_by_name(b, "Body").unwrap();
        let gadget = scene.create_object(class(&scene, "Gadget"), Some(a), "g");

        scene.attach_child(body_a, gadget);
        assert_eq!(scene.scene_parent(gadget), Some(body_a));

        // Cross-actor reattach.
        scene.attach_child(body_b, gadget);
        assert_eq!(scene.scene_parent(gadget), Some(body_b));
        assert!(scene
            .get(body_a)
            .unwrap()
            .as_component()
            .unwrap()
            .attach_children
            .is_empty());

        scene.detach(gadget);
        assert!(scene.scene_parent(gadget).is_none());
    }

    #[test]
    fn destroy_actor_destroys_subtree() {
        let mut scene = Scene::new(test_registry());
        let root = scene.spawn_actor(class(&scene, "Panel"), None);
        let child = scene.spawn_actor(class(&scene, "Panel"), Some(root));
        let gadget = scene.create_object(class(&scene, "Gadget"), Some(child), "g");
        let doodad = scene.create_object(class(&scene, "Doodad"), Some(root), "d");
        let before = scene.object_count();

        scene.destroy_object(root);

        assert!(!scene.is_alive(root));
        assert!(!scene.is_alive(child));
        assert!(!scene.is_alive(gadget));
        assert!(!scene.is_alive(doodad));
        assert_eq!(scene.object_count(), before - 6); // 2 panels + 2 bodies + gadget + doodad
    }

    #[test]
    fn destroy_component_unhooks_owner() {
        let mut scene = Scene::new(test_registry());
        let a = scene.spawn_actor(class(&scene, "Panel"), None);
        let body = scene.find_default_subobject_by_name(a, "Body").unwrap();

        scene.destroy_object(body);

        let actor = scene.get(a).unwrap().as_actor().unwrap().clone();
        assert!(actor.components.is_empty());
        assert!(actor.root_component.is_none());
    }

    #[test]
    fn owning_actor_walks_outer_chain() {
        let mut scene = Scene::new(test_registry());
        let a = scene.spawn_actor(class(&scene, "Panel"), None);
        let gadget = scene.create_object(class(&scene, "Gadget"), Some(a), "g");
        let doodad = scene.create_object(class(&scene, "Doodad"), Some(gadget), "d");

        assert_eq!(scene.owning_actor(doodad), Some(a));
        assert_eq!(scene.owning_actor(a), Some(a));

        let orphan = scene.create_object(class(&scene, "Doodad"), None, "o");
        assert!(scene.owning_actor(orphan).is_none());
    }
}
