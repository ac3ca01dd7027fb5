//! Scene object handles and records.

use serde::{Deserialize, Serialize};

use crate::class::ClassId;
use crate::property::PropertyBag;

/// A scene-local object handle.
///
/// Layout: slot index + spawn tick. The spawn tick replaces a generation
/// counter for ABA detection: if a slot is reused, the new object's spawn
/// tick differs, so stale handles never resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    index: u32,
    spawn_tick: u64,
}

impl ObjectId {
    pub(crate) fn new(index: u32, spawn_tick: u64) -> Self {
        Self { index, spawn_tick }
    }

    pub fn index(self) -> u32 {
        self.index
    }

    pub fn spawn_tick(self) -> u64 {
        self.spawn_tick
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Object({}:{})", self.index, self.spawn_tick)
    }
}

/// Actor-specific state: the actor tree and owned components.
#[derive(Debug, Clone, Default)]
pub struct ActorData {
    /// The component the actor presents to the scene hierarchy.
    pub root_component: Option<ObjectId>,
    /// Parent actor in the actor tree.
    pub parent: Option<ObjectId>,
    /// Child actors, in attach order.
    pub children: Vec<ObjectId>,
    /// Owned components, in creation order.
    pub components: Vec<ObjectId>,
}

/// Component-specific state: scene attachment, distinct from ownership.
#[derive(Debug, Clone, Default)]
pub struct ComponentData {
    /// The component this one is attached to in the scene. May belong to
    /// a different actor than the owner.
    pub scene_parent: Option<ObjectId>,
    /// Components attached to this one, in attach order.
    pub attach_children: Vec<ObjectId>,
}

/// Kind-specific payload of a scene object.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    Actor(ActorData),
    Component(ComponentData),
    Object,
}

/// A live scene object: an actor, a component, or a plain owned object.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub(crate) name: String,
    pub(crate) class: ClassId,
    pub(crate) outer: Option<ObjectId>,
    pub(crate) flags: u32,
    pub(crate) properties: PropertyBag,
    pub(crate) kind: ObjectKind,
}

impl SceneObject {
    /// Object is never serialized.
    pub const TRANSIENT: u32 = 1 << 0;
    /// Object is serialized only when saving for editor use.
    pub const EDITOR_ONLY: u32 = 1 << 1;
    /// Object was created by its owner's class constructor and is
    /// matched by name at load time instead of being re-created.
    pub const DEFAULT_SUBOBJECT: u32 = 1 << 2;

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    /// The owner in the ownership chain (`None` for root-level actors).
    pub fn outer(&self) -> Option<ObjectId> {
        self.outer
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }

    pub fn is_transient(&self) -> bool {
        self.flags & Self::TRANSIENT != 0
    }

    pub fn is_editor_only(&self) -> bool {
        self.flags & Self::EDITOR_ONLY != 0
    }

    pub fn is_default_subobject(&self) -> bool {
        self.flags & Self::DEFAULT_SUBOBJECT != 0
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn is_actor(&self) -> bool {
        matches!(self.kind, ObjectKind::Actor(_))
    }

    pub fn is_component(&self) -> bool {
        matches!(self.kind, ObjectKind::Component(_))
    }

    pub fn as_actor(&self) -> Option<&ActorData> {
        match &self.kind {
            ObjectKind::Actor(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_actor_mut(&mut self) -> Option<&mut ActorData> {
        match &mut self.kind {
            ObjectKind::Actor(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_component(&self) -> Option<&ComponentData> {
        match &self.kind {
            ObjectKind::Component(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_component_mut(&mut self) -> Option<&mut ComponentData> {
        match &mut self.kind {
            ObjectKind::Component(data) => Some(data),
            _ => None,
        }
    }
}
