//! Class descriptors and the class registry.
//!
//! A [`ClassInfo`] plays the role of a reflected class: it names the
//! object kind it constructs, the default property schema applied by the
//! "constructor" ([`Scene::create_object`](crate::Scene::create_object)),
//! and the default sub-objects the constructor creates. The default
//! property schema is also the drift reference when stale prefab override
//! records are applied at load.

use std::collections::HashMap;

use crate::property::PropertyBag;

/// A registry-local class handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ClassId(u32);

impl ClassId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Which object kind instances of a class are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Actor,
    Component,
    Object,
}

/// A default sub-object the class constructor creates, matched by name
/// at load time instead of being re-created.
#[derive(Debug, Clone)]
pub struct DefaultSubObjectSpec {
    pub name: String,
    pub class: ClassId,
}

/// A class descriptor.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub kind: ClassKind,
    /// Non-instantiable classes are excluded from prefab collection.
    pub instantiable: bool,
    /// Default property values, applied on construction. The set of
    /// names here is the class's property schema.
    pub defaults: PropertyBag,
    /// Sub-objects the constructor creates.
    pub default_subobjects: Vec<DefaultSubObjectSpec>,
}

impl ClassInfo {
    pub fn new(name: &str, kind: ClassKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            instantiable: true,
            defaults: PropertyBag::new(),
            default_subobjects: Vec::new(),
        }
    }

    pub fn not_instantiable(mut self) -> Self {
        self.instantiable = false;
        self
    }

    pub fn with_default(mut self, name: &str, value: crate::PropertyValue) -> Self {
        self.defaults.set(name, value);
        self
    }

    pub fn with_subobject(mut self, name: &str, class: ClassId) -> Self {
        self.default_subobjects.push(DefaultSubObjectSpec {
            name: name.to_owned(),
            class,
        });
        self
    }
}

/// A deduplicating class storage, indexed by [`ClassId`].
///
/// Index 0 is always the reserved `"MissingClass"` stub, substituted at
/// load time for records whose class cannot be resolved.
pub struct ClassRegistry {
    classes: Vec<ClassInfo>,
    lookup: HashMap<String, ClassId>,
}

impl ClassRegistry {
    /// The reserved stub class for unresolvable records.
    pub const MISSING: ClassId = ClassId(0);

    /// Name of the reserved stub class.
    pub const MISSING_NAME: &'static str = "MissingClass";

    pub fn new() -> Self {
        let mut registry = Self {
            classes: Vec::new(),
            lookup: HashMap::new(),
        };
        registry.register(ClassInfo::new(Self::MISSING_NAME, ClassKind::Object).not_instantiable());
        registry
    }

    /// Register a class, returning its [`ClassId`].
    ///
    /// # Panics
    ///
    /// Panics if a class with the same name is already registered.
    pub fn register(&mut self, info: ClassInfo) -> ClassId {
        assert!(
            !self.lookup.contains_key(&info.name),
            "class '{}' is already registered",
            info.name
        );
        let id = ClassId(self.classes.len() as u32);
        self.lookup.insert(info.name.clone(), id);
        self.classes.push(info);
        id
    }

    /// Resolve a [`ClassId`] to its descriptor.
    ///
    /// # Panics
    ///
    /// Panics if the ID is out of range.
    pub fn get(&self, id: ClassId) -> &ClassInfo {
        &self.classes[id.0 as usize]
    }

    /// Try to resolve a [`ClassId`], returning `None` if invalid.
    pub fn try_get(&self, id: ClassId) -> Option<&ClassInfo> {
        self.classes.get(id.0 as usize)
    }

    pub fn find_by_name(&self, name: &str) -> Option<ClassId> {
        self.lookup.get(name).copied()
    }

    /// Number of registered classes (including the stub class).
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.len() <= 1
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}
