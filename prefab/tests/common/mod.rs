//! Shared fixtures: a small class catalog and scene-building helpers.

#![allow(dead_code)]

use std::sync::Arc;

use amaranth_scene::{
    AssetId, AssetStore, ClassId, ClassInfo, ClassKind, ClassRegistry, ObjectId, PropertyValue,
    Scene,
};
use amaranth_prefab::{save_prefab, BinaryPropertyCodec, SaveTarget};

/// The standard test catalog: a `Panel` actor with a constructor-created
/// `Body` component, a free `Gadget` component, and a plain `Doodad`.
pub fn registry() -> Arc<ClassRegistry> {
    let mut registry = ClassRegistry::new();
    let body = registry.register(
        ClassInfo::new("Body", ClassKind::Component)
            .with_default("depth", PropertyValue::I64(0))
            .with_default("visible", PropertyValue::Bool(true)),
    );
    registry.register(
        ClassInfo::new("Panel", ClassKind::Actor)
            .with_default("width", PropertyValue::I64(100))
            .with_default("title", PropertyValue::String("panel".into()))
            .with_subobject("Body", body),
    );
    registry.register(
        ClassInfo::new("Gadget", ClassKind::Component)
            .with_default("speed", PropertyValue::F64(1.0))
            .with_default("target", PropertyValue::Null),
    );
    registry.register(
        ClassInfo::new("Doodad", ClassKind::Object)
            .with_default("tag", PropertyValue::String(String::new())),
    );
    Arc::new(registry)
}

/// The catalog with `Gadget` missing, for unresolvable-class scenarios.
pub fn registry_without_gadget() -> Arc<ClassRegistry> {
    let mut registry = ClassRegistry::new();
    let body = registry.register(
        ClassInfo::new("Body", ClassKind::Component)
            .with_default("depth", PropertyValue::I64(0))
            .with_default("visible", PropertyValue::Bool(true)),
    );
    registry.register(
        ClassInfo::new("Panel", ClassKind::Actor)
            .with_default("width", PropertyValue::I64(100))
            .with_default("title", PropertyValue::String("panel".into()))
            .with_subobject("Body", body),
    );
    Arc::new(registry)
}

/// The catalog with `Gadget` lacking its `speed` property, for
/// schema-drift scenarios.
pub fn registry_with_drifted_gadget() -> Arc<ClassRegistry> {
    let mut registry = ClassRegistry::new();
    let body = registry.register(
        ClassInfo::new("Body", ClassKind::Component)
            .with_default("depth", PropertyValue::I64(0))
            .with_default("visible", PropertyValue::Bool(true)),
    );
    registry.register(
        ClassInfo::new("Panel", ClassKind::Actor)
            .with_default("width", PropertyValue::I64(100))
            .with_default("title", PropertyValue::String("panel".into()))
            .with_subobject("Body", body),
    );
    registry.register(
        ClassInfo::new("Gadget", ClassKind::Component).with_default("target", PropertyValue::Null),
    );
    Arc::new(registry)
}

pub fn scene() -> Scene {
    Scene::new(registry())
}

pub fn class(scene: &Scene, name: &str) -> ClassId {
    scene
        .registry()
        .find_by_name(name)
        .unwrap_or_else(|| panic!("class '{name}' not registered"))
}

pub fn body_of(scene: &Scene, actor: ObjectId) -> ObjectId {
    scene
        .find_default_subobject_by_name(actor, "Body")
        .expect("Panel has a Body")
}

pub fn component_named(scene: &Scene, actor: ObjectId, name: &str) -> Option<ObjectId> {
    scene
        .get(actor)?
        .as_actor()?
        .components
        .iter()
        .copied()
        .find(|&c| scene.get(c).map(|o| o.name() == name).unwrap_or(false))
}

pub fn child_actor(scene: &Scene, actor: ObjectId, index: usize) -> ObjectId {
    scene.get(actor).unwrap().as_actor().unwrap().children[index]
}

pub fn set_prop(scene: &mut Scene, object: ObjectId, name: &str, value: PropertyValue) {
    scene
        .get_mut(object)
        .expect("object is alive")
        .properties_mut()
        .set(name, value);
}

pub fn get_prop(scene: &Scene, object: ObjectId, name: &str) -> Option<PropertyValue> {
    scene.get(object)?.properties().get(name).cloned()
}

/// Author the standard child asset at `path`: a `Panel` whose extra
/// `Gadget` component `g` has `speed` authored to 5.0.
pub fn make_child_asset(assets: &mut AssetStore, path: &str) -> AssetId {
    let mut scene = scene();
    let root = scene.spawn_actor(class(&scene, "Panel"), None);
    let gadget = scene.create_object(class(&scene, "Gadget"), Some(root), "g");
    set_prop(&mut scene, gadget, "speed", PropertyValue::F64(5.0));

    let bytes = save_prefab(
        &scene,
        assets,
        &BinaryPropertyCodec,
        root,
        SaveTarget::Editor,
    )
    .expect("child asset saves");
    assets.insert_prefab(path, bytes)
}

/// The `g` gadget of a loaded child-asset instance root.
pub fn gadget_of(scene: &Scene, instance_root: ObjectId) -> ObjectId {
    component_named(scene, instance_root, "g").expect("instance has gadget 'g'")
}
