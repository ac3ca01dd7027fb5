//! Save/load round-trip behavior for flat and nested hierarchies.

mod common;

use amaranth_prefab::{
    load_prefab, save_prefab, BinaryPropertyCodec, LoadContext, LoadError, PrefabDocument,
    PrefabHelper, PrefabReader, SaveTarget, StructuralError,
};
use amaranth_scene::{AssetStore, PropertyValue, Scene};

use common::*;

const CODEC: BinaryPropertyCodec = BinaryPropertyCodec;

/// Root panel with a child panel, an extra gadget on the root, and a
/// property reference from the gadget to the child's body.
fn build_tree(scene: &mut Scene) -> amaranth_scene::ObjectId {
    let root = scene.spawn_actor(class(scene, "Panel"), None);
    let child = scene.spawn_actor(class(scene, "Panel"), Some(root));
    let gadget = scene.create_object(class(scene, "Gadget"), Some(root), "g");

    set_prop(scene, root, "width", PropertyValue::I64(42));
    let child_body = body_of(scene, child);
    set_prop(scene, child_body, "depth", PropertyValue::I64(7));
    set_prop(scene, gadget, "target", PropertyValue::Object(child_body));
    root
}

#[test]
fn round_trip_preserves_structure_and_values() {
    let mut source = scene();
    let root = build_tree(&mut source);
    let mut assets = AssetStore::new();
    let asset = assets.insert_prefab(
        "tree.prefab",
        save_prefab(&source, &assets, &CODEC, root, SaveTarget::Editor).unwrap(),
    );

    let mut target = scene();
    let loaded = load_prefab(&mut target, &assets, &CODEC, asset, None).unwrap();
    assert!(loaded.summary.is_clean());

    let new_root = loaded.root;
    assert_eq!(target.get(new_root).unwrap().name(), "Panel");
    assert_eq!(
        get_prop(&target, new_root, "width"),
        Some(PropertyValue::I64(42))
    );
    assert_eq!(
        get_prop(&target, new_root, "title"),
        Some(PropertyValue::String("panel".into()))
    );

    let new_child = child_actor(&target, new_root, 0);
    let new_child_body = body_of(&target, new_child);
    assert_eq!(
        get_prop(&target, new_child_body, "depth"),
        Some(PropertyValue::I64(7))
    );

    // The gadget's reference now points at the *new* child's body.
    let new_gadget = component_named(&target, new_root, "g").unwrap();
    assert_eq!(
        get_prop(&target, new_gadget, "target"),
        Some(PropertyValue::Object(new_child_body))
    );

    // Root component survives via default-sub-object matching.
    let root_data = target.get(new_root).unwrap().as_actor().unwrap().clone();
    assert_eq!(root_data.root_component, Some(body_of(&target, new_root)));
}

#[test]
fn round_trip_is_isomorphic_not_aliased() {
    let mut source = scene();
    let root = build_tree(&mut source);
    let mut assets = AssetStore::new();
    let asset = assets.insert_prefab(
        "tree.prefab",
        save_prefab(&source, &assets, &CODEC, root, SaveTarget::Editor).unwrap(),
    );

    // Loading into the same scene spawns an entirely separate tree.
    let before = source.object_count();
    let loaded = load_prefab(&mut source, &assets, &CODEC, asset, None).unwrap();
    assert_eq!(source.object_count(), before * 2);
    assert_ne!(loaded.root, root);

    set_prop(&mut source, loaded.root, "width", PropertyValue::I64(1));
    assert_eq!(get_prop(&source, root, "width"), Some(PropertyValue::I64(42)));
}

#[test]
fn cyclic_component_references_resolve() {
    let mut source = scene();
    let root = source.spawn_actor(class(&source, "Panel"), None);
    let a = source.create_object(class(&source, "Gadget"), Some(root), "a");
    let b = source.create_object(class(&source, "Gadget"), Some(root), "b");
    set_prop(&mut source, a, "target", PropertyValue::Object(b));
    set_prop(&mut source, b, "target", PropertyValue::Object(a));

    let mut assets = AssetStore::new();
    let asset = assets.insert_prefab(
        "cycle.prefab",
        save_prefab(&source, &assets, &CODEC, root, SaveTarget::Editor).unwrap(),
    );

    let mut target = scene();
    let loaded = load_prefab(&mut target, &assets, &CODEC, asset, None).unwrap();
    assert!(loaded.summary.is_clean());

    let new_a = component_named(&target, loaded.root, "a").unwrap();
    let new_b = component_named(&target, loaded.root, "b").unwrap();
    assert_eq!(
        get_prop(&target, new_a, "target"),
        Some(PropertyValue::Object(new_b))
    );
    assert_eq!(
        get_prop(&target, new_b, "target"),
        Some(PropertyValue::Object(new_a))
    );
}

#[test]
fn component_scene_parent_crosses_actor_tree() {
    // Scenario: a component on the root is scene-attached to a component
    // on the child actor.
    let mut source = scene();
    let root = source.spawn_actor(class(&source, "Panel"), None);
    let child = source.spawn_actor(class(&source, "Panel"), Some(root));
    let gadget = source.create_object(class(&source, "Gadget"), Some(root), "g");
    let child_body = body_of(&source, child);
    source.attach_child(child_body, gadget);

    let mut assets = AssetStore::new();
    let asset = assets.insert_prefab(
        "cross.prefab",
        save_prefab(&source, &assets, &CODEC, root, SaveTarget::Editor).unwrap(),
    );

    let mut target = scene();
    let loaded = load_prefab(&mut target, &assets, &CODEC, asset, None).unwrap();

    let new_child = child_actor(&target, loaded.root, 0);
    let new_child_body = body_of(&target, new_child);
    let new_gadget = component_named(&target, loaded.root, "g").unwrap();
    assert_eq!(target.scene_parent(new_gadget), Some(new_child_body));
    assert_ne!(
        target.scene_parent(new_gadget),
        Some(body_of(&target, loaded.root))
    );
}

#[test]
fn save_is_idempotent_with_stable_guids() {
    let mut source = scene();
    let root = build_tree(&mut source);
    let mut assets = AssetStore::new();
    let asset = assets.insert_prefab("tree.prefab", Vec::new());

    let mut helper = PrefabHelper::new(asset);
    helper.adopt_root(root);

    let first = helper.save(&source, &mut assets, &CODEC).unwrap();
    let second = helper.save(&source, &mut assets, &CODEC).unwrap();
    assert_eq!(first, second);
}

#[test]
fn guids_stay_stable_across_load_and_resave() {
    let mut source = scene();
    let root = build_tree(&mut source);
    let mut assets = AssetStore::new();
    let asset = assets.insert_prefab("tree.prefab", Vec::new());

    let mut helper = PrefabHelper::new(asset);
    helper.adopt_root(root);
    let original = helper.save(&source, &mut assets, &CODEC).unwrap();

    let mut target = scene();
    let mut loaded_helper = PrefabHelper::new(asset);
    loaded_helper
        .load(&mut target, &assets, &CODEC, None)
        .unwrap();
    let resaved = loaded_helper.save(&target, &mut assets, &CODEC).unwrap();

    assert_eq!(original, resaved);
}

#[test]
fn helper_revert_restores_asset_state() {
    let mut source = scene();
    let root = build_tree(&mut source);
    let mut assets = AssetStore::new();
    let asset = assets.insert_prefab("tree.prefab", Vec::new());
    let mut helper = PrefabHelper::new(asset);
    helper.adopt_root(root);
    helper.save(&source, &mut assets, &CODEC).unwrap();

    set_prop(&mut source, root, "width", PropertyValue::I64(999));
    let reverted = helper.revert(&mut source, &assets, &CODEC).unwrap();

    assert!(!source.is_alive(root));
    assert_eq!(
        get_prop(&source, reverted, "width"),
        Some(PropertyValue::I64(42))
    );
}

#[test]
fn unresolvable_class_degrades_to_single_stub() {
    let mut source = scene();
    let root = build_tree(&mut source);
    let mut assets = AssetStore::new();
    let asset = assets.insert_prefab(
        "tree.prefab",
        save_prefab(&source, &assets, &CODEC, root, SaveTarget::Editor).unwrap(),
    );

    // Load against a catalog that no longer knows the Gadget class.
    let mut target = Scene::new(registry_without_gadget());
    let loaded = load_prefab(&mut target, &assets, &CODEC, asset, None).unwrap();

    assert_eq!(loaded.summary.missing_class_stubs, 1);

    // Everything else still loaded correctly.
    assert_eq!(
        get_prop(&target, loaded.root, "width"),
        Some(PropertyValue::I64(42))
    );
    let child = child_actor(&target, loaded.root, 0);
    assert_eq!(
        get_prop(&target, body_of(&target, child), "depth"),
        Some(PropertyValue::I64(7))
    );

    let stub = component_named(&target, loaded.root, "g").unwrap();
    assert_eq!(
        target.get(stub).unwrap().class(),
        amaranth_scene::ClassRegistry::MISSING
    );
}

#[test]
fn truncated_document_aborts_without_side_effects() {
    let mut source = scene();
    let root = build_tree(&mut source);
    let mut assets = AssetStore::new();
    let bytes = save_prefab(&source, &assets, &CODEC, root, SaveTarget::Editor).unwrap();
    let asset = assets.insert_prefab("tree.prefab", bytes[..bytes.len() / 2].to_vec());

    let mut target = scene();
    let result = load_prefab(&mut target, &assets, &CODEC, asset, None);
    assert!(matches!(result, Err(LoadError::Structural(_))));
    assert_eq!(target.object_count(), 0);
}

#[test]
fn self_referential_asset_aborts_and_rolls_back() {
    let mut work = scene();
    let mut assets = AssetStore::new();
    let child = make_child_asset(&mut assets, "a.prefab");

    // Re-author "a.prefab" so it contains a reference to itself.
    let root = work.spawn_actor(class(&work, "Panel"), None);
    let mut helper = PrefabHelper::new(child);
    helper.adopt_root(root);
    helper
        .instantiate_sub_prefab(&mut work, &assets, &CODEC, child, root)
        .unwrap();
    helper.save(&work, &mut assets, &CODEC).unwrap();

    let mut target = scene();
    let result = load_prefab(&mut target, &assets, &CODEC, child, None);
    assert!(matches!(
        result,
        Err(LoadError::Structural(StructuralError::RecursionOverflow { .. }))
    ));
    assert_eq!(target.object_count(), 0);
}

#[test]
fn load_attaches_under_given_parent() {
    let mut source = scene();
    let root = build_tree(&mut source);
    let mut assets = AssetStore::new();
    let asset = assets.insert_prefab(
        "tree.prefab",
        save_prefab(&source, &assets, &CODEC, root, SaveTarget::Editor).unwrap(),
    );

    let mut target = scene();
    let parent = target.spawn_actor(class(&target, "Panel"), None);
    let loaded = load_prefab(&mut target, &assets, &CODEC, asset, Some(parent)).unwrap();
    assert_eq!(target.actor_parent(loaded.root), Some(parent));
    assert_eq!(child_actor(&target, parent, 0), loaded.root);
}

#[test]
fn dead_parent_is_rejected() {
    let mut source = scene();
    let root = build_tree(&mut source);
    let mut assets = AssetStore::new();
    let bytes = save_prefab(&source, &assets, &CODEC, root, SaveTarget::Editor).unwrap();

    let mut target = scene();
    let parent = target.spawn_actor(class(&target, "Panel"), None);
    target.destroy_object(parent);

    let mut reader = PrefabReader::new(&mut target, &assets, &CODEC);
    let result = reader.load_bytes(&bytes, Some(parent), &LoadContext::new());
    assert!(matches!(result, Err(LoadError::DeadParent)));
}

#[test]
fn runtime_save_drops_editor_only_objects() {
    let mut source = scene();
    let root = source.spawn_actor(class(&source, "Panel"), None);
    let tool = source.create_object(class(&source, "Gadget"), Some(root), "tool");
    source
        .get_mut(tool)
        .unwrap()
        .set_flags(amaranth_scene::SceneObject::EDITOR_ONLY);

    let mut assets = AssetStore::new();
    let editor_bytes = save_prefab(&source, &assets, &CODEC, root, SaveTarget::Editor).unwrap();
    let runtime_bytes = save_prefab(&source, &assets, &CODEC, root, SaveTarget::Runtime).unwrap();

    let editor_doc = PrefabDocument::from_bytes(&editor_bytes).unwrap();
    let runtime_doc = PrefabDocument::from_bytes(&runtime_bytes).unwrap();
    assert_eq!(editor_doc.components.len(), 2); // Body + tool
    assert_eq!(runtime_doc.components.len(), 1); // Body only
}
