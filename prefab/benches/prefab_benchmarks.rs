use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use amaranth_prefab::{load_prefab, save_prefab, BinaryPropertyCodec, SaveTarget};
use amaranth_scene::{
    AssetStore, ClassInfo, ClassKind, ClassRegistry, ObjectId, PropertyValue, Scene,
};

fn registry() -> Arc<ClassRegistry> {
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
    registry.register(
        ClassInfo::new("Gadget", ClassKind::Component)
            .with_default("speed", PropertyValue::F64(1.0))
            .with_default("target", PropertyValue::Null),
    );
    Arc::new(registry)
}

/// A three-level tree of 40 actors with cross-referencing components.
fn build_tree(scene: &mut Scene) -> ObjectId {
    let panel = scene.registry().find_by_name("Panel").unwrap();
    let gadget_class = scene.registry().find_by_name("Gadget").unwrap();

    let root = scene.spawn_actor(panel, None);
    let mut previous_gadget: Option<ObjectId> = None;
    for i in 0..13 {
        let child = scene.spawn_actor(panel, Some(root));
        for j in 0..2 {
            let grandchild = scene.spawn_actor(panel, Some(child));
            let gadget =
                scene.create_object(gadget_class, Some(grandchild), &format!("g{i}_{j}"));
            if let Some(previous) = previous_gadget {
                scene
                    .get_mut(gadget)
                    .unwrap()
                    .properties_mut()
                    .set("target", PropertyValue::Object(previous));
            }
            previous_gadget = Some(gadget);
        }
    }
    root
}

fn bench_save(c: &mut Criterion) {
    let mut scene = Scene::new(registry());
    let assets = AssetStore::new();
    let root = build_tree(&mut scene);

    c.bench_function("save_tree", |b| {
        b.iter(|| {
            save_prefab(
                &scene,
                &assets,
                &BinaryPropertyCodec,
                root,
                SaveTarget::Editor,
            )
            .unwrap()
        })
    });
}

fn bench_load(c: &mut Criterion) {
    let shared = registry();
    let mut scene = Scene::new(Arc::clone(&shared));
    let mut assets = AssetStore::new();
    let root = build_tree(&mut scene);
    let bytes = save_prefab(
        &scene,
        &assets,
        &BinaryPropertyCodec,
        root,
        SaveTarget::Editor,
    )
    .unwrap();
    let asset = assets.insert_prefab("bench.prefab", bytes);

    c.bench_function("load_tree", |b| {
        b.iter(|| {
            let mut target = Scene::new(Arc::clone(&shared));
            load_prefab(&mut target, &assets, &BinaryPropertyCodec, asset, None).unwrap()
        })
    });
}

criterion_group!(benches, bench_save, bench_load);
criterion_main!(benches);
