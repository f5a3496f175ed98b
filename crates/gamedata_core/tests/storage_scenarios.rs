//! # Storage Scenario Tests
//!
//! End-to-end checks of the storage engine against a live world:
//!
//! 1. **Dense**: values survive a garbage collection that drops one entity
//! 2. **Sparse**: archetype-seeded entities stay isolated after a write
//! 3. **Registry**: one tick of deletions reaches every storage
//! 4. **Archetypes**: named sheets seeded for an object in one call
//!
//! Run with: cargo test -p gamedata_core --test storage_scenarios

use std::collections::HashSet;

use gamedata_core::{
    field_projection, Archetype, ArchetypeRow, ComponentView, DenseStorage, EntityHandle,
    MultiStorage, ObjectLiveness, RowAllocator, RowState, RowType, SparseStorage, StorageConfig,
    StorageError, StorageRegistry, Strategy, World,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct Float3 {
    x: f32,
    y: f32,
    z: f32,
}

impl Float3 {
    const fn splat(v: f32) -> Self {
        Self { x: v, y: v, z: v }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Transform {
    position: Float3,
    scale: f32,
}

// ============================================================================
// SCENARIO A: DENSE STORAGE
// ============================================================================

#[test]
fn scenario_dense_garbage_collect() {
    let mut world = World::new();
    let mut storage: DenseStorage<i32> = DenseStorage::new();

    let entities: Vec<EntityHandle> = (1..=5)
        .map(|value| {
            let handle = world.create_object();
            *storage.get_or_create(handle) = value;
            handle
        })
        .collect();

    assert!(world.delete_object(entities[2]));
    // Stale until the storage is collected
    assert_eq!(storage.get(entities[2]), Some(&3));

    assert_eq!(storage.garbage_collect(&world), 1);

    let mut seen = HashSet::new();
    storage.for_each(|handle, value| {
        assert!(seen.insert((handle, *value)));
    });
    let expected: HashSet<_> = [0, 1, 3, 4]
        .into_iter()
        .map(|i| (entities[i], i as i32 + 1))
        .collect();
    assert_eq!(seen, expected);
    assert_eq!(storage.slot(entities[2]), None);
}

#[test]
fn dense_hole_reused_after_recycled_id() {
    let mut world = World::new();
    let mut storage: DenseStorage<i32> = DenseStorage::new();
    let a = world.create_object();
    let b = world.create_object();
    *storage.get_or_create(a) = 1;
    *storage.get_or_create(b) = 2;

    world.delete_object(a);
    storage.garbage_collect(&world);
    world.flush_deletions();

    // Same id, new generation: the old handle must not see the new row
    let c = world.create_object();
    assert_eq!(c.id(), a.id());
    *storage.get_or_create(c) = 3;

    assert_eq!(storage.slot(c), Some(0));
    assert_eq!(storage.get(a), None);
    assert_eq!(storage.get(c), Some(&3));
    assert_eq!(storage.allocator().index().slot_count(), 2);
}

// ============================================================================
// SCENARIO B: SPARSE COPY-ON-WRITE
// ============================================================================

#[test]
fn scenario_sparse_copy_on_write() {
    let mut world = World::new();
    let mut storage =
        SparseStorage::<Float3>::with_row_type(RowType::pod::<Float3>(), &StorageConfig::default())
            .unwrap();
    let archetype = ArchetypeRow::new(Float3::splat(0.0));

    let e1 = world.create_object();
    let e2 = world.create_object();
    storage.instantiate(e1, &archetype).unwrap();
    storage.instantiate(e2, &archetype).unwrap();

    *storage.get_or_create(e1) = Float3::splat(1.0);

    assert_eq!(storage.get(e2), Some(&Float3::splat(0.0)));
    assert_eq!(storage.get(e1), Some(&Float3::splat(1.0)));
    assert_eq!(storage.row_state(e1), Some(RowState::Private));
    assert_eq!(storage.row_state(e2), Some(RowState::Shared));
    assert_eq!(archetype.get(), &Float3::splat(0.0));
}

#[test]
fn sparse_deletion_leaves_archetype_alive() {
    let mut world = World::new();
    let mut storage: SparseStorage<Float3> = SparseStorage::new();
    let archetype = ArchetypeRow::new(Float3::splat(5.0));

    let handles: Vec<_> = (0..4).map(|_| world.create_object()).collect();
    for handle in &handles {
        storage.instantiate(*handle, &archetype).unwrap();
    }
    if let Some(row) = storage.get_mut(handles[0]) {
        row.y = 6.0;
    }

    for handle in &handles {
        let shared = storage.row_state(*handle) == Some(RowState::Shared);
        assert_eq!(
            storage.get_data_for_deletion(*handle).map(|row| row.y == 5.0),
            Some(shared)
        );
        world.delete_object(*handle);
    }

    assert_eq!(storage.garbage_collect(&world), 4);
    assert!(storage.is_empty());
    assert_eq!(storage.allocator().private_rows(), 0);
    assert_eq!(archetype.share_count(), 1);
    assert_eq!(archetype.get().x, 5.0);
}

#[test]
fn sparse_rejects_foreign_row_type() {
    let result = SparseStorage::<Float3>::with_row_type(
        RowType::of::<Transform>(),
        &StorageConfig::default(),
    );
    assert!(matches!(result, Err(StorageError::TypeMismatch { .. })));
}

// ============================================================================
// STRIDED FIELD VIEW
// ============================================================================

#[test]
fn strided_view_walks_live_rows_only() {
    let mut world = World::new();
    let mut storage: DenseStorage<Transform> = DenseStorage::with_config(&StorageConfig {
        initial_capacity: 8,
        page_size: 4,
    });

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let handle = world.create_object();
            storage.get_or_create(handle).scale = i as f32;
            handle
        })
        .collect();
    world.delete_object(handles[5]);

    let mut scale = storage.strided(field_projection!(Transform, scale));
    let mut total = 0.0;
    scale.for_each_live(&world, |_, value| total += *value);
    assert_eq!(total, 45.0 - 5.0);

    scale.for_each_live_mut(&world, |_, value| *value *= 2.0);

    let mut position = storage.strided(field_projection!(Transform, position));
    *position.get_or_create(handles[1]) = Float3::splat(2.0);

    assert_eq!(storage.get(handles[1]).map(|t| t.scale), Some(2.0));
    assert_eq!(
        storage.get(handles[1]).map(|t| t.position),
        Some(Float3::splat(2.0))
    );
    assert_eq!(storage.get(handles[5]).map(|t| t.scale), Some(5.0));
    assert!(!world.is_object_valid(handles[5]));
}

// ============================================================================
// REGISTRY
// ============================================================================

#[test]
fn registry_tick() {
    let mut world = World::new();
    let mut registry = StorageRegistry::new();
    registry.register(DenseStorage::<Transform>::new());
    registry.register(SparseStorage::<Float3>::new());

    let archetype = ArchetypeRow::new(Float3::splat(1.0));
    let handles: Vec<_> = (0..6).map(|_| world.create_object()).collect();
    for handle in &handles {
        if let Some(transforms) = registry.get_mut::<DenseStorage<Transform>>() {
            transforms.get_or_create(*handle).scale = 1.0;
        }
        if let Some(velocities) = registry.get_mut::<SparseStorage<Float3>>() {
            velocities.instantiate(*handle, &archetype).unwrap();
        }
    }

    world.delete_object(handles[0]);
    world.delete_object(handles[3]);
    assert_eq!(registry.garbage_collect(&world), 4);
    assert_eq!(world.flush_deletions(), 2);

    assert_eq!(registry.erase_object(handles[1]), 2);
    assert!(registry.iter().all(|storage| storage.len() == 3));
    assert_eq!(archetype.share_count(), 4);
}

// ============================================================================
// ARCHETYPES AND NAMED SHEETS
// ============================================================================

#[test]
fn archetype_instantiation_across_sheets() {
    let config = StorageConfig::default();
    let mut world = World::new();
    let mut registry = StorageRegistry::new();
    registry.register_sheet::<Transform>("transform", Strategy::Dense, &config);
    registry.register_sheet::<Float3>("velocity", Strategy::Sparse, &config);
    registry.register_named("body", MultiStorage::<(f32, u32)>::with_config(&config));

    let velocity = ArchetypeRow::new(Float3::splat(1.0));
    let transform = ArchetypeRow::new(Transform {
        position: Float3::splat(0.0),
        scale: 0.5,
    });
    let bullet = Archetype::new("bullet")
        .with("transform", transform)
        .with("velocity", velocity.clone());

    let handles: Vec<_> = (0..4).map(|_| world.create_object()).collect();
    for handle in &handles {
        assert_eq!(registry.instantiate_archetype(*handle, &bullet), Ok(2));
        if let Some(body) = registry.get_named_mut::<MultiStorage<(f32, u32)>>("body") {
            *body.get_or_create(*handle).0 = 0.1;
        }
    }
    assert_eq!(velocity.share_count(), 6);

    if let Some(view) = registry.view_mut::<Float3>("velocity") {
        view.get_or_create(handles[0]).x = 8.0;
    }
    let scale = registry
        .view::<Transform>("transform")
        .and_then(|view| view.get(handles[3]))
        .map(|t| t.scale);
    assert_eq!(scale, Some(0.5));

    world.delete_object(handles[1]);
    assert_eq!(registry.garbage_collect(&world), 3);
    assert_eq!(velocity.share_count(), 5);

    assert_eq!(registry.forget_archetype(&bullet), 2);
    assert_eq!(velocity.share_count(), 2);
    assert_eq!(
        registry.view::<Float3>("velocity").and_then(|v| v.get(handles[2])),
        Some(&Float3::splat(1.0))
    );
    let boosted = registry
        .view::<Float3>("velocity")
        .and_then(|view| view.get(handles[0]))
        .map(|v| v.x);
    assert_eq!(boosted, Some(8.0));
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn config_file_drives_storage_sizing() {
    let path = std::env::temp_dir().join(format!("gamedata_core_{}.toml", std::process::id()));
    std::fs::write(&path, "initial_capacity = 64\npage_size = 16\n").unwrap();

    let config = StorageConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.page_size, 16);

    let storage: DenseStorage<u8> = DenseStorage::with_config(&config);
    assert_eq!(storage.allocator().rows().page_size(), 16);

    let missing = StorageConfig::load(&path);
    assert!(matches!(missing, Err(StorageError::InvalidConfig(_))));
}
