//! # Store Property Tests
//!
//! End-to-end checks of the store's guarantees:
//!
//! 1. **Identity**: reused indices carry a newer generation
//! 2. **Registry**: names are unique, ids are stable
//! 3. **Tables**: one table per property set, whatever the input order
//! 4. **Migration**: shared values survive, new ones are defaulted
//! 5. **Swap-remove**: the moved row's owner is remapped
//! 6. **Dispatch**: adds run before removes
//! 7. **Queries**: inclusion and exclusion select exact tables
//!
//! Run with: cargo test -p strata --test store_properties_test

// SAFETY: the movement system writes its Position column through a view.
#![allow(unsafe_code)]

use bytemuck::{Pod, Zeroable};
use strata::{
    AddProperty, EntityId, FilterDesc, IdentityPool, Property, PropertyFlags, PropertyId,
    RemoveProperty, TableSignature, TypeRegistry, World, WorldConfig,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

impl Property for Position {
    const NAME: &'static str = "Position";
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

impl Property for Velocity {
    const NAME: &'static str = "Velocity";
}

fn props(world: &World) -> (PropertyId, PropertyId, PropertyId) {
    let a = world.register_property("A", 4, Some(&0u32.to_le_bytes()), PropertyFlags::empty());
    let b = world.register_property("B", 4, Some(&0u32.to_le_bytes()), PropertyFlags::empty());
    let c = world.register_property("C", 4, Some(&77u32.to_le_bytes()), PropertyFlags::empty());
    (a, b, c)
}

// ============================================================================
// IDENTITY
// ============================================================================

#[test]
fn test_reused_index_has_newer_generation() {
    let mut pool = IdentityPool::new(0, 0);
    let old = pool.allocate();
    pool.deallocate(old);
    let new = pool.allocate();

    assert_eq!(new.index(), old.index());
    assert!(new.generation() > old.generation());
    assert!(!pool.is_valid(old));
    assert!(pool.is_valid(new));
}

#[test]
fn test_world_stale_handle_is_invalid() {
    let mut world = World::default();
    let old = world.create_entity();
    world.delete_entity(old);
    let new = world.create_entity();
    assert_eq!(new.index(), old.index());
    assert!(!world.is_valid(old));
    assert!(world.is_valid(new));
}

#[test]
fn test_partitions_do_not_mix() {
    let config = WorldConfig::from_toml_str("partition = 2").unwrap();
    let mut world = World::new(config);
    let e = world.create_entity();
    assert_eq!(e.partition(), 2);
    assert!(!world.is_valid(EntityId::new(e.index(), e.generation(), 0)));
}

// ============================================================================
// REGISTRY
// ============================================================================

#[test]
fn test_distinct_names_get_stable_ids() {
    let mut registry = TypeRegistry::new();
    let a = registry.register("A", 4, None, PropertyFlags::empty());
    let b = registry.register("B", 4, None, PropertyFlags::empty());
    assert_ne!(a, b);
    for _ in 0..3 {
        assert_eq!(registry.lookup("A"), Some(a));
        assert_eq!(registry.lookup("B"), Some(b));
    }
}

#[test]
#[should_panic(expected = "cannot register two properties")]
fn test_duplicate_name_is_fatal() {
    let world = World::default();
    world.register_property("A", 4, None, PropertyFlags::empty());
    world.register_property("A", 8, None, PropertyFlags::empty());
}

// ============================================================================
// TABLES
// ============================================================================

#[test]
fn test_table_identity_ignores_order() {
    let mut world = World::default();
    let (a, b, _) = props(&world);
    let ab = world.find_or_create_table(&[a, b]);
    let ba = world.find_or_create_table(&[b, a]);
    assert_eq!(ab, ba);

    let mut sig = TableSignature::from_properties(&[b, a]);
    sig.set(world.owner_property());
    assert_eq!(world.database().find_table(&sig), Some(ab));
}

// ============================================================================
// MIGRATION
// ============================================================================

#[test]
fn test_migration_keeps_shared_and_defaults_new() {
    let mut world = World::default();
    let (a, b, c) = props(&world);
    let e = world.create_entity();
    world.instantiate(e, &[a, b]);
    world.set_property(e, a, 5u32);
    world.set_property(e, b, 0x78u32);

    let dst = world.find_or_create_table(&[a, c]);
    world.migrate(e, dst);

    assert_eq!(world.get_property::<u32>(e, a), Some(5));
    assert_eq!(world.get_property::<u32>(e, c), Some(77));
    assert_eq!(world.property_bytes(e, b), None);
    assert!(!world.has_property(e, b));
}

#[test]
fn test_swap_remove_remaps_moved_entity() {
    let mut world = World::default();
    let (a, _, c) = props(&world);
    let entities: Vec<EntityId> = (0..4u32)
        .map(|i| {
            let e = world.create_entity();
            world.instantiate(e, &[a]);
            world.set_property(e, a, i);
            e
        })
        .collect();
    let table = world.entity_mapping(entities[1]).table;
    let before = world.num_rows(table);

    let buffer = world.create_op_buffer();
    world.add_op(&buffer, AddProperty::new(entities[1], c));
    world.dispatch(buffer);

    assert_eq!(world.num_rows(table), before - 1);
    let moved = world.entity_mapping(entities[3]);
    assert_eq!(moved.table, table);
    assert_eq!(moved.row, 1);
    assert_eq!(world.get_property::<u32>(entities[3], a), Some(3));
    for (i, &e) in entities.iter().enumerate() {
        assert_eq!(world.get_property::<u32>(e, a), Some(i as u32));
    }
}

#[test]
#[should_panic(expected = "written only by the world")]
fn test_owner_column_rejects_queued_writes() {
    let mut world = World::default();
    let (a, _, _) = props(&world);
    let e0 = world.create_entity();
    let e1 = world.create_entity();
    world.instantiate(e0, &[a]);
    world.instantiate(e1, &[a]);

    let buffer = world.create_op_buffer();
    let owner = world.owner_property();
    world.add_op(&buffer, AddProperty::new(e1, owner).with_pod(&e0));
}

// ============================================================================
// DISPATCH
// ============================================================================

#[test]
fn test_adds_drain_before_removes() {
    let mut world = World::default();
    let (a, b, _) = props(&world);
    let e = world.create_entity();
    world.instantiate(e, &[a]);

    let buffer = world.create_op_buffer();
    world.add_op(&buffer, RemoveProperty::new(e, b));
    world.add_op(&buffer, AddProperty::new(e, b));
    world.dispatch(buffer);

    // Had the remove run first it would have been a no-op, leaving `b`.
    assert!(!world.has_property(e, b));
    assert!(world.has_property(e, a));
}

#[test]
fn test_many_entities_many_ops() {
    let mut world = World::default();
    let (a, b, c) = props(&world);
    let entities: Vec<EntityId> = (0..200)
        .map(|_| {
            let e = world.create_entity();
            world.instantiate(e, &[a]);
            e
        })
        .collect();

    let buffer = world.create_op_buffer();
    for (i, &e) in entities.iter().enumerate() {
        let value = (i as u32).to_le_bytes();
        if i % 2 == 0 {
            world.add_op(&buffer, AddProperty::new(e, b).with_value(&value));
        }
        if i % 3 == 0 {
            world.add_op(&buffer, AddProperty::new(e, c));
        }
    }
    world.dispatch(buffer);
    world.release_scratch();

    for (i, &e) in entities.iter().enumerate() {
        assert_eq!(world.has_property(e, b), i % 2 == 0);
        assert_eq!(world.has_property(e, c), i % 3 == 0);
        if i % 2 == 0 {
            assert_eq!(world.get_property::<u32>(e, b), Some(i as u32));
        }
        let mapping = world.entity_mapping(e);
        assert_eq!(
            world.get_property::<EntityId>(e, world.owner_property()),
            Some(e),
            "owner column out of sync at {mapping:?}"
        );
    }
}

// ============================================================================
// QUERIES
// ============================================================================

#[test]
fn test_query_include_exclude_selects_exact_table() {
    let mut world = World::default();
    let (a, b, c) = props(&world);
    for set in [&[a][..], &[a, b][..], &[a, b, c][..]] {
        let e = world.create_entity();
        world.instantiate(e, set);
    }

    let filter = world.create_filter(&FilterDesc::new().read(a).read(b).without(c));
    let expected = world.find_or_create_table(&[a, b]);
    let dataset = world.query(filter);
    let tables: Vec<_> = dataset.iter().map(|v| v.table()).collect();
    assert_eq!(tables, vec![expected]);
}

#[test]
#[should_panic(expected = "at least one inclusive property")]
fn test_filter_without_inclusive_is_fatal() {
    let mut world = World::default();
    let (a, _, _) = props(&world);
    world.create_filter(&FilterDesc::new().without(a));
}

// ============================================================================
// END TO END
// ============================================================================

#[test]
fn test_position_velocity_scenario() {
    let mut world = World::default();
    let position = world.register_type::<Position>();
    let velocity = world.register_type::<Velocity>();
    assert_eq!(world.registry().describe(position).byte_size(), 12);

    let e = world.create_entity();
    world.instantiate(e, &[position]);
    let start = Position {
        x: 4.0,
        y: 5.0,
        z: 6.0,
    };
    world.set_property(e, position, start);

    let buffer = world.create_op_buffer();
    let v = Velocity {
        x: 1.0,
        y: 2.0,
        z: 3.0,
    };
    world.add_op(&buffer, AddProperty::new(e, velocity).with_pod(&v));
    world.dispatch(buffer);

    let expected = world.find_or_create_table(&[position, velocity]);
    assert_eq!(world.entity_mapping(e).table, expected);
    assert_eq!(world.get_property::<Velocity>(e, velocity), Some(v));
    assert_eq!(world.get_property::<Position>(e, position), Some(start));

    // A movement system over the resulting dataset.
    let movers = world.create_filter(&FilterDesc::new().write(position).read(velocity));
    {
        let dataset = world.query(movers);
        for view in dataset {
            let velocities = view.column::<Velocity>(1).unwrap().to_vec();
            // SAFETY: this system is the only one touching Position.
            let positions = unsafe { view.column_mut::<Position>(0) }.unwrap();
            for (p, v) in positions.iter_mut().zip(&velocities) {
                p.x += v.x;
                p.y += v.y;
                p.z += v.z;
            }
        }
    }
    world.release_datasets();
    world.release_scratch();

    assert_eq!(
        world.get_property::<Position>(e, position),
        Some(Position {
            x: 5.0,
            y: 7.0,
            z: 9.0
        })
    );
}
