//! Property tests over random command sequences.
//!
//! Whatever interleaving of spawns, inserts, removes, replaces, despawns,
//! and commits a caller produces, storage must stay consistent: records
//! agree with archetype rows, columns stay aligned, and accounting holds.

use std::sync::Once;

use proptest::prelude::*;
use weft::prelude::*;
use weft::ComponentId;

#[derive(Clone, Copy, Debug, PartialEq)]
struct A {
    value: i32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct B {
    value: i32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct C {
    value: i32,
}

static INIT: Once = Once::new();

fn init_components() {
    INIT.call_once(|| {
        register_component::<A>().unwrap();
        register_component::<B>().unwrap();
        register_component::<C>().unwrap();
    });
}

/// Component subset encoded in the low three bits.
fn bundle_for(mask: u8, value: i32) -> Bundle {
    let mut bundle = Bundle::new();
    if mask & 1 != 0 {
        bundle = bundle.with(A { value }).unwrap();
    }
    if mask & 2 != 0 {
        bundle = bundle.with(B { value }).unwrap();
    }
    if mask & 4 != 0 {
        bundle = bundle.with(C { value }).unwrap();
    }
    bundle
}

fn component_ids_for(mask: u8) -> Vec<ComponentId> {
    let mut ids = Vec::new();
    if mask & 1 != 0 {
        ids.push(component_id_of::<A>().unwrap());
    }
    if mask & 2 != 0 {
        ids.push(component_id_of::<B>().unwrap());
    }
    if mask & 4 != 0 {
        ids.push(component_id_of::<C>().unwrap());
    }
    ids
}

#[derive(Clone, Debug)]
enum Op {
    Spawn(u8, i32),
    Insert(usize, u8, i32),
    Remove(usize, u8),
    Replace(usize, u8, i32),
    Despawn(usize),
    Commit,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8, any::<i32>()).prop_map(|(mask, value)| Op::Spawn(mask, value)),
        (any::<usize>(), 0u8..8, any::<i32>())
            .prop_map(|(index, mask, value)| Op::Insert(index, mask, value)),
        (any::<usize>(), 0u8..8).prop_map(|(index, mask)| Op::Remove(index, mask)),
        (any::<usize>(), 0u8..8, any::<i32>())
            .prop_map(|(index, mask, value)| Op::Replace(index, mask, value)),
        any::<usize>().prop_map(Op::Despawn),
        Just(Op::Commit),
    ]
}

fn pick(spawned: &[Entity], index: usize) -> Option<Entity> {
    if spawned.is_empty() {
        None
    } else {
        Some(spawned[index % spawned.len()])
    }
}

fn tolerate_no_entity(result: WorldResult<()>) {
    match result {
        Ok(()) => {}
        Err(WorldError::NoEntity { .. }) => {}
        Err(other) => panic!("unexpected world error: {other}"),
    }
}

proptest! {
    #[test]
    fn random_command_sequences_hold_invariants(
        deferred in any::<bool>(),
        ops in proptest::collection::vec(op_strategy(), 1..40),
    ) {
        init_components();
        let mut world = World::new();
        if deferred {
            world.start_deferring();
        }

        let mut spawned: Vec<Entity> = Vec::new();
        for op in ops {
            match op {
                Op::Spawn(mask, value) => {
                    spawned.push(world.spawn(bundle_for(mask, value)).unwrap());
                }
                Op::Insert(index, mask, value) => {
                    if let Some(entity) = pick(&spawned, index) {
                        tolerate_no_entity(world.insert(entity, bundle_for(mask, value)));
                    }
                }
                Op::Remove(index, mask) => {
                    if let Some(entity) = pick(&spawned, index) {
                        match world.remove(entity, &component_ids_for(mask)) {
                            Ok(_) | Err(WorldError::NoEntity { .. }) => {}
                            Err(other) => panic!("unexpected world error: {other}"),
                        }
                    }
                }
                Op::Replace(index, mask, value) => {
                    if let Some(entity) = pick(&spawned, index) {
                        tolerate_no_entity(world.replace(entity, bundle_for(mask, value)));
                    }
                }
                Op::Despawn(index) => {
                    if let Some(entity) = pick(&spawned, index) {
                        tolerate_no_entity(world.despawn(entity));
                    }
                }
                Op::Commit => {
                    match world.commit_commands() {
                        Ok(()) | Err(WorldError::NoEntity { .. }) => {}
                        Err(other) => panic!("unexpected world error: {other}"),
                    }
                    world.validate().unwrap();
                }
            }
        }

        match world.stop_deferring() {
            Ok(()) | Err(WorldError::NoEntity { .. }) => {}
            Err(other) => panic!("unexpected world error: {other}"),
        }
        world.validate().unwrap();

        // Accounting: size() agrees with full iteration.
        prop_assert_eq!(world.size(), world.iter().count());

        // Query completeness: a single-component query yields exactly the
        // entities that iteration says hold that component.
        let a_id = component_id_of::<A>().unwrap();
        let with_a_by_iteration = world
            .iter()
            .filter(|(_, components)| components.contains_key(&a_id))
            .count();
        let with_a_by_query = world.query().with::<A>().cursor(&world).count();
        prop_assert_eq!(with_a_by_query, with_a_by_iteration);

        // Round-trip: every value read through a query matches get().
        let snapshot = world.query().with::<A>().cursor(&world).snapshot();
        for (entity, values) in snapshot {
            let direct = world.get(entity, a_id).unwrap().unwrap();
            prop_assert_eq!(
                direct.extract::<A>(),
                values[0].extract::<A>()
            );
        }
    }
}

proptest! {
    #[test]
    fn despawn_elision_never_resurrects(
        mask in 0u8..8,
        value in any::<i32>(),
        extra_ops in 1usize..5,
    ) {
        init_components();
        let mut world = World::new();
        let entity = world.spawn(bundle_for(mask, value)).unwrap();

        world.start_deferring();
        world.despawn(entity).unwrap();
        for i in 0..extra_ops {
            tolerate_no_entity(world.insert(entity, bundle_for(mask, i as i32)));
            tolerate_no_entity(world.replace(entity, bundle_for(mask, i as i32)));
        }
        world.stop_deferring().unwrap();

        prop_assert!(!world.contains(entity));
        prop_assert_eq!(world.size(), 0);
        world.validate().unwrap();
    }
}
