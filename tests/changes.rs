use std::sync::Once;

use weft::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Temperature {
    degrees: i32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Label {
    id: u32,
}

static INIT: Once = Once::new();

fn init_components() {
    INIT.call_once(|| {
        register_component::<Temperature>().unwrap();
        register_component::<Label>().unwrap();
    });
}

fn temperature(degrees: i32) -> Bundle {
    Bundle::new().with(Temperature { degrees }).unwrap()
}

fn drain(world: &mut World, hooks: &mut SystemHooks) -> Vec<(Entity, Option<i32>, Option<i32>)> {
    let mut records: Vec<_> = world
        .query_changed::<Temperature>(hooks)
        .unwrap()
        .map(|(entity, record)| {
            (
                entity,
                record.old.as_ref().and_then(|i| i.extract::<Temperature>()).map(|t| t.degrees),
                record.new.as_ref().and_then(|i| i.extract::<Temperature>()).map(|t| t.degrees),
            )
        })
        .collect();
    records.sort();
    records
}

#[test]
fn first_observation_seeds_existing_entities_as_new() {
    init_components();
    let mut world = World::new();
    let mut hooks = SystemHooks::new();

    let warm = world.spawn(temperature(20)).unwrap();
    let hot = world.spawn(temperature(80)).unwrap();
    world.spawn(Bundle::new().with(Label { id: 1 }).unwrap()).unwrap();

    let records = drain(&mut world, &mut hooks);
    assert_eq!(
        records,
        vec![(warm, None, Some(20)), (hot, None, Some(80))]
    );

    // A second drain with no interleaved changes yields nothing.
    assert!(drain(&mut world, &mut hooks).is_empty());
}

#[test]
fn updates_report_old_and_new_values() {
    init_components();
    let mut world = World::new();
    let mut hooks = SystemHooks::new();

    let entity = world.spawn(temperature(10)).unwrap();
    drain(&mut world, &mut hooks);

    world.insert(entity, temperature(15)).unwrap();
    assert_eq!(
        drain(&mut world, &mut hooks),
        vec![(entity, Some(10), Some(15))]
    );
}

#[test]
fn intermediate_values_collapse_between_drains() {
    init_components();
    let mut world = World::new();
    let mut hooks = SystemHooks::new();

    let entity = world.spawn(temperature(1)).unwrap();
    drain(&mut world, &mut hooks);

    world.insert(entity, temperature(2)).unwrap();
    world.insert(entity, temperature(3)).unwrap();
    world.insert(entity, temperature(4)).unwrap();

    // One record per entity: old is the value at the previous drain, new
    // is the current value; the 2 and 3 are never seen.
    assert_eq!(
        drain(&mut world, &mut hooks),
        vec![(entity, Some(1), Some(4))]
    );
}

#[test]
fn restoring_the_observed_value_reports_nothing() {
    init_components();
    let mut world = World::new();
    let mut hooks = SystemHooks::new();

    let entity = world.spawn(temperature(5)).unwrap();
    drain(&mut world, &mut hooks);

    let temperature_id = component_id_of::<Temperature>().unwrap();
    let original = world.get(entity, temperature_id).unwrap().unwrap();

    world.insert(entity, temperature(6)).unwrap();

    // Putting the exact observed instance back collapses the pending
    // record away entirely.
    let mut bundle = Bundle::new();
    bundle.push(original);
    world.insert(entity, bundle).unwrap();

    assert!(drain(&mut world, &mut hooks).is_empty());
}

#[test]
fn removal_and_despawn_report_the_old_value() {
    init_components();
    let mut world = World::new();
    let mut hooks = SystemHooks::new();

    let removed = world.spawn(temperature(30)).unwrap();
    let despawned = world.spawn(temperature(40)).unwrap();
    drain(&mut world, &mut hooks);

    let temperature_id = component_id_of::<Temperature>().unwrap();
    world.remove(removed, &[temperature_id]).unwrap();
    world.despawn(despawned).unwrap();

    assert_eq!(
        drain(&mut world, &mut hooks),
        vec![(removed, Some(30), None), (despawned, Some(40), None)]
    );
}

#[test]
fn remove_then_reinsert_merges_into_one_record() {
    init_components();
    let mut world = World::new();
    let mut hooks = SystemHooks::new();

    let entity = world.spawn(temperature(1)).unwrap();
    drain(&mut world, &mut hooks);

    let temperature_id = component_id_of::<Temperature>().unwrap();
    world.remove(entity, &[temperature_id]).unwrap();
    world.insert(entity, temperature(2)).unwrap();

    assert_eq!(
        drain(&mut world, &mut hooks),
        vec![(entity, Some(1), Some(2))]
    );
}

#[test]
fn replace_reports_dropped_components() {
    init_components();
    let mut world = World::new();
    let mut hooks = SystemHooks::new();

    let entity = world
        .spawn(
            Bundle::new()
                .with(Temperature { degrees: 12 })
                .unwrap()
                .with(Label { id: 3 })
                .unwrap(),
        )
        .unwrap();
    drain(&mut world, &mut hooks);

    // Replacing the whole set with Label-only drops Temperature; its
    // observer is told.
    world
        .replace(entity, Bundle::new().with(Label { id: 4 }).unwrap())
        .unwrap();

    assert_eq!(
        drain(&mut world, &mut hooks),
        vec![(entity, Some(12), None)]
    );
    assert_eq!(world.get_value::<Temperature>(entity).unwrap(), None);
    assert_eq!(
        world.get_value::<Label>(entity).unwrap(),
        Some(Label { id: 4 })
    );
}

#[test]
fn observers_are_independent() {
    init_components();
    let mut world = World::new();
    let mut first = SystemHooks::new();
    let mut second = SystemHooks::new();

    let entity = world.spawn(temperature(0)).unwrap();
    drain(&mut world, &mut first);

    world.insert(entity, temperature(1)).unwrap();

    // The second observer starts now: it sees the current value as new,
    // regardless of what the first observer already consumed.
    assert_eq!(
        drain(&mut world, &mut second),
        vec![(entity, None, Some(1))]
    );
    assert_eq!(
        drain(&mut world, &mut first),
        vec![(entity, Some(0), Some(1))]
    );
}

#[test]
fn deferred_changes_arrive_at_commit() {
    init_components();
    let mut world = World::new();
    let mut hooks = SystemHooks::new();

    let entity = world.spawn(temperature(1)).unwrap();
    drain(&mut world, &mut hooks);

    world.start_deferring();
    world.insert(entity, temperature(2)).unwrap();

    assert!(
        drain(&mut world, &mut hooks).is_empty(),
        "queued mutations are not yet observable"
    );

    world.commit_commands().unwrap();
    assert_eq!(
        drain(&mut world, &mut hooks),
        vec![(entity, Some(1), Some(2))]
    );
}

#[test]
fn dropped_observers_stop_receiving() {
    init_components();
    let mut world = World::new();

    let entity = world.spawn(temperature(1)).unwrap();

    {
        let mut ephemeral = SystemHooks::new();
        drain(&mut world, &mut ephemeral);
        // The caller's context ends here; its storage is released.
    }

    // Emission after the observer died must not panic, and a fresh
    // observer is seeded from scratch.
    world.insert(entity, temperature(2)).unwrap();

    let mut hooks = SystemHooks::new();
    assert_eq!(
        drain(&mut world, &mut hooks),
        vec![(entity, None, Some(2))]
    );
}

#[test]
fn clear_is_not_reported_and_reseeds_observers() {
    init_components();
    let mut world = World::new();
    let mut hooks = SystemHooks::new();

    world.spawn(temperature(1)).unwrap();
    drain(&mut world, &mut hooks);

    world.clear();

    let reborn = world.spawn(temperature(2)).unwrap();

    // Nothing from before the reset leaks through; the observer is
    // re-seeded against the new world.
    assert_eq!(
        drain(&mut world, &mut hooks),
        vec![(reborn, None, Some(2))]
    );
}

#[test]
fn unregistered_component_types_are_an_error() {
    init_components();
    let mut world = World::new();
    let mut hooks = SystemHooks::new();

    struct NotAComponent;
    let err = world.query_changed::<NotAComponent>(&mut hooks).unwrap_err();
    assert!(matches!(err, WorldError::InvalidComponent { .. }));
}
