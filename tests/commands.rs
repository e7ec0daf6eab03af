use std::sync::Once;

use weft::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Marker {
    value: i32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Tag;

static INIT: Once = Once::new();

fn init_components() {
    INIT.call_once(|| {
        register_component::<Marker>().unwrap();
        register_component::<Tag>().unwrap();
    });
}

fn marker(value: i32) -> Bundle {
    Bundle::new().with(Marker { value }).unwrap()
}

#[test]
fn deferred_mutations_are_invisible_until_commit() {
    init_components();
    let mut world = World::new();
    let entity = world.spawn(Bundle::new()).unwrap();

    world.start_deferring();
    world.insert(entity, marker(1)).unwrap();

    assert_eq!(world.get_value::<Marker>(entity).unwrap(), None);

    world.commit_commands().unwrap();
    assert_eq!(
        world.get_value::<Marker>(entity).unwrap(),
        Some(Marker { value: 1 })
    );
    assert!(world.is_deferring(), "commit alone stays in deferring mode");

    world.stop_deferring().unwrap();
    assert!(!world.is_deferring());
}

#[test]
fn spawn_allocates_synchronously_while_deferring() {
    init_components();
    let mut world = World::new();

    world.start_deferring();
    let entity = world.spawn(marker(5)).unwrap();

    // The id is live immediately; only the component attachment waits.
    assert!(world.contains(entity));
    assert_eq!(world.size(), 1);
    assert_eq!(world.get_value::<Marker>(entity).unwrap(), None);

    world.stop_deferring().unwrap();
    assert_eq!(
        world.get_value::<Marker>(entity).unwrap(),
        Some(Marker { value: 5 })
    );
}

#[test]
fn commands_apply_in_enqueue_order() {
    init_components();
    let mut world = World::new();
    let entity = world.spawn(Bundle::new()).unwrap();

    world.start_deferring();
    world.insert(entity, marker(1)).unwrap();
    world.insert(entity, marker(2)).unwrap();
    world.insert(entity, marker(3)).unwrap();
    world.commit_commands().unwrap();

    assert_eq!(
        world.get_value::<Marker>(entity).unwrap(),
        Some(Marker { value: 3 })
    );
}

#[test]
fn despawn_elides_every_later_command_on_the_entity() {
    init_components();
    let mut world = World::new();
    let entity = world.spawn(Bundle::new()).unwrap();

    world.start_deferring();
    world.despawn(entity).unwrap();
    world.insert(entity, marker(1)).unwrap();
    world.replace(entity, marker(2)).unwrap();
    world.despawn(entity).unwrap();
    world.commit_commands().unwrap();

    assert!(!world.contains(entity), "insert after despawn must not re-animate");
    assert_eq!(world.size(), 0);
    world.validate().unwrap();
}

#[test]
fn commands_before_the_despawn_still_apply() {
    init_components();
    let mut world = World::new();
    let entity = world.spawn(Bundle::new()).unwrap();

    world.start_deferring();
    world.insert(entity, marker(1)).unwrap();
    world.despawn(entity).unwrap();
    world.commit_commands().unwrap();

    assert!(!world.contains(entity));
    world.validate().unwrap();
}

#[test]
fn remove_reports_values_from_the_call_site() {
    init_components();
    let mut world = World::new();
    let entity = world.spawn(marker(7)).unwrap();

    world.start_deferring();
    let marker_id = component_id_of::<Marker>().unwrap();
    let removed = world.remove(entity, &[marker_id]).unwrap();

    // The value is reported synchronously even though the detachment is
    // still queued.
    assert_eq!(
        removed[0].as_ref().and_then(|i| i.extract::<Marker>()),
        Some(Marker { value: 7 })
    );
    assert_eq!(
        world.get_value::<Marker>(entity).unwrap(),
        Some(Marker { value: 7 })
    );

    world.commit_commands().unwrap();
    assert_eq!(world.get_value::<Marker>(entity).unwrap(), None);
}

#[test]
fn deferred_replace_on_a_vanished_entity_fails_at_commit() {
    init_components();
    let mut world = World::new();

    world.start_deferring();
    world.replace(Entity(404), marker(1)).unwrap();

    let err = world.commit_commands().unwrap_err();
    assert!(matches!(err, WorldError::NoEntity { .. }));
}

#[test]
fn spawn_at_reuses_an_id_pending_deletion() {
    init_components();
    let mut world = World::new();
    let entity = world.spawn(marker(1)).unwrap();

    world.start_deferring();
    world.despawn(entity).unwrap();

    // Reusing the id applies the pending despawn eagerly and starts a
    // fresh incarnation.
    let reborn = world
        .spawn_at(entity.id(), Bundle::new().with(Tag).unwrap())
        .unwrap();
    assert_eq!(reborn, entity);

    world.commit_commands().unwrap();
    assert!(world.contains(reborn));
    assert_eq!(world.get_value::<Marker>(reborn).unwrap(), None);
    assert_eq!(world.get_value::<Tag>(reborn).unwrap(), Some(Tag));
    world.validate().unwrap();
}

#[test]
fn spawn_at_clears_a_stale_deletion_mark() {
    init_components();
    let mut world = World::new();
    let entity = world.spawn(marker(1)).unwrap();

    world.start_deferring();
    world.despawn(entity).unwrap();
    world.commit_commands().unwrap();
    assert!(!world.contains(entity));

    // The deletion mark survives the commit. Without clearing it, every
    // command addressing the reused id would be elided forever.
    let reborn = world.spawn_at(entity.id(), marker(9)).unwrap();
    world.commit_commands().unwrap();

    assert!(world.contains(reborn));
    assert_eq!(
        world.get_value::<Marker>(reborn).unwrap(),
        Some(Marker { value: 9 })
    );
    world.validate().unwrap();
}

#[test]
fn stop_deferring_flushes_the_queue() {
    init_components();
    let mut world = World::new();
    let entity = world.spawn(Bundle::new()).unwrap();

    world.start_deferring();
    world.insert(entity, marker(2)).unwrap();
    world.stop_deferring().unwrap();

    assert_eq!(
        world.get_value::<Marker>(entity).unwrap(),
        Some(Marker { value: 2 })
    );

    // Back in immediate mode: mutations apply at the call site.
    world.insert(entity, marker(3)).unwrap();
    assert_eq!(
        world.get_value::<Marker>(entity).unwrap(),
        Some(Marker { value: 3 })
    );
}
