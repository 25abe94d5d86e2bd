//! Integration tests for relationship search.

use sieve_foundation::{Entity, Id};
use sieve_storage::{ComponentDesc, World, search_relation, type_match_count, type_search_from};

#[test]
fn search_walks_childof_chains() {
    let mut world = World::new();
    let tag = world.component(ComponentDesc::tag("Root")).unwrap();

    let grandparent = world.spawn();
    world.add(grandparent, tag).unwrap();
    let parent = world.spawn();
    world.child_of(parent, grandparent).unwrap();
    let child = world.spawn();
    world.child_of(child, parent).unwrap();

    let table = world.table(world.entity_table(child).unwrap());
    let hit = search_relation(
        &world,
        table,
        0,
        Id::entity(tag),
        Entity::CHILD_OF,
        false,
        true,
    )
    .unwrap();
    assert_eq!(hit.source, grandparent);
}

#[test]
fn search_without_up_stays_local() {
    let mut world = World::new();
    let tag = world.component(ComponentDesc::tag("Root")).unwrap();

    let parent = world.spawn();
    world.add(parent, tag).unwrap();
    let child = world.spawn();
    world.child_of(child, parent).unwrap();

    let table = world.table(world.entity_table(child).unwrap());
    assert!(
        search_relation(&world, table, 0, Id::entity(tag), Entity::CHILD_OF, true, false).is_none()
    );
}

#[test]
fn offset_search_enumerates_wildcard_columns() {
    let mut world = World::new();
    let likes = world.component(ComponentDesc::tag("Likes")).unwrap();
    let targets: Vec<Entity> = (0..3).map(|_| world.spawn()).collect();

    let e = world.spawn();
    for &t in &targets {
        world.add_pair(e, likes, t).unwrap();
    }

    let table = world.table(world.entity_table(e).unwrap());
    let pattern = Id::pair(likes, Entity::WILDCARD);

    let mut columns = Vec::new();
    let mut offset = 0;
    while let Some(column) = type_search_from(table, offset, pattern) {
        columns.push(column);
        offset = column + 1;
    }

    assert_eq!(columns.len(), 3);
    assert_eq!(type_match_count(table, pattern), 3);
    for (column, &target) in columns.iter().zip(&targets) {
        assert_eq!(table.ids()[*column], Id::pair(likes, target));
    }
}

#[test]
fn missing_link_breaks_the_chain() {
    let mut world = World::new();
    let tag = world.component(ComponentDesc::tag("Root")).unwrap();

    let parent = world.spawn();
    let child = world.spawn();
    world.child_of(child, parent).unwrap();
    let _ = tag;

    let table = world.table(world.entity_table(child).unwrap());
    assert!(
        search_relation(&world, table, 0, Id::entity(tag), Entity::CHILD_OF, true, true).is_none()
    );
}
