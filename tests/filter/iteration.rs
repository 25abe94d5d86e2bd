//! Integration tests for filter iteration.

use sieve_filter::{
    Filter, FilterDesc, FilterFlags, Pivot, RefDesc, TermDesc, TermOper,
};
use sieve_foundation::{Entity, Id};
use sieve_storage::{ComponentDesc, TableId, World};

fn collect_rows(world: &World, filter: &Filter) -> Vec<(Entity, Id)> {
    let mut it = filter.iter(world);
    let mut rows = Vec::new();
    while it.next() {
        if let Some(entity) = it.entity() {
            rows.push((entity, it.field_id(0)));
        }
    }
    rows
}

#[test]
fn or_chain_yields_each_entity_once_with_short_circuit() {
    let mut world = World::new();
    let tag_a = world.component(ComponentDesc::tag("TagA")).unwrap();
    let tag_b = world.component(ComponentDesc::tag("TagB")).unwrap();

    let e1 = world.spawn();
    world.add(e1, tag_a).unwrap();
    let e2 = world.spawn();
    world.add(e2, tag_b).unwrap();
    let e3 = world.spawn();
    world.add(e3, tag_a).unwrap();
    world.add(e3, tag_b).unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::component(tag_a).with_oper(TermOper::Or))
            .with_term(TermDesc::component(tag_b).with_oper(TermOper::Or)),
    )
    .unwrap();

    let rows = collect_rows(&world, &filter);
    assert_eq!(
        rows,
        vec![
            (e1, Id::entity(tag_a)),
            (e2, Id::entity(tag_b)),
            // Both tags present: the first OR sibling wins, not both.
            (e3, Id::entity(tag_a)),
        ]
    );
}

#[test]
fn inherited_components_come_from_their_base() {
    let mut world = World::new();
    let position = world.component(ComponentDesc::new("Position")).unwrap();

    let base = world.spawn();
    world.add(base, position).unwrap();
    let derived = world.spawn();
    world.is_a(derived, base).unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new().with_term(TermDesc::component(position)),
    )
    .unwrap();

    let mut it = filter.iter(&world);
    let mut seen = Vec::new();
    while it.next() {
        let entity = it.entity().unwrap();
        seen.push((entity, it.field_source(0), it.field_column(0)));
    }

    assert_eq!(seen.len(), 2);
    // The base matches on itself.
    assert_eq!(seen[0].0, base);
    assert!(seen[0].1.is_null());
    assert!(seen[0].2 > 0);
    // The derived entity matches through its base; the column is encoded
    // negative to signal the non-self source.
    assert_eq!(seen[1].0, derived);
    assert_eq!(seen[1].1, base);
    assert!(seen[1].2 < 0);
}

#[test]
fn empty_tables_are_visited_only_on_request() {
    let mut world = World::new();
    let tag = world.component(ComponentDesc::tag("TagX")).unwrap();
    let e = world.spawn();
    world.add(e, tag).unwrap();
    let table = world.entity_table(e).unwrap();
    world.remove(e, tag).unwrap();

    let plain = Filter::new(
        &world,
        FilterDesc::new().with_term(TermDesc::component(tag)),
    )
    .unwrap();
    let mut it = plain.iter(&world);
    assert!(!it.next_instanced());

    let inclusive = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::component(tag))
            .match_empty_tables(),
    )
    .unwrap();
    let mut it = inclusive.iter(&world);
    assert!(it.next_instanced());
    assert_eq!(it.table_id(), Some(table));
    assert_eq!(it.count(), 0);
    assert!(!it.next_instanced());

    // Row-wise iteration has nothing to expand from an empty table.
    let mut it = inclusive.iter(&world);
    assert!(!it.next());
}

#[test]
fn iteration_is_deterministic() {
    let mut world = World::new();
    let position = world.component(ComponentDesc::new("Position")).unwrap();
    let velocity = world.component(ComponentDesc::new("Velocity")).unwrap();
    let tag = world.component(ComponentDesc::tag("TagA")).unwrap();

    for i in 0..12 {
        let e = world.spawn();
        world.add(e, position).unwrap();
        if i % 2 == 0 {
            world.add(e, velocity).unwrap();
        }
        if i % 3 == 0 {
            world.add(e, tag).unwrap();
        }
    }

    let filter = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::component(position))
            .with_term(TermDesc::component(velocity).with_oper(TermOper::Optional)),
    )
    .unwrap();

    let run = |filter: &Filter| {
        let mut it = filter.iter(&world);
        let mut out = Vec::new();
        while it.next_instanced() {
            out.push((
                it.table_id(),
                it.field_id(0),
                it.field_id(1),
                it.field_column(0),
                it.field_column(1),
                it.field_source(0),
            ));
        }
        out
    };

    let first = run(&filter);
    let second = run(&filter);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn wildcard_permutations_follow_odometer_order() {
    let mut world = World::new();
    let likes = world.component(ComponentDesc::tag("Likes")).unwrap();
    let eats = world.component(ComponentDesc::tag("Eats")).unwrap();
    let a = world.spawn_named("a").unwrap();
    let b = world.spawn_named("b").unwrap();
    let x = world.spawn_named("x").unwrap();
    let y = world.spawn_named("y").unwrap();

    let e = world.spawn();
    world.add_pair(e, likes, a).unwrap();
    world.add_pair(e, likes, b).unwrap();
    world.add_pair(e, eats, x).unwrap();
    world.add_pair(e, eats, y).unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::pair(likes, Entity::WILDCARD))
            .with_term(TermDesc::pair(eats, Entity::WILDCARD)),
    )
    .unwrap();

    let mut it = filter.iter(&world);
    let mut perms = Vec::new();
    while it.next_instanced() {
        perms.push((it.field_id(0), it.field_id(1)));
    }

    // The right-most field advances fastest.
    assert_eq!(
        perms,
        vec![
            (Id::pair(likes, a), Id::pair(eats, x)),
            (Id::pair(likes, a), Id::pair(eats, y)),
            (Id::pair(likes, b), Id::pair(eats, x)),
            (Id::pair(likes, b), Id::pair(eats, y)),
        ]
    );
}

#[test]
fn unsatisfiable_filters_yield_nothing() {
    let mut world = World::new();
    let present = world.component(ComponentDesc::tag("Present")).unwrap();
    let absent = world.component(ComponentDesc::tag("Absent")).unwrap();
    let e = world.spawn();
    world.add(e, present).unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::component(present))
            .with_term(TermDesc::component(absent)),
    )
    .unwrap();

    assert_eq!(filter.pivot_term(&world), Pivot::Unsatisfiable);
    let mut it = filter.iter(&world);
    assert!(!it.next_instanced());
}

#[test]
fn all_negation_filters_hold_as_conditions() {
    let mut world = World::new();
    let tag = world.component(ComponentDesc::tag("TagA")).unwrap();
    let e = world.spawn();
    world.add(e, tag).unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new().with_term(TermDesc::component(tag).with_oper(TermOper::Not)),
    )
    .unwrap();
    assert!(filter.flags().contains(FilterFlags::MATCH_ANYTHING));

    let mut it = filter.iter(&world);
    assert!(it.next_instanced());
    assert_eq!(it.table_id(), None);
    assert_eq!(it.count(), 0);
    assert!(!it.field_is_set(0));
    assert!(!it.next_instanced());

    // Row-wise: one "condition holds" result naming no entity.
    let mut it = filter.iter(&world);
    assert!(it.next());
    assert_eq!(it.entity(), None);
    assert!(!it.next());
}

#[test]
fn fixed_source_filters_evaluate_once() {
    let mut world = World::new();
    let config = world.component(ComponentDesc::tag("Config")).unwrap();
    let settings = world.spawn_named("settings").unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::component(config).with_src(RefDesc::entity(settings))),
    )
    .unwrap();
    assert!(!filter.flags().contains(FilterFlags::MATCH_THIS));

    // The source does not have Config yet.
    let mut it = filter.iter(&world);
    assert!(!it.next_instanced());
    drop(it);

    world.add(settings, config).unwrap();
    let mut it = filter.iter(&world);
    assert!(it.next_instanced());
    assert_eq!(it.table_id(), None);
    assert_eq!(it.field_source(0), settings);
    assert!(!it.next_instanced());
}

#[test]
fn pinned_this_verifies_a_single_entity() {
    let mut world = World::new();
    let tag = world.component(ComponentDesc::tag("TagA")).unwrap();
    let e1 = world.spawn();
    world.add(e1, tag).unwrap();
    let e2 = world.spawn();
    world.add(e2, tag).unwrap();
    let outsider = world.spawn();

    let filter = Filter::new(
        &world,
        FilterDesc::new().with_term(TermDesc::component(tag)),
    )
    .unwrap();

    let mut it = filter.iter(&world);
    it.set_this_entity(e2);
    assert!(it.next_instanced());
    assert_eq!(it.entities(), &[e2]);
    assert!(!it.next_instanced());

    let mut it = filter.iter(&world);
    it.set_this_entity(outsider);
    assert!(!it.next_instanced());
}

#[test]
fn pinned_this_table_yields_the_whole_batch() {
    let mut world = World::new();
    let tag = world.component(ComponentDesc::tag("TagA")).unwrap();
    let e1 = world.spawn();
    world.add(e1, tag).unwrap();
    let e2 = world.spawn();
    world.add(e2, tag).unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new().with_term(TermDesc::component(tag)),
    )
    .unwrap();

    let table = world.entity_table(e1).unwrap();
    let mut it = filter.iter(&world);
    it.set_this_table(table);
    assert!(it.next_instanced());
    assert_eq!(it.entities(), &[e1, e2]);
    assert!(!it.next_instanced());
}

#[test]
fn chained_iteration_rematches_upstream_tables() {
    let mut world = World::new();
    let tag_a = world.component(ComponentDesc::tag("TagA")).unwrap();
    let tag_b = world.component(ComponentDesc::tag("TagB")).unwrap();

    let only_a = world.spawn();
    world.add(only_a, tag_a).unwrap();
    let both = world.spawn();
    world.add(both, tag_a).unwrap();
    world.add(both, tag_b).unwrap();

    let upstream = Filter::new(
        &world,
        FilterDesc::new().with_term(TermDesc::component(tag_a)),
    )
    .unwrap();
    let mut tables: Vec<TableId> = Vec::new();
    let mut it = upstream.iter(&world);
    while it.next_instanced() {
        if let Some(t) = it.table_id() {
            tables.push(t);
        }
    }
    assert_eq!(tables.len(), 2);

    let downstream = Filter::new(
        &world,
        FilterDesc::new().with_term(TermDesc::component(tag_b)),
    )
    .unwrap();
    let mut it = downstream.chain_iter(&world, tables.into_iter());
    assert!(it.next_instanced());
    assert_eq!(it.entities(), &[both]);
    assert!(!it.next_instanced());
}

#[test]
fn instanced_flag_makes_next_yield_batches() {
    let mut world = World::new();
    let tag = world.component(ComponentDesc::tag("TagA")).unwrap();
    for _ in 0..3 {
        let e = world.spawn();
        world.add(e, tag).unwrap();
    }

    let filter = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::component(tag))
            .instanced(),
    )
    .unwrap();

    let mut it = filter.iter(&world);
    assert!(it.next());
    assert_eq!(it.count(), 3);
    assert!(!it.next());
}

#[test]
fn prefab_and_disabled_require_opt_in() {
    let mut world = World::new();
    let tag = world.component(ComponentDesc::tag("TagA")).unwrap();

    let normal = world.spawn();
    world.add(normal, tag).unwrap();
    let prefab = world.spawn();
    world.add(prefab, tag).unwrap();
    world.add(prefab, Entity::PREFAB).unwrap();

    let plain = Filter::new(
        &world,
        FilterDesc::new().with_term(TermDesc::component(tag)),
    )
    .unwrap();
    let rows = collect_rows(&world, &plain);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, normal);

    // Matching the Prefab tag itself opts the filter in.
    let with_prefabs = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::component(tag))
            .with_term(TermDesc::component(Entity::PREFAB).with_oper(TermOper::Optional)),
    )
    .unwrap();
    assert!(with_prefabs.flags().contains(FilterFlags::MATCH_PREFAB));
    let rows = collect_rows(&world, &with_prefabs);
    assert_eq!(rows.len(), 2);
}

#[test]
fn pagination_trims_batches() {
    let mut world = World::new();
    let tag_a = world.component(ComponentDesc::tag("TagA")).unwrap();
    let tag_b = world.component(ComponentDesc::tag("TagB")).unwrap();

    let mut entities = Vec::new();
    for i in 0..5 {
        let e = world.spawn();
        world.add(e, tag_a).unwrap();
        if i >= 3 {
            world.add(e, tag_b).unwrap();
        }
        entities.push(e);
    }

    let filter = Filter::new(
        &world,
        FilterDesc::new().with_term(TermDesc::component(tag_a)),
    )
    .unwrap();

    // Tables: [TagA] with 3 rows, then [TagA, TagB] with 2 rows.
    let mut paged = filter.iter(&world).paged(2, Some(2));
    let mut rows = Vec::new();
    while paged.next_instanced() {
        rows.extend_from_slice(paged.entities());
    }
    assert_eq!(rows, vec![entities[2], entities[3]]);
}
