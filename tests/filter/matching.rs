//! Integration tests for table matching.

use sieve_filter::{
    FieldData, Filter, FilterDesc, RefDesc, TermDesc, TermOper, finalize_term, match_filter,
    match_term,
};
use sieve_foundation::{Entity, Id};
use sieve_storage::{ComponentDesc, World};

#[test]
fn any_pairs_report_a_single_match() {
    let mut world = World::new();
    let likes = world.component(ComponentDesc::tag("Likes")).unwrap();
    let targets: Vec<Entity> = (0..3).map(|_| world.spawn()).collect();
    let e = world.spawn();
    for &t in &targets {
        world.add_pair(e, likes, t).unwrap();
    }

    let table = world.table(world.entity_table(e).unwrap());

    let wildcard = finalize_term(&world, &TermDesc::pair(likes, Entity::WILDCARD)).unwrap();
    let hit = match_term(&world, &wildcard, Some(table), 0, true).unwrap();
    assert_eq!(hit.count, 3);

    let any = finalize_term(&world, &TermDesc::pair(likes, Entity::ANY)).unwrap();
    let hit = match_term(&world, &any, Some(table), 0, true).unwrap();
    assert_eq!(hit.count, 1);
}

#[test]
fn whole_list_match_accumulates_permutations() {
    let mut world = World::new();
    let likes = world.component(ComponentDesc::tag("Likes")).unwrap();
    let eats = world.component(ComponentDesc::tag("Eats")).unwrap();
    let a = world.spawn();
    let b = world.spawn();
    let e = world.spawn();
    world.add_pair(e, likes, a).unwrap();
    world.add_pair(e, likes, b).unwrap();
    world.add_pair(e, eats, a).unwrap();
    world.add_pair(e, eats, b).unwrap();
    world.add_pair(e, eats, e).unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::pair(likes, Entity::WILDCARD))
            .with_term(TermDesc::pair(eats, Entity::WILDCARD)),
    )
    .unwrap();

    let table = world.table(world.entity_table(e).unwrap());
    let mut fields = FieldData::new(filter.field_count());
    let mut total = 1;
    assert!(match_filter(
        &world,
        &filter,
        Some(table),
        &mut fields,
        Some(&mut total),
        None,
    ));

    // 2 likes x 3 eats.
    assert_eq!(total, 6);
    assert_eq!(fields.counts, vec![2, 3]);
}

#[test]
fn or_chains_short_circuit() {
    let mut world = World::new();
    let a = world.component(ComponentDesc::tag("TagA")).unwrap();
    let b = world.component(ComponentDesc::tag("TagB")).unwrap();
    let e = world.spawn();
    world.add(e, a).unwrap();
    world.add(e, b).unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::component(a).with_oper(TermOper::Or))
            .with_term(TermDesc::component(b).with_oper(TermOper::Or)),
    )
    .unwrap();

    let table = world.table(world.entity_table(e).unwrap());
    let mut fields = FieldData::new(filter.field_count());
    assert!(match_filter(
        &world, &filter, Some(table), &mut fields, None, None
    ));

    // Both tags are present; the first sibling wins the field.
    assert_eq!(fields.ids[0], Id::entity(a));
    assert_eq!(fields.term_of_field[0], 0);
}

#[test]
fn optional_terms_report_presence() {
    let mut world = World::new();
    let tag = world.component(ComponentDesc::tag("TagA")).unwrap();
    let extra = world.component(ComponentDesc::tag("Extra")).unwrap();

    let with_extra = world.spawn();
    world.add(with_extra, tag).unwrap();
    world.add(with_extra, extra).unwrap();
    let without = world.spawn();
    world.add(without, tag).unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::component(tag))
            .with_term(TermDesc::component(extra).with_oper(TermOper::Optional)),
    )
    .unwrap();

    let mut fields = FieldData::new(filter.field_count());
    let table = world.table(world.entity_table(with_extra).unwrap());
    assert!(match_filter(
        &world, &filter, Some(table), &mut fields, None, None
    ));
    assert!(fields.set[1]);
    assert!(fields.columns[1] > 0);

    // Unmatched optional: the field reports the declared id, a zero
    // column, and a null source; no data is fabricated.
    let table = world.table(world.entity_table(without).unwrap());
    assert!(match_filter(
        &world, &filter, Some(table), &mut fields, None, None
    ));
    assert!(!fields.set[1]);
    assert_eq!(fields.columns[1], 0);
    assert!(fields.sources[1].is_null());
    assert_eq!(fields.ids[1], Id::entity(extra));
}

#[test]
fn fixed_sources_match_their_own_table() {
    let mut world = World::new();
    let config = world.component(ComponentDesc::tag("Config")).unwrap();
    let tag = world.component(ComponentDesc::tag("TagA")).unwrap();

    let settings = world.spawn_named("settings").unwrap();
    world.add(settings, config).unwrap();

    let e = world.spawn();
    world.add(e, tag).unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::component(tag))
            .with_term(TermDesc::component(config).with_src(RefDesc::name("settings"))),
    )
    .unwrap();

    let table = world.table(world.entity_table(e).unwrap());
    let mut fields = FieldData::new(filter.field_count());
    assert!(match_filter(
        &world, &filter, Some(table), &mut fields, None, None
    ));
    assert_eq!(fields.sources[1], settings);
    assert!(fields.columns[1] < 0);
}

#[test]
fn type_operators_expand_entity_types() {
    let mut world = World::new();
    let a = world.component(ComponentDesc::tag("TagA")).unwrap();
    let b = world.component(ComponentDesc::tag("TagB")).unwrap();
    let bundle = world.component(ComponentDesc::tag("Bundle")).unwrap();
    world.add(bundle, a).unwrap();
    world.add(bundle, b).unwrap();

    let full = world.spawn();
    world.add(full, a).unwrap();
    world.add(full, b).unwrap();
    let half = world.spawn();
    world.add(half, a).unwrap();

    let and_from = finalize_term(
        &world,
        &TermDesc::component(bundle).with_oper(TermOper::AndFrom),
    )
    .unwrap();
    let or_from = finalize_term(
        &world,
        &TermDesc::component(bundle).with_oper(TermOper::OrFrom),
    )
    .unwrap();

    let full_table = world.table(world.entity_table(full).unwrap());
    let half_table = world.table(world.entity_table(half).unwrap());

    assert!(match_term(&world, &and_from, Some(full_table), 0, false).is_some());
    assert!(match_term(&world, &and_from, Some(half_table), 0, false).is_none());
    assert!(match_term(&world, &or_from, Some(half_table), 0, false).is_some());
}

#[test]
fn nested_and_groups_recurse() {
    let mut world = World::new();
    let a = world.component(ComponentDesc::tag("TagA")).unwrap();
    let b = world.component(ComponentDesc::tag("TagB")).unwrap();

    // inner requires TagA and TagB; outer requires the inner group.
    let inner = world.component(ComponentDesc::tag("Inner")).unwrap();
    world.add(inner, a).unwrap();
    world.add(inner, b).unwrap();
    let outer = world.component(ComponentDesc::tag("Outer")).unwrap();
    world.add_id(outer, Id::and_group(inner)).unwrap();

    let full = world.spawn();
    world.add(full, a).unwrap();
    world.add(full, b).unwrap();
    let half = world.spawn();
    world.add(half, b).unwrap();

    let term = finalize_term(
        &world,
        &TermDesc::component(outer).with_oper(TermOper::AndFrom),
    )
    .unwrap();

    let full_table = world.table(world.entity_table(full).unwrap());
    let half_table = world.table(world.entity_table(half).unwrap());
    assert!(match_term(&world, &term, Some(full_table), 0, false).is_some());
    assert!(match_term(&world, &term, Some(half_table), 0, false).is_none());
}
