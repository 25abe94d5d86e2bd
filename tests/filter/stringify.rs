//! Integration tests for filter stringification.
//!
//! The expression parser is an external collaborator, so round-tripping is
//! exercised as: render a filter, rebuild an equivalent one from the same
//! descriptors, and require identical terms and identical renderings.

use sieve_filter::{
    Filter, FilterDesc, InOut, RefDesc, TermDesc, TermOper, TraversalMode,
};
use sieve_storage::{ComponentDesc, World};

fn world_with_components() -> World {
    let mut world = World::new();
    world.component(ComponentDesc::new("Position")).unwrap();
    world.component(ComponentDesc::new("Velocity")).unwrap();
    world.component(ComponentDesc::tag("TagA")).unwrap();
    world.component(ComponentDesc::tag("TagB")).unwrap();
    world.component(ComponentDesc::tag("Likes")).unwrap();
    world.spawn_named("bob").unwrap();
    world
}

#[test]
fn renders_the_documented_notation() {
    let mut world = world_with_components();
    let position = world.lookup("Position").unwrap();
    let tag_a = world.lookup("TagA").unwrap();
    let tag_b = world.lookup("TagB").unwrap();
    let likes = world.lookup("Likes").unwrap();
    let bob = world.lookup("bob").unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::component(position).with_inout(InOut::In))
            .with_term(TermDesc::pair(likes, bob))
            .with_term(TermDesc::component(tag_a).with_oper(TermOper::Or))
            .with_term(TermDesc::component(tag_b).with_oper(TermOper::Or))
            .with_term(TermDesc::component(tag_b).with_oper(TermOper::Not)),
    )
    .unwrap();

    assert_eq!(
        filter.expr_string(&world),
        "[in] Position, (Likes,bob), TagA || TagB, [none] !TagB"
    );
}

#[test]
fn traversal_deviations_render_suffixes() {
    let mut world = world_with_components();
    let tag_a = world.lookup("TagA").unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new().with_term(
            TermDesc::component(tag_a)
                .with_src(RefDesc::this().with_mode(TraversalMode::SelfUp)),
        ),
    )
    .unwrap();
    assert_eq!(filter.expr_string(&world), "TagA($this:self|up(ChildOf))");

    let filter = Filter::new(
        &world,
        FilterDesc::new().with_term(
            TermDesc::component(tag_a)
                .with_src(RefDesc::this().with_mode(TraversalMode::Cascade)),
        ),
    )
    .unwrap();
    assert_eq!(filter.expr_string(&world), "TagA($this:cascade(ChildOf))");
}

#[test]
fn optional_and_fixed_sources_render() {
    let mut world = world_with_components();
    let velocity = world.lookup("Velocity").unwrap();
    let bob = world.lookup("bob").unwrap();

    let filter = Filter::new(
        &world,
        FilterDesc::new()
            .with_term(TermDesc::component(velocity).with_oper(TermOper::Optional))
            .with_term(TermDesc::component(velocity).with_src(RefDesc::entity(bob))),
    )
    .unwrap();
    assert_eq!(filter.expr_string(&world), "?Velocity, Velocity(bob)");
}

#[test]
fn rebuilt_filters_render_and_compare_equal() {
    let mut world = world_with_components();
    let position = world.lookup("Position").unwrap();
    let likes = world.lookup("Likes").unwrap();
    let tag_a = world.lookup("TagA").unwrap();
    let bob = world.lookup("bob").unwrap();

    let desc = || {
        FilterDesc::new()
            .with_term(TermDesc::component(position).with_inout(InOut::In))
            .with_term(TermDesc::pair(likes, bob).with_oper(TermOper::Optional))
            .with_term(TermDesc::component(tag_a).with_oper(TermOper::Not))
    };

    let original = Filter::new(&world, desc()).unwrap();
    let rebuilt = Filter::new(&world, desc()).unwrap();

    assert_eq!(original.expr_string(&world), rebuilt.expr_string(&world));
    assert_eq!(original.term_count(), rebuilt.term_count());
    for (a, b) in original.terms().zip(rebuilt.terms()) {
        assert_eq!(a, b);
    }

    // Equality covers ids, operators, and access annotations.
    let mut opers = original.terms().map(|t| t.oper);
    assert!(opers.all(|o| matches!(
        o,
        TermOper::And | TermOper::Optional | TermOper::Not
    )));
}

#[test]
fn named_lookup_and_entity_lookup_agree() {
    let world = {
        let mut world = World::new();
        world.component(ComponentDesc::new("Position")).unwrap();
        world
    };

    let by_name = Filter::new(
        &world,
        FilterDesc::new().with_term(TermDesc::named("Position")),
    )
    .unwrap();
    let by_entity = Filter::new(
        &world,
        FilterDesc::new().with_term(TermDesc::component(world.lookup("Position").unwrap())),
    )
    .unwrap();

    assert_eq!(by_name.expr_string(&world), by_entity.expr_string(&world));
    assert_eq!(
        by_name.term(0).unwrap().id,
        by_entity.term(0).unwrap().id
    );
}
