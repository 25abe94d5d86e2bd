//! Integration tests for entity and id encoding.

use sieve_foundation::{Entity, Id};

#[test]
fn builtin_entities_are_distinct() {
    let builtins = [
        Entity::WILDCARD,
        Entity::ANY,
        Entity::THIS,
        Entity::CHILD_OF,
        Entity::IS_A,
        Entity::PREFAB,
        Entity::DISABLED,
    ];
    for (i, a) in builtins.iter().enumerate() {
        for b in &builtins[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn pair_ids_never_collide_with_plain_ids() {
    let e = Entity::new(42);
    let plain = Id::entity(e);
    let pair = Id::pair(e, e);

    assert_ne!(plain, pair);
    assert!(!plain.is_pair());
    assert!(pair.is_pair());
}

#[test]
fn wildcard_and_any_are_wildcards() {
    assert!(Id::WILDCARD.is_wildcard());
    assert!(Id::ANY.is_wildcard());
    assert!(Id::ANY.is_any());
    assert!(!Id::WILDCARD.is_any());

    let pair = Id::pair(Entity::new(10), Entity::ANY);
    assert!(pair.is_wildcard());
    assert!(pair.is_any());
}

mod properties {
    use proptest::prelude::*;
    use sieve_foundation::{Entity, Id};

    proptest! {
        #[test]
        fn exact_patterns_match_only_themselves(
            first in 8u32..(1 << 30),
            second in 8u32..(1 << 30),
            other in 8u32..(1 << 30),
        ) {
            let id = Id::pair(Entity::new(first), Entity::new(second));
            prop_assert!(id.matches(id));
            if other != second {
                let different = Id::pair(Entity::new(first), Entity::new(other));
                prop_assert!(!id.matches(different));
            }
        }

        #[test]
        fn wildcard_patterns_subsume_exact_ones(
            first in 8u32..(1 << 30),
            second in 8u32..(1 << 30),
        ) {
            let id = Id::pair(Entity::new(first), Entity::new(second));
            let by_first = Id::pair(Entity::new(first), Entity::WILDCARD);
            let by_second = Id::pair(Entity::WILDCARD, Entity::new(second));
            prop_assert!(by_first.matches(id));
            prop_assert!(by_second.matches(id));
        }
    }
}

#[test]
fn pattern_matching_is_elementwise() {
    let rel = Entity::new(10);
    let alice = Entity::new(20);
    let bob = Entity::new(21);

    let concrete = Id::pair(rel, alice);
    assert!(Id::pair(rel, Entity::WILDCARD).matches(concrete));
    assert!(!Id::pair(rel, bob).matches(concrete));
    assert!(Id::pair(Entity::WILDCARD, alice).matches(concrete));
    assert!(!Id::pair(Entity::WILDCARD, bob).matches(concrete));
}
