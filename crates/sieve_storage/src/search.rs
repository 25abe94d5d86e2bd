//! Relationship-traversal search.
//!
//! The primitive consumed by term matching: find a column in a table's id
//! array matching an id pattern, optionally walking up a traversable
//! relationship to the nearest ancestor that carries the id.

use sieve_foundation::{Entity, Id};

use crate::table::Table;
use crate::world::World;

/// Result of a relationship search.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RelationMatch {
    /// Matched column in the id array of the table where the id was found.
    pub column: usize,
    /// Entity the id was found on, or null for a self match.
    pub source: Entity,
}

/// Searches a table's id array for a column matching `pattern`, starting
/// at `offset`.
#[must_use]
pub fn type_search_from(table: &Table, offset: usize, pattern: Id) -> Option<usize> {
    table
        .ids()
        .iter()
        .enumerate()
        .skip(offset)
        .find(|&(_, &id)| id_matches(pattern, id))
        .map(|(i, _)| i)
}

/// Counts the columns matching `pattern`.
///
/// `_` (Any) patterns are capped at exactly one match per table: they ask
/// whether a representative exists, not how many.
#[must_use]
pub fn type_match_count(table: &Table, pattern: Id) -> usize {
    let count = table
        .ids()
        .iter()
        .filter(|&&id| id_matches(pattern, id))
        .count();
    if pattern.is_any() {
        count.min(1)
    } else {
        count
    }
}

/// Searches for `pattern` on the table itself and, when `up` is set, on
/// ancestors along `relation`, nearest ancestor first.
///
/// `offset` applies to the self search only; it is the resume point used
/// when re-invoking the search to find the next match of a repeatable
/// wildcard term. The returned column indexes the id array of the table
/// the id was found in; `source` is null for self matches.
#[must_use]
pub fn search_relation(
    world: &World,
    table: &Table,
    offset: usize,
    pattern: Id,
    relation: Entity,
    include_self: bool,
    up: bool,
) -> Option<RelationMatch> {
    if include_self {
        if let Some(column) = type_search_from(table, offset, pattern) {
            return Some(RelationMatch {
                column,
                source: Entity::null(),
            });
        }
    }

    if !up || relation.is_null() {
        return None;
    }

    let edge = Id::pair(relation, Entity::WILDCARD);
    for &id in table.ids() {
        if !id_matches(edge, id) {
            continue;
        }
        let target = id.second();
        if target.is_null() || target.is_wildcard() {
            continue;
        }
        let Some(target_table) = world.entity_table(target) else {
            continue;
        };
        let target_table = world.table(target_table);
        if let Some(hit) = search_relation(world, target_table, 0, pattern, relation, true, true) {
            let source = if hit.source.is_null() {
                target
            } else {
                hit.source
            };
            return Some(RelationMatch {
                column: hit.column,
                source,
            });
        }
    }

    None
}

/// Pattern match for one type column. AND-group ids only match themselves;
/// they are expanded by operator evaluation, not by wildcard search.
fn id_matches(pattern: Id, id: Id) -> bool {
    if id.is_and_group() {
        pattern == id
    } else {
        pattern.matches(id)
    }
}
