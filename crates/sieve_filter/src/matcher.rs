//! Table matching.
//!
//! Evaluates one finalized term, and then a full ordered term list, against
//! a concrete table: per field, the resolved id, the matched column, the
//! source entity, and the match multiplicity for wildcard terms that can
//! match a table more than once.

use sieve_foundation::{Entity, Id};
use sieve_storage::{Table, World, search_relation, type_match_count, type_search_from};

use crate::filter::Filter;
use crate::term::{InOut, Term, TermOper, Traversal};

/// Result of matching one term against one table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TermHit {
    /// The concrete id that matched (the term's own id pattern when the
    /// match is tolerated rather than found).
    pub id: Id,
    /// 1-based matched column, negated when the id was found on another
    /// entity, zero when unmatched but tolerated.
    pub column: i32,
    /// Entity carrying the id, or null for a self match.
    pub source: Entity,
    /// Number of distinct matches the table offers for this term.
    pub count: usize,
    /// False when the term only matched by tolerance (Not, or an absent
    /// Optional).
    pub set: bool,
}

impl TermHit {
    fn unmatched(id: Id) -> Self {
        Self {
            id,
            column: 0,
            source: Entity::null(),
            count: 1,
            set: false,
        }
    }

    fn trivial(id: Id) -> Self {
        Self {
            set: true,
            ..Self::unmatched(id)
        }
    }
}

/// Per-field output arrays of a whole-list match, sized to the filter's
/// field count.
#[derive(Clone, Debug, Default)]
pub struct FieldData {
    /// Matched concrete id per field.
    pub ids: Vec<Id>,
    /// Encoded column per field (see [`TermHit::column`]).
    pub columns: Vec<i32>,
    /// Source entity per field; null when matched on the table itself.
    pub sources: Vec<Entity>,
    /// Match multiplicity per field.
    pub counts: Vec<usize>,
    /// Whether the field actually matched (false for Not and absent
    /// Optional fields).
    pub set: Vec<bool>,
    /// Term driving each field; for OR chains, the member that matched.
    pub term_of_field: Vec<usize>,
}

impl FieldData {
    /// Creates field arrays for `field_count` fields.
    #[must_use]
    pub fn new(field_count: usize) -> Self {
        Self {
            ids: vec![Id::NULL; field_count],
            columns: vec![0; field_count],
            sources: vec![Entity::null(); field_count],
            counts: vec![1; field_count],
            set: vec![false; field_count],
            term_of_field: vec![0; field_count],
        }
    }

    pub(crate) fn store(&mut self, field: usize, term_index: usize, hit: &TermHit) {
        self.ids[field] = hit.id;
        self.columns[field] = hit.column;
        self.sources[field] = hit.source;
        self.counts[field] = hit.count;
        self.set[field] = hit.set;
        self.term_of_field[field] = term_index;
    }
}

/// Matches a single term against a table.
///
/// `table` is the table the "this" variable is bound to; `None` means the
/// variable is unbound, which satisfies only tolerated operators. `offset`
/// is the column to resume the search at when looking for the next match
/// of a repeatable wildcard term. When `count_matches` is set the hit
/// carries the table's full multiplicity for the term, otherwise 1.
#[must_use]
pub fn match_term(
    world: &World,
    term: &Term,
    table: Option<&Table>,
    offset: usize,
    count_matches: bool,
) -> Option<TermHit> {
    // A term with an explicitly empty source matches its id as given.
    if term.matches_none() {
        return Some(TermHit::trivial(term.id));
    }

    if matches!(
        term.oper,
        TermOper::AndFrom | TermOper::OrFrom | TermOper::NotFrom
    ) {
        return match_oper_terms(world, term, table);
    }

    // Fixed sources redirect the match to the source's own table.
    let fixed_src = term.src.entity();
    let match_table = match fixed_src {
        Some(src) => world.entity_table(src).map(|t| world.table(t)),
        None => table,
    };

    let Some(match_table) = match_table else {
        // Nothing to match against: only tolerated operators hold.
        return match term.oper {
            TermOper::Not | TermOper::Optional => Some(TermHit::unmatched(term.id)),
            _ => None,
        };
    };

    let (include_self, up, relation) = traversal_parts(term.src.traversal);
    let found = root_pair_match(term.id, match_table).or_else(|| {
        search_relation(
            world,
            match_table,
            offset,
            term.id,
            relation,
            include_self,
            up,
        )
        .map(|hit| {
            let source_table = if hit.source.is_null() {
                match_table
            } else {
                world.table(world.entity_table(hit.source).unwrap_or(match_table.id()))
            };
            let id = source_table.ids().get(hit.column).copied().unwrap_or(term.id);
            let source = match fixed_src {
                Some(src) if hit.source.is_null() => src,
                _ => hit.source,
            };
            let count = if hit.source.is_null() && count_matches {
                type_match_count(match_table, term.id)
            } else {
                1
            };
            let shared = !source.is_null();
            let column = encode_column(hit.column, shared);
            TermHit {
                id,
                column,
                source,
                count: count.max(1),
                set: true,
            }
        })
    });

    match term.oper {
        TermOper::Not => match found {
            Some(_) => None,
            None => Some(TermHit::unmatched(term.id)),
        },
        TermOper::Optional => Some(found.unwrap_or_else(|| TermHit::unmatched(term.id))),
        _ => found,
    }
}

/// Matches a full term list against a table, filling per-field outputs.
///
/// `skip_term` names a term whose result the caller already holds (the
/// pivot); it is not re-evaluated unless it expands a type operator.
/// When `total` is given it accumulates the product of match counts over
/// this-variable terms: the number of cartesian permutations the table
/// contributes.
#[must_use]
pub fn match_filter(
    world: &World,
    filter: &Filter,
    table: Option<&Table>,
    fields: &mut FieldData,
    mut total: Option<&mut usize>,
    skip_term: Option<usize>,
) -> bool {
    let terms: Vec<&Term> = filter.terms().collect();
    let mut i = 0;

    while i < terms.len() {
        let term = terms[i];

        if term.oper == TermOper::Or {
            // An OR chain is one field: evaluate members until one holds,
            // then skip the remaining siblings.
            let field = term.field_index;
            let mut matched = false;
            let mut j = i;
            while j < terms.len()
                && terms[j].oper == TermOper::Or
                && terms[j].field_index == field
            {
                if !matched {
                    if let Some(hit) = match_term(world, terms[j], table, 0, false) {
                        // One representative per field: OR chains never
                        // contribute permutations.
                        fields.store(field, j, &TermHit { count: 1, ..hit });
                        matched = true;
                    }
                }
                j += 1;
            }
            if !matched {
                return false;
            }
            i = j;
            continue;
        }

        let skip = skip_term == Some(i)
            && !matches!(
                term.oper,
                TermOper::AndFrom | TermOper::OrFrom | TermOper::NotFrom
            );
        if skip {
            i += 1;
            continue;
        }

        // Only plain this-variable terms contribute permutations; every
        // other field is pinned to a single representative match.
        let count_matches =
            total.is_some() && term.oper == TermOper::And && term.matches_this();
        let Some(hit) = match_term(world, term, table, 0, count_matches) else {
            return false;
        };

        if skip_term != Some(i) {
            if count_matches {
                fields.store(term.field_index, i, &hit);
                if let Some(total) = total.as_deref_mut() {
                    *total *= hit.count;
                }
            } else {
                fields.store(term.field_index, i, &TermHit { count: 1, ..hit });
            }
        }
        i += 1;
    }

    true
}

/// Decomposes a source traversal into search arguments. Down traversal has
/// no effect on matching; it constrains id resolution, not the search.
fn traversal_parts(traversal: Traversal) -> (bool, bool, Entity) {
    match traversal {
        Traversal::Self_ | Traversal::Down(_) | Traversal::SelfDown(_) => {
            (true, false, Entity::null())
        }
        Traversal::Up(r) | Traversal::Cascade(r) => (false, true, r),
        Traversal::SelfUp(r) | Traversal::Transitive(r) => (true, true, r),
    }
}

pub(crate) fn encode_column(column: usize, shared: bool) -> i32 {
    let encoded = i32::try_from(column + 1).unwrap_or(i32::MAX);
    if shared { -encoded } else { encoded }
}

/// `(R, 0)` pairs index entities without any `(R, _)`: the root term.
fn root_pair_match(id: Id, table: &Table) -> Option<TermHit> {
    if !id.is_pair() || !id.second().is_null() {
        return None;
    }
    let edge = Id::pair(id.first(), Entity::WILDCARD);
    if type_search_from(table, 0, edge).is_some() {
        None
    } else {
        Some(TermHit::trivial(id))
    }
}

/// AndFrom/OrFrom/NotFrom: expand the target entity's type and require
/// all, any, or none of its ids to match independently. AND-group ids in
/// the type recurse into their own entity's type.
fn match_oper_terms(world: &World, term: &Term, table: Option<&Table>) -> Option<TermHit> {
    let type_entity = term.id.as_entity()?;
    let ids = type_ids(world, type_entity)?;

    let mut any = false;
    let mut all = true;
    for id in &ids {
        let ok = eval_type_id(world, term, table, *id);
        any |= ok;
        all &= ok;
    }

    let matched = match term.oper {
        TermOper::AndFrom => all,
        TermOper::OrFrom => any,
        TermOper::NotFrom => !any,
        _ => false,
    };
    if matched {
        Some(TermHit::trivial(term.id))
    } else {
        None
    }
}

fn eval_type_id(world: &World, term: &Term, table: Option<&Table>, id: Id) -> bool {
    if id.is_and_group() {
        // Nested AND group: every id of the group's type must match. The
        // expansion recurses without a depth bound; type arrays cannot
        // form cycles.
        let Some(ids) = type_ids(world, id.first()) else {
            return false;
        };
        return ids.iter().all(|&sub| eval_type_id(world, term, table, sub));
    }
    let sub = Term {
        id,
        oper: TermOper::And,
        inout: InOut::None,
        record: None,
        ..term.clone()
    };
    match_term(world, &sub, table, 0, false).is_some()
}

fn type_ids(world: &World, entity: Entity) -> Option<Vec<Id>> {
    let table = world.entity_table(entity)?;
    Some(world.table(table).ids().to_vec())
}
