//! Low-level term iteration.
//!
//! A term iterator walks the set of tables registered under a term's id
//! (or id pattern), optionally falling back to superset candidates: tables
//! that can reach the id by up-traversal over the term's relationship.
//! This is the only component that reads the component index's table
//! caches directly.

use log::trace;
use sieve_foundation::{Entity, Id, Result, SnapshotVec};
use sieve_storage::{TableId, TableRecord, World, search_relation, type_search_from};

use crate::term::{InOut, RefKind, Term, TermDesc, TermOper, TermRef, Traversal, Variable};
use crate::validator::finalize_term;

/// One yielded (table, column, source) triple.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TermMatch {
    /// The candidate table.
    pub table: TableId,
    /// The concrete id matched in the table (or its ancestor).
    pub id: Id,
    /// Matched column in the table the id was found in.
    pub column: usize,
    /// Entity the id was found on; null when the table itself carries it.
    pub source: Entity,
    /// Number of matching columns in the table. Always 1 for superset
    /// matches and single-match (`_`) patterns.
    pub match_count: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum IterState {
    SelfScan,
    UpScan,
    Done,
}

/// Iteration options derived from the owning filter (or the term itself
/// for standalone iteration).
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct TermIterOptions {
    pub match_empty: bool,
    pub match_prefab: bool,
    pub match_disabled: bool,
    /// Yield each table at most once, leaving within-table multiplicity to
    /// the caller.
    pub one_per_table: bool,
}

/// Cursor over the tables matching one term.
pub struct TermIter<'w> {
    world: &'w World,
    term: Term,
    state: IterState,
    self_tables: SnapshotVec<TableRecord>,
    self_pos: usize,
    up_tables: SnapshotVec<TableRecord>,
    up_pos: usize,
    options: TermIterOptions,
    current: Option<TermMatch>,
    /// Matches left in the current table beyond the current one.
    remaining: usize,
}

impl<'w> TermIter<'w> {
    /// Creates a standalone term iterator from a descriptor.
    ///
    /// The term is finalized lazily, so a malformed descriptor fails here
    /// with the same errors filter construction reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor fails validation.
    pub fn new(world: &'w World, desc: &TermDesc) -> Result<Self> {
        let term = finalize_term(world, desc)?;
        let options = TermIterOptions {
            match_prefab: term.first.entity() == Some(Entity::PREFAB),
            match_disabled: term.first.entity() == Some(Entity::DISABLED),
            ..TermIterOptions::default()
        };
        Ok(Self::with_term(world, term, options))
    }

    /// Creates an iterator over an already-finalized term.
    pub(crate) fn with_term(world: &'w World, term: Term, options: TermIterOptions) -> Self {
        let self_tables = term
            .record
            .as_ref()
            .cloned()
            .or_else(|| world.component_record(term.id))
            .filter(|_| term.src.traversal.includes_self())
            .map_or_else(SnapshotVec::new, |r| r.tables());

        // Superset candidates: tables with a (relation, _) edge. The scan
        // is skipped entirely when no table in the world has such an edge.
        let up_tables = term
            .src
            .traversal
            .relation()
            .filter(|_| term.src.traversal.is_up())
            .and_then(|rel| world.component_record(Id::pair(rel, Entity::WILDCARD)))
            .map_or_else(SnapshotVec::new, |r| r.tables());

        let state = if self_tables.is_empty() && up_tables.is_empty() {
            IterState::Done
        } else if self_tables.is_empty() {
            IterState::UpScan
        } else {
            IterState::SelfScan
        };

        Self {
            world,
            term,
            state,
            self_tables,
            self_pos: 0,
            up_tables,
            up_pos: 0,
            options,
            current: None,
            remaining: 0,
        }
    }

    /// Creates an iterator over every table that has anything at all,
    /// seeded from the builtin Any record.
    pub(crate) fn scan_all(world: &'w World, options: TermIterOptions) -> Self {
        let term = Term {
            first: TermRef {
                kind: RefKind::Var(Variable::Any),
                traversal: Traversal::Self_,
            },
            second: TermRef::default(),
            src: TermRef {
                kind: RefKind::Var(Variable::This),
                traversal: Traversal::Self_,
            },
            id: Id::ANY,
            oper: TermOper::And,
            inout: InOut::None,
            field_index: 0,
            record: world.component_record(Id::ANY),
        };
        Self::with_term(world, term, options)
    }

    /// Returns the term driving this iterator.
    #[must_use]
    pub fn term(&self) -> &Term {
        &self.term
    }

    /// Advances to the next (table, column, source) triple.
    pub fn next(&mut self) -> Option<TermMatch> {
        // Replay further matches within the current table first.
        if self.remaining > 0 && !self.options.one_per_table {
            if let Some(current) = self.current {
                let table = self.world.table(current.table);
                if let Some(column) = type_search_from(table, current.column + 1, self.term.id) {
                    let next = TermMatch {
                        column,
                        id: table.ids().get(column).copied().unwrap_or(self.term.id),
                        ..current
                    };
                    self.current = Some(next);
                    self.remaining -= 1;
                    return Some(next);
                }
            }
            self.remaining = 0;
        }

        loop {
            match self.state {
                IterState::SelfScan => {
                    let Some(record) = self.self_tables.get(self.self_pos).copied() else {
                        self.state = if self.up_tables.is_empty() {
                            IterState::Done
                        } else {
                            trace!("term iterator falling back to superset scan");
                            IterState::UpScan
                        };
                        continue;
                    };
                    self.self_pos += 1;

                    let table = self.world.table(record.table);
                    if self.skip_table(table) {
                        continue;
                    }

                    let match_count = if self.term.id.is_any() {
                        1
                    } else {
                        record.count
                    };
                    // Wildcard patterns report the concrete id at the
                    // matched column; exact ids (and the root index, whose
                    // column is a placeholder) report the pattern itself.
                    let id = if self.term.id.is_wildcard() {
                        table.ids().get(record.column).copied().unwrap_or(self.term.id)
                    } else {
                        self.term.id
                    };
                    let hit = TermMatch {
                        table: record.table,
                        id,
                        column: record.column,
                        source: Entity::null(),
                        match_count,
                    };
                    self.current = Some(hit);
                    self.remaining = if self.options.one_per_table {
                        0
                    } else {
                        match_count.saturating_sub(1)
                    };
                    return Some(hit);
                }
                IterState::UpScan => {
                    let Some(record) = self.up_tables.get(self.up_pos).copied() else {
                        self.state = IterState::Done;
                        continue;
                    };
                    self.up_pos += 1;

                    let table = self.world.table(record.table);
                    if self.skip_table(table) {
                        continue;
                    }
                    // Tables carrying the id themselves were already
                    // yielded by the self scan.
                    if self.term.src.traversal.includes_self()
                        && type_search_from(table, 0, self.term.id).is_some()
                    {
                        continue;
                    }

                    let Some(relation) = self.term.src.traversal.relation() else {
                        self.state = IterState::Done;
                        continue;
                    };
                    let Some(found) =
                        search_relation(self.world, table, 0, self.term.id, relation, false, true)
                    else {
                        continue;
                    };

                    let source_table = self
                        .world
                        .entity_table(found.source)
                        .map(|t| self.world.table(t));
                    let id = source_table
                        .and_then(|t| t.ids().get(found.column).copied())
                        .unwrap_or(self.term.id);

                    // Supersets never have multiplicity: only the nearest
                    // ancestor counts.
                    let hit = TermMatch {
                        table: record.table,
                        id,
                        column: found.column,
                        source: found.source,
                        match_count: 1,
                    };
                    self.current = Some(hit);
                    self.remaining = 0;
                    return Some(hit);
                }
                IterState::Done => return None,
            }
        }
    }

    fn skip_table(&self, table: &sieve_storage::Table) -> bool {
        use sieve_storage::TableFlags;
        if !self.options.match_empty && table.is_empty() {
            return true;
        }
        if table.flags().contains(TableFlags::IS_PREFAB) && !self.options.match_prefab {
            return true;
        }
        if table.flags().contains(TableFlags::IS_DISABLED) && !self.options.match_disabled {
            return true;
        }
        false
    }
}
