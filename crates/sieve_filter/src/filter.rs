//! The filter: an uncached, stateless multi-term query.
//!
//! A filter owns its finalized term list and aggregate flags. Construction
//! validates a descriptor in one pass; a failed construction returns an
//! error and leaves nothing behind.

use bitflags::bitflags;
use log::debug;
use sieve_foundation::{Entity, Result, SpillVec};
use sieve_storage::{TableId, World};

use crate::display;
use crate::filter_iter::FilterIter;
use crate::term::{Term, TermDesc, TermOper};
use crate::validator;

bitflags! {
    /// Aggregate flags computed during filter finalization.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct FilterFlags: u32 {
        /// At least one term matches the "this" variable.
        const MATCH_THIS = 1 << 0;
        /// Every term matches the "this" variable.
        const MATCH_ONLY_THIS = 1 << 1;
        /// Every term is a negation on the "this" variable; the filter
        /// holds without naming entities.
        const MATCH_ANYTHING = 1 << 2;
        /// Prefab entities are included in results.
        const MATCH_PREFAB = 1 << 3;
        /// Disabled entities are included in results.
        const MATCH_DISABLED = 1 << 4;
        /// No term fetches component data.
        const NO_DATA = 1 << 5;
        /// Tables with zero entities are still visited.
        const MATCH_EMPTY_TABLES = 1 << 6;
        /// Iteration yields whole-table batches instead of rows.
        const INSTANCED = 1 << 7;
    }
}

/// Result of pivot term selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Pivot {
    /// Index of the term with the fewest candidate tables.
    Term(usize),
    /// No term qualifies; candidates must come from a full table scan.
    ScanAll,
    /// Some required term's id has no tables at all; iteration yields
    /// nothing.
    Unsatisfiable,
}

/// Descriptor for constructing a [`Filter`].
#[derive(Clone, Debug, Default)]
pub struct FilterDesc {
    /// The term list, in evaluation order.
    pub terms: Vec<TermDesc>,
    /// Entity this filter is associated with, if any.
    pub entity: Option<Entity>,
    /// Visit tables with zero entities.
    pub match_empty_tables: bool,
    /// Yield whole-table batches from `next`.
    pub instanced: bool,
    /// Treat the filter as a boolean condition; no term fetches data.
    pub no_data: bool,
}

impl FilterDesc {
    /// Creates an empty descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a term.
    #[must_use]
    pub fn with_term(mut self, term: TermDesc) -> Self {
        self.terms.push(term);
        self
    }

    /// Associates the filter with an entity.
    #[must_use]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Visit tables with zero entities.
    #[must_use]
    pub fn match_empty_tables(mut self) -> Self {
        self.match_empty_tables = true;
        self
    }

    /// Yield whole-table batches from `next`.
    #[must_use]
    pub fn instanced(mut self) -> Self {
        self.instanced = true;
        self
    }

    /// Treat the filter as a pure boolean condition.
    #[must_use]
    pub fn no_data(mut self) -> Self {
        self.no_data = true;
        self
    }
}

/// An uncached, stateless multi-term query.
#[derive(Debug)]
pub struct Filter {
    terms: SpillVec<Term>,
    field_count: usize,
    flags: FilterFlags,
    entity: Option<Entity>,
}

impl Filter {
    /// Validates a descriptor and constructs a filter.
    ///
    /// # Errors
    ///
    /// Returns the first validation error, carrying the rendered
    /// expression and the character offset of the offending term. No
    /// partially-constructed filter or entity association is left behind.
    pub fn new(world: &World, desc: FilterDesc) -> Result<Self> {
        let (terms, field_count, mut flags) = validator::finalize_filter(world, &desc.terms)?;

        if desc.match_empty_tables {
            flags |= FilterFlags::MATCH_EMPTY_TABLES;
        }
        if desc.instanced {
            flags |= FilterFlags::INSTANCED;
        }
        if desc.no_data {
            flags |= FilterFlags::NO_DATA;
        }

        let filter = Self {
            terms,
            field_count,
            flags,
            entity: desc.entity,
        };
        debug!(
            "constructed filter `{}` ({} terms, {} fields)",
            display::filter_expr(world, &filter),
            filter.term_count(),
            filter.field_count()
        );
        Ok(filter)
    }

    /// Returns the terms, in evaluation order.
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.iter()
    }

    /// Returns one term by index.
    #[must_use]
    pub fn term(&self, index: usize) -> Option<&Term> {
        self.terms.get(index)
    }

    /// Number of terms.
    #[must_use]
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Number of output fields. OR chains collapse to one field, so this
    /// is at most the term count.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Aggregate flags.
    #[must_use]
    pub fn flags(&self) -> FilterFlags {
        self.flags
    }

    /// The entity this filter is associated with, if any.
    #[must_use]
    pub fn entity(&self) -> Option<Entity> {
        self.entity
    }

    /// Chooses the pivot term: among terms with the And operator and the
    /// "this" source, the one whose id has the fewest candidate tables.
    /// Ties prefer a term matched on the table itself over one that needs
    /// up traversal.
    #[must_use]
    pub fn pivot_term(&self, world: &World) -> Pivot {
        let mut best: Option<(usize, usize, bool)> = None;

        for (index, term) in self.terms().enumerate() {
            if term.oper != TermOper::And || !term.matches_this() {
                continue;
            }
            let record = term
                .record()
                .cloned()
                .or_else(|| world.component_record(term.id));
            let table_count = record.map_or(0, |r| r.table_count());
            if table_count == 0 {
                return Pivot::Unsatisfiable;
            }

            let self_only = !term.src.traversal.is_up();
            let better = match best {
                None => true,
                Some((_, best_count, best_self)) => {
                    table_count < best_count
                        || (table_count == best_count && self_only && !best_self)
                }
            };
            if better {
                best = Some((index, table_count, self_only));
            }
        }

        match best {
            Some((index, _, _)) => Pivot::Term(index),
            None => Pivot::ScanAll,
        }
    }

    /// Creates an iterator over the tables and rows matching this filter.
    #[must_use]
    pub fn iter<'w>(&'w self, world: &'w World) -> FilterIter<'w> {
        FilterIter::new(world, self)
    }

    /// Creates an iterator driven by an upstream table sequence instead of
    /// the pivot term; each upstream table is evaluated wholesale.
    pub fn chain_iter<'w, I>(&'w self, world: &'w World, tables: I) -> FilterIter<'w>
    where
        I: IntoIterator<Item = TableId>,
        I::IntoIter: 'w,
    {
        FilterIter::chained(world, self, Box::new(tables.into_iter()))
    }

    /// Renders the filter as an expression string.
    #[must_use]
    pub fn expr_string(&self, world: &World) -> String {
        display::filter_expr(world, self)
    }
}
