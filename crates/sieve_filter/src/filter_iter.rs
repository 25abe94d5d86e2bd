//! Filter iteration.
//!
//! Composes a term iterator over the pivot term with the table matcher to
//! produce fully-matched rows across a multi-term filter, replaying
//! cartesian permutations for wildcard terms that match a table more than
//! once.

use sieve_foundation::Entity;
use sieve_storage::{Table, TableId, World};

use crate::filter::{Filter, FilterFlags, Pivot};
use crate::matcher::{FieldData, TermHit, encode_column, match_filter, match_term};
use crate::term_iter::{TermIter, TermIterOptions};

/// An odometer over per-field match counts.
///
/// [`advance`](Self::advance) produces the next lexicographic combination:
/// the right-most lane with unconsumed matches ticks forward and every
/// lane to its right resets. The order is deterministic and documented.
#[derive(Clone, Debug, Default)]
pub struct MultiIndexCursor {
    lanes: Vec<(usize, usize)>,
}

impl MultiIndexCursor {
    /// Creates an empty cursor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the cursor to the first combination of the given lane sizes.
    pub fn reset(&mut self, maxes: &[usize]) {
        self.lanes.clear();
        self.lanes.extend(maxes.iter().map(|&max| (0, max.max(1))));
    }

    /// Returns the total number of combinations.
    #[must_use]
    pub fn total(&self) -> usize {
        self.lanes.iter().map(|&(_, max)| max).product()
    }

    /// Returns the current position of each lane.
    #[must_use]
    pub fn positions(&self) -> Vec<usize> {
        self.lanes.iter().map(|&(current, _)| current).collect()
    }

    /// Advances to the next combination, returning the index of the lane
    /// that ticked forward, or `None` when all combinations are consumed.
    pub fn advance(&mut self) -> Option<usize> {
        for lane in (0..self.lanes.len()).rev() {
            let (current, max) = self.lanes[lane];
            if current + 1 < max {
                self.lanes[lane] = (current + 1, max);
                for reset in &mut self.lanes[lane + 1..] {
                    reset.0 = 0;
                }
                return Some(lane);
            }
        }
        None
    }
}

/// External binding for the "this" variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThisBinding {
    /// Constrain iteration to a single entity.
    Entity(Entity),
    /// Constrain iteration to a single table.
    Table(TableId),
}

enum PivotSource<'w> {
    /// Drive candidates from the pivot term's table cache.
    Pivot {
        iter: TermIter<'w>,
        term_index: usize,
    },
    /// No pivot qualifies: scan every table in the world.
    ScanAll(TermIter<'w>),
    /// Tables supplied by an upstream iterator.
    Chain(Box<dyn Iterator<Item = TableId> + 'w>),
    /// Every term is a negation on an unbound variable: the filter is a
    /// condition that holds without naming entities.
    Condition,
    /// No term matches the "this" variable: evaluate fixed sources once.
    NoThis,
    /// A pivot term's id has no tables: nothing can ever match.
    Nothing,
}

struct Batch {
    table: Option<TableId>,
    offset: usize,
    count: usize,
    total: usize,
}

/// Streaming cursor over the tables (or rows) matching a filter.
///
/// Scratch state is released on drop; abandoning an iterator early cannot
/// leak.
pub struct FilterIter<'w> {
    world: &'w World,
    filter: &'w Filter,
    source: PivotSource<'w>,
    fields: FieldData,
    cursor: MultiIndexCursor,
    matches_left: usize,
    table: Option<TableId>,
    offset: usize,
    count: usize,
    row: Option<usize>,
    binding: Option<ThisBinding>,
    done: bool,
}

impl<'w> FilterIter<'w> {
    pub(crate) fn new(world: &'w World, filter: &'w Filter) -> Self {
        let options = Self::options(filter);
        let flags = filter.flags();

        let source = if !flags.contains(FilterFlags::MATCH_THIS) {
            PivotSource::NoThis
        } else {
            match filter.pivot_term(world) {
                Pivot::Unsatisfiable => PivotSource::Nothing,
                Pivot::Term(index) => {
                    let Some(term) = filter.term(index) else {
                        unreachable!("pivot index comes from the filter's own terms")
                    };
                    log::trace!("filter pivot: term {index}");
                    PivotSource::Pivot {
                        iter: TermIter::with_term(world, term.clone(), options),
                        term_index: index,
                    }
                }
                Pivot::ScanAll => {
                    if flags.contains(FilterFlags::MATCH_ANYTHING) {
                        PivotSource::Condition
                    } else {
                        log::trace!("filter has no pivot: scanning all tables");
                        PivotSource::ScanAll(TermIter::scan_all(world, options))
                    }
                }
            }
        };

        Self {
            world,
            filter,
            source,
            fields: FieldData::new(filter.field_count()),
            cursor: MultiIndexCursor::new(),
            matches_left: 0,
            table: None,
            offset: 0,
            count: 0,
            row: None,
            binding: None,
            done: false,
        }
    }

    pub(crate) fn chained(
        world: &'w World,
        filter: &'w Filter,
        tables: Box<dyn Iterator<Item = TableId> + 'w>,
    ) -> Self {
        let mut iter = Self::new(world, filter);
        iter.source = PivotSource::Chain(tables);
        iter
    }

    fn options(filter: &Filter) -> TermIterOptions {
        let flags = filter.flags();
        TermIterOptions {
            match_empty: flags.contains(FilterFlags::MATCH_EMPTY_TABLES),
            match_prefab: flags.contains(FilterFlags::MATCH_PREFAB),
            match_disabled: flags.contains(FilterFlags::MATCH_DISABLED),
            one_per_table: true,
        }
    }

    // --- Introspection ---

    /// The filter driven by this iterator.
    #[must_use]
    pub fn filter(&self) -> &Filter {
        self.filter
    }

    /// Current table, if the current result names one.
    #[must_use]
    pub fn table_id(&self) -> Option<TableId> {
        self.table
    }

    /// Current table reference.
    #[must_use]
    pub fn table(&self) -> Option<&'w Table> {
        self.table.map(|t| self.world.table(t))
    }

    /// Row offset of the current batch within its table.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of rows in the current batch.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Entities of the current batch.
    #[must_use]
    pub fn entities(&self) -> &'w [Entity] {
        match self.table() {
            Some(table) => &table.entities()[self.offset..self.offset + self.count],
            None => &[],
        }
    }

    /// Entity of the current row, in row-wise iteration.
    #[must_use]
    pub fn entity(&self) -> Option<Entity> {
        let row = self.row?;
        self.entities().get(row).copied()
    }

    /// Number of output fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.ids.len()
    }

    /// Resolved id of a field.
    #[must_use]
    pub fn field_id(&self, field: usize) -> sieve_foundation::Id {
        self.fields.ids[field]
    }

    /// Encoded column of a field: 1-based, negated for ids found on
    /// another entity, zero when unmatched but tolerated.
    #[must_use]
    pub fn field_column(&self, field: usize) -> i32 {
        self.fields.columns[field]
    }

    /// Source entity of a field; null when matched on the table itself.
    #[must_use]
    pub fn field_source(&self, field: usize) -> Entity {
        self.fields.sources[field]
    }

    /// Whether a field actually matched. False for negations and absent
    /// optional terms.
    #[must_use]
    pub fn field_is_set(&self, field: usize) -> bool {
        self.fields.set[field]
    }

    // --- Binding ---

    /// Pins the "this" variable to one entity before iteration; the
    /// iterator verifies that entity's table instead of scanning.
    pub fn set_this_entity(&mut self, entity: Entity) {
        self.binding = Some(ThisBinding::Entity(entity));
    }

    /// Pins the "this" variable to one table before iteration.
    pub fn set_this_table(&mut self, table: TableId) {
        self.binding = Some(ThisBinding::Table(table));
    }

    // --- Iteration ---

    /// Advances to the next result row.
    ///
    /// On filters constructed as instanced this behaves exactly like
    /// [`next_instanced`](Self::next_instanced); otherwise each table
    /// batch is expanded one entity at a time.
    pub fn next(&mut self) -> bool {
        if self.filter.flags().contains(FilterFlags::INSTANCED) {
            return self.next_instanced();
        }
        loop {
            if let Some(row) = self.row {
                if row + 1 < self.count {
                    self.row = Some(row + 1);
                    return true;
                }
                self.row = None;
            }
            if !self.next_instanced() {
                return false;
            }
            if self.table.is_none() {
                // A condition result has no rows to expand.
                return true;
            }
            if self.count == 0 {
                continue;
            }
            self.row = Some(0);
            return true;
        }
    }

    /// Advances to the next whole-table batch.
    ///
    /// Returns false when the iterator is exhausted. Tables are yielded in
    /// the component index's registration order; permutations within one
    /// table follow the odometer order of [`MultiIndexCursor`].
    pub fn next_instanced(&mut self) -> bool {
        if self.matches_left > 0 {
            if self.replay() {
                self.matches_left -= 1;
                return true;
            }
            self.matches_left = 0;
        }

        if self.done {
            return false;
        }

        if self.binding.is_some() {
            return self.next_bound();
        }

        let world = self.world;
        let filter = self.filter;

        let batch = match &mut self.source {
            PivotSource::Nothing => None,
            PivotSource::Condition | PivotSource::NoThis => {
                self.done = true;
                if match_filter(world, filter, None, &mut self.fields, None, None) {
                    Some(Batch {
                        table: None,
                        offset: 0,
                        count: 0,
                        total: 1,
                    })
                } else {
                    None
                }
            }
            PivotSource::Pivot { iter, term_index } => {
                let mut found = None;
                while let Some(tm) = iter.next() {
                    let Some(pivot) = filter.term(*term_index) else {
                        break;
                    };
                    let table = world.table(tm.table);
                    let hit = TermHit {
                        id: tm.id,
                        column: encode_column(tm.column, !tm.source.is_null()),
                        source: tm.source,
                        count: tm.match_count.max(1),
                        set: true,
                    };
                    self.fields.store(pivot.field_index, *term_index, &hit);

                    let mut total = tm.match_count.max(1);
                    if match_filter(
                        world,
                        filter,
                        Some(table),
                        &mut self.fields,
                        Some(&mut total),
                        Some(*term_index),
                    ) {
                        found = Some(Batch {
                            table: Some(tm.table),
                            offset: 0,
                            count: table.entity_count(),
                            total,
                        });
                        break;
                    }
                }
                found
            }
            PivotSource::ScanAll(iter) => {
                let mut found = None;
                while let Some(tm) = iter.next() {
                    let table = world.table(tm.table);
                    let mut total = 1;
                    if match_filter(
                        world,
                        filter,
                        Some(table),
                        &mut self.fields,
                        Some(&mut total),
                        None,
                    ) {
                        found = Some(Batch {
                            table: Some(tm.table),
                            offset: 0,
                            count: table.entity_count(),
                            total,
                        });
                        break;
                    }
                }
                found
            }
            PivotSource::Chain(tables) => {
                let mut found = None;
                for table_id in tables.by_ref() {
                    let table = world.table(table_id);
                    let mut total = 1;
                    if match_filter(
                        world,
                        filter,
                        Some(table),
                        &mut self.fields,
                        Some(&mut total),
                        None,
                    ) {
                        found = Some(Batch {
                            table: Some(table_id),
                            offset: 0,
                            count: table.entity_count(),
                            total,
                        });
                        break;
                    }
                }
                found
            }
        };

        match batch {
            Some(batch) => {
                self.start_batch(&batch);
                true
            }
            None => {
                self.table = None;
                self.count = 0;
                false
            }
        }
    }

    fn next_bound(&mut self) -> bool {
        self.done = true;
        if matches!(self.source, PivotSource::Nothing) {
            return false;
        }
        let Some(binding) = self.binding else {
            return false;
        };

        let (table_id, offset, count) = match binding {
            ThisBinding::Entity(e) => {
                let Some(table) = self.world.entity_table(e) else {
                    return false;
                };
                (table, self.world.entity_row(e).unwrap_or(0), 1)
            }
            ThisBinding::Table(t) => (t, 0, self.world.table(t).entity_count()),
        };

        let table = self.world.table(table_id);
        let mut total = 1;
        if !match_filter(
            self.world,
            self.filter,
            Some(table),
            &mut self.fields,
            Some(&mut total),
            None,
        ) {
            return false;
        }

        self.start_batch(&Batch {
            table: Some(table_id),
            offset,
            count,
            total,
        });
        true
    }

    fn start_batch(&mut self, batch: &Batch) {
        self.table = batch.table;
        self.offset = batch.offset;
        self.count = batch.count;
        self.cursor.reset(&self.fields.counts);
        self.matches_left = batch.total.saturating_sub(1);
        self.row = None;
    }

    /// Produces the next permutation of the current table: the right-most
    /// field with unconsumed matches advances to its next column and every
    /// field to its right resets to its first match.
    fn replay(&mut self) -> bool {
        let Some(table_id) = self.table else {
            return false;
        };
        let Some(lane) = self.cursor.advance() else {
            return false;
        };
        let table = self.world.table(table_id);
        if !self.advance_field(lane, table, true) {
            return false;
        }
        for field in lane + 1..self.fields.counts.len() {
            if self.fields.counts[field] > 1 && !self.advance_field(field, table, false) {
                return false;
            }
        }
        true
    }

    fn advance_field(&mut self, field: usize, table: &Table, from_current: bool) -> bool {
        let term_index = self.fields.term_of_field[field];
        let Some(term) = self.filter.term(term_index) else {
            return false;
        };
        let offset = if from_current {
            self.fields.columns[field].unsigned_abs() as usize
        } else {
            0
        };
        let Some(hit) = match_term(self.world, term, Some(table), offset, false) else {
            return false;
        };
        let count = self.fields.counts[field];
        self.fields.store(field, term_index, &TermHit { count, ..hit });
        true
    }

    /// Wraps the iterator in a pagination view that skips `offset` rows
    /// and yields at most `limit` rows.
    #[must_use]
    pub fn paged(self, offset: usize, limit: Option<usize>) -> PageIter<'w> {
        PageIter {
            iter: self,
            skip: offset,
            limit,
            offset: 0,
            count: 0,
        }
    }
}

/// Pagination over instanced iteration: trims batches at both ends until
/// `limit` rows have been produced.
pub struct PageIter<'w> {
    iter: FilterIter<'w>,
    skip: usize,
    limit: Option<usize>,
    offset: usize,
    count: usize,
}

impl<'w> PageIter<'w> {
    /// Advances to the next trimmed batch.
    pub fn next_instanced(&mut self) -> bool {
        if self.limit == Some(0) {
            return false;
        }
        loop {
            if !self.iter.next_instanced() {
                return false;
            }
            let rows = self.iter.count();
            if rows == 0 {
                continue;
            }
            if self.skip >= rows {
                self.skip -= rows;
                continue;
            }
            let start = self.iter.offset() + self.skip;
            let mut take = rows - self.skip;
            self.skip = 0;
            if let Some(limit) = self.limit.as_mut() {
                take = take.min(*limit);
                *limit -= take;
            }
            self.offset = start;
            self.count = take;
            return true;
        }
    }

    /// Row offset of the trimmed batch within its table.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of rows in the trimmed batch.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Entities of the trimmed batch.
    #[must_use]
    pub fn entities(&self) -> &'w [Entity] {
        match self.iter.table() {
            Some(table) => &table.entities()[self.offset..self.offset + self.count],
            None => &[],
        }
    }

    /// The underlying filter iterator, for field access.
    #[must_use]
    pub fn inner(&self) -> &FilterIter<'w> {
        &self.iter
    }
}
