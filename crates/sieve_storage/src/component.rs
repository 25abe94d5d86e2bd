//! Component registration and the component index.
//!
//! Every id (or wildcard id pattern) that appears in a table signature gets
//! a [`ComponentRecord`]: trait flags plus an insertion-ordered cache of
//! the tables carrying the id. Records are shared as `Arc` handles; a term
//! that caches a record keeps it alive for as long as the filter lives,
//! regardless of what the storage layer does afterwards.

use std::sync::{Arc, PoisonError, RwLock};

use bitflags::bitflags;
use sieve_foundation::{Id, SnapshotVec};

use crate::table::TableId;

bitflags! {
    /// Trait flags attached to a registered component, tag, or relationship.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub struct IdFlags: u32 {
        /// Presence-only id; carries no data.
        const TAG = 1 << 0;
        /// The id cannot be specialized; forbids down-traversal over it.
        const FINAL = 1 << 1;
        /// Instances do not inherit this id from their bases.
        const DONT_INHERIT = 1 << 2;
        /// `(R, a)` and `(a, b)` imply `(R, b)`.
        const TRANSITIVE = 1 << 3;
        /// `(R, a)` holds for source `a` itself.
        const REFLEXIVE = 1 << 4;
        /// The relationship graph contains no cycles.
        const ACYCLIC = 1 << 5;
        /// The relationship may be walked by up/down traversal.
        const TRAVERSABLE = 1 << 6;
        /// Pair targets must be children of the relationship entity.
        const ONE_OF = 1 << 7;
    }
}

/// One table registered under a component record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TableRecord {
    /// The registered table.
    pub table: TableId,
    /// Index of the first matching column in the table's id array.
    pub column: usize,
    /// Number of matching columns (more than 1 only for wildcard patterns).
    pub count: usize,
}

/// Index entry for one id or id pattern: trait flags plus the cache of
/// tables carrying the id.
///
/// The cache is behind a lock only for registration; readers take O(1)
/// snapshots and never hold the lock while iterating.
pub struct ComponentRecord {
    id: Id,
    flags: IdFlags,
    cache: RwLock<SnapshotVec<TableRecord>>,
}

impl ComponentRecord {
    pub(crate) fn new(id: Id, flags: IdFlags) -> Self {
        Self {
            id,
            flags,
            cache: RwLock::new(SnapshotVec::new()),
        }
    }

    /// Returns the id this record indexes.
    #[must_use]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the trait flags of the id.
    #[must_use]
    pub fn flags(&self) -> IdFlags {
        self.flags
    }

    /// Returns the number of tables registered under this id, empty tables
    /// included.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns an O(1) snapshot of the table cache, in registration order.
    #[must_use]
    pub fn tables(&self) -> SnapshotVec<TableRecord> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Returns the record for a specific table, if registered.
    #[must_use]
    pub fn find(&self, table: TableId) -> Option<TableRecord> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.table == table)
            .copied()
    }

    /// Registers a table column under this record.
    ///
    /// Registering the same table again folds into the existing entry: the
    /// first column wins, the match count grows. That is how wildcard
    /// pattern records accumulate multiplicity.
    pub(crate) fn register(&self, table: TableId, column: usize) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        for i in 0..cache.len() {
            let Some(existing) = cache.get(i).copied() else {
                break;
            };
            if existing.table == table {
                cache.set(
                    i,
                    TableRecord {
                        count: existing.count + 1,
                        ..existing
                    },
                );
                return;
            }
        }
        cache.push(TableRecord {
            table,
            column,
            count: 1,
        });
    }
}

impl std::fmt::Debug for ComponentRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRecord")
            .field("id", &self.id)
            .field("flags", &self.flags)
            .field("tables", &self.table_count())
            .finish()
    }
}

/// Shared handle to a component record.
pub type RecordRef = Arc<ComponentRecord>;

/// Descriptor for registering a named component, tag, or relationship.
///
/// Data components are inheritable by default; tags and relationships opt
/// into the traits they carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentDesc {
    /// Registered name.
    pub name: String,
    /// Trait flags.
    pub flags: IdFlags,
}

impl ComponentDesc {
    /// Creates a descriptor for a data-bearing component.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: IdFlags::empty(),
        }
    }

    /// Creates a descriptor for a presence-only tag.
    #[must_use]
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: IdFlags::TAG,
        }
    }

    /// Marks the id as final: no id may specialize it.
    #[must_use]
    pub fn final_(mut self) -> Self {
        self.flags |= IdFlags::FINAL;
        self
    }

    /// Marks the id as not inherited by instances.
    #[must_use]
    pub fn dont_inherit(mut self) -> Self {
        self.flags |= IdFlags::DONT_INHERIT;
        self
    }

    /// Marks the relationship as transitive.
    #[must_use]
    pub fn transitive(mut self) -> Self {
        self.flags |= IdFlags::TRANSITIVE;
        self
    }

    /// Marks the relationship as reflexive.
    #[must_use]
    pub fn reflexive(mut self) -> Self {
        self.flags |= IdFlags::REFLEXIVE;
        self
    }

    /// Marks the relationship graph as acyclic.
    #[must_use]
    pub fn acyclic(mut self) -> Self {
        self.flags |= IdFlags::ACYCLIC;
        self
    }

    /// Allows up/down traversal over the relationship. Implies acyclic.
    #[must_use]
    pub fn traversable(mut self) -> Self {
        self.flags |= IdFlags::TRAVERSABLE | IdFlags::ACYCLIC;
        self
    }

    /// Restricts pair targets to children of the relationship entity.
    #[must_use]
    pub fn one_of(mut self) -> Self {
        self.flags |= IdFlags::ONE_OF;
        self
    }
}
