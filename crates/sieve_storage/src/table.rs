//! Archetype tables.
//!
//! A table is a storage archetype: the set of entities sharing an identical
//! component/tag signature. The query engine consumes tables through their
//! ordered id arrays and row entity lists; it never mutates them.

use std::fmt;

use bitflags::bitflags;
use sieve_foundation::{Entity, Id};

/// Identifier of a table within a world.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct TableId(pub(crate) u32);

impl TableId {
    /// Returns the raw index of this table.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

bitflags! {
    /// Structural markers derived from a table's id array.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct TableFlags: u32 {
        /// The table holds prefab entities.
        const IS_PREFAB = 1 << 0;
        /// The table holds disabled entities.
        const IS_DISABLED = 1 << 1;
        /// The table has at least one `(IsA, _)` pair.
        const HAS_IS_A = 1 << 2;
        /// The table has at least one `(ChildOf, _)` pair.
        const HAS_CHILD_OF = 1 << 3;
        /// The table has at least one relationship pair.
        const HAS_PAIRS = 1 << 4;
    }
}

/// A storage archetype: an ordered id signature plus its row entities.
pub struct Table {
    id: TableId,
    /// Ids owned by the table, sorted and deduplicated.
    ids: Vec<Id>,
    /// Entities stored in the table, one per row.
    entities: Vec<Entity>,
    flags: TableFlags,
}

impl Table {
    pub(crate) fn new(id: TableId, ids: Vec<Id>) -> Self {
        let mut flags = TableFlags::empty();
        for &tid in &ids {
            if tid == Id::entity(Entity::PREFAB) {
                flags |= TableFlags::IS_PREFAB;
            }
            if tid == Id::entity(Entity::DISABLED) {
                flags |= TableFlags::IS_DISABLED;
            }
            if tid.is_pair() {
                flags |= TableFlags::HAS_PAIRS;
                if tid.first() == Entity::IS_A {
                    flags |= TableFlags::HAS_IS_A;
                }
                if tid.first() == Entity::CHILD_OF {
                    flags |= TableFlags::HAS_CHILD_OF;
                }
            }
        }
        Self {
            id,
            ids,
            entities: Vec::new(),
            flags,
        }
    }

    /// Returns this table's identifier.
    #[must_use]
    pub fn id(&self) -> TableId {
        self.id
    }

    /// Returns the ordered id signature of the table.
    #[must_use]
    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    /// Returns the table's structural flags.
    #[must_use]
    pub fn flags(&self) -> TableFlags {
        self.flags
    }

    /// Returns the entities stored in the table, in row order.
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the table currently stores no entities.
    ///
    /// Empty tables stay registered in the component index; whether they
    /// are visited is an iteration-time choice.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns true if the table's signature contains the exact id.
    #[must_use]
    pub fn has(&self, id: Id) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    /// Appends an entity row, returning its row index.
    pub(crate) fn push_entity(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Removes the given row, returning the entity that was moved into its
    /// place (if any).
    pub(crate) fn swap_remove_entity(&mut self, row: usize) -> Option<Entity> {
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("ids", &self.ids)
            .field("rows", &self.entities.len())
            .field("flags", &self.flags)
            .finish()
    }
}
