//! Component and pair identifiers.
//!
//! An [`Id`] names one thing a table can contain: a plain component or tag
//! (an entity), or a relationship pair packing two entities. High role bits
//! carry the pair marker and the AND-group marker used by type expansion.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// Role bit marking relationship pair identifiers.
const PAIR_BIT: u64 = 1 << 63;

/// Role bit marking AND-group identifiers inside type arrays.
const AND_BIT: u64 = 1 << 62;

const ROLE_MASK: u64 = PAIR_BIT | AND_BIT;

/// Maximum entity index storable in the first slot of a pair.
const PAIR_FIRST_MAX: u32 = (1 << 30) - 1;

/// Identifier for a component, tag, or relationship pair.
///
/// # Layout
/// - plain id: entity index in the low 32 bits
/// - pair: [`PAIR`](Id::is_pair) role bit, first entity in bits 32..62,
///   second entity in the low 32 bits
/// - AND group: role bit plus the type entity index in the low 32 bits
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Id(u64);

impl Id {
    /// The unset identifier.
    pub const NULL: Id = Id(0);

    /// The `*` pattern: matches every identifier.
    pub const WILDCARD: Id = Id(Entity::WILDCARD.index() as u64);

    /// The `_` pattern: matches at most one representative identifier.
    pub const ANY: Id = Id(Entity::ANY.index() as u64);

    /// Creates a plain component/tag identifier from an entity.
    #[must_use]
    pub const fn entity(e: Entity) -> Self {
        Self(e.index() as u64)
    }

    /// Creates a relationship pair identifier.
    ///
    /// # Panics
    ///
    /// Panics if the first entity's index does not fit in the pair encoding.
    #[must_use]
    pub const fn pair(first: Entity, second: Entity) -> Self {
        assert!(first.index() <= PAIR_FIRST_MAX, "pair first out of range");
        Self(PAIR_BIT | ((first.index() as u64) << 32) | second.index() as u64)
    }

    /// Creates an AND-group identifier for the given type entity.
    ///
    /// When this id appears in a type array, matching expands to requiring
    /// every id in the entity's own type.
    #[must_use]
    pub const fn and_group(e: Entity) -> Self {
        Self(AND_BIT | e.index() as u64)
    }

    /// Returns true if this identifier is unset.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this is a relationship pair.
    #[must_use]
    pub const fn is_pair(self) -> bool {
        self.0 & PAIR_BIT != 0
    }

    /// Returns true if this is an AND-group identifier.
    #[must_use]
    pub const fn is_and_group(self) -> bool {
        self.0 & AND_BIT != 0 && self.0 & PAIR_BIT == 0
    }

    /// Returns the first element: the pair relation, or the entity itself
    /// for plain identifiers.
    #[must_use]
    pub const fn first(self) -> Entity {
        if self.is_pair() {
            Entity::new(((self.0 >> 32) & PAIR_FIRST_MAX as u64) as u32)
        } else {
            Entity::new((self.0 & u32::MAX as u64) as u32)
        }
    }

    /// Returns the second element of a pair, or the null entity for plain
    /// identifiers.
    #[must_use]
    pub const fn second(self) -> Entity {
        if self.is_pair() {
            Entity::new((self.0 & u32::MAX as u64) as u32)
        } else {
            Entity::null()
        }
    }

    /// Returns the entity for a plain (non-pair, non-group) identifier.
    #[must_use]
    pub const fn as_entity(self) -> Option<Entity> {
        if self.0 & ROLE_MASK == 0 {
            Some(Entity::new(self.0 as u32))
        } else {
            None
        }
    }

    /// Returns true if any element of this identifier is a wildcard.
    #[must_use]
    pub const fn is_wildcard(self) -> bool {
        if self.is_pair() {
            self.first().is_wildcard() || self.second().is_wildcard()
        } else {
            self.first().is_wildcard()
        }
    }

    /// Returns true if any element is the single-match `_` wildcard.
    #[must_use]
    pub const fn is_any(self) -> bool {
        if self.is_pair() {
            self.first().index() == Entity::ANY.index()
                || self.second().index() == Entity::ANY.index()
        } else {
            self.first().index() == Entity::ANY.index()
        }
    }

    /// Returns true if `id` matches this identifier used as a pattern.
    ///
    /// Wildcard elements in the pattern match any concrete element. A plain
    /// `*` or `_` pattern matches every identifier, pairs included.
    #[must_use]
    pub fn matches(self, id: Id) -> bool {
        if !self.is_pair() {
            if self.first().is_wildcard() {
                return !id.is_null();
            }
            return self == id;
        }
        if !id.is_pair() {
            return false;
        }
        let first_ok = self.first().is_wildcard() || self.first() == id.first();
        let second_ok = self.second().is_wildcard() || self.second() == id.second();
        first_ok && second_ok
    }

    /// Returns the raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }
}

impl From<Entity> for Id {
    fn from(e: Entity) -> Self {
        Id::entity(e)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pair() {
            write!(f, "Id({}, {})", self.first().index(), self.second().index())
        } else if self.is_and_group() {
            write!(f, "Id(and {})", self.first().index())
        } else {
            write!(f, "Id({})", self.first().index())
        }
    }
}
