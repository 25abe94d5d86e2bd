//! Entity identifiers and reserved builtin entities.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Entity identifier.
///
/// An entity is a plain index into the world's entity storage. Index 0 is
/// the null sentinel ("explicitly no entity"); a small range of low indices
/// is reserved for builtin entities that the query engine gives special
/// meaning to.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entity(u32);

impl Entity {
    // =========================================================================
    // Reserved Entities
    // =========================================================================
    // These are always alive, with fixed indices and fixed names registered
    // by the world at startup.

    /// Matches every possible concrete identifier (`*`).
    pub const WILDCARD: Entity = Entity(1);

    /// Matches at most one representative concrete identifier (`_`).
    pub const ANY: Entity = Entity(2);

    /// The builtin "this" variable: the entity currently being matched.
    pub const THIS: Entity = Entity(3);

    /// The builtin parent-child relationship.
    pub const CHILD_OF: Entity = Entity(4);

    /// The builtin inheritance relationship.
    pub const IS_A: Entity = Entity(5);

    /// Tag marking prefab entities, excluded from matching by default.
    pub const PREFAB: Entity = Entity(6);

    /// Tag marking disabled entities, excluded from matching by default.
    pub const DISABLED: Entity = Entity(7);

    /// First index handed out to user entities.
    pub const FIRST_USER_INDEX: u32 = 8;

    /// Creates an entity ID with the given index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the sentinel value representing "no entity".
    #[must_use]
    pub const fn null() -> Self {
        Self(0)
    }

    /// Returns true if this is the null sentinel value.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the raw index of this entity.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Returns true if this is one of the wildcard entities (`*` or `_`).
    #[must_use]
    pub const fn is_wildcard(self) -> bool {
        self.0 == Self::WILDCARD.0 || self.0 == Self::ANY.0
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "#null")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}
