//! Error types for filter validation and construction.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

/// The main error type for Sieve operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional rendered-expression context pointing at the offending term.
    pub context: Option<ExprContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds expression context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ExprContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an unresolved name error.
    #[must_use]
    pub fn unresolved_name(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnresolvedName(name.into()))
    }

    /// Creates a conflicting-reference error for a term slot.
    #[must_use]
    pub fn conflicting_ref(slot: &'static str) -> Self {
        Self::new(ErrorKind::ConflictingRef { slot })
    }

    /// Creates an uninitialized-reference error for a term slot.
    #[must_use]
    pub fn uninitialized_ref(slot: &'static str) -> Self {
        Self::new(ErrorKind::UninitializedRef { slot })
    }

    /// Creates an id-mismatch error for a term slot.
    #[must_use]
    pub fn id_mismatch(slot: &'static str) -> Self {
        Self::new(ErrorKind::IdMismatch { slot })
    }

    /// Creates an expected-wildcard error for a term slot.
    #[must_use]
    pub fn expected_wildcard(slot: &'static str) -> Self {
        Self::new(ErrorKind::ExpectedWildcard { slot })
    }

    /// Creates a self-reference error for an acyclic relationship.
    #[must_use]
    pub fn self_reference(relation: impl Into<String>) -> Self {
        Self::new(ErrorKind::SelfReference {
            relation: relation.into(),
        })
    }

    /// Creates a non-traversable relationship error.
    #[must_use]
    pub fn not_traversable(relation: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotTraversable {
            relation: relation.into(),
        })
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// A symbolic name did not resolve to any entity.
    #[error("unresolved identifier '{0}'")]
    UnresolvedName(String),

    /// A term slot carries both a resolved entity and a competing name.
    #[error("term.{slot} has competing name and id values")]
    ConflictingRef {
        /// The term slot (`src`, `first`, or `second`).
        slot: &'static str,
    },

    /// A required term slot was left unset.
    #[error("term.{slot} is not initialized")]
    UninitializedRef {
        /// The term slot that was unset.
        slot: &'static str,
    },

    /// The resolved term id disagrees with an independently specified slot.
    #[error("mismatch between term.id and term.{slot}")]
    IdMismatch {
        /// The slot that disagreed with the id.
        slot: &'static str,
    },

    /// A variable slot decomposed to a concrete, non-wildcard id element.
    #[error("expected wildcard id for variable term.{slot}")]
    ExpectedWildcard {
        /// The slot flagged as a variable.
        slot: &'static str,
    },

    /// A relationship pair is missing a required element.
    #[error("invalid zero element in pair id")]
    InvalidPair,

    /// The term has no component id after resolution.
    #[error("term has no component id")]
    MissingId,

    /// Source and target of an acyclic, non-reflexive relationship are the
    /// same variable or entity.
    #[error("term with acyclic relationship '{relation}' cannot have the same source and target")]
    SelfReference {
        /// The offending relationship.
        relation: String,
    },

    /// A traversal was requested over a relationship that does not allow it.
    #[error("cannot traverse non-traversable relationship '{relation}'")]
    NotTraversable {
        /// The offending relationship.
        relation: String,
    },

    /// A traversal modifier appeared on a slot that does not support it.
    #[error("invalid traversal modifier for term.{slot}")]
    InvalidTraversal {
        /// The slot carrying the modifier.
        slot: &'static str,
    },

    /// AndFrom/OrFrom/NotFrom combined with an explicit access annotation.
    #[error("invalid inout value for AndFrom/OrFrom/NotFrom term")]
    InvalidInOut,

    /// Terms of one OR chain name different sources.
    #[error("mismatching source for terms of the same OR chain")]
    MismatchedOrSource,

    /// A pair target fell outside the relationship's allowed target set.
    #[error("invalid target '{target}': must be a child of '{scope}'")]
    InvalidTarget {
        /// The rejected target.
        target: String,
        /// The enumeration scope the target must belong to.
        scope: String,
    },

    /// A name is already bound to a different entity.
    #[error("name '{0}' is already in use")]
    NameInUse(String),

    /// Entity was not found in storage.
    #[error("entity not found: {0}")]
    EntityNotFound(u32),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Rendered-expression context for a validation error.
///
/// Carries the filter rendered as an expression string plus the character
/// offset at which the offending term starts.
#[derive(Debug, Clone)]
pub struct ExprContext {
    /// The rendered filter expression.
    pub expr: String,
    /// Character offset of the offending term within `expr`.
    pub offset: usize,
}

impl ExprContext {
    /// Creates a new expression context.
    #[must_use]
    pub fn new(expr: impl Into<String>, offset: usize) -> Self {
        Self {
            expr: expr.into(),
            offset,
        }
    }
}

impl fmt::Display for ExprContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in expression `{}` at offset {}", self.expr, self.offset)
    }
}

/// The result type for Sieve operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
