//! Terms: the atomic unit of a query.
//!
//! A term names a component, tag, or relationship pair to match, where to
//! match it (its source), and how to traverse relationships while doing
//! so. Callers describe terms with [`TermDesc`]; the validator turns a
//! descriptor into a fully resolved [`Term`].

use sieve_foundation::{Entity, Id};
use sieve_storage::RecordRef;

/// A query variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Variable {
    /// The builtin "this" variable: the entity currently being matched.
    This,
    /// The `*` variable: matches every concrete id.
    Wildcard,
    /// The `_` variable: matches at most one representative id.
    Any,
    /// A user-named variable.
    Named(String),
}

/// What one identifier slot of a term resolves to.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum RefKind {
    /// Nothing; the slot is not used by the term.
    #[default]
    Unset,
    /// A concrete entity. The null entity means "explicitly no entity".
    Entity(Entity),
    /// A variable.
    Var(Variable),
}

/// How a slot traverses relationships during matching.
///
/// Every variant that walks a relationship carries the relationship
/// entity, so a traversal without a relation is unrepresentable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Traversal {
    /// Match on the slot's own entity only.
    #[default]
    Self_,
    /// Match on entities reachable by walking the relation upward.
    Up(Entity),
    /// Match on the entity itself, then walk the relation upward.
    SelfUp(Entity),
    /// Match on entities reachable by walking the relation downward.
    Down(Entity),
    /// Match on the entity itself, then walk the relation downward.
    SelfDown(Entity),
    /// Up traversal ordered by hierarchy depth.
    Cascade(Entity),
    /// Transitive closure: the entity itself plus repeated up traversal.
    Transitive(Entity),
}

impl Traversal {
    /// Returns true if the slot's own entity participates in matching.
    #[must_use]
    pub fn includes_self(self) -> bool {
        matches!(
            self,
            Self::Self_ | Self::SelfUp(_) | Self::SelfDown(_) | Self::Transitive(_)
        )
    }

    /// Returns true if matching walks the relationship upward.
    #[must_use]
    pub fn is_up(self) -> bool {
        matches!(
            self,
            Self::Up(_) | Self::SelfUp(_) | Self::Cascade(_) | Self::Transitive(_)
        )
    }

    /// Returns true if matching walks the relationship downward.
    #[must_use]
    pub fn is_down(self) -> bool {
        matches!(self, Self::Down(_) | Self::SelfDown(_))
    }

    /// Returns the traversed relationship, if any.
    #[must_use]
    pub fn relation(self) -> Option<Entity> {
        match self {
            Self::Self_ => None,
            Self::Up(r)
            | Self::SelfUp(r)
            | Self::Down(r)
            | Self::SelfDown(r)
            | Self::Cascade(r)
            | Self::Transitive(r) => Some(r),
        }
    }
}

/// A fully resolved identifier slot.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TermRef {
    /// What the slot resolves to.
    pub kind: RefKind,
    /// How the slot traverses relationships.
    pub traversal: Traversal,
}

impl TermRef {
    /// Returns true if the slot is used by the term.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !matches!(self.kind, RefKind::Unset)
    }

    /// Returns the concrete entity, if the slot resolved to one.
    #[must_use]
    pub fn entity(&self) -> Option<Entity> {
        match self.kind {
            RefKind::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if the slot is the builtin "this" variable.
    #[must_use]
    pub fn is_this(&self) -> bool {
        matches!(self.kind, RefKind::Var(Variable::This))
    }

    /// Returns true if the slot is any variable.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        matches!(self.kind, RefKind::Var(_))
    }

    /// Returns the user-chosen variable name, if the slot is one.
    #[must_use]
    pub fn var_name(&self) -> Option<&str> {
        match &self.kind {
            RefKind::Var(Variable::Named(name)) => Some(name),
            _ => None,
        }
    }
}

/// Term operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum TermOper {
    /// The term must match.
    #[default]
    And,
    /// At least one term of the chain must match.
    Or,
    /// The term must not match.
    Not,
    /// The term may match.
    Optional,
    /// Every id in the target entity's type must match.
    AndFrom,
    /// At least one id in the target entity's type must match.
    OrFrom,
    /// No id in the target entity's type may match.
    NotFrom,
}

/// Read/write intent annotation. Used for data-access planning, never for
/// matching.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum InOut {
    /// Derived from the term: read-write for this-terms, read otherwise.
    #[default]
    Default,
    /// Read only.
    In,
    /// Write only.
    Out,
    /// Read and write.
    InOut,
    /// The term fetches no data.
    None,
    /// The term fetches no data but still participates in change tracking.
    Filter,
}

/// One atomic condition of a filter, fully resolved.
#[derive(Clone, Debug)]
pub struct Term {
    /// The matched component or relationship.
    pub first: TermRef,
    /// The pair target, when the term matches a relationship pair.
    pub second: TermRef,
    /// Where the term is matched.
    pub src: TermRef,
    /// Resolved component or pair id.
    pub id: Id,
    /// Operator.
    pub oper: TermOper,
    /// Access annotation.
    pub inout: InOut,
    /// Output field this term writes to. OR-chained terms share a field.
    pub field_index: usize,
    /// Cached component record for `id`; keeps the record alive while the
    /// term exists.
    pub(crate) record: Option<RecordRef>,
}

impl Term {
    /// Returns true if the term matches the builtin "this" variable or an
    /// unconstrained variable source.
    #[must_use]
    pub fn matches_this(&self) -> bool {
        self.src.is_this()
    }

    /// Returns true if the term explicitly matches no entity at all.
    #[must_use]
    pub fn matches_none(&self) -> bool {
        self.src.entity().is_some_and(Entity::is_null)
    }

    /// Returns the cached component record, if the id is registered.
    #[must_use]
    pub fn record(&self) -> Option<&RecordRef> {
        self.record.as_ref()
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        // The cached record is derived state and excluded from equality.
        self.first == other.first
            && self.second == other.second
            && self.src == other.src
            && self.id == other.id
            && self.oper == other.oper
            && self.inout == other.inout
            && self.field_index == other.field_index
    }
}

impl Eq for Term {}

// =============================================================================
// Descriptors
// =============================================================================

/// Traversal request on a descriptor slot, before relation defaults are
/// applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraversalMode {
    /// Match the slot's own entity only.
    Self_,
    /// Walk the relation upward.
    Up,
    /// Match the entity itself, then walk upward.
    SelfUp,
    /// Walk the relation downward.
    Down,
    /// Match the entity itself, then walk downward.
    SelfDown,
    /// Up traversal ordered by hierarchy depth.
    Cascade,
    /// Shorthand for up traversal over `ChildOf`.
    Parent,
}

/// Caller-supplied description of one identifier slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefDesc {
    /// Resolved entity, if the caller already has one.
    pub entity: Option<Entity>,
    /// Symbolic name, resolved during validation.
    pub name: Option<String>,
    /// Interpret `name` as a variable instead of an entity name.
    pub variable: bool,
    /// Requested traversal mode; defaulted per slot when absent.
    pub mode: Option<TraversalMode>,
    /// Requested traversal relationship; defaulted per mode when absent.
    pub relation: Option<Entity>,
}

impl RefDesc {
    /// Describes a slot by resolved entity.
    #[must_use]
    pub fn entity(e: Entity) -> Self {
        Self {
            entity: Some(e),
            ..Self::default()
        }
    }

    /// Describes a slot by symbolic name.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Describes a slot by variable name.
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            variable: true,
            ..Self::default()
        }
    }

    /// Describes the builtin "this" variable.
    #[must_use]
    pub fn this() -> Self {
        Self::entity(Entity::THIS)
    }

    /// Sets the traversal mode.
    #[must_use]
    pub fn with_mode(mut self, mode: TraversalMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets the traversal relationship.
    #[must_use]
    pub fn with_relation(mut self, relation: Entity) -> Self {
        self.relation = Some(relation);
        self
    }

    /// Returns true if no field of the descriptor is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entity.is_none() && self.name.is_none() && self.mode.is_none()
            && self.relation.is_none()
    }
}

/// Caller-supplied description of one term.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TermDesc {
    /// Already-resolved component or pair id, if the caller has one.
    pub id: Id,
    /// The matched component or relationship.
    pub first: RefDesc,
    /// The pair target.
    pub second: RefDesc,
    /// Where to match. Defaults to the "this" variable.
    pub src: RefDesc,
    /// Operator.
    pub oper: TermOper,
    /// Access annotation.
    pub inout: InOut,
}

impl TermDesc {
    /// Describes a term matching a plain component or tag.
    #[must_use]
    pub fn component(component: Entity) -> Self {
        Self {
            first: RefDesc::entity(component),
            ..Self::default()
        }
    }

    /// Describes a term matching a relationship pair.
    #[must_use]
    pub fn pair(relation: Entity, target: Entity) -> Self {
        Self {
            first: RefDesc::entity(relation),
            second: RefDesc::entity(target),
            ..Self::default()
        }
    }

    /// Describes a term from an already-resolved id.
    #[must_use]
    pub fn from_id(id: Id) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Describes a term matching a component by name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            first: RefDesc::name(name),
            ..Self::default()
        }
    }

    /// Replaces the first slot.
    #[must_use]
    pub fn with_first(mut self, first: RefDesc) -> Self {
        self.first = first;
        self
    }

    /// Replaces the pair target slot.
    #[must_use]
    pub fn with_second(mut self, second: RefDesc) -> Self {
        self.second = second;
        self
    }

    /// Replaces the source slot.
    #[must_use]
    pub fn with_src(mut self, src: RefDesc) -> Self {
        self.src = src;
        self
    }

    /// Sets the operator.
    #[must_use]
    pub fn with_oper(mut self, oper: TermOper) -> Self {
        self.oper = oper;
        self
    }

    /// Sets the access annotation.
    #[must_use]
    pub fn with_inout(mut self, inout: InOut) -> Self {
        self.inout = inout;
        self
    }
}
