//! Term and filter validation.
//!
//! Turns caller-supplied, partially-specified term descriptors into fully
//! resolved, self-consistent terms, or fails with an error carrying the
//! rendered expression and the offset of the offending term. Runs once per
//! term, then once more across the whole term list to assign field indices
//! and aggregate filter flags.

use log::debug;
use sieve_foundation::{Entity, Error, ErrorKind, ExprContext, Id, Result, SpillVec};
use sieve_storage::{IdFlags, World};

use crate::display;
use crate::filter::FilterFlags;
use crate::term::{
    InOut, RefDesc, RefKind, Term, TermDesc, TermOper, TermRef, Traversal, TraversalMode, Variable,
};

/// Resolves one term descriptor into a finalized term.
///
/// # Errors
///
/// Returns a validation error when the descriptor is inconsistent: an
/// unresolved name, a term id disagreeing with its slots, a missing pair
/// element, a self-referencing acyclic relationship, a non-traversable
/// traversal relationship, or an invalid operator/inout combination.
pub fn finalize_term(world: &World, desc: &TermDesc) -> Result<Term> {
    let mut first = TermRef {
        kind: resolve_ref(world, &desc.first, "first", None)?,
        traversal: Traversal::Self_,
    };

    // When the relationship restricts its targets, second names resolve
    // among the relationship's children.
    let scope = first
        .entity()
        .filter(|e| !e.is_null())
        .filter(|&e| world.id_flags(Id::entity(e)).contains(IdFlags::ONE_OF));
    let mut second = TermRef {
        kind: resolve_ref(world, &desc.second, "second", scope)?,
        traversal: Traversal::Self_,
    };
    let mut src = TermRef {
        kind: resolve_ref(world, &desc.src, "src", None)?,
        traversal: Traversal::Self_,
    };

    // A `$` source means "the matched component itself": singleton terms.
    if src.var_name() == Some("$") {
        src.kind = first.kind.clone();
    }

    let mut oper = desc.oper;
    let mut inout = desc.inout;
    let mut id = desc.id;

    if !id.is_null() {
        populate_from_id(id, &mut first, &mut second)?;
    }

    // Source defaults to the "this" variable.
    if !src.is_set() {
        src.kind = RefKind::Var(Variable::This);
    }

    if id.is_null() {
        id = derive_id(&first, &second)?;
    }

    // `!(ChildOf, *)` asks for entities with no parent; the root index
    // answers that directly.
    if oper == TermOper::Not
        && id.is_pair()
        && id.first() == Entity::CHILD_OF
        && id.second().is_wildcard()
        && !matches!(src.kind, RefKind::Var(Variable::Any))
    {
        oper = TermOper::And;
        id = Id::pair(Entity::CHILD_OF, Entity::null());
        second.kind = RefKind::Entity(Entity::null());
    }

    let id_flags = world.id_flags(id);
    src.traversal = resolve_src_traversal(&desc.src, &src, id_flags)?;
    first.traversal = resolve_first_traversal(world, &desc.first, &first)?;
    second.traversal = resolve_second_traversal(world, &desc.second, oper, &first, &second, &src)?;

    // Wildcard sources and negations fetch nothing.
    if matches!(src.kind, RefKind::Var(Variable::Wildcard | Variable::Any)) {
        inout = InOut::None;
    }
    if oper == TermOper::Not && inout == InOut::Default {
        inout = InOut::None;
    }
    if inout == InOut::Default
        && (id == Id::WILDCARD || id == Id::pair(Entity::WILDCARD, Entity::WILDCARD))
    {
        inout = InOut::None;
    }

    let term = Term {
        record: world.component_record(id),
        first,
        second,
        src,
        id,
        oper,
        inout,
        field_index: 0,
    };

    verify_term(world, &term)?;
    Ok(term)
}

/// Finalizes a whole term list: per-term finalization, field assignment,
/// and flag aggregation. Errors carry expression context.
pub(crate) fn finalize_filter(
    world: &World,
    descs: &[TermDesc],
) -> Result<(SpillVec<Term>, usize, FilterFlags)> {
    let mut terms: SpillVec<Term> = SpillVec::new();
    for (index, desc) in descs.iter().enumerate() {
        let term = finalize_term(world, desc)
            .map_err(|err| attach_context(world, descs, index, err))?;
        terms.push(term);
    }

    let mut flags = FilterFlags::MATCH_ONLY_THIS | FilterFlags::MATCH_ANYTHING;
    let mut field_count = 0usize;
    let mut fields: Vec<usize> = Vec::with_capacity(terms.len());

    for i in 0..terms.len() {
        let continues = i > 0
            && terms.get(i - 1).is_some_and(|t| t.oper == TermOper::Or)
            && terms.get(i).is_some_and(|t| t.oper == TermOper::Or);
        if continues {
            let (Some(prev), Some(cur)) = (terms.get(i - 1), terms.get(i)) else {
                break;
            };
            if !same_source(&prev.src, &cur.src) {
                return Err(attach_context(
                    world,
                    descs,
                    i,
                    Error::new(ErrorKind::MismatchedOrSource),
                ));
            }
            fields.push(fields[i - 1]);
        } else {
            fields.push(field_count);
            field_count += 1;
        }

        let Some(term) = terms.get(i) else { break };
        if term.matches_this() {
            flags |= FilterFlags::MATCH_THIS;
        } else {
            flags.remove(FilterFlags::MATCH_ONLY_THIS);
        }
        if !(term.oper == TermOper::Not && term.matches_this()) {
            flags.remove(FilterFlags::MATCH_ANYTHING);
        }
        if term.first.entity() == Some(Entity::PREFAB) && term.src.traversal.includes_self() {
            flags |= FilterFlags::MATCH_PREFAB;
        }
        if term.first.entity() == Some(Entity::DISABLED) && term.src.traversal.includes_self() {
            flags |= FilterFlags::MATCH_DISABLED;
        }
    }

    for (i, field) in fields.iter().enumerate() {
        if let Some(term) = terms.get_mut(i) {
            term.field_index = *field;
        }
    }

    if terms.iter().all(|t| term_provides_no_data(world, t)) {
        flags |= FilterFlags::NO_DATA;
    }

    debug!(
        "finalized filter: {} terms, {} fields, flags {:?}",
        terms.len(),
        field_count,
        flags
    );
    Ok((terms, field_count, flags))
}

fn attach_context(world: &World, descs: &[TermDesc], index: usize, err: Error) -> Error {
    let (expr, offset) = display::desc_expr(world, descs, index);
    err.with_context(ExprContext::new(expr, offset))
}

// =============================================================================
// Identifier resolution
// =============================================================================

fn resolve_ref(
    world: &World,
    desc: &RefDesc,
    slot: &'static str,
    scope: Option<Entity>,
) -> Result<RefKind> {
    if desc.entity.is_some() && desc.name.is_some() {
        return Err(Error::conflicting_ref(slot));
    }
    if let Some(e) = desc.entity {
        return Ok(entity_to_kind(e));
    }
    let Some(name) = &desc.name else {
        return Ok(RefKind::Unset);
    };
    Ok(match name.as_str() {
        // The reserved "0" token always means "explicitly no entity".
        "0" => RefKind::Entity(Entity::null()),
        "*" => RefKind::Var(Variable::Wildcard),
        "_" => RefKind::Var(Variable::Any),
        "This" | "$this" => RefKind::Var(Variable::This),
        "$" => RefKind::Var(Variable::Named("$".to_string())),
        _ if desc.variable => RefKind::Var(Variable::Named(name.clone())),
        _ => {
            let found = scope
                .and_then(|s| world.lookup_child(s, name))
                .or_else(|| world.lookup(name))
                .ok_or_else(|| Error::unresolved_name(name.clone()))?;
            entity_to_kind(found)
        }
    })
}

fn entity_to_kind(e: Entity) -> RefKind {
    match e {
        Entity::THIS => RefKind::Var(Variable::This),
        Entity::WILDCARD => RefKind::Var(Variable::Wildcard),
        Entity::ANY => RefKind::Var(Variable::Any),
        other => RefKind::Entity(other),
    }
}

fn populate_from_id(id: Id, first: &mut TermRef, second: &mut TermRef) -> Result<()> {
    if id.is_pair() {
        let f = id.first();
        let s = id.second();
        if f.is_null() {
            return Err(Error::new(ErrorKind::InvalidPair));
        }
        if s.is_null() && f != Entity::CHILD_OF {
            return Err(Error::new(ErrorKind::InvalidPair));
        }
        fill_ref(first, f, "first")?;
        fill_ref(second, s, "second")?;
    } else {
        let e = id.first();
        if e.is_null() {
            return Err(Error::new(ErrorKind::MissingId));
        }
        fill_ref(first, e, "first")?;
        if second.is_set() {
            return Err(Error::id_mismatch("second"));
        }
    }
    Ok(())
}

fn fill_ref(slot_ref: &mut TermRef, element: Entity, slot: &'static str) -> Result<()> {
    match &slot_ref.kind {
        RefKind::Unset => {
            slot_ref.kind = entity_to_kind(element);
            Ok(())
        }
        RefKind::Entity(have) => {
            if *have == element {
                Ok(())
            } else {
                Err(Error::id_mismatch(slot))
            }
        }
        RefKind::Var(_) => {
            // A variable slot requires a wildcard-shaped id element.
            if element.is_wildcard() {
                Ok(())
            } else {
                Err(Error::expected_wildcard(slot))
            }
        }
    }
}

fn derive_id(first: &TermRef, second: &TermRef) -> Result<Id> {
    let f = ref_id_element(&first.kind).ok_or_else(|| Error::uninitialized_ref("first"))?;
    if f.is_null() {
        return Err(Error::new(ErrorKind::MissingId));
    }
    if second.is_set() {
        let s = ref_id_element(&second.kind).ok_or_else(|| Error::uninitialized_ref("second"))?;
        Ok(Id::pair(f, s))
    } else {
        Ok(Id::entity(f))
    }
}

/// Maps a resolved slot to the id element it contributes. Variables are
/// wildcard-shaped: a named variable can match any concrete id.
fn ref_id_element(kind: &RefKind) -> Option<Entity> {
    match kind {
        RefKind::Unset => None,
        RefKind::Entity(e) => Some(*e),
        RefKind::Var(Variable::Any) => Some(Entity::ANY),
        RefKind::Var(_) => Some(Entity::WILDCARD),
    }
}

// =============================================================================
// Traversal resolution
// =============================================================================

fn mode_traversal(mode: TraversalMode, relation: Option<Entity>) -> Traversal {
    match mode {
        TraversalMode::Self_ => Traversal::Self_,
        TraversalMode::Up => Traversal::Up(relation.unwrap_or(Entity::CHILD_OF)),
        TraversalMode::SelfUp => Traversal::SelfUp(relation.unwrap_or(Entity::CHILD_OF)),
        TraversalMode::Down => Traversal::Down(relation.unwrap_or(Entity::IS_A)),
        TraversalMode::SelfDown => Traversal::SelfDown(relation.unwrap_or(Entity::IS_A)),
        TraversalMode::Cascade => Traversal::Cascade(relation.unwrap_or(Entity::CHILD_OF)),
        TraversalMode::Parent => Traversal::Up(Entity::CHILD_OF),
    }
}

/// The structural default for a source slot: match the entity itself, then
/// walk the inheritance relationship upward, unless the matched id is not
/// inherited.
pub(crate) fn default_src_traversal(id_flags: IdFlags) -> Traversal {
    if id_flags.contains(IdFlags::DONT_INHERIT) {
        Traversal::Self_
    } else {
        Traversal::SelfUp(Entity::IS_A)
    }
}

fn resolve_src_traversal(desc: &RefDesc, src: &TermRef, id_flags: IdFlags) -> Result<Traversal> {
    // An explicitly empty source never traverses.
    if src.entity().is_some_and(Entity::is_null) {
        return Ok(Traversal::Self_);
    }
    let trav = match (desc.mode, desc.relation) {
        (None, None) => default_src_traversal(id_flags),
        // An explicit relation without an explicit mode implies Up.
        (None, Some(rel)) => Traversal::Up(rel),
        (Some(mode), rel) => mode_traversal(mode, rel),
    };
    // Inheritance traversal is inert for ids that are never inherited.
    if id_flags.contains(IdFlags::DONT_INHERIT) && trav.relation() == Some(Entity::IS_A) {
        return Ok(Traversal::Self_);
    }
    Ok(trav)
}

fn resolve_first_traversal(world: &World, desc: &RefDesc, first: &TermRef) -> Result<Traversal> {
    if matches!(
        desc.mode,
        Some(TraversalMode::Cascade | TraversalMode::Parent)
    ) {
        return Err(Error::new(ErrorKind::InvalidTraversal { slot: "first" }));
    }
    let trav = match (desc.mode, desc.relation) {
        (None, None) => Traversal::SelfDown(Entity::IS_A),
        (None, Some(rel)) => Traversal::Up(rel),
        (Some(mode), rel) => mode_traversal(mode, rel),
    };
    // Final ids have no specializations to find downward.
    if let Some(e) = first.entity() {
        if !e.is_null()
            && world.id_flags(Id::entity(e)).contains(IdFlags::FINAL)
            && trav.is_down()
        {
            return Ok(Traversal::Self_);
        }
    }
    Ok(trav)
}

fn resolve_second_traversal(
    world: &World,
    desc: &RefDesc,
    oper: TermOper,
    first: &TermRef,
    second: &TermRef,
    src: &TermRef,
) -> Result<Traversal> {
    if matches!(
        desc.mode,
        Some(TraversalMode::Cascade | TraversalMode::Parent)
    ) {
        return Err(Error::new(ErrorKind::InvalidTraversal { slot: "second" }));
    }
    if !second.is_set() {
        return Ok(Traversal::Self_);
    }
    match (desc.mode, desc.relation) {
        (None, None) => {
            // Targets of transitive relationships are found through the
            // closure, except where a single representative or a negation
            // makes the closure meaningless.
            if let Some(rel) = first.entity() {
                let skip = matches!(second.kind, RefKind::Var(Variable::Any))
                    || matches!(src.kind, RefKind::Var(Variable::Any))
                    || (oper == TermOper::Not
                        && matches!(second.kind, RefKind::Var(Variable::Wildcard)))
                    || second.entity().is_some_and(Entity::is_null);
                if !skip
                    && !rel.is_null()
                    && world.id_flags(Id::entity(rel)).contains(IdFlags::TRANSITIVE)
                {
                    return Ok(Traversal::Transitive(rel));
                }
            }
            Ok(Traversal::Self_)
        }
        (None, Some(rel)) => Ok(Traversal::Up(rel)),
        (Some(mode), rel) => Ok(mode_traversal(mode, rel)),
    }
}

// =============================================================================
// Structural verification
// =============================================================================

fn verify_term(world: &World, term: &Term) -> Result<()> {
    if !term.first.is_set() {
        return Err(Error::uninitialized_ref("first"));
    }
    if !term.src.is_set() {
        return Err(Error::uninitialized_ref("src"));
    }
    if term.id.is_null() {
        return Err(Error::new(ErrorKind::MissingId));
    }

    if term.id.is_pair() {
        let f = term.id.first();
        let s = term.id.second();
        if f.is_null() {
            return Err(Error::new(ErrorKind::InvalidPair));
        }
        if s.is_null() && f != Entity::CHILD_OF {
            return Err(Error::new(ErrorKind::InvalidPair));
        }
    } else if term.second.is_set() {
        return Err(Error::id_mismatch("second"));
    }

    if let Some(f) = term.first.entity() {
        if !f.is_null() {
            let first_flags = world.id_flags(Id::entity(f));

            // src == second on an acyclic, non-reflexive relationship can
            // never hold.
            if term.second.is_set() {
                let same = match (&term.src.kind, &term.second.kind) {
                    (RefKind::Entity(a), RefKind::Entity(b)) => !a.is_null() && a == b,
                    (RefKind::Var(a), RefKind::Var(b)) => {
                        a == b && !matches!(a, Variable::Wildcard | Variable::Any)
                    }
                    _ => false,
                };
                if same
                    && first_flags.contains(IdFlags::ACYCLIC)
                    && !first_flags.contains(IdFlags::REFLEXIVE)
                {
                    return Err(Error::self_reference(world.name_of(f)));
                }
            }

            // Restricted target enumerations.
            if first_flags.contains(IdFlags::ONE_OF) {
                if let Some(s) = term.second.entity() {
                    if !s.is_null() && !world.has_id(s, Id::pair(Entity::CHILD_OF, f)) {
                        return Err(Error::new(ErrorKind::InvalidTarget {
                            target: world.name_of(s),
                            scope: world.name_of(f),
                        }));
                    }
                }
            }
        }
    }

    if let Some(rel) = term.src.traversal.relation() {
        if !world.id_flags(Id::entity(rel)).contains(IdFlags::TRAVERSABLE) {
            return Err(Error::not_traversable(world.name_of(rel)));
        }
    }

    if matches!(
        term.oper,
        TermOper::AndFrom | TermOper::OrFrom | TermOper::NotFrom
    ) && !matches!(term.inout, InOut::Default | InOut::None)
    {
        return Err(Error::new(ErrorKind::InvalidInOut));
    }

    Ok(())
}

// =============================================================================
// Flag aggregation helpers
// =============================================================================

fn same_source(a: &TermRef, b: &TermRef) -> bool {
    match (&a.kind, &b.kind) {
        (RefKind::Entity(x), RefKind::Entity(y)) => x == y,
        (RefKind::Var(x), RefKind::Var(y)) => x == y,
        _ => false,
    }
}

fn term_provides_no_data(world: &World, term: &Term) -> bool {
    if matches!(term.inout, InOut::None | InOut::Filter) {
        return true;
    }
    if term.matches_none() || term.oper == TermOper::Not {
        return true;
    }
    world.id_flags(term.id).contains(IdFlags::TAG)
}
