//! Filter and term stringification.
//!
//! Renders finalized filters in the expression notation consumed by the
//! external expression parser:
//!
//! - `Pred` - a this-sourced term with default traversal
//! - `Pred(Src)` / `Pred(Src,Tgt)` - explicit source (and pair target)
//! - `(Pred,Tgt)` - a pair on the default this source
//! - `[inout]` prefixes when the access annotation is not the default
//! - `!` / `?` operator prefixes, `and|` / `or|` / `not|` for the type
//!   expansion operators, ` || ` between OR siblings
//! - `:self|up(Rel)`-style suffixes whenever a slot's traversal differs
//!   from its structural default

use sieve_foundation::{Entity, Id};
use sieve_storage::{IdFlags, World};

use crate::filter::Filter;
use crate::term::{
    InOut, RefDesc, RefKind, Term, TermDesc, TermOper, TermRef, Traversal, Variable,
};
use crate::validator::default_src_traversal;

/// Renders a whole filter.
pub(crate) fn filter_expr(world: &World, filter: &Filter) -> String {
    let terms: Vec<&Term> = filter.terms().collect();
    let mut out = String::new();
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            let continues =
                terms[i - 1].oper == TermOper::Or && terms[i].oper == TermOper::Or;
            out.push_str(if continues { " || " } else { ", " });
        }
        out.push_str(&term_expr(world, term));
    }
    out
}

/// Renders one finalized term.
pub(crate) fn term_expr(world: &World, term: &Term) -> String {
    let mut out = String::new();

    match term.inout {
        InOut::Default => {}
        InOut::In => out.push_str("[in] "),
        InOut::Out => out.push_str("[out] "),
        InOut::InOut => out.push_str("[inout] "),
        InOut::None => out.push_str("[none] "),
        InOut::Filter => out.push_str("[filter] "),
    }

    match term.oper {
        TermOper::Not => out.push('!'),
        TermOper::Optional => out.push('?'),
        TermOper::AndFrom => out.push_str("and|"),
        TermOper::OrFrom => out.push_str("or|"),
        TermOper::NotFrom => out.push_str("not|"),
        TermOper::And | TermOper::Or => {}
    }

    let mut pred = ref_str(world, &term.first);
    if term.first.traversal != expected_first_traversal(world, &term.first) {
        pred.push_str(&traversal_suffix(world, term.first.traversal));
    }

    let mut target = term.second.is_set().then(|| ref_str(world, &term.second));
    if let Some(target) = target.as_mut() {
        if !is_default_second_traversal(term) {
            target.push_str(&traversal_suffix(world, term.second.traversal));
        }
    }

    let src_is_default_this =
        term.src.is_this() && term.src.traversal == default_src_traversal(world.id_flags(term.id));

    match (src_is_default_this, target) {
        (true, None) => out.push_str(&pred),
        (true, Some(target)) => {
            out.push('(');
            out.push_str(&pred);
            out.push(',');
            out.push_str(&target);
            out.push(')');
        }
        (false, target) => {
            let mut src = ref_str(world, &term.src);
            if term.src.traversal != default_src_traversal(world.id_flags(term.id)) {
                src.push_str(&traversal_suffix(world, term.src.traversal));
            }
            out.push_str(&pred);
            out.push('(');
            out.push_str(&src);
            if let Some(target) = target {
                out.push(',');
                out.push_str(&target);
            }
            out.push(')');
        }
    }

    out
}

fn ref_str(world: &World, slot: &TermRef) -> String {
    match &slot.kind {
        RefKind::Unset => String::new(),
        RefKind::Entity(e) if e.is_null() => "0".to_string(),
        RefKind::Entity(e) => world.name_of(*e),
        RefKind::Var(Variable::This) => "$this".to_string(),
        RefKind::Var(Variable::Wildcard) => "*".to_string(),
        RefKind::Var(Variable::Any) => "_".to_string(),
        RefKind::Var(Variable::Named(name)) => format!("${name}"),
    }
}

fn traversal_suffix(world: &World, traversal: Traversal) -> String {
    match traversal {
        Traversal::Self_ => ":self".to_string(),
        Traversal::Up(r) => format!(":up({})", world.name_of(r)),
        Traversal::SelfUp(r) => format!(":self|up({})", world.name_of(r)),
        Traversal::Down(r) => format!(":down({})", world.name_of(r)),
        Traversal::SelfDown(r) => format!(":self|down({})", world.name_of(r)),
        Traversal::Cascade(r) => format!(":cascade({})", world.name_of(r)),
        Traversal::Transitive(r) => format!(":self|up({})|all", world.name_of(r)),
    }
}

fn expected_first_traversal(world: &World, first: &TermRef) -> Traversal {
    let is_final = first
        .entity()
        .is_some_and(|e| !e.is_null() && world.id_flags(Id::entity(e)).contains(IdFlags::FINAL));
    if is_final {
        Traversal::Self_
    } else {
        Traversal::SelfDown(Entity::IS_A)
    }
}

/// The target's structural default is plain self matching, or the
/// transitive closure the validator assigns for transitive relations.
fn is_default_second_traversal(term: &Term) -> bool {
    match term.second.traversal {
        Traversal::Self_ => true,
        Traversal::Transitive(r) => term.first.entity() == Some(r),
        _ => false,
    }
}

// =============================================================================
// Descriptor rendering (for error context)
// =============================================================================

/// Best-effort rendering of a descriptor list, before validation has
/// resolved it. Returns the rendered expression and the character offset
/// at which term `index` starts.
pub(crate) fn desc_expr(world: &World, descs: &[TermDesc], index: usize) -> (String, usize) {
    let mut out = String::new();
    let mut offset = 0;
    for (i, desc) in descs.iter().enumerate() {
        if i > 0 {
            let continues = descs[i - 1].oper == TermOper::Or && descs[i].oper == TermOper::Or;
            out.push_str(if continues { " || " } else { ", " });
        }
        if i == index {
            offset = out.len();
        }
        out.push_str(&desc_term_expr(world, desc));
    }
    (out, offset)
}

fn desc_term_expr(world: &World, desc: &TermDesc) -> String {
    let prefix = match desc.oper {
        TermOper::Not => "!",
        TermOper::Optional => "?",
        TermOper::AndFrom => "and|",
        TermOper::OrFrom => "or|",
        TermOper::NotFrom => "not|",
        TermOper::And | TermOper::Or => "",
    };

    let first = ref_desc_str(world, &desc.first)
        .or_else(|| (!desc.id.is_null()).then(|| world.name_of(desc.id.first())))
        .unwrap_or_else(|| "?".to_string());
    let second = ref_desc_str(world, &desc.second)
        .or_else(|| desc.id.is_pair().then(|| world.name_of(desc.id.second())));
    let src = ref_desc_str(world, &desc.src);

    let body = match (src, second) {
        (None, None) => first,
        (None, Some(second)) => format!("({first},{second})"),
        (Some(src), None) => format!("{first}({src})"),
        (Some(src), Some(second)) => format!("{first}({src},{second})"),
    };
    format!("{prefix}{body}")
}

fn ref_desc_str(world: &World, desc: &RefDesc) -> Option<String> {
    if let Some(name) = &desc.name {
        let special = matches!(name.as_str(), "0" | "*" | "_" | "$" | "$this" | "This");
        if desc.variable && !special {
            return Some(format!("${name}"));
        }
        return Some(name.clone());
    }
    let e = desc.entity?;
    Some(match e {
        Entity::THIS => "$this".to_string(),
        Entity::WILDCARD => "*".to_string(),
        Entity::ANY => "_".to_string(),
        other if other.is_null() => "0".to_string(),
        other => world.name_of(other),
    })
}
