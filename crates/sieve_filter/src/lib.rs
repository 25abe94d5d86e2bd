//! Term validation, table matching, and filter iteration for Sieve.
//!
//! This crate provides:
//! - [`Term`] / [`TermDesc`] - Atomic query conditions and their
//!   descriptors
//! - [`finalize_term`] - The term validator
//! - [`Filter`] / [`FilterDesc`] - Uncached multi-term queries
//! - [`TermIter`] - Low-level table enumeration for one term
//! - [`FilterIter`] - Streaming iteration over matched tables and rows

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod display;
pub mod filter;
pub mod filter_iter;
pub mod matcher;
pub mod term;
pub mod term_iter;
pub mod validator;

pub use filter::{Filter, FilterDesc, FilterFlags, Pivot};
pub use filter_iter::{FilterIter, MultiIndexCursor, PageIter, ThisBinding};
pub use matcher::{FieldData, TermHit, match_filter, match_term};
pub use term::{
    InOut, RefDesc, RefKind, Term, TermDesc, TermOper, TermRef, Traversal, TraversalMode, Variable,
};
pub use term_iter::{TermIter, TermMatch};
pub use validator::finalize_term;
