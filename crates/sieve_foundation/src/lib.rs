//! Core identifiers, errors, and buffers for Sieve.
//!
//! This crate provides:
//! - [`Entity`] - Entity identifiers with reserved builtins
//! - [`Id`] - Component, tag, and relationship-pair identifiers
//! - [`Error`] - Rich error types with expression context
//! - Buffers ([`SpillVec`], [`SnapshotVec`]) for terms and table caches

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collections;
pub mod entity;
pub mod error;
pub mod id;

pub use collections::{INLINE_CAPACITY, SnapshotVec, SpillVec};
pub use entity::Entity;
pub use error::{Error, ErrorKind, ExprContext, Result};
pub use id::Id;
