//! Sieve - Term-based query and filter matching over an archetype store
//!
//! This crate re-exports all layers of the Sieve system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: sieve_filter     — Terms, validation, matching, iteration
//! Layer 1: sieve_storage    — Archetype tables, component index, search
//! Layer 0: sieve_foundation — Core types (Entity, Id, Error, buffers)
//! ```

pub use sieve_filter as filter;
pub use sieve_foundation as foundation;
pub use sieve_storage as storage;
