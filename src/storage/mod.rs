//! Fact storage for a reasoning run.
//!
//! A run owns exactly one [`FactStore`]. The store is append-only: facts are
//! never retracted, which is what makes the fixpoint well-defined.

mod fact_store;

pub use fact_store::{ContradictionKind, FactStore, InsertOutcome};
