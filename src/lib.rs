//! Cophylogenetic reconciliation under the Duplication-Transfer-Loss model.
//!
//! Given a host tree, a symbiont (parasite) tree, a leaf-to-leaf mapping
//! between them, and a cost vector, this crate builds the compact AND/OR
//! solution DAG encoding every minimum-cost reconciliation and exposes three
//! ways to consume it ([`strategy::all`], [`strategy::per_vector`],
//! [`strategy::per_class`]) without ever materializing the full
//! reconciliation set unless asked to enumerate it.
//!
//! Parsing the two trees out of whatever format an embedder stores them in
//! is out of scope — this crate starts from already-built [`tree::Tree`]
//! values and a leaf map.

pub mod cyclicity;
pub mod dag;
pub mod engine;
pub mod equivalence;
pub mod error;
pub mod options;
pub mod strategy;
pub mod transfer;
pub mod tree;
pub mod utils;
pub mod walker;

pub use error::ReconcileError;
pub use options::{CostVector, ReconciliationOptions, Task};
pub use tree::{NodeId, Tree, TreeBuilder};

#[cfg(test)]
mod tests;
