#![doc = include_str!("../README.md")]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, missing_docs)]
#![allow(
    clippy::similar_names,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

mod collections;
/// Handlers for more control during solving.
pub mod handlers;
/// Resolution proofs and unsat-core extraction.
pub mod proof;
/// The propositional CDCL engine.
pub mod sat;
/// Simplification and preprocessing of terms and literals.
pub mod simplify;
/// The top-level SMT solver.
pub mod solver;
/// Hash-consed terms, sorts, and signed literals.
pub mod terms;
/// Theory plugins and the congruence closure.
pub mod theory;
