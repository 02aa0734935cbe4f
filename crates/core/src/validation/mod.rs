//! Record validation engine.
//!
//! Provides rule types, the custom-hook registry, and a pure-logic
//! evaluator that runs after transformation.

pub mod evaluator;
pub mod hooks;
pub mod rules;
