//! Shared domain types for the vigil event engine.
//!
//! Everything that crosses a crate boundary lives here: events and their
//! tags, trigger diffs, tasks, correlation rules, configuration snapshot
//! records, and the infix expression evaluator used by correlation formulas.

pub mod config;
pub mod correlation;
pub mod expr;
pub mod expression;
pub mod types;

#[cfg(test)]
mod tests;
