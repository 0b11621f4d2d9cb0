//! Common items related to Genetic Programming.
//!
//! Expressions are trees of primitives, each with some level of arity - aka the number of
//! inputs. Primitives with an arity of zero are terminals: either constants or arguments that
//! stand in for the values an expression is evaluated with.

pub mod expr;
pub mod pset;
pub mod value;
