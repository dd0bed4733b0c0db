//! anymip: an algebraic modeling facade over interchangeable solving engines.
//!
//! Models are built once, with variables combined through operator
//! expressions into constraints and objectives, then dispatched to any of three
//! backends (COIN-OR CBC, HiGHS, or a CP-SAT style engine backed by an
//! incremental SAT solver) without rewriting model code per engine. Every
//! expression carries both a backend-native handle and a human-readable
//! formula, native statuses are translated into one canonical taxonomy, and
//! infeasible models can be diagnosed down to a minimal conflicting
//! constraint set on the backend that exposes assumption-literal unsat
//! cores.

// Domain layer: expression algebra, value objects, errors
pub mod domain;

// Model facade: variable creation, constraints, objective, solve dispatch
pub mod model;

// Solver adapters: concrete engines behind the capability interface
pub mod solver;

// Hierarchical boolean-variable tree with wildcard selection
pub mod tree;

// Re-export commonly used types
pub use domain::{constant, Backend, BinOp, IntoNode, ModelError, Node, Result, Status};
pub use model::{ConstraintExpr, Solver, SolverConfig};
pub use tree::{Axis, DictBoolVar, KeySpec};
