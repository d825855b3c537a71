//! Whole-program type inference for lowered SubsetJulia code.
//!
//! Given a method and the abstract types of its arguments, inference
//! computes an over-approximation of the values at every program point and
//! a return type, without executing the program.

// Library code never writes to stderr; report through `log` or diagnostics.
#![deny(clippy::print_stderr)]

// Configuration and errors
pub mod config;
pub mod diagnostics;
pub mod error;

// Collaborator interfaces
pub mod ir;
pub mod method_table;
pub mod types;

// Lattice and builtin semantics
pub mod lattice;
pub mod tfuncs;

// Frames, fixpoint engine and interprocedural state
pub mod abstract_interp;
pub mod ipo;

// Rust API for programmatic use
pub mod api;
pub use api::{AbstractInterpreter, InferenceResult};
