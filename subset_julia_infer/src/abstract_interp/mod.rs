//! Abstract interpretation over lowered code.
//!
//! This module provides the per-specialization inference frame and the
//! fixpoint engine that drives it:
//!
//! - Worklist iteration over statements, lowest index first
//! - Branch refinement through `Conditional` values (isa, === nothing)
//! - Exception-handler regions feeding their catch blocks
//! - Recursion cycles converged jointly by their outermost frame
//!
//! # Module structure
//!
//! - `env`: `VarTable`, the slot environment at one program point
//! - `worklist`: `StmtWorklist`, the pending-statement set
//! - `handlers`: the active handler chain per statement
//! - `conditional`: creation and splitting of `Conditional` refinements
//! - `frame`: `Frame` and the request-owned `FrameArena`
//! - `engine`: `InferenceEngine`, statement evaluation and call resolution

pub mod conditional;
pub mod engine;
pub mod env;
pub mod frame;
pub mod handlers;
pub mod worklist;

pub use conditional::{split_env_by_condition, SplitEnv};
pub use engine::InferenceEngine;
pub use env::VarTable;
pub use frame::{Frame, FrameArena};
pub use handlers::HandlerMap;
pub use worklist::StmtWorklist;
