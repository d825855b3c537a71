//! Abstract value lattice for type inference.
//!
//! The lattice tracks, for every program point, an over-approximation of
//! the runtime values that can appear there:
//!
//! - `Const` and `Conditional` carry value and branch refinement
//! - `TypeOf` and `PartialTypeVar` describe values that are themselves types
//! - `Union2` chains are bounded; merging past the bound collapses them
//!
//! # Module structure
//!
//! - `value`: `AbstractValue` and `ConstValue`
//! - `ops`: `TypeLattice`, the partial order, the widening merge and
//!   widening helpers

pub mod ops;
pub mod value;

pub use ops::TypeLattice;
pub use value::{AbstractValue, ConstValue};
