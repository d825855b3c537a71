//! Type descriptors and the subtyping oracle.
//!
//! - `julia_type`: the `JuliaType` descriptor and depth limiting
//! - `oracle`: the `TypeOracle` interface queried by inference
//! - `universe`: `TypeUniverse`, a nominal hierarchy implementing the oracle

pub mod julia_type;
pub mod oracle;
pub mod universe;

pub use julia_type::{JuliaType, TypeVar, WILDCARD_NAME};
pub use oracle::TypeOracle;
pub use universe::{DataTypeDef, TypeUniverse};
