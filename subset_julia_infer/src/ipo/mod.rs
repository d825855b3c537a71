//! Interprocedural bookkeeping for type inference.
//!
//! Inference of one specialization may demand inference of its callees.
//! This module holds the pieces shared across frames:
//!
//! - `call_graph`: frame handles, specialization keys and backedges
//! - `recursion`: lazy detection and merging of recursion cycles
//! - `cache`: the global, world-age aware result cache
//! - `validity`: world-age windows attached to every result

pub mod cache;
pub mod call_graph;
pub mod recursion;
pub mod validity;

pub use cache::{CachedResult, InferenceCache};
pub use call_graph::{Backedge, FrameId, SpecKey};
pub use validity::WorldRange;
