//! Error types for the inference engine.
//!
//! Only internal invariant violations surface as `InferenceError`. Dead paths,
//! widening and instantiation failures are expressed as abstract values.

use thiserror::Error;

use crate::ipo::WorldRange;
use crate::method_table::MethodId;

/// Hard failure of an inference request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("unknown method specialization {0}")]
    UnknownMethod(MethodId),

    #[error("validity window {window} of `{method}` does not contain world {world}")]
    InvalidValidityWindow {
        method: String,
        window: WorldRange,
        world: u64,
    },

    #[error("recursion cycle [{}] still changing after {rounds} rounds", methods.join(", "))]
    CycleDidNotConverge { methods: Vec<String>, rounds: usize },

    #[error("non-monotone merge in `{method}` at statement {pc}")]
    NonMonotoneMerge { method: String, pc: usize },
}

/// Failure of parametric type instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstantiationError {
    #[error("`{0}` is not a parametric type")]
    NotParametric(String),

    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("too many parameters for `{head}`: expected at most {expected}, got {got}")]
    TooManyParameters {
        head: String,
        expected: usize,
        got: usize,
    },

    #[error("parameter `{param}` of `{head}` must be a subtype of {bound}, got {got}")]
    BoundViolation {
        head: String,
        param: String,
        bound: String,
        got: String,
    },
}

/// Failure while building a transfer-function table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("transfer function for `{0}` registered twice")]
    DuplicateRegistration(String),

    #[error("invalid arity for `{op}`: min {min} > max {max}")]
    InvalidArity { op: String, min: usize, max: usize },
}
