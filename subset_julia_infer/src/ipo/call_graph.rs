//! Call-graph bookkeeping between inference frames.
//!
//! Frames live in an arena owned by one inference request and refer to each
//! other through `FrameId` handles. Two kinds of edges are recorded:
//!
//! - forward edges: the specializations a frame's result depends on
//! - backedges: the `(caller, statement)` pairs to re-run when a callee's
//!   provisional return type changes

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lattice::AbstractValue;
use crate::method_table::MethodId;

/// Handle of a frame within one request's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// A call statement that consumed a callee's return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Backedge {
    pub caller: FrameId,
    pub pc: usize,
}

/// A method together with the abstract argument types it is inferred for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpecKey {
    pub method: MethodId,
    pub argtypes: Vec<AbstractValue>,
}

impl SpecKey {
    pub fn new(method: MethodId, argtypes: Vec<AbstractValue>) -> Self {
        Self { method, argtypes }
    }
}

impl fmt::Display for SpecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.method)?;
        for (i, a) in self.argtypes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", a)?;
        }
        write!(f, ")")
    }
}

/// Add `item` unless already present, preserving insertion order.
pub fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) -> bool {
    if list.contains(&item) {
        false
    } else {
        list.push(item);
        true
    }
}
