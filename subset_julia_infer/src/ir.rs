//! Lowered statement representation consumed by inference.
//!
//! Lowering produces, per method, a linear sequence of statements with
//! resolved branch and handler targets plus a table of local slots. The
//! first `nargs` slots hold the arguments. Every statement index doubles as
//! the SSA id of the value that statement produces.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lattice::ConstValue;
use crate::types::JuliaType;

/// Index of a local slot.
pub type SlotId = usize;

/// Index of an SSA value; equal to the index of the defining statement.
pub type SsaId = usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Slot(SlotId),
    Ssa(SsaId),
    Const(ConstValue),
    Type(JuliaType),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Use(Operand),
    /// A primitive operation handled by the transfer-function registry.
    Builtin { op: String, args: Vec<Operand> },
    /// A generic call dispatched through the method table.
    Call { func: String, args: Vec<Operand> },
    /// Construct an instance of a struct type.
    New { ty: JuliaType, args: Vec<Operand> },
}

impl Expr {
    pub fn operands(&self) -> &[Operand] {
        match self {
            Expr::Use(op) => std::slice::from_ref(op),
            Expr::Builtin { args, .. } | Expr::Call { args, .. } | Expr::New { args, .. } => args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Assign { slot: SlotId, value: Expr },
    Expr(Expr),
    Goto(usize),
    GotoIfNot { cond: Operand, dest: usize },
    Return(Operand),
    /// Install an exception handler whose catch block starts at `catch_dest`.
    EnterHandler { catch_dest: usize },
    /// Pop `count` handlers.
    LeaveHandler { count: usize },
    Throw(Operand),
    Nop,
}

impl Stmt {
    pub fn operands(&self) -> &[Operand] {
        match self {
            Stmt::Assign { value, .. } | Stmt::Expr(value) => value.operands(),
            Stmt::GotoIfNot { cond, .. } => std::slice::from_ref(cond),
            Stmt::Return(op) | Stmt::Throw(op) => std::slice::from_ref(op),
            Stmt::Goto(_) | Stmt::EnterHandler { .. } | Stmt::LeaveHandler { .. } | Stmt::Nop => {
                &[]
            }
        }
    }
}

/// Structural problems in lowered code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error("`{method}` has no statements")]
    Empty { method: String },

    #[error("`{method}` declares {nargs} arguments but only {slots} slots")]
    TooFewSlots {
        method: String,
        nargs: usize,
        slots: usize,
    },

    #[error("statement {pc} of `{method}` jumps to {dest}, past the end")]
    BadTarget {
        method: String,
        pc: usize,
        dest: usize,
    },

    #[error("statement {pc} of `{method}` reads undefined slot {slot}")]
    BadSlot {
        method: String,
        pc: usize,
        slot: SlotId,
    },

    #[error("statement {pc} of `{method}` reads undefined SSA value {ssa}")]
    BadSsa {
        method: String,
        pc: usize,
        ssa: SsaId,
    },
}

/// Lowered code of one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeInfo {
    pub name: String,
    /// Number of argument slots, including a trailing varargs slot.
    pub nargs: usize,
    pub slot_names: Vec<String>,
    pub stmts: Vec<Stmt>,
}

impl CodeInfo {
    pub fn new(
        name: impl Into<String>,
        slot_names: &[&str],
        nargs: usize,
        stmts: Vec<Stmt>,
    ) -> Self {
        Self {
            name: name.into(),
            nargs,
            slot_names: slot_names.iter().map(|s| s.to_string()).collect(),
            stmts,
        }
    }

    pub fn nslots(&self) -> usize {
        self.slot_names.len()
    }

    pub fn ssa_count(&self) -> usize {
        self.stmts.len()
    }

    /// Check targets and operand references. SSA reads may refer to any
    /// statement, including later ones reached through a back edge.
    pub fn validate(&self) -> Result<(), IrError> {
        let method = || self.name.clone();
        if self.stmts.is_empty() {
            return Err(IrError::Empty { method: method() });
        }
        if self.nargs > self.nslots() {
            return Err(IrError::TooFewSlots {
                method: method(),
                nargs: self.nargs,
                slots: self.nslots(),
            });
        }
        let n = self.stmts.len();
        for (pc, stmt) in self.stmts.iter().enumerate() {
            let target = match stmt {
                Stmt::Goto(dest) | Stmt::GotoIfNot { dest, .. } => Some(*dest),
                Stmt::EnterHandler { catch_dest } => Some(*catch_dest),
                _ => None,
            };
            if let Some(dest) = target {
                if dest >= n {
                    return Err(IrError::BadTarget {
                        method: method(),
                        pc,
                        dest,
                    });
                }
            }
            if let Stmt::Assign { slot, .. } = stmt {
                if *slot >= self.nslots() {
                    return Err(IrError::BadSlot {
                        method: method(),
                        pc,
                        slot: *slot,
                    });
                }
            }
            for op in stmt.operands() {
                match op {
                    Operand::Slot(slot) if *slot >= self.nslots() => {
                        return Err(IrError::BadSlot {
                            method: method(),
                            pc,
                            slot: *slot,
                        })
                    }
                    Operand::Ssa(ssa) if *ssa >= n => {
                        return Err(IrError::BadSsa {
                            method: method(),
                            pc,
                            ssa: *ssa,
                        })
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// For every SSA id, the statements that read it.
    pub fn ssa_uses(&self) -> Vec<Vec<usize>> {
        let mut uses = vec![Vec::new(); self.stmts.len()];
        for (pc, stmt) in self.stmts.iter().enumerate() {
            for op in stmt.operands() {
                if let Operand::Ssa(id) = op {
                    if let Some(list) = uses.get_mut(*id) {
                        if !list.contains(&pc) {
                            list.push(pc);
                        }
                    }
                }
            }
        }
        uses
    }
}
