//! Exception-handler regions.
//!
//! The active handler chain at each statement is found by a forward pass
//! over the control-flow graph: `EnterHandler` pushes its catch target on
//! the fallthrough edge, `LeaveHandler` pops, and the catch block itself
//! starts with the chain that was active before the matching enter.

use std::collections::VecDeque;

use crate::ir::{CodeInfo, Stmt};

/// Handler chain (innermost last) active at every statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerMap {
    chains: Vec<Option<Vec<usize>>>,
}

impl HandlerMap {
    pub fn compute(code: &CodeInfo) -> Self {
        let n = code.stmts.len();
        let mut chains: Vec<Option<Vec<usize>>> = vec![None; n];
        let mut queue = VecDeque::new();
        if n > 0 {
            chains[0] = Some(Vec::new());
            queue.push_back(0);
        }
        while let Some(pc) = queue.pop_front() {
            let Some(chain) = chains[pc].clone() else {
                continue;
            };
            let mut succ = |dest: usize, chain: Vec<usize>| {
                if dest < n && chains[dest].is_none() {
                    chains[dest] = Some(chain);
                    queue.push_back(dest);
                }
            };
            match &code.stmts[pc] {
                Stmt::EnterHandler { catch_dest } => {
                    succ(*catch_dest, chain.clone());
                    let mut inner = chain;
                    inner.push(*catch_dest);
                    succ(pc + 1, inner);
                }
                Stmt::LeaveHandler { count } => {
                    let mut outer = chain;
                    let keep = outer.len().saturating_sub(*count);
                    outer.truncate(keep);
                    succ(pc + 1, outer);
                }
                Stmt::Goto(dest) => succ(*dest, chain),
                Stmt::GotoIfNot { dest, .. } => {
                    succ(*dest, chain.clone());
                    succ(pc + 1, chain);
                }
                Stmt::Return(_) | Stmt::Throw(_) => {}
                _ => succ(pc + 1, chain),
            }
        }
        Self { chains }
    }

    /// The catch target that receives exceptions thrown at `pc`.
    pub fn innermost(&self, pc: usize) -> Option<usize> {
        self.chains.get(pc)?.as_ref()?.last().copied()
    }
}
