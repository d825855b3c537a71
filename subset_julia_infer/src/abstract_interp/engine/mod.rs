//! Abstract interpretation engine with worklist-driven fixpoint iteration.
//!
//! The engine owns every frame of one inference request. A frame is run by
//! repeatedly popping the lowest pending statement, evaluating it against
//! the state stored for it, and merging the resulting state into each
//! successor. A successor whose stored state changed is pushed back on the
//! worklist. Widening in the lattice bounds every chain of merges, so each
//! frame reaches a fixpoint in finitely many steps.
//!
//! Calls suspend the current frame while the callee is inferred (see
//! `calls`). Frames that turn out to be mutually recursive are merged into
//! one cycle and driven to a joint fixpoint by the outermost member.

mod calls;


use std::collections::HashMap;

use crate::api::AbstractInterpreter;
use crate::config::InferenceConfig;
use crate::diagnostics::{emit_cycle_widened, emit_frame_limited};
use crate::error::InferenceError;
use crate::ipo::recursion::cycle_members;
use crate::ipo::{CachedResult, FrameId, SpecKey, WorldRange};
use crate::ir::{Expr, Operand, Stmt};
use crate::lattice::{AbstractValue, TypeLattice};
use crate::method_table::MethodDef;
use crate::tfuncs::tuple::tfunc_tuple;
use crate::tfuncs::{new_struct, TFuncContext};

use super::conditional::split_env_by_condition;
use super::env::{limited_merge, VarTable};
use super::frame::{Frame, FrameArena};

/// Cost charged for a statement that performs a generic call.
pub const CALL_COST: u64 = 20;

/// Cost charged for a struct allocation.
pub const NEW_COST: u64 = 2;

/// Fixpoint engine for one inference request.
#[derive(Debug)]
pub struct InferenceEngine<'r, 'a> {
    interp: &'r AbstractInterpreter<'a>,
    config: InferenceConfig,
    arena: FrameArena<'a>,
    /// Frames of this request that reached their fixpoint.
    finished: HashMap<SpecKey, FrameId>,
}

impl<'r, 'a> InferenceEngine<'r, 'a> {
    pub fn new(interp: &'r AbstractInterpreter<'a>, config: InferenceConfig) -> Self {
        Self {
            interp,
            config,
            arena: FrameArena::new(),
            finished: HashMap::new(),
        }
    }

    pub fn arena(&self) -> &FrameArena<'a> {
        &self.arena
    }

    pub fn frame(&self, id: FrameId) -> &Frame<'a> {
        &self.arena[id]
    }

    fn lattice(&self) -> TypeLattice<'a> {
        TypeLattice::new(self.interp.oracle, self.interp.limits)
    }

    /// Create a frame inferring `def` for the arguments in `key`.
    pub fn add_frame(
        &mut self,
        key: SpecKey,
        def: &'a MethodDef,
        parent: Option<FrameId>,
    ) -> FrameId {
        let depth = parent.map_or(0, |p| self.arena[p].depth + 1);
        let entry = self.seed_arguments(def, &key.argtypes);
        let frame = Frame::new(key, &def.code, entry, def.world_range, parent, depth, &self.config);
        let id = self.arena.push(frame);
        log::debug!(
            "new frame {} for {} {} (depth {})",
            id,
            def.name,
            self.arena[id].key,
            depth
        );
        id
    }

    /// Entry state: each argument narrowed to its declared type, excess
    /// arguments packed into a tuple for the varargs slot.
    fn seed_arguments(&self, def: &MethodDef, argtypes: &[AbstractValue]) -> VarTable {
        let lattice = self.lattice();
        let nfixed = def.sig.len();
        let mut args: Vec<AbstractValue> = def
            .sig
            .iter()
            .enumerate()
            .map(|(i, declared)| match argtypes.get(i) {
                Some(actual) => lattice.narrow(actual, declared),
                None => AbstractValue::Bottom,
            })
            .collect();
        if let Some(bound) = &def.vararg {
            let excess: Vec<AbstractValue> = argtypes
                .iter()
                .skip(nfixed)
                .map(|a| lattice.narrow(a, bound))
                .collect();
            let packed = if excess.iter().any(AbstractValue::is_bottom) {
                AbstractValue::Bottom
            } else {
                let mut ctx = TFuncContext::new(lattice);
                tfunc_tuple("tuple", &excess, &mut ctx)
            };
            args.push(packed);
        }
        VarTable::with_args(def.code.nslots(), args)
    }

    /// Run `id` to its fixpoint and finish it, or leave it to the root of
    /// the cycle it joined.
    pub fn typeinf(&mut self, id: FrameId) -> Result<(), InferenceError> {
        self.typeinf_local(id)?;
        if self.arena[id].cycle_root.is_some() {
            return Ok(());
        }
        if self.arena[id].callers_in_cycle.is_empty() {
            self.finish(id)
        } else {
            self.drive_cycle(id)
        }
    }

    /// Drain the worklist of one frame.
    fn typeinf_local(&mut self, id: FrameId) -> Result<(), InferenceError> {
        while let Some(pc) = self.arena[id].worklist.pop() {
            let Some(env) = self.arena[id].states[pc].clone() else {
                continue;
            };
            let frame = &mut self.arena[id];
            frame.visits[pc] += 1;
            log::trace!("{} {}: visit {} #{}", id, frame.name(), pc, frame.visits[pc]);
            if frame.visits[pc] > self.interp.limits.max_statement_visits {
                self.mark_limited(id);
            }
            self.step(id, pc, env)?;
        }
        Ok(())
    }

    pub(crate) fn mark_limited(&mut self, id: FrameId) {
        let frame = &mut self.arena[id];
        if !frame.limited {
            frame.limited = true;
            log::debug!("{} {} marked limited", id, frame.name());
            emit_frame_limited(frame.name());
        }
    }

    fn step(&mut self, id: FrameId, pc: usize, env: VarTable) -> Result<(), InferenceError> {
        let lattice = self.lattice();
        let code = self.arena[id].code;
        if let Some(handler) = self.arena[id].handlers.innermost(pc) {
            self.propagate(id, handler, env.without_conditionals(&lattice))?;
        }
        match &code.stmts[pc] {
            Stmt::Assign { slot, value } => {
                let v = self.eval_expr(id, pc, value, &env)?;
                self.record_ssa(id, pc, &v)?;
                if v.is_bottom() {
                    return Ok(());
                }
                let mut next = env;
                next.record_conditions(pc, &v);
                next.set(*slot, v);
                next.invalidate_conditionals(*slot, &lattice);
                self.propagate(id, pc + 1, next)
            }
            Stmt::Expr(value) => {
                let v = self.eval_expr(id, pc, value, &env)?;
                self.record_ssa(id, pc, &v)?;
                if v.is_bottom() {
                    return Ok(());
                }
                let mut next = env;
                next.record_conditions(pc, &v);
                self.propagate(id, pc + 1, next)
            }
            Stmt::Goto(dest) => self.propagate(id, *dest, env),
            Stmt::GotoIfNot { cond, dest } => {
                let c = self.eval_operand(id, cond, &env);
                let split = split_env_by_condition(&lattice, &env, &c);
                if let Some(then_env) = split.then_env {
                    self.propagate(id, pc + 1, then_env)?;
                }
                if let Some(else_env) = split.else_env {
                    self.propagate(id, *dest, else_env)?;
                }
                Ok(())
            }
            Stmt::Return(op) => {
                let v = lattice.widen_conditional(&self.eval_operand(id, op, &env));
                self.update_bestguess(id, pc, v)
            }
            Stmt::EnterHandler { .. } | Stmt::LeaveHandler { .. } | Stmt::Nop => {
                self.propagate(id, pc + 1, env)
            }
            Stmt::Throw(_) => Ok(()),
        }
    }

    /// The value of `op` in `env`. An SSA value loses the refinements whose
    /// slot was assigned since it was computed.
    fn eval_operand(&self, id: FrameId, op: &Operand, env: &VarTable) -> AbstractValue {
        match op {
            Operand::Slot(slot) => env.get(*slot).clone(),
            Operand::Ssa(ssa) => {
                let Some(v) = self.arena[id].ssa_types.get(*ssa) else {
                    return AbstractValue::Bottom;
                };
                if env.conditions_hold(*ssa, v) {
                    v.clone()
                } else {
                    self.lattice().widen_conditional(v)
                }
            }
            Operand::Const(c) => AbstractValue::constant(c.clone()),
            Operand::Type(t) => AbstractValue::type_value(t.clone(), true),
        }
    }

    fn eval_expr(
        &mut self,
        id: FrameId,
        pc: usize,
        expr: &Expr,
        env: &VarTable,
    ) -> Result<AbstractValue, InferenceError> {
        let args: Vec<AbstractValue> = expr
            .operands()
            .iter()
            .map(|op| self.eval_operand(id, op, env))
            .collect();
        match expr {
            Expr::Use(_) => Ok(args.into_iter().next().unwrap_or(AbstractValue::Bottom)),
            Expr::Builtin { op, args: operands } => {
                self.abstract_builtin(id, pc, op, operands, &args)
            }
            Expr::Call { func, .. } => self.abstract_call(id, pc, func, &args),
            Expr::New { ty, .. } => {
                if args.iter().any(AbstractValue::is_bottom) {
                    return Ok(AbstractValue::Bottom);
                }
                let ctx = TFuncContext::new(self.lattice());
                Ok(new_struct(&ctx, ty, &args))
            }
        }
    }

    /// Merge `incoming` into the state of `dest`, queueing `dest` if it
    /// changed.
    fn propagate(
        &mut self,
        id: FrameId,
        dest: usize,
        incoming: VarTable,
    ) -> Result<(), InferenceError> {
        let lattice = self.lattice();
        let frame = &mut self.arena[id];
        if dest >= frame.states.len() {
            return Ok(());
        }
        let limited = frame.limited;
        if frame.states[dest].is_none() {
            frame.states[dest] = Some(incoming);
            frame.worklist.push(dest);
            return Ok(());
        }
        let Some(current) = frame.states[dest].as_mut() else {
            return Ok(());
        };
        let old = cfg!(debug_assertions).then(|| current.clone());
        if !current.merge_changed(&incoming, &lattice, limited) {
            return Ok(());
        }
        if let Some(old) = old {
            if !current.subsumes(&old, &lattice) {
                return Err(InferenceError::NonMonotoneMerge {
                    method: frame.code.name.clone(),
                    pc: dest,
                });
            }
        }
        log::trace!("{}: state of {} changed", frame.name(), dest);
        frame.worklist.push(dest);
        Ok(())
    }

    /// Merge the value produced at `pc` into its SSA slot; on change every
    /// reader of that SSA id is queued again.
    fn record_ssa(
        &mut self,
        id: FrameId,
        pc: usize,
        v: &AbstractValue,
    ) -> Result<(), InferenceError> {
        let lattice = self.lattice();
        let frame = &mut self.arena[id];
        let old = &frame.ssa_types[pc];
        let new = if frame.limited {
            limited_merge(&lattice, old, v)
        } else {
            lattice.merge(old, v)
        };
        if &new == old {
            return Ok(());
        }
        check_monotone(&lattice, frame, pc, &new, old)?;
        frame.ssa_types[pc] = new;
        for &user in &frame.ssa_uses[pc] {
            frame.worklist.push(user);
        }
        Ok(())
    }

    /// Merge a returned value into the frame's best guess and notify the
    /// callers that consumed the previous guess.
    fn update_bestguess(
        &mut self,
        id: FrameId,
        pc: usize,
        v: AbstractValue,
    ) -> Result<(), InferenceError> {
        if v.is_bottom() {
            return Ok(());
        }
        let lattice = self.lattice();
        let frame = &mut self.arena[id];
        let new = if frame.limited {
            limited_merge(&lattice, &frame.bestguess, &v)
        } else {
            lattice.merge(&frame.bestguess, &v)
        };
        if new == frame.bestguess {
            return Ok(());
        }
        check_monotone(&lattice, frame, pc, &new, &frame.bestguess)?;
        log::trace!("{}: return type {} -> {}", frame.name(), frame.bestguess, new);
        frame.bestguess = new;
        let backedges = frame.backedges.clone();
        for edge in backedges {
            let caller = &mut self.arena[edge.caller];
            if caller.in_progress() {
                caller.worklist.push(edge.pc);
            }
        }
        Ok(())
    }

    /// Drive every member of the cycle rooted at `root` until none has
    /// pending work, then finish them together.
    fn drive_cycle(&mut self, root: FrameId) -> Result<(), InferenceError> {
        let max_rounds = self.interp.limits.max_cycle_iterations;
        let mut rounds = 0;
        let mut widened = false;
        loop {
            if self.arena[root].cycle_root.is_some() {
                // Absorbed into an enclosing cycle.
                return Ok(());
            }
            let members = cycle_members(&self.arena, root);
            let pending: Vec<FrameId> = members
                .iter()
                .copied()
                .filter(|&m| !self.arena[m].worklist.is_empty())
                .collect();
            if pending.is_empty() {
                break;
            }
            rounds += 1;
            if rounds > max_rounds {
                return Err(InferenceError::CycleDidNotConverge {
                    methods: self.cycle_names(root),
                    rounds: max_rounds,
                });
            }
            if !widened && rounds > max_rounds / 2 {
                widened = true;
                log::debug!("cycle at {} still changing after {} rounds", root, rounds);
                emit_cycle_widened(rounds, self.arena[root].name());
                for &m in &members {
                    self.mark_limited(m);
                }
            }
            for m in pending {
                self.typeinf_local(m)?;
            }
        }
        log::debug!("cycle at {} converged after {} rounds", root, rounds);
        self.finish_cycle(root)
    }

    fn cycle_names(&self, root: FrameId) -> Vec<String> {
        cycle_members(&self.arena, root)
            .into_iter()
            .map(|m| self.arena[m].name().to_string())
            .collect()
    }

    fn finish_cycle(&mut self, root: FrameId) -> Result<(), InferenceError> {
        let members = cycle_members(&self.arena, root);
        let valid = members
            .iter()
            .fold(WorldRange::ALL, |acc, &m| acc.intersect(&self.arena[m].valid));
        for &m in &members {
            self.arena[m].valid = valid;
        }
        for m in members {
            self.finish(m)?;
        }
        Ok(())
    }

    /// Mark a converged frame inferred and publish its result.
    fn finish(&mut self, id: FrameId) -> Result<(), InferenceError> {
        let world = self.interp.world;
        let cost = self.arena[id].optimize.then(|| self.frame_cost(id));
        let frame = &mut self.arena[id];
        if !frame.valid.contains(world) {
            return Err(InferenceError::InvalidValidityWindow {
                method: frame.name().to_string(),
                window: frame.valid,
                world,
            });
        }
        frame.inferred = true;
        self.finished.insert(frame.key.clone(), id);
        if frame.cached && !(frame.limited && frame.parent.is_some()) {
            let result = CachedResult {
                return_type: frame.bestguess.clone(),
                valid: frame.valid,
                limited: frame.limited,
                edges: frame.edges.clone(),
                ssa_types: frame.optimize.then(|| frame.ssa_types.clone()),
                cost,
            };
            frame.stored = self.interp.cache.insert_if_absent(frame.key.clone(), result);
            log::debug!(
                "{} {} finished: {} valid {} (cache write {})",
                id,
                frame.name(),
                frame.bestguess,
                frame.valid,
                if frame.stored { "stored" } else { "skipped" }
            );
        } else {
            log::debug!("{} {} finished: {} (not cached)", id, frame.name(), frame.bestguess);
        }
        Ok(())
    }

    /// Sum of the costs of every reached statement.
    pub fn frame_cost(&self, id: FrameId) -> u64 {
        let frame = &self.arena[id];
        frame
            .code
            .stmts
            .iter()
            .zip(&frame.states)
            .filter(|(_, state)| state.is_some())
            .map(|(stmt, _)| match stmt {
                Stmt::Assign { value, .. } | Stmt::Expr(value) => match value {
                    Expr::Builtin { op, .. } => {
                        u64::from(self.interp.tfuncs.cost(op).unwrap_or(0))
                    }
                    Expr::Call { .. } => CALL_COST,
                    Expr::New { .. } => NEW_COST,
                    Expr::Use(_) => 0,
                },
                _ => 0,
            })
            .sum()
    }
}

fn check_monotone(
    lattice: &TypeLattice<'_>,
    frame: &Frame<'_>,
    pc: usize,
    new: &AbstractValue,
    old: &AbstractValue,
) -> Result<(), InferenceError> {
    if cfg!(debug_assertions) && !lattice.subsumes(new, old) {
        return Err(InferenceError::NonMonotoneMerge {
            method: frame.name().to_string(),
            pc,
        });
    }
    Ok(())
}
