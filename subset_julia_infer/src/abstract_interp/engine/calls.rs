//! Call resolution between frames.
//!
//! A resolved call is answered, in order of preference, from:
//!
//! 1. the global cache, for a result valid in the current world
//! 2. a frame of this request that already finished
//! 3. an in-progress frame for the same specialization, which closes a
//!    recursion cycle
//! 4. a new child frame, run synchronously to its fixpoint
//!
//! A call to a method that already has an in-progress ancestor frame with
//! different arguments is widened first, so that recursion on ever-growing
//! argument types collapses into a cycle.

use crate::diagnostics::{emit_recursive_cycle, emit_unresolved_call};
use crate::error::InferenceError;
use crate::ipo::call_graph::push_unique;
use crate::ipo::recursion::{
    cycle_members, find_in_progress, find_same_method_ancestor, merge_cycle,
};
use crate::ipo::{Backedge, FrameId, SpecKey};
use crate::ir::Operand;
use crate::lattice::{AbstractValue, ConstValue};
use crate::method_table::{MethodMatch, SpecializationResolver};
use crate::tfuncs::{CallContext, TFuncContext};
use crate::types::JuliaType;

use super::super::conditional::{egal_conditional, isa_conditional};
use super::InferenceEngine;

/// The calling frame as seen by call-like transfer functions.
struct CallSite<'s, 'r, 'a> {
    engine: &'s mut InferenceEngine<'r, 'a>,
    frame: FrameId,
    pc: usize,
    error: Option<InferenceError>,
}

impl CallContext for CallSite<'_, '_, '_> {
    fn invoke(
        &mut self,
        name: &str,
        sig: &[JuliaType],
        argtypes: &[AbstractValue],
    ) -> AbstractValue {
        let interp = self.engine.interp;
        let Some(m) = interp
            .methods
            .resolve_exact(name, sig, interp.world, interp.oracle)
        else {
            emit_unresolved_call(name, self.engine.arena[self.frame].name());
            return AbstractValue::Top;
        };
        match self.engine.typeinf_edge(self.frame, self.pc, m, argtypes.to_vec()) {
            Ok(v) => v,
            Err(e) => {
                self.error.get_or_insert(e);
                AbstractValue::Top
            }
        }
    }
}

impl std::fmt::Debug for CallSite<'_, '_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSite")
            .field("frame", &self.frame)
            .field("pc", &self.pc)
            .finish()
    }
}

/// The single value an operand of `===` can be compared against.
fn singleton_operand(v: &AbstractValue) -> Option<ConstValue> {
    match v {
        AbstractValue::Const(c) => Some(c.clone()),
        AbstractValue::Concrete {
            ty: JuliaType::DataType { name, params },
            exact: true,
        } if name == "Nothing" && params.is_empty() => Some(ConstValue::Nothing),
        _ => None,
    }
}

impl<'r, 'a> InferenceEngine<'r, 'a> {
    pub(super) fn abstract_builtin(
        &mut self,
        id: FrameId,
        pc: usize,
        op: &str,
        operands: &[Operand],
        args: &[AbstractValue],
    ) -> Result<AbstractValue, InferenceError> {
        let lattice = self.lattice();
        let tfuncs = self.interp.tfuncs;
        let mut site = CallSite {
            engine: &mut *self,
            frame: id,
            pc,
            error: None,
        };
        let result = {
            let mut ctx = TFuncContext::with_call(lattice, &mut site);
            tfuncs.dispatch(op, args, &mut ctx)
        };
        if let Some(err) = site.error.take() {
            return Err(err);
        }
        let refined = match (op, operands, args) {
            ("isa", [Operand::Slot(slot), _], [x, t]) => {
                isa_conditional(&lattice, *slot, x, t, result)
            }
            ("===", [Operand::Slot(slot), _], [x, c])
            | ("===", [_, Operand::Slot(slot)], [c, x]) => {
                match singleton_operand(c) {
                    Some(c) => egal_conditional(&lattice, *slot, x, &c, result),
                    None => result,
                }
            }
            _ => result,
        };
        Ok(refined)
    }

    pub(super) fn abstract_call(
        &mut self,
        id: FrameId,
        pc: usize,
        func: &str,
        args: &[AbstractValue],
    ) -> Result<AbstractValue, InferenceError> {
        if args.iter().any(AbstractValue::is_bottom) {
            return Ok(AbstractValue::Bottom);
        }
        let lattice = self.lattice();
        let argtypes: Vec<AbstractValue> =
            args.iter().map(|a| lattice.widen_conditional(a)).collect();
        let types: Vec<JuliaType> = argtypes.iter().map(|a| lattice.widen_type(a)).collect();
        let interp = self.interp;
        let Some(m) = interp
            .methods
            .resolve(func, &types, interp.world, interp.oracle)
        else {
            log::debug!("{}: unresolved call {}({:?})", self.arena[id].name(), func, types);
            emit_unresolved_call(func, self.arena[id].name());
            return Ok(AbstractValue::Top);
        };
        self.typeinf_edge(id, pc, m, argtypes)
    }

    /// Infer the callee of a resolved call made at `(caller, pc)` and
    /// record the dependency in both directions.
    pub(crate) fn typeinf_edge(
        &mut self,
        caller: FrameId,
        pc: usize,
        m: MethodMatch,
        argtypes: Vec<AbstractValue>,
    ) -> Result<AbstractValue, InferenceError> {
        let methods: &'a dyn SpecializationResolver = self.interp.methods;
        let def = methods
            .method(m.method)
            .ok_or(InferenceError::UnknownMethod(m.method))?;
        self.arena[caller].narrow_valid(&m.valid);
        let mut key = SpecKey::new(m.method, argtypes);

        if let Some(v) = self.reuse_result(caller, pc, &key) {
            return Ok(v);
        }
        if let Some(ancestor) = find_same_method_ancestor(&self.arena, caller, m.method) {
            let ancestor_args = &self.arena[ancestor].key.argtypes;
            if let Some(widened) = self.limit_recursion(ancestor_args, &key.argtypes) {
                log::debug!(
                    "{}: recursion on {} widened to {:?}",
                    self.arena[caller].name(),
                    def.name,
                    widened
                );
                key = SpecKey::new(m.method, widened);
                if let Some(v) = self.reuse_result(caller, pc, &key) {
                    return Ok(v);
                }
            }
        }
        if self.arena[caller].depth + 1 > self.interp.limits.max_call_depth {
            log::debug!("{}: call depth limit reached at {}", self.arena[caller].name(), def.name);
            self.mark_limited(caller);
            return Ok(AbstractValue::Top);
        }

        let child = self.add_frame(key.clone(), def, Some(caller));
        self.typeinf(child)?;
        self.link(child, caller, pc, key);
        Ok(self.arena[child].bestguess.clone())
    }

    /// A result for `key` that needs no new frame.
    fn reuse_result(&mut self, caller: FrameId, pc: usize, key: &SpecKey) -> Option<AbstractValue> {
        let interp = self.interp;
        if let Some(hit) = interp.cache.get(key, interp.world) {
            log::debug!("cache hit for {}", key);
            let frame = &mut self.arena[caller];
            frame.narrow_valid(&hit.valid);
            push_unique(&mut frame.edges, key.clone());
            return Some(hit.return_type);
        }
        if let Some(&done) = self.finished.get(key) {
            self.link(done, caller, pc, key.clone());
            return Some(self.arena[done].bestguess.clone());
        }
        let active = find_in_progress(&self.arena, caller, key)?;
        let root = merge_cycle(&mut self.arena, caller, active);
        let names: Vec<String> = cycle_members(&self.arena, root)
            .into_iter()
            .map(|m| self.arena[m].name().to_string())
            .collect();
        log::debug!("recursion cycle rooted at {}: [{}]", root, names.join(", "));
        emit_recursive_cycle(names);
        self.link(active, caller, pc, key.clone());
        let lattice = self.lattice();
        Some(lattice.widen_conditional(&self.arena[active].bestguess))
    }

    /// Record that `caller` consumed the result of `callee` at `pc`.
    fn link(&mut self, callee: FrameId, caller: FrameId, pc: usize, key: SpecKey) {
        push_unique(&mut self.arena[callee].backedges, Backedge { caller, pc });
        let valid = self.arena[callee].valid;
        let frame = &mut self.arena[caller];
        frame.narrow_valid(&valid);
        push_unique(&mut frame.edges, key);
    }

    /// Merge the argument types of a recursive call into those of its
    /// ancestor, widened so that repeated recursion stabilizes.
    fn limit_recursion(
        &self,
        ancestor: &[AbstractValue],
        new: &[AbstractValue],
    ) -> Option<Vec<AbstractValue>> {
        if ancestor.len() != new.len() || ancestor == new {
            return None;
        }
        let lattice = self.lattice();
        Some(
            ancestor
                .iter()
                .zip(new)
                .map(|(a, b)| lattice.limit_value(&lattice.widen_to_concrete(&lattice.merge(a, b))))
                .collect(),
        )
    }
}
