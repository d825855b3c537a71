//! Shared helpers for integration tests
// This helper module is consumed selectively by the integration test files.
#![allow(dead_code)]

use subset_julia_infer::config::{InferenceConfig, InferenceLimits};
use subset_julia_infer::ipo::{InferenceCache, WorldRange};
use subset_julia_infer::ir::{CodeInfo, Expr, Operand, Stmt};
use subset_julia_infer::lattice::{AbstractValue, ConstValue, TypeLattice};
use subset_julia_infer::method_table::{MethodId, MethodTable};
use subset_julia_infer::types::{JuliaType, TypeUniverse};
use subset_julia_infer::{AbstractInterpreter, InferenceResult};

/// A method table plus everything an interpreter borrows from.
pub struct Program {
    pub universe: TypeUniverse,
    pub table: MethodTable,
    pub limits: InferenceLimits,
    pub cache: InferenceCache,
}

impl Program {
    pub fn new() -> Self {
        Self {
            universe: TypeUniverse::new(),
            table: MethodTable::new(),
            limits: InferenceLimits::default(),
            cache: InferenceCache::new(),
        }
    }

    /// Define a method that exists in every world. The first `sig.len()`
    /// slots are the arguments.
    pub fn define(
        &mut self,
        name: &str,
        sig: Vec<JuliaType>,
        slots: &[&str],
        stmts: Vec<Stmt>,
    ) -> MethodId {
        self.define_in(name, sig, slots, stmts, WorldRange::ALL)
    }

    pub fn define_in(
        &mut self,
        name: &str,
        sig: Vec<JuliaType>,
        slots: &[&str],
        stmts: Vec<Stmt>,
        world: WorldRange,
    ) -> MethodId {
        let code = CodeInfo::new(name, slots, sig.len(), stmts);
        self.table
            .add(name, sig, None, code, world)
            .unwrap_or_else(|e| panic!("failed to define {}: {}", name, e))
    }

    pub fn interp(&self, world: u64) -> AbstractInterpreter<'_> {
        AbstractInterpreter::new(&self.universe, &self.table, &self.limits, &self.cache, world)
    }

    pub fn lattice(&self) -> TypeLattice<'_> {
        TypeLattice::new(&self.universe, &self.limits)
    }

    pub fn infer(&self, m: MethodId, args: &[AbstractValue]) -> InferenceResult {
        self.infer_with(m, args, &InferenceConfig::default())
    }

    pub fn infer_with(
        &self,
        m: MethodId,
        args: &[AbstractValue],
        config: &InferenceConfig,
    ) -> InferenceResult {
        self.interp(1)
            .infer(m, args, config)
            .unwrap_or_else(|e| panic!("inference failed: {}", e))
    }
}

pub fn slot(i: usize) -> Operand {
    Operand::Slot(i)
}

pub fn ssa(i: usize) -> Operand {
    Operand::Ssa(i)
}

pub fn int(v: i64) -> Operand {
    Operand::Const(ConstValue::Int64(v))
}

pub fn boolean(v: bool) -> Operand {
    Operand::Const(ConstValue::Bool(v))
}

pub fn func(name: &str) -> Operand {
    Operand::Const(ConstValue::Function(name.into()))
}

pub fn builtin(op: &str, args: Vec<Operand>) -> Expr {
    Expr::Builtin {
        op: op.into(),
        args,
    }
}

pub fn call(f: &str, args: Vec<Operand>) -> Expr {
    Expr::Call {
        func: f.into(),
        args,
    }
}

pub fn int64() -> AbstractValue {
    AbstractValue::exact(JuliaType::int64())
}

/// `fib(n::Int64) = n < 2 ? n : fib(n - 1) + fib(n - 2)`
pub fn define_fib(p: &mut Program) -> MethodId {
    p.define(
        "fib",
        vec![JuliaType::int64()],
        &["n"],
        vec![
            Stmt::Expr(builtin("slt_int", vec![slot(0), int(2)])),
            Stmt::GotoIfNot {
                cond: ssa(0),
                dest: 3,
            },
            Stmt::Return(slot(0)),
            Stmt::Expr(builtin("sub_int", vec![slot(0), int(1)])),
            Stmt::Expr(call("fib", vec![ssa(3)])),
            Stmt::Expr(builtin("sub_int", vec![slot(0), int(2)])),
            Stmt::Expr(call("fib", vec![ssa(5)])),
            Stmt::Expr(builtin("add_int", vec![ssa(4), ssa(6)])),
            Stmt::Return(ssa(7)),
        ],
    )
}

/// `is_even(n) = n == 0 ? true : is_odd(n - 1)` and its mirror image.
pub fn define_parity(p: &mut Program) -> (MethodId, MethodId) {
    let body = |result: bool, other: &str| {
        vec![
            Stmt::Expr(builtin("eq_int", vec![slot(0), int(0)])),
            Stmt::GotoIfNot {
                cond: ssa(0),
                dest: 3,
            },
            Stmt::Return(boolean(result)),
            Stmt::Expr(builtin("sub_int", vec![slot(0), int(1)])),
            Stmt::Expr(call(other, vec![ssa(3)])),
            Stmt::Return(ssa(4)),
        ]
    };
    let even = p.define("is_even", vec![JuliaType::int64()], &["n"], body(true, "is_odd"));
    let odd = p.define("is_odd", vec![JuliaType::int64()], &["n"], body(false, "is_even"));
    (even, odd)
}
