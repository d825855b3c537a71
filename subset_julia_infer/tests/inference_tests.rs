mod common;

use common::*;
use pretty_assertions::assert_eq;

use subset_julia_infer::config::InferenceConfig;
use subset_julia_infer::diagnostics::{DiagnosticReason, DiagnosticsCollector};
use subset_julia_infer::error::InferenceError;
use subset_julia_infer::ipo::{SpecKey, WorldRange};
use subset_julia_infer::ir::{Operand, Stmt};
use subset_julia_infer::lattice::{AbstractValue, ConstValue};
use subset_julia_infer::method_table::MethodId;
use subset_julia_infer::tfuncs::{builtins, TFuncContext};
use subset_julia_infer::types::JuliaType;

fn define_increment(p: &mut Program) -> MethodId {
    p.define(
        "f",
        vec![JuliaType::int64()],
        &["x"],
        vec![
            Stmt::Expr(builtin("add_int", vec![slot(0), int(1)])),
            Stmt::Return(ssa(0)),
        ],
    )
}

#[test]
fn test_constant_argument_folds_through_arithmetic() {
    let mut p = Program::new();
    let f = define_increment(&mut p);
    let result = p.infer(f, &[AbstractValue::int(2)]);
    assert_eq!(result.return_type, AbstractValue::int(3));
    assert!(!result.limited);
}

#[test]
fn test_isa_on_disjoint_type_is_false() {
    let mut p = Program::new();
    let f = p.define(
        "f",
        vec![JuliaType::Any],
        &["x"],
        vec![
            Stmt::Expr(builtin("isa", vec![slot(0), Operand::Type(JuliaType::int64())])),
            Stmt::Return(ssa(0)),
        ],
    );
    let result = p.infer(f, &[AbstractValue::exact(JuliaType::string())]);
    assert_eq!(result.return_type, AbstractValue::boolean(false));
}

#[test]
fn test_getfield_on_constant_named_tuple() {
    let mut p = Program::new();
    let f = p.define(
        "f",
        vec![JuliaType::Any],
        &["x"],
        vec![
            Stmt::Expr(builtin(
                "getfield",
                vec![slot(0), Operand::Const(ConstValue::Symbol("a".into()))],
            )),
            Stmt::Return(ssa(0)),
        ],
    );
    let nt = AbstractValue::Const(ConstValue::NamedTuple(vec![
        ("a".into(), ConstValue::Int64(1)),
        ("b".into(), ConstValue::String("s".into())),
    ]));
    assert_eq!(p.infer(f, &[nt]).return_type, AbstractValue::int(1));
}

#[test]
fn test_dispatch_outside_arity_is_bottom() {
    let p = Program::new();
    let mut ctx = TFuncContext::new(p.lattice());
    let tfuncs = builtins();
    assert_eq!(tfuncs.dispatch("add_int", &[int64()], &mut ctx), AbstractValue::Bottom);
    assert_eq!(
        tfuncs.dispatch("add_int", &[int64(), int64(), int64()], &mut ctx),
        AbstractValue::Bottom
    );
    assert_eq!(tfuncs.dispatch("isa", &[], &mut ctx), AbstractValue::Bottom);
}

#[test]
fn test_unknown_method_is_an_error() {
    let p = Program::new();
    let err = p
        .interp(1)
        .infer(MethodId(99), &[], &InferenceConfig::default())
        .unwrap_err();
    assert!(matches!(err, InferenceError::UnknownMethod(MethodId(99))), "{:?}", err);
}

#[test]
fn test_wrong_argument_count_is_unreachable() {
    let mut p = Program::new();
    let f = define_increment(&mut p);
    let result = p.infer(f, &[int64(), int64()]);
    assert_eq!(result.return_type, AbstractValue::Bottom);
    assert!(p.cache.is_empty());
}

#[test]
fn test_self_recursion_converges() {
    let mut p = Program::new();
    let fib = define_fib(&mut p);
    let result = p.infer(fib, &[AbstractValue::int(10)]);
    assert_eq!(result.return_type, int64());
    assert!(!result.edges.is_empty());

    let widened = p.infer(fib, &[int64()]);
    assert_eq!(widened.return_type, int64());
    assert!(widened.cached);
}

#[test]
fn test_mutual_recursion_reaches_a_fixpoint() {
    let mut p = Program::new();
    let (even, odd) = define_parity(&mut p);

    let first = p.infer(even, &[int64()]);
    assert_eq!(first.return_type, AbstractValue::bool_type());
    assert!(p.cache.contains(&SpecKey::new(even, vec![int64()]), 1));
    assert!(p.cache.contains(&SpecKey::new(odd, vec![int64()]), 1));

    // Re-running either member reproduces the cycle's answer.
    let again = p.infer(even, &[int64()]);
    assert_eq!(again.return_type, first.return_type);
    assert!(again.cached);
    assert_eq!(p.infer(odd, &[int64()]).return_type, AbstractValue::bool_type());

    let mut fresh = Program::new();
    let (_, fresh_odd) = define_parity(&mut fresh);
    assert_eq!(fresh.infer(fresh_odd, &[int64()]).return_type, AbstractValue::bool_type());
}

#[test]
fn test_cycle_joined_through_a_member_leaves_outer_caller_alone() {
    // t(n) = a(n); a(n) = n == 0 ? 1 : (b(n); c(n)); b(n) = a(n); c(n) = b(n)
    let mut p = Program::new();
    let forward = |to: &str| vec![Stmt::Expr(call(to, vec![slot(0)])), Stmt::Return(ssa(0))];
    let t = p.define("t", vec![JuliaType::int64()], &["n"], forward("a"));
    let a = p.define(
        "a",
        vec![JuliaType::int64()],
        &["n"],
        vec![
            Stmt::Expr(builtin("eq_int", vec![slot(0), int(0)])),
            Stmt::GotoIfNot {
                cond: ssa(0),
                dest: 3,
            },
            Stmt::Return(int(1)),
            Stmt::Expr(call("b", vec![slot(0)])),
            Stmt::Expr(call("c", vec![slot(0)])),
            Stmt::Return(ssa(4)),
        ],
    );
    p.define("b", vec![JuliaType::int64()], &["n"], forward("a"));
    p.define("c", vec![JuliaType::int64()], &["n"], forward("b"));

    let first = p.infer(t, &[int64()]);
    assert_eq!(first.return_type, AbstractValue::int(1));
    assert!(first.cached);
    assert!(p.cache.contains(&SpecKey::new(t, vec![int64()]), 1));
    assert!(p.cache.contains(&SpecKey::new(a, vec![int64()]), 1));

    let again = p.infer(t, &[int64()]);
    assert_eq!(again.return_type, first.return_type);
    assert_eq!(p.infer(a, &[int64()]).return_type, AbstractValue::int(1));
}

#[test]
fn test_mutual_recursion_with_constant_base_case() {
    let mut p = Program::new();
    let (even, _) = define_parity(&mut p);
    assert_eq!(p.infer(even, &[AbstractValue::int(0)]).return_type, AbstractValue::boolean(true));
    let lattice = p.lattice();
    let three = p.infer(even, &[AbstractValue::int(3)]).return_type;
    assert!(lattice.le(&three, &AbstractValue::bool_type()));
}

#[test]
fn test_validity_window_follows_method_definitions() {
    let mut p = Program::new();
    p.define("g", vec![JuliaType::Any], &["x"], vec![Stmt::Return(int(1))]);
    p.define_in(
        "g",
        vec![JuliaType::int64()],
        &["x"],
        vec![Stmt::Return(int(2))],
        WorldRange::since(10),
    );
    let f = p.define(
        "f",
        vec![JuliaType::int64()],
        &["x"],
        vec![Stmt::Expr(call("g", vec![slot(0)])), Stmt::Return(ssa(0))],
    );
    let config = InferenceConfig::default();

    let before = p.interp(5).infer(f, &[int64()], &config).unwrap();
    assert_eq!(before.return_type, AbstractValue::int(1));
    assert_eq!(before.valid, WorldRange::new(0, 9));

    let after = p.interp(10).infer(f, &[int64()], &config).unwrap();
    assert_eq!(after.return_type, AbstractValue::int(2));
    assert_eq!(after.valid, WorldRange::since(10));
    assert!(!after.valid.overlaps(&before.valid));

    let direct = p.interp(5).infer_call("g", &[int64()], &config).unwrap();
    assert_eq!(direct.valid, WorldRange::new(0, 9));
}

#[test]
fn test_unresolved_call_is_any_and_reported() {
    let mut p = Program::new();
    let f = p.define(
        "f",
        vec![JuliaType::int64()],
        &["x"],
        vec![Stmt::Expr(call("nope", vec![slot(0)])), Stmt::Return(ssa(0))],
    );
    DiagnosticsCollector::enable();
    DiagnosticsCollector::clear();
    let result = p.infer(f, &[int64()]);
    let diags = DiagnosticsCollector::take();
    DiagnosticsCollector::disable();

    assert_eq!(result.return_type, AbstractValue::Top);
    assert!(diags
        .iter()
        .any(|d| d.reason == DiagnosticReason::UnresolvedCall("nope".into())));
}

#[test]
fn test_global_cache_reuse() {
    let mut p = Program::new();
    let f = define_increment(&mut p);

    let first = p.infer(f, &[int64()]);
    assert!(first.cached);
    assert_eq!(p.cache.len(), 1);
    let second = p.infer(f, &[int64()]);
    assert!(second.cached);
    assert_eq!(second.return_type, first.return_type);

    let uncached = InferenceConfig {
        cached: false,
        ..InferenceConfig::default()
    };
    let other = p.infer_with(f, &[AbstractValue::int(7)], &uncached);
    assert_eq!(other.return_type, AbstractValue::int(8));
    assert!(!other.cached);
    assert_eq!(p.cache.len(), 1);
}

#[test]
fn test_optimize_retains_ssa_types_and_cost() {
    let mut p = Program::new();
    let f = define_increment(&mut p);
    let config = InferenceConfig {
        optimize: true,
        ..InferenceConfig::default()
    };
    let result = p.infer_with(f, &[AbstractValue::int(2)], &config);
    let ssa_types = result.ssa_types.expect("ssa types retained");
    assert_eq!(ssa_types.len(), 2);
    assert_eq!(ssa_types[0], AbstractValue::int(3));
    assert_eq!(result.cost, Some(1));

    let plain = p.infer(f, &[AbstractValue::int(2)]);
    assert!(plain.cached);
    assert_eq!(plain.ssa_types, None);
    assert_eq!(plain.cost, None);
}

#[test]
fn test_invoke_bypasses_dispatch() {
    let mut p = Program::new();
    p.define("g", vec![JuliaType::Any], &["x"], vec![Stmt::Return(int(1))]);
    p.define("g", vec![JuliaType::int64()], &["x"], vec![Stmt::Return(int(2))]);
    let via_invoke = p.define(
        "h",
        vec![JuliaType::int64()],
        &["x"],
        vec![
            Stmt::Expr(builtin(
                "invoke",
                vec![func("g"), Operand::Type(JuliaType::Tuple(vec![JuliaType::Any])), slot(0)],
            )),
            Stmt::Return(ssa(0)),
        ],
    );
    let via_call = p.define(
        "k",
        vec![JuliaType::int64()],
        &["x"],
        vec![Stmt::Expr(call("g", vec![slot(0)])), Stmt::Return(ssa(0))],
    );
    assert_eq!(p.infer(via_invoke, &[int64()]).return_type, AbstractValue::int(1));
    assert_eq!(p.infer(via_call, &[int64()]).return_type, AbstractValue::int(2));
}

#[test]
fn test_call_depth_limit() {
    let mut p = Program::new();
    p.limits.max_call_depth = 2;
    let chain = |next: &str| vec![Stmt::Expr(call(next, vec![])), Stmt::Return(ssa(0))];
    let a = p.define("a", vec![], &[], chain("b"));
    p.define("b", vec![], &[], chain("c"));
    let c = p.define("c", vec![], &[], chain("d"));
    p.define("d", vec![], &[], vec![Stmt::Return(int(1))]);

    let result = p.infer(a, &[]);
    assert_eq!(result.return_type, AbstractValue::Top);
    assert!(!p.cache.contains(&SpecKey::new(c, vec![]), 1));
}

#[test]
fn test_result_to_json() {
    let mut p = Program::new();
    let f = define_increment(&mut p);
    let result = p.infer(f, &[AbstractValue::int(2)]);
    insta::assert_snapshot!(
        result.to_json().unwrap(),
        @r###"{"return_type":{"Const":{"Int64":3}},"valid":{"min":0,"max":18446744073709551615},"cached":true,"limited":false,"edges":[]}"###
    );
}
