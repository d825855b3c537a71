//! Transfer functions for arithmetic, comparison, conversion and checked
//! arithmetic builtins.
//!
//! Intrinsics (`add_int`, `lt_float`, ...) operate on operands of one
//! primitive type and return that type. The generic operators (`+`, `<`,
//! ...) apply numeric promotion. All of them fold when every operand is a
//! known constant.

use crate::error::RegistryError;
use crate::lattice::{AbstractValue, ConstValue};
use crate::types::JuliaType;

use super::registry::{TFuncContext, TransferFunctions};
use super::{leaf_value, type_operand};

const INT_BINARY: [&str; 11] = [
    "add_int", "sub_int", "mul_int", "sdiv_int", "srem_int", "and_int", "or_int", "xor_int",
    "shl_int", "lshr_int", "ashr_int",
];
const INT_COMPARE: [&str; 6] = ["eq_int", "ne_int", "slt_int", "sle_int", "ult_int", "ule_int"];
const FLOAT_COMPARE: [&str; 4] = ["eq_float", "ne_float", "lt_float", "le_float"];
const GENERIC_COMPARE: [&str; 4] = ["==", "!=", "<", "<="];

pub fn register_arithmetic(registry: &mut TransferFunctions) -> Result<(), RegistryError> {
    for op in INT_BINARY {
        registry.register(op, 2, 2, tfunc_int_binary, 1)?;
    }
    registry.register("neg_int", 1, 1, tfunc_int_unary, 1)?;
    registry.register("not_int", 1, 1, tfunc_int_unary, 1)?;
    for op in ["add_float", "sub_float", "mul_float"] {
        registry.register(op, 2, 2, tfunc_float_binary, 1)?;
    }
    registry.register("div_float", 2, 2, tfunc_float_binary, 20)?;
    registry.register("neg_float", 1, 1, tfunc_float_unary, 1)?;
    for op in ["+", "-", "*"] {
        registry.register(op, 2, 2, tfunc_promoting_binary, 1)?;
    }
    registry.register("/", 2, 2, tfunc_promoting_binary, 20)?;
    for op in ["bitcast", "sitofp", "fptosi", "trunc_int", "sext_int", "zext_int"] {
        registry.register(op, 2, 2, tfunc_convert, 1)?;
    }
    Ok(())
}

pub fn register_comparison(registry: &mut TransferFunctions) -> Result<(), RegistryError> {
    for op in INT_COMPARE
        .into_iter()
        .chain(FLOAT_COMPARE)
        .chain(GENERIC_COMPARE)
    {
        registry.register(op, 2, 2, tfunc_compare, 1)?;
    }
    Ok(())
}

pub fn register_checked(registry: &mut TransferFunctions) -> Result<(), RegistryError> {
    for op in ["checked_sadd_int", "checked_ssub_int", "checked_smul_int"] {
        registry.register(op, 2, 2, tfunc_checked, 2)?;
    }
    Ok(())
}

/// Outcome of evaluating a builtin on constants.
#[derive(Debug, Clone, PartialEq)]
pub enum Folded {
    Value(ConstValue),
    /// The operation always throws for these operands.
    Throws,
}

/// Evaluate a binary intrinsic or generic numeric operator on constants.
///
/// Integer intrinsics wrap on overflow. Returns `None` when the operation
/// cannot be evaluated at compile time.
///
/// ```text
/// fold_binary("add_int", 2, 1)      => Value(3)
/// fold_binary("sdiv_int", 1, 0)     => Throws
/// fold_binary("/", 1, 2)            => Value(0.5)
/// fold_binary("<", 1, 2.5)          => Value(true)
/// ```
pub fn fold_binary(op: &str, lhs: &ConstValue, rhs: &ConstValue) -> Option<Folded> {
    use ConstValue::{Bool, Float64, Int64};
    let value = match (op, lhs, rhs) {
        ("add_int" | "+", Int64(a), Int64(b)) => Int64(a.wrapping_add(*b)),
        ("sub_int" | "-", Int64(a), Int64(b)) => Int64(a.wrapping_sub(*b)),
        ("mul_int" | "*", Int64(a), Int64(b)) => Int64(a.wrapping_mul(*b)),
        ("sdiv_int", Int64(a), Int64(b)) => match a.checked_div(*b) {
            Some(q) => Int64(q),
            None => return Some(Folded::Throws),
        },
        ("srem_int", Int64(a), Int64(b)) => {
            if *b == 0 {
                return Some(Folded::Throws);
            }
            Int64(a.wrapping_rem(*b))
        }
        ("and_int", Int64(a), Int64(b)) => Int64(a & b),
        ("or_int", Int64(a), Int64(b)) => Int64(a | b),
        ("xor_int", Int64(a), Int64(b)) => Int64(a ^ b),
        ("and_int", Bool(a), Bool(b)) => Bool(*a && *b),
        ("or_int", Bool(a), Bool(b)) => Bool(*a || *b),
        ("xor_int", Bool(a), Bool(b)) => Bool(a != b),
        ("shl_int", Int64(a), Int64(b)) => Int64(shift(*b).map_or(0, |s| a.wrapping_shl(s))),
        ("lshr_int", Int64(a), Int64(b)) => {
            Int64(shift(*b).map_or(0, |s| ((*a as u64) >> s) as i64))
        }
        ("ashr_int", Int64(a), Int64(b)) => Int64(a >> shift(*b).unwrap_or(63)),

        ("add_float" | "+", Float64(a), Float64(b)) => Float64(a + b),
        ("sub_float" | "-", Float64(a), Float64(b)) => Float64(a - b),
        ("mul_float" | "*", Float64(a), Float64(b)) => Float64(a * b),
        ("div_float" | "/", Float64(a), Float64(b)) => Float64(a / b),
        ("/", Int64(a), Int64(b)) => Float64(*a as f64 / *b as f64),

        ("eq_int" | "==", Int64(a), Int64(b)) => Bool(a == b),
        ("ne_int" | "!=", Int64(a), Int64(b)) => Bool(a != b),
        ("slt_int" | "<", Int64(a), Int64(b)) => Bool(a < b),
        ("sle_int" | "<=", Int64(a), Int64(b)) => Bool(a <= b),
        ("ult_int", Int64(a), Int64(b)) => Bool((*a as u64) < (*b as u64)),
        ("ule_int", Int64(a), Int64(b)) => Bool((*a as u64) <= (*b as u64)),
        ("eq_int" | "==", Bool(a), Bool(b)) => Bool(a == b),
        ("ne_int" | "!=", Bool(a), Bool(b)) => Bool(a != b),
        ("eq_float" | "==", Float64(a), Float64(b)) => Bool(a == b),
        ("ne_float" | "!=", Float64(a), Float64(b)) => Bool(a != b),
        ("lt_float" | "<", Float64(a), Float64(b)) => Bool(a < b),
        ("le_float" | "<=", Float64(a), Float64(b)) => Bool(a <= b),

        // Mixed generic arithmetic promotes to Float64.
        ("+" | "-" | "*" | "/", Int64(a), Float64(_)) => {
            return fold_binary(op, &Float64(*a as f64), rhs)
        }
        ("+" | "-" | "*" | "/", Float64(_), Int64(b)) => {
            return fold_binary(op, lhs, &Float64(*b as f64))
        }
        // Mixed comparisons are exact: an integer with no exact Float64
        // image is not folded.
        ("==" | "!=" | "<" | "<=", Int64(a), Float64(_)) => {
            return fold_binary(op, &Float64(exact_f64(*a)?), rhs)
        }
        ("==" | "!=" | "<" | "<=", Float64(_), Int64(b)) => {
            return fold_binary(op, lhs, &Float64(exact_f64(*b)?))
        }

        ("==" | "!=", a, b) => Bool(generic_eq(a, b)? == (op == "==")),
        _ => return None,
    };
    Some(Folded::Value(value))
}

/// `a` as a Float64, if that conversion is lossless.
fn exact_f64(a: i64) -> Option<f64> {
    (a.unsigned_abs() <= 1 << 53).then_some(a as f64)
}

/// Generic `==` between two constants, or `None` when it is not decided.
///
/// Numbers compare by value, so `0.0 == -0.0` and `NaN != NaN`; tuples and
/// named tuples compare element-wise. Struct instances compare with `===`.
fn generic_eq(a: &ConstValue, b: &ConstValue) -> Option<bool> {
    use ConstValue::*;
    match (a, b) {
        (Float64(x), Float64(y)) => Some(x == y),
        (Int64(i), Float64(f)) | (Float64(f), Int64(i)) => Some(exact_f64(*i)? == *f),
        (Tuple(xs), Tuple(ys)) => {
            if xs.len() != ys.len() {
                return Some(false);
            }
            all_eq(xs.iter().zip(ys).map(|(x, y)| generic_eq(x, y)))
        }
        (NamedTuple(xs), NamedTuple(ys)) => {
            let same_names = xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x.0 == y.0);
            if !same_names {
                return Some(false);
            }
            all_eq(xs.iter().zip(ys).map(|(x, y)| generic_eq(&x.1, &y.1)))
        }
        (a, b) if std::mem::discriminant(a) == std::mem::discriminant(b) => Some(a == b),
        _ => None,
    }
}

/// `false` if any element is unequal, otherwise `true` only if all are known.
fn all_eq(results: impl Iterator<Item = Option<bool>>) -> Option<bool> {
    let mut known = true;
    for r in results {
        match r {
            Some(false) => return Some(false),
            Some(true) => {}
            None => known = false,
        }
    }
    known.then_some(true)
}

/// Evaluate a unary intrinsic on a constant.
pub fn fold_unary(op: &str, x: &ConstValue) -> Option<ConstValue> {
    match (op, x) {
        ("neg_int", ConstValue::Int64(a)) => Some(ConstValue::Int64(a.wrapping_neg())),
        ("not_int", ConstValue::Int64(a)) => Some(ConstValue::Int64(!a)),
        ("not_int", ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
        ("neg_float", ConstValue::Float64(f)) => Some(ConstValue::Float64(-f)),
        _ => None,
    }
}

fn shift(amount: i64) -> Option<u32> {
    u32::try_from(amount).ok().filter(|s| *s < 64)
}

fn fold_args(op: &str, args: &[AbstractValue]) -> Option<AbstractValue> {
    let [AbstractValue::Const(a), AbstractValue::Const(b)] = args else {
        return None;
    };
    match fold_binary(op, a, b)? {
        Folded::Value(v) => Some(AbstractValue::constant(v)),
        Folded::Throws => Some(AbstractValue::Bottom),
    }
}

/// The result of an intrinsic whose operand must lie in `domain`: the
/// operand's own type.
fn same_type_result(
    x: &AbstractValue,
    domain: &JuliaType,
    ctx: &TFuncContext<'_>,
) -> AbstractValue {
    let ty = ctx.lattice.widen_type(x);
    if ctx.oracle().is_disjoint(&ty, domain) {
        return AbstractValue::Bottom;
    }
    if ctx.oracle().is_subtype(&ty, domain) {
        return leaf_value(ctx, ty);
    }
    leaf_value(ctx, ctx.oracle().intersect(&ty, domain))
}

fn operands_in(args: &[AbstractValue], domain: &JuliaType, ctx: &TFuncContext<'_>) -> bool {
    args.iter()
        .all(|a| !ctx.oracle().is_disjoint(&ctx.lattice.widen_type(a), domain))
}

/// Integer intrinsics.
///
/// ```text
/// add_int(Const(2), Const(1))   => Const(3)
/// add_int(Int64, Int64)         => Int64
/// add_int(String, Int64)        => Union{}
/// ```
pub fn tfunc_int_binary(
    op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    if let Some(folded) = fold_args(op, args) {
        return folded;
    }
    let integer = JuliaType::named("Integer");
    if !operands_in(args, &integer, ctx) {
        return AbstractValue::Bottom;
    }
    same_type_result(&args[0], &integer, ctx)
}

pub fn tfunc_int_unary(
    op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    if let Some(c) = args[0].as_const().and_then(|c| fold_unary(op, c)) {
        return AbstractValue::constant(c);
    }
    same_type_result(&args[0], &JuliaType::named("Integer"), ctx)
}

pub fn tfunc_float_binary(
    op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    if let Some(folded) = fold_args(op, args) {
        return folded;
    }
    let float = JuliaType::named("AbstractFloat");
    if !operands_in(args, &float, ctx) {
        return AbstractValue::Bottom;
    }
    same_type_result(&args[0], &float, ctx)
}

pub fn tfunc_float_unary(
    op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    if let Some(c) = args[0].as_const().and_then(|c| fold_unary(op, c)) {
        return AbstractValue::constant(c);
    }
    same_type_result(&args[0], &JuliaType::named("AbstractFloat"), ctx)
}

/// Generic `+`, `-`, `*` and `/`.
///
/// ```text
/// +(Const(1), Const(2.5))   => Const(3.5)
/// +(Int64, Float64)         => Float64
/// /(Int64, Int64)           => Float64
/// +(Int64, Real)            => <:Number
/// ```
pub fn tfunc_promoting_binary(
    op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    if let Some(folded) = fold_args(op, args) {
        return folded;
    }
    let ta = ctx.lattice.widen_type(&args[0]);
    let tb = ctx.lattice.widen_type(&args[1]);
    let number = JuliaType::named("Number");
    let oracle = ctx.oracle();
    // Non-numeric operands dispatch to user methods not modelled here.
    if !oracle.is_subtype(&ta, &number) || !oracle.is_subtype(&tb, &number) {
        return AbstractValue::Top;
    }
    let promoted = match (ta.datatype_name(), tb.datatype_name()) {
        (Some(x), Some(y)) if oracle.is_leaf_type(&ta) && oracle.is_leaf_type(&tb) => {
            promote_numeric(x, y, op == "/")
        }
        _ => None,
    };
    match promoted {
        Some(name) => AbstractValue::exact(JuliaType::named(name)),
        None => AbstractValue::concrete(number),
    }
}

/// Comparison intrinsics and generic comparison operators.
pub fn tfunc_compare(
    op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    if let Some(folded) = fold_args(op, args) {
        return folded;
    }
    let domain = if INT_COMPARE.contains(&op) {
        JuliaType::named("Integer")
    } else if FLOAT_COMPARE.contains(&op) {
        JuliaType::named("AbstractFloat")
    } else if op == "<" || op == "<=" {
        let number = JuliaType::named("Number");
        let numeric = args
            .iter()
            .all(|a| ctx.oracle().is_subtype(&ctx.lattice.widen_type(a), &number));
        return if numeric {
            AbstractValue::bool_type()
        } else {
            AbstractValue::Top
        };
    } else {
        return AbstractValue::bool_type();
    };
    if !operands_in(args, &domain, ctx) {
        return AbstractValue::Bottom;
    }
    AbstractValue::bool_type()
}

/// Overflow-checked integer arithmetic, returning `(result, overflowed)`.
///
/// ```text
/// checked_sadd_int(Const(typemax(Int64)), Const(1))  => Const((typemin(Int64), true))
/// checked_smul_int(Int64, Int64)                     => Tuple{Int64, Bool}
/// ```
pub fn tfunc_checked(
    op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    if let [
        AbstractValue::Const(ConstValue::Int64(a)),
        AbstractValue::Const(ConstValue::Int64(b)),
    ] = args
    {
        let (value, overflow) = match op {
            "checked_sadd_int" => a.overflowing_add(*b),
            "checked_ssub_int" => a.overflowing_sub(*b),
            _ => a.overflowing_mul(*b),
        };
        return AbstractValue::Const(ConstValue::Tuple(vec![
            ConstValue::Int64(value),
            ConstValue::Bool(overflow),
        ]));
    }
    let integer = JuliaType::named("Integer");
    if !operands_in(args, &integer, ctx) {
        return AbstractValue::Bottom;
    }
    let value = same_type_result(&args[0], &integer, ctx);
    let ty = ctx.lattice.widen_type(&value);
    leaf_value(ctx, JuliaType::Tuple(vec![ty, JuliaType::bool()]))
}

/// Conversion intrinsics: `op(T, x)` produces an instance of `T`.
pub fn tfunc_convert(
    op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    let target = match &args[0] {
        AbstractValue::TypeOf { ty, exact: false } => return AbstractValue::concrete(ty.clone()),
        other => match type_operand(other) {
            Some(t) => t.clone(),
            None => return AbstractValue::Top,
        },
    };
    if let Some(c) = args[1].as_const().and_then(|c| fold_convert(op, &target, c)) {
        return AbstractValue::constant(c);
    }
    leaf_value(ctx, target)
}

fn fold_convert(op: &str, target: &JuliaType, x: &ConstValue) -> Option<ConstValue> {
    let name = target.datatype_name()?;
    match (op, name, x) {
        ("sitofp", "Float64", ConstValue::Int64(i)) => Some(ConstValue::Float64(*i as f64)),
        ("fptosi", "Int64", ConstValue::Float64(f))
            if f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
        {
            Some(ConstValue::Int64(*f as i64))
        }
        ("bitcast", "Float64", ConstValue::Int64(i)) => {
            Some(ConstValue::Float64(f64::from_bits(*i as u64)))
        }
        ("bitcast", "Int64", ConstValue::Float64(f)) => Some(ConstValue::Int64(f.to_bits() as i64)),
        ("bitcast" | "trunc_int" | "sext_int" | "zext_int", "Int64", ConstValue::Int64(i)) => {
            Some(ConstValue::Int64(*i))
        }
        ("bitcast", "Float64", ConstValue::Float64(f)) => Some(ConstValue::Float64(*f)),
        _ => None,
    }
}

const INT_RANKS: [&str; 6] = ["Bool", "Int8", "UInt8", "Int32", "Int64", "UInt64"];
const FLOAT_RANKS: [&str; 2] = ["Float32", "Float64"];

/// Promoted result type of a binary numeric operation on two leaf types.
/// `float_result` forces a floating-point result, as for `/`.
pub fn promote_numeric(a: &str, b: &str, float_result: bool) -> Option<&'static str> {
    let int_rank = |n: &str| INT_RANKS.iter().position(|r| *r == n);
    let float_rank = |n: &str| FLOAT_RANKS.iter().position(|r| *r == n);
    let name = match (int_rank(a), int_rank(b), float_rank(a), float_rank(b)) {
        (Some(_), Some(_), _, _) if float_result => "Float64",
        (Some(x), Some(y), _, _) => match INT_RANKS[x.max(y)] {
            "Bool" => "Int64",
            other => other,
        },
        (_, _, Some(x), Some(y)) => FLOAT_RANKS[x.max(y)],
        (Some(_), _, _, Some(y)) => FLOAT_RANKS[y],
        (_, Some(_), Some(x), _) => FLOAT_RANKS[x],
        _ => return None,
    };
    Some(name)
}
