//! Type predicates and value-level control builtins.
//!
//! `isa`, `<:` and `===` answer with a constant whenever the relation is
//! decidable from the abstract operands alone. The engine turns slot-based
//! `isa` and `===` results into `Conditional` values; this module only
//! computes the plain answer.

use crate::error::RegistryError;
use crate::lattice::AbstractValue;
use crate::types::JuliaType;

use super::registry::{TFuncContext, TransferFunctions};
use super::{cannot_be_type, type_bound};

pub fn register_predicates(registry: &mut TransferFunctions) -> Result<(), RegistryError> {
    registry.register("isa", 2, 2, tfunc_isa, 1)?;
    registry.register("<:", 2, 2, tfunc_subtype, 1)?;
    registry.register("typeassert", 2, 2, tfunc_typeassert, 1)?;
    registry.register("typeof", 1, 1, tfunc_typeof, 1)?;
    registry.register("===", 2, 2, tfunc_egal, 1)?;
    registry.register("ifelse", 3, 3, tfunc_ifelse, 1)?;
    registry.register("throw", 1, 1, tfunc_throw, 0)?;
    Ok(())
}

/// Whether every value described by `v` has exactly the runtime type
/// `widen_type(v)`.
fn has_exact_runtime_type(v: &AbstractValue) -> bool {
    match v {
        AbstractValue::Const(c) => c.has_exact_type(),
        AbstractValue::Concrete { exact, .. } => *exact,
        _ => false,
    }
}

/// Decide `isa(x, T)` where `T` is bounded by `t`.
pub fn isa_answer(
    ctx: &TFuncContext<'_>,
    x: &AbstractValue,
    t: &JuliaType,
    exact: bool,
) -> AbstractValue {
    let oracle = ctx.oracle();
    let tx = ctx.lattice.widen_type(x);
    if oracle.is_disjoint(&tx, t) {
        return AbstractValue::boolean(false);
    }
    if !exact {
        return AbstractValue::bool_type();
    }
    if oracle.is_subtype(&tx, t) {
        return AbstractValue::boolean(true);
    }
    if has_exact_runtime_type(x) {
        return AbstractValue::boolean(false);
    }
    AbstractValue::bool_type()
}

/// `isa(x, T)`.
///
/// ```text
/// isa(String, Type{Int64})       => Const(false)
/// isa(Const(1), Type{Integer})   => Const(true)
/// isa(<:Real, Type{Int64})       => Bool
/// ```
pub fn tfunc_isa(_op: &str, args: &[AbstractValue], ctx: &mut TFuncContext<'_>) -> AbstractValue {
    match type_bound(&args[1]) {
        Some((t, exact)) => isa_answer(ctx, &args[0], &t, exact),
        None if cannot_be_type(ctx, &args[1]) => AbstractValue::Bottom,
        None => AbstractValue::bool_type(),
    }
}

/// `A <: B`.
pub fn tfunc_subtype(
    _op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    let oracle = ctx.oracle();
    match (type_bound(&args[0]), type_bound(&args[1])) {
        (Some((a, true)), Some((b, true))) => AbstractValue::boolean(oracle.is_subtype(&a, &b)),
        // Some subtype of `a` is still a subtype of `b`.
        (Some((a, false)), Some((b, true))) if oracle.is_subtype(&a, &b) => {
            AbstractValue::boolean(true)
        }
        (Some(_), Some(_)) => AbstractValue::bool_type(),
        _ if cannot_be_type(ctx, &args[0]) || cannot_be_type(ctx, &args[1]) => {
            AbstractValue::Bottom
        }
        _ => AbstractValue::bool_type(),
    }
}

/// `typeassert(x, T)`: `x` narrowed to `T`, or `Bottom` when the assertion
/// always fails.
pub fn tfunc_typeassert(
    _op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    let x = &args[0];
    match type_bound(&args[1]) {
        Some((t, exact)) => {
            let tx = ctx.lattice.widen_type(x);
            if exact && has_exact_runtime_type(x) && !ctx.oracle().is_subtype(&tx, &t) {
                return AbstractValue::Bottom;
            }
            ctx.lattice.narrow(x, &t)
        }
        None if cannot_be_type(ctx, &args[1]) => AbstractValue::Bottom,
        None => x.clone(),
    }
}

/// `typeof(x)`.
///
/// The type of a type value is not modelled and yields `Any`.
pub fn tfunc_typeof(
    _op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    typeof_value(ctx, &args[0])
}

fn typeof_value(ctx: &TFuncContext<'_>, x: &AbstractValue) -> AbstractValue {
    match x {
        AbstractValue::Bottom => AbstractValue::Bottom,
        AbstractValue::Top => AbstractValue::type_value(JuliaType::Any, false),
        AbstractValue::Const(c) => AbstractValue::type_value(c.julia_type(), c.has_exact_type()),
        AbstractValue::Concrete { ty, exact } => AbstractValue::type_value(ty.clone(), *exact),
        AbstractValue::Conditional { .. } => AbstractValue::type_value(JuliaType::bool(), true),
        AbstractValue::TypeOf { .. } | AbstractValue::PartialTypeVar(_) => AbstractValue::Top,
        AbstractValue::Union2(..) => x
            .leaves()
            .into_iter()
            .map(|leaf| typeof_value(ctx, leaf))
            .fold(AbstractValue::Bottom, |acc, t| ctx.lattice.merge(&acc, &t)),
    }
}

/// `a === b`, egality.
pub fn tfunc_egal(_op: &str, args: &[AbstractValue], ctx: &mut TFuncContext<'_>) -> AbstractValue {
    let (a, b) = (&args[0], &args[1]);
    match (a, b) {
        (AbstractValue::Const(x), AbstractValue::Const(y)) => return AbstractValue::boolean(x == y),
        (
            AbstractValue::TypeOf {
                ty: x,
                exact: true,
            },
            AbstractValue::TypeOf {
                ty: y,
                exact: true,
            },
        ) if !x.has_free_type_vars() && !y.has_free_type_vars() => {
            return AbstractValue::boolean(x == y)
        }
        _ => {}
    }
    let oracle = ctx.oracle();
    let ta = ctx.lattice.widen_type(a);
    let tb = ctx.lattice.widen_type(b);
    if oracle.is_disjoint(&ta, &tb) {
        return AbstractValue::boolean(false);
    }
    // Two instances of a field-less, zero-sized leaf type are the same value.
    if has_exact_runtime_type(a)
        && has_exact_runtime_type(b)
        && ta == tb
        && oracle.sizeof(&ta) == Some(0)
        && oracle.field_types(&ta).is_some_and(|f| f.is_empty())
    {
        return AbstractValue::boolean(true);
    }
    AbstractValue::bool_type()
}

/// `ifelse(c, a, b)`.
pub fn tfunc_ifelse(
    _op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    match args[0].as_const().and_then(|c| c.as_bool()) {
        Some(true) => args[1].clone(),
        Some(false) => args[2].clone(),
        None => {
            let tc = ctx.lattice.widen_type(&args[0]);
            if ctx.oracle().is_disjoint(&tc, &JuliaType::bool()) {
                AbstractValue::Bottom
            } else {
                ctx.lattice.merge(&args[1], &args[2])
            }
        }
    }
}

pub fn tfunc_throw(
    _op: &str,
    _args: &[AbstractValue],
    _ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    AbstractValue::Bottom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InferenceLimits;
    use crate::lattice::{ConstValue, TypeLattice};
    use crate::tfuncs::builtins;
    use crate::types::{TypeUniverse, TypeVar};

    fn eval(op: &str, args: &[AbstractValue]) -> AbstractValue {
        let universe = TypeUniverse::new();
        let limits = InferenceLimits::default();
        let mut ctx = TFuncContext::new(TypeLattice::new(&universe, &limits));
        builtins().dispatch(op, args, &mut ctx)
    }

    fn ty(t: JuliaType) -> AbstractValue {
        AbstractValue::type_value(t, true)
    }

    #[test]
    fn test_isa_disjoint_is_false() {
        assert_eq!(
            eval(
                "isa",
                &[AbstractValue::exact(JuliaType::string()), ty(JuliaType::int64())]
            ),
            AbstractValue::boolean(false)
        );
    }

    #[test]
    fn test_isa_subtype_is_true() {
        assert_eq!(
            eval("isa", &[AbstractValue::int(1), ty(JuliaType::named("Integer"))]),
            AbstractValue::boolean(true)
        );
        assert_eq!(
            eval(
                "isa",
                &[
                    AbstractValue::concrete(JuliaType::named("Signed")),
                    ty(JuliaType::named("Real"))
                ]
            ),
            AbstractValue::boolean(true)
        );
    }

    #[test]
    fn test_isa_undecidable() {
        assert_eq!(
            eval(
                "isa",
                &[AbstractValue::concrete(JuliaType::named("Real")), ty(JuliaType::int64())]
            ),
            AbstractValue::bool_type()
        );
        assert_eq!(
            eval("isa", &[AbstractValue::Top, ty(JuliaType::int64())]),
            AbstractValue::bool_type()
        );
        assert_eq!(
            eval("isa", &[AbstractValue::Top, AbstractValue::int(3)]),
            AbstractValue::Bottom
        );
    }

    #[test]
    fn test_subtype_predicate() {
        assert_eq!(
            eval("<:", &[ty(JuliaType::int64()), ty(JuliaType::named("Number"))]),
            AbstractValue::boolean(true)
        );
        assert_eq!(
            eval("<:", &[ty(JuliaType::string()), ty(JuliaType::named("Number"))]),
            AbstractValue::boolean(false)
        );
        assert_eq!(
            eval(
                "<:",
                &[
                    AbstractValue::type_value(JuliaType::named("Real"), false),
                    ty(JuliaType::int64())
                ]
            ),
            AbstractValue::bool_type()
        );
        assert_eq!(
            eval(
                "<:",
                &[
                    AbstractValue::PartialTypeVar(TypeVar::new("T", JuliaType::named("Signed"))),
                    ty(JuliaType::named("Integer"))
                ]
            ),
            AbstractValue::boolean(true)
        );
    }

    #[test]
    fn test_typeassert_narrows() {
        let u = AbstractValue::Union2(
            Box::new(AbstractValue::exact(JuliaType::int64())),
            Box::new(AbstractValue::exact(JuliaType::nothing())),
        );
        assert_eq!(
            eval("typeassert", &[u, ty(JuliaType::int64())]),
            AbstractValue::exact(JuliaType::int64())
        );
        assert_eq!(
            eval("typeassert", &[AbstractValue::int(1), ty(JuliaType::string())]),
            AbstractValue::Bottom
        );
        assert_eq!(
            eval("typeassert", &[AbstractValue::Top, ty(JuliaType::string())]),
            AbstractValue::exact(JuliaType::string())
        );
    }

    #[test]
    fn test_typeof() {
        assert_eq!(eval("typeof", &[AbstractValue::int(1)]), ty(JuliaType::int64()));
        assert_eq!(
            eval("typeof", &[AbstractValue::concrete(JuliaType::named("Real"))]),
            AbstractValue::type_value(JuliaType::named("Real"), false)
        );
        assert_eq!(eval("typeof", &[ty(JuliaType::int64())]), AbstractValue::Top);
    }

    #[test]
    fn test_egal() {
        assert_eq!(
            eval("===", &[AbstractValue::int(1), AbstractValue::int(1)]),
            AbstractValue::boolean(true)
        );
        assert_eq!(
            eval(
                "===",
                &[AbstractValue::int(1), AbstractValue::exact(JuliaType::string())]
            ),
            AbstractValue::boolean(false)
        );
        assert_eq!(
            eval(
                "===",
                &[
                    AbstractValue::exact(JuliaType::nothing()),
                    AbstractValue::Const(ConstValue::Nothing)
                ]
            ),
            AbstractValue::boolean(true)
        );
        assert_eq!(
            eval(
                "===",
                &[AbstractValue::exact(JuliaType::int64()), AbstractValue::int(2)]
            ),
            AbstractValue::bool_type()
        );
    }

    #[test]
    fn test_ifelse_and_throw() {
        let a = AbstractValue::int(1);
        let b = AbstractValue::exact(JuliaType::string());
        assert_eq!(
            eval("ifelse", &[AbstractValue::boolean(false), a.clone(), b.clone()]),
            b
        );
        assert!(matches!(
            eval("ifelse", &[AbstractValue::bool_type(), a.clone(), b.clone()]),
            AbstractValue::Union2(..)
        ));
        assert_eq!(eval("ifelse", &[a.clone(), a.clone(), b]), AbstractValue::Bottom);
        assert_eq!(eval("throw", &[a]), AbstractValue::Bottom);
    }
}
