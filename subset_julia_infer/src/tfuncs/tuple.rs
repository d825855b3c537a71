//! Tuple construction.

use crate::error::RegistryError;
use crate::lattice::{AbstractValue, ConstValue};
use crate::types::JuliaType;

use super::registry::{TFuncContext, TransferFunctions, VARIADIC};

pub fn register_tuple(registry: &mut TransferFunctions) -> Result<(), RegistryError> {
    registry.register("tuple", 0, VARIADIC, tfunc_tuple, 1)
}

/// The single value of a singleton-typed abstract value.
fn singleton_value(v: &AbstractValue) -> Option<ConstValue> {
    match v {
        AbstractValue::Const(c) => Some(c.clone()),
        AbstractValue::Concrete {
            ty: JuliaType::DataType { name, params },
            exact: true,
        } if name == "Nothing" && params.is_empty() => Some(ConstValue::Nothing),
        AbstractValue::TypeOf {
            ty,
            exact: true,
        } if !ty.has_free_type_vars() => Some(ConstValue::Type(ty.clone())),
        _ => None,
    }
}

/// Whether every value described by `v` has exactly the type
/// `widen_type(v)`.
fn is_exact_element(ctx: &TFuncContext<'_>, v: &AbstractValue) -> bool {
    match v {
        AbstractValue::Const(c) => c.has_exact_type(),
        AbstractValue::Concrete { exact, .. } => *exact,
        AbstractValue::Conditional { .. } => true,
        AbstractValue::TypeOf { ty, exact } => *exact && !ty.has_free_type_vars(),
        AbstractValue::Union2(..) => ctx.oracle().is_leaf_type(&ctx.lattice.widen_type(v)),
        _ => false,
    }
}

/// `tuple(args...)`.
///
/// ```text
/// tuple()                           => Const(())
/// tuple(Const(1), Const(:a))        => Const((1, :a))
/// tuple(Int64, Type{String})        => Tuple{Int64, Type{String}}
/// tuple(Int64, <:Real)              => <:Tuple{Int64, Real}
/// ```
pub fn tfunc_tuple(_op: &str, args: &[AbstractValue], ctx: &mut TFuncContext<'_>) -> AbstractValue {
    if args.len() > ctx.limits().max_tuple_length {
        return AbstractValue::Top;
    }
    if let Some(values) = args.iter().map(singleton_value).collect::<Option<Vec<_>>>() {
        return AbstractValue::Const(ConstValue::Tuple(values));
    }
    let exact = args.iter().all(|a| is_exact_element(ctx, a));
    let elems: Vec<JuliaType> = args
        .iter()
        .map(|a| ctx.lattice.widen_type(&ctx.lattice.widen_conditional(a)))
        .collect();
    let value = AbstractValue::with_exactness(JuliaType::Tuple(elems), exact);
    ctx.lattice.limit_value(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InferenceLimits;
    use crate::lattice::TypeLattice;
    use crate::tfuncs::builtins;
    use crate::types::TypeUniverse;

    fn eval_with(limits: &InferenceLimits, args: &[AbstractValue]) -> AbstractValue {
        let universe = TypeUniverse::new();
        let mut ctx = TFuncContext::new(TypeLattice::new(&universe, limits));
        builtins().dispatch("tuple", args, &mut ctx)
    }

    fn eval(args: &[AbstractValue]) -> AbstractValue {
        eval_with(&InferenceLimits::default(), args)
    }

    #[test]
    fn test_constant_tuple() {
        assert_eq!(eval(&[]), AbstractValue::Const(ConstValue::Tuple(vec![])));
        assert_eq!(
            eval(&[AbstractValue::int(1), AbstractValue::symbol("a")]),
            AbstractValue::Const(ConstValue::Tuple(vec![
                ConstValue::Int64(1),
                ConstValue::Symbol("a".into())
            ]))
        );
        assert_eq!(
            eval(&[AbstractValue::exact(JuliaType::nothing())]),
            AbstractValue::Const(ConstValue::Tuple(vec![ConstValue::Nothing]))
        );
    }

    #[test]
    fn test_type_operands_become_members() {
        assert_eq!(
            eval(&[
                AbstractValue::exact(JuliaType::int64()),
                AbstractValue::type_value(JuliaType::string(), true)
            ]),
            AbstractValue::exact(JuliaType::Tuple(vec![
                JuliaType::int64(),
                JuliaType::type_of(JuliaType::string())
            ]))
        );
    }

    #[test]
    fn test_inexact_element() {
        assert_eq!(
            eval(&[
                AbstractValue::exact(JuliaType::int64()),
                AbstractValue::concrete(JuliaType::named("Real"))
            ]),
            AbstractValue::concrete(JuliaType::Tuple(vec![
                JuliaType::int64(),
                JuliaType::named("Real")
            ]))
        );
    }

    #[test]
    fn test_long_tuple_widens() {
        let limits = InferenceLimits {
            max_tuple_length: 2,
            ..InferenceLimits::default()
        };
        let int = AbstractValue::exact(JuliaType::int64());
        assert_eq!(
            eval_with(&limits, &[int.clone(), int.clone(), int]),
            AbstractValue::Top
        );
    }
}
