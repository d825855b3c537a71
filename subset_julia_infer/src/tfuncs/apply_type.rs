//! Parametric type application: `apply_type(Head, P1, P2, ...)`.
//!
//! Instantiation failures are not inference errors. The runtime would
//! throw, and inference answers with "some subtype of the head".

use crate::diagnostics::emit_instantiation_failed;
use crate::error::RegistryError;
use crate::lattice::AbstractValue;
use crate::types::{JuliaType, TypeVar};

use super::registry::{TFuncContext, TransferFunctions, VARIADIC};
use super::{cannot_be_type, type_bound};

pub fn register_apply_type(registry: &mut TransferFunctions) -> Result<(), RegistryError> {
    registry.register("apply_type", 1, VARIADIC, tfunc_apply_type, 1)
}

/// `apply_type(Head, params...)`.
///
/// ```text
/// apply_type(Union)                      => Type{Union{}}
/// apply_type(Union, Int64)               => Type{Int64}
/// apply_type(Union, Int64, Nothing)      => Type{Union{Int64, Nothing}}
/// apply_type(Ref, Int64)                 => Type{Ref{Int64}}
/// apply_type(Ref, Type{<:Real})          => Type{<:Ref{<:Real}}
/// apply_type(Int64, Int64)               => Type{<:Int64}
/// apply_type(Ref, Const(1))              => Type{<:Ref}
/// ```
pub fn tfunc_apply_type(
    _op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    let head = &args[0];
    let params = &args[1..];
    let Some((head_ty, head_exact)) = type_bound(head) else {
        return if cannot_be_type(ctx, head) {
            AbstractValue::Bottom
        } else {
            AbstractValue::type_value(JuliaType::Any, false)
        };
    };
    let Some(head_name) = head_ty.datatype_name().map(str::to_string) else {
        return AbstractValue::type_value(JuliaType::Any, false);
    };
    if !head_exact {
        return AbstractValue::type_value(JuliaType::Any, false);
    }
    if head_name == "Union" {
        return apply_union(ctx, params);
    }

    let mut exact = true;
    let mut applied = Vec::with_capacity(params.len());
    for p in params {
        match p {
            AbstractValue::TypeOf { ty, exact: true } => applied.push(ty.clone()),
            AbstractValue::TypeOf { ty, exact: false } => {
                exact = false;
                applied.push(JuliaType::TypeVar(TypeVar::wildcard(ty.clone())));
            }
            AbstractValue::PartialTypeVar(tv) => {
                exact = false;
                applied.push(JuliaType::TypeVar(tv.clone()));
            }
            // Bits values such as `Val{3}` are valid parameters, so a
            // non-type is as unknown as `Top`.
            _ => {
                exact = false;
                applied.push(JuliaType::wildcard());
            }
        }
    }

    let oracle = ctx.oracle();
    match oracle.instantiate(&head_name, &applied) {
        Ok(ty) if exact => AbstractValue::type_value(ty, true),
        Ok(ty) => AbstractValue::type_value(ctx.lattice.limit_type(&ty), false),
        Err(e) => {
            emit_instantiation_failed(&head_name, &e.to_string());
            let bound = oracle
                .instantiate(&head_name, &[])
                .unwrap_or(JuliaType::Any);
            AbstractValue::type_value(bound, false)
        }
    }
}

fn apply_union(ctx: &TFuncContext<'_>, params: &[AbstractValue]) -> AbstractValue {
    match params {
        [] => AbstractValue::type_value(JuliaType::Bottom, true),
        [single] if type_bound(single).is_some() => single.clone(),
        _ => {
            let mut exact = true;
            let mut members = Vec::with_capacity(params.len());
            for p in params {
                match type_bound(p) {
                    Some((ty, e)) => {
                        exact &= e && !ty.has_free_type_vars();
                        members.push(ty);
                    }
                    None if cannot_be_type(ctx, p) => return AbstractValue::Bottom,
                    None => return AbstractValue::type_value(JuliaType::Any, false),
                }
            }
            let union = simplify_union(ctx, members);
            if exact {
                AbstractValue::type_value(union, true)
            } else {
                AbstractValue::type_value(ctx.lattice.limit_type(&union), false)
            }
        }
    }
}

/// Union of `members` without members subsumed by another member.
fn simplify_union(ctx: &TFuncContext<'_>, members: Vec<JuliaType>) -> JuliaType {
    let oracle = ctx.oracle();
    let kept: Vec<JuliaType> = members
        .iter()
        .enumerate()
        .filter(|(i, m)| {
            !members.iter().enumerate().any(|(j, other)| {
                j != *i && oracle.is_subtype(m, other) && (!oracle.is_subtype(other, m) || j < *i)
            })
        })
        .map(|(_, m)| m.clone())
        .collect();
    JuliaType::union(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InferenceLimits;
    use crate::diagnostics::{DiagnosticReason, DiagnosticsCollector};
    use crate::lattice::TypeLattice;
    use crate::tfuncs::builtins;
    use crate::types::TypeUniverse;

    fn eval(args: &[AbstractValue]) -> AbstractValue {
        let universe = TypeUniverse::new();
        let limits = InferenceLimits::default();
        let mut ctx = TFuncContext::new(TypeLattice::new(&universe, &limits));
        builtins().dispatch("apply_type", args, &mut ctx)
    }

    fn ty(t: JuliaType) -> AbstractValue {
        AbstractValue::type_value(t, true)
    }

    #[test]
    fn test_union_head() {
        let union = ty(JuliaType::named("Union"));
        assert_eq!(eval(&[union.clone()]), ty(JuliaType::Bottom));
        assert_eq!(eval(&[union.clone(), ty(JuliaType::int64())]), ty(JuliaType::int64()));
        assert_eq!(
            eval(&[union.clone(), ty(JuliaType::int64()), ty(JuliaType::nothing())]),
            ty(JuliaType::union([JuliaType::int64(), JuliaType::nothing()]))
        );
        assert_eq!(
            eval(&[
                union,
                ty(JuliaType::int64()),
                AbstractValue::type_value(JuliaType::named("Real"), false)
            ]),
            AbstractValue::type_value(JuliaType::named("Real"), false)
        );
    }

    #[test]
    fn test_parametric_head() {
        let r = ty(JuliaType::named("Ref"));
        assert_eq!(
            eval(&[r.clone(), ty(JuliaType::int64())]),
            ty(JuliaType::parametric("Ref", vec![JuliaType::int64()]))
        );
        assert_eq!(
            eval(&[
                r.clone(),
                AbstractValue::type_value(JuliaType::named("Real"), false)
            ]),
            AbstractValue::type_value(
                JuliaType::parametric(
                    "Ref",
                    vec![JuliaType::TypeVar(TypeVar::wildcard(JuliaType::named("Real")))]
                ),
                false
            )
        );
        assert_eq!(
            eval(&[r, AbstractValue::Top]),
            AbstractValue::type_value(
                JuliaType::parametric("Ref", vec![JuliaType::wildcard()]),
                false
            )
        );
    }

    #[test]
    fn test_value_parameter_is_not_dead() {
        let wildcard_ref = AbstractValue::type_value(
            JuliaType::parametric("Ref", vec![JuliaType::wildcard()]),
            false,
        );
        assert_eq!(eval(&[ty(JuliaType::named("Ref")), AbstractValue::int(1)]), wildcard_ref);
        assert_eq!(
            eval(&[ty(JuliaType::named("Ref")), AbstractValue::symbol("a")]),
            wildcard_ref
        );
        // `Union{1}` still throws.
        assert_eq!(
            eval(&[ty(JuliaType::named("Union")), ty(JuliaType::int64()), AbstractValue::int(1)]),
            AbstractValue::Bottom
        );
    }

    #[test]
    fn test_tuple_head() {
        assert_eq!(
            eval(&[
                ty(JuliaType::named("Tuple")),
                ty(JuliaType::int64()),
                ty(JuliaType::string())
            ]),
            ty(JuliaType::Tuple(vec![JuliaType::int64(), JuliaType::string()]))
        );
    }

    #[test]
    fn test_instantiation_failure_is_conservative() {
        DiagnosticsCollector::enable();
        DiagnosticsCollector::clear();
        let result = eval(&[ty(JuliaType::int64()), ty(JuliaType::int64())]);
        assert_eq!(result, AbstractValue::type_value(JuliaType::int64(), false));
        let diags = DiagnosticsCollector::take();
        DiagnosticsCollector::disable();
        assert!(diags
            .iter()
            .any(|d| matches!(d.reason, DiagnosticReason::InstantiationFailed(..))));
    }

    #[test]
    fn test_non_type_head() {
        assert_eq!(eval(&[AbstractValue::int(1)]), AbstractValue::Bottom);
        assert_eq!(
            eval(&[AbstractValue::Top, ty(JuliaType::int64())]),
            AbstractValue::type_value(JuliaType::Any, false)
        );
    }
}
