//! `invoke(f, Tuple{sig...}, args...)`: a call dispatched to the method of
//! `f` with exactly the declared signature.

use crate::error::RegistryError;
use crate::lattice::{AbstractValue, ConstValue};
use crate::types::JuliaType;

use super::registry::{TFuncContext, TransferFunctions, VARIADIC};
use super::type_operand;

pub fn register_invoke(registry: &mut TransferFunctions) -> Result<(), RegistryError> {
    registry.register("invoke", 2, VARIADIC, tfunc_invoke, 20)
}

/// The target must be a known function and the signature a known tuple
/// type. An argument that cannot match its declared type makes the call
/// dead; otherwise the callee is inferred through the calling frame with
/// each argument narrowed to its declared type.
pub fn tfunc_invoke(
    _op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    let Some(ConstValue::Function(name)) = args[0].as_const() else {
        return AbstractValue::Top;
    };
    let Some(JuliaType::Tuple(sig)) = type_operand(&args[1]) else {
        return AbstractValue::Top;
    };
    let actual = &args[2..];
    if sig.len() != actual.len() {
        return AbstractValue::Bottom;
    }
    let mut narrowed = Vec::with_capacity(actual.len());
    for (declared, arg) in sig.iter().zip(actual) {
        let meet = ctx.lattice.narrow(arg, declared);
        if meet.is_bottom() {
            return AbstractValue::Bottom;
        }
        narrowed.push(ctx.lattice.widen_conditional(&meet));
    }
    match ctx.call.as_deref_mut() {
        Some(call) => call.invoke(name, sig, &narrowed),
        None => AbstractValue::Top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InferenceLimits;
    use crate::lattice::TypeLattice;
    use crate::tfuncs::{builtins, CallContext};
    use crate::types::TypeUniverse;

    /// Records requests and answers with the first argument.
    #[derive(Debug, Default)]
    struct Recorder {
        calls: Vec<(String, Vec<JuliaType>, Vec<AbstractValue>)>,
    }

    impl CallContext for Recorder {
        fn invoke(
            &mut self,
            name: &str,
            sig: &[JuliaType],
            argtypes: &[AbstractValue],
        ) -> AbstractValue {
            self.calls
                .push((name.to_string(), sig.to_vec(), argtypes.to_vec()));
            argtypes.first().cloned().unwrap_or(AbstractValue::Top)
        }
    }

    fn sig(types: Vec<JuliaType>) -> AbstractValue {
        AbstractValue::type_value(JuliaType::Tuple(types), true)
    }

    fn f() -> AbstractValue {
        AbstractValue::Const(ConstValue::Function("f".into()))
    }

    #[test]
    fn test_invoke_narrows_and_records() {
        let universe = TypeUniverse::new();
        let limits = InferenceLimits::default();
        let mut recorder = Recorder::default();
        let result = {
            let mut ctx =
                TFuncContext::with_call(TypeLattice::new(&universe, &limits), &mut recorder);
            builtins().dispatch(
                "invoke",
                &[f(), sig(vec![JuliaType::named("Integer")]), AbstractValue::Top],
                &mut ctx,
            )
        };
        assert_eq!(result, AbstractValue::concrete(JuliaType::named("Integer")));
        assert_eq!(recorder.calls.len(), 1);
        assert_eq!(recorder.calls[0].0, "f");
    }

    #[test]
    fn test_invoke_disjoint_argument_is_dead() {
        let universe = TypeUniverse::new();
        let limits = InferenceLimits::default();
        let mut recorder = Recorder::default();
        let result = {
            let mut ctx =
                TFuncContext::with_call(TypeLattice::new(&universe, &limits), &mut recorder);
            builtins().dispatch(
                "invoke",
                &[
                    f(),
                    sig(vec![JuliaType::int64()]),
                    AbstractValue::exact(JuliaType::string()),
                ],
                &mut ctx,
            )
        };
        assert_eq!(result, AbstractValue::Bottom);
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn test_invoke_without_frame_or_target() {
        let universe = TypeUniverse::new();
        let limits = InferenceLimits::default();
        let mut ctx = TFuncContext::new(TypeLattice::new(&universe, &limits));
        let table = builtins();
        assert_eq!(
            table.dispatch("invoke", &[f(), sig(vec![]),], &mut ctx),
            AbstractValue::Top
        );
        assert_eq!(
            table.dispatch(
                "invoke",
                &[AbstractValue::Top, sig(vec![]), AbstractValue::int(1)],
                &mut ctx
            ),
            AbstractValue::Top
        );
        assert_eq!(
            table.dispatch("invoke", &[f(), sig(vec![]), AbstractValue::int(1)], &mut ctx),
            AbstractValue::Bottom
        );
    }
}
