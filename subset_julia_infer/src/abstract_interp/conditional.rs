//! Conditional type narrowing.
//!
//! `isa(x, T)` and `x === c` on a slot operand produce a `Conditional`
//! recording what each outcome implies for the slot. A branch on such a
//! value splits the environment: the then-successor sees the slot narrowed,
//! the else-successor sees it with the tested type removed.
//!
//! ```text
//! %1 = isa(x, Int64)        # x::Union{Int64, Nothing}
//! goto_if_not %1, L2
//!     # x::Int64
//! L2:
//!     # x::Nothing
//! ```

use crate::ir::SlotId;
use crate::lattice::{AbstractValue, ConstValue, TypeLattice};
use crate::tfuncs::type_bound;
use crate::types::JuliaType;

use super::env::VarTable;

/// Successor environments of a conditional branch; `None` marks a
/// successor that cannot be reached.
#[derive(Debug)]
pub struct SplitEnv {
    /// Environment for the fallthrough (condition is true)
    pub then_env: Option<VarTable>,
    /// Environment for the branch target (condition is false)
    pub else_env: Option<VarTable>,
}

/// Split `env` by the abstract value of a branch condition.
pub fn split_env_by_condition(
    lattice: &TypeLattice<'_>,
    env: &VarTable,
    cond: &AbstractValue,
) -> SplitEnv {
    match cond {
        AbstractValue::Const(ConstValue::Bool(true)) => SplitEnv {
            then_env: Some(env.clone()),
            else_env: None,
        },
        AbstractValue::Const(ConstValue::Bool(false)) => SplitEnv {
            then_env: None,
            else_env: Some(env.clone()),
        },
        AbstractValue::Conditional {
            slot,
            then_type,
            else_type,
        } => SplitEnv {
            then_env: refine(env, *slot, then_type),
            else_env: refine(env, *slot, else_type),
        },
        other => {
            let ty = lattice.widen_type(other);
            if lattice.oracle().is_disjoint(&ty, &JuliaType::bool()) {
                // Non-Bool condition: the branch throws a TypeError.
                SplitEnv {
                    then_env: None,
                    else_env: None,
                }
            } else {
                SplitEnv {
                    then_env: Some(env.clone()),
                    else_env: Some(env.clone()),
                }
            }
        }
    }
}

fn refine(env: &VarTable, slot: SlotId, value: &AbstractValue) -> Option<VarTable> {
    if value.is_bottom() {
        return None;
    }
    let mut refined = env.clone();
    refined.set(slot, value.clone());
    Some(refined)
}

/// Refine the result of `isa(x, t)`, where `x` is read from `slot`.
///
/// Only an undecided answer is refined; a constant answer already decides
/// the branch.
pub fn isa_conditional(
    lattice: &TypeLattice<'_>,
    slot: SlotId,
    x: &AbstractValue,
    t: &AbstractValue,
    plain: AbstractValue,
) -> AbstractValue {
    if plain != AbstractValue::bool_type() {
        return plain;
    }
    let Some((ty, exact)) = type_bound(t) else {
        return plain;
    };
    let then_type = lattice.narrow(x, &ty);
    let else_type = if exact && !ty.has_free_type_vars() {
        lattice.subtract(x, &ty)
    } else {
        x.clone()
    };
    make_conditional(slot, x, then_type, else_type, plain)
}

/// Refine the result of `x === c`, where `x` is read from `slot`.
pub fn egal_conditional(
    lattice: &TypeLattice<'_>,
    slot: SlotId,
    x: &AbstractValue,
    c: &ConstValue,
    plain: AbstractValue,
) -> AbstractValue {
    if plain != AbstractValue::bool_type() {
        return plain;
    }
    let cty = c.julia_type();
    if lattice.narrow(x, &cty).is_bottom() {
        return plain;
    }
    let then_type = AbstractValue::constant(c.clone());
    let else_type = if matches!(c, ConstValue::Nothing) {
        lattice.subtract(x, &cty)
    } else {
        x.clone()
    };
    make_conditional(slot, x, then_type, else_type, plain)
}

fn make_conditional(
    slot: SlotId,
    x: &AbstractValue,
    then_type: AbstractValue,
    else_type: AbstractValue,
    plain: AbstractValue,
) -> AbstractValue {
    if &then_type == x && &else_type == x {
        return plain;
    }
    AbstractValue::Conditional {
        slot,
        then_type: Box::new(then_type),
        else_type: Box::new(else_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InferenceLimits;
    use crate::types::TypeUniverse;

    fn int_or_nothing(lattice: &TypeLattice<'_>) -> AbstractValue {
        lattice.merge(
            &AbstractValue::exact(JuliaType::int64()),
            &AbstractValue::exact(JuliaType::nothing()),
        )
    }

    #[test]
    fn test_isa_conditional_splits_union() {
        let universe = TypeUniverse::new();
        let limits = InferenceLimits::default();
        let lattice = TypeLattice::new(&universe, &limits);
        let x = int_or_nothing(&lattice);
        let cond = isa_conditional(
            &lattice,
            0,
            &x,
            &AbstractValue::type_value(JuliaType::int64(), true),
            AbstractValue::bool_type(),
        );
        let env = VarTable::with_args(1, vec![x]);
        let split = split_env_by_condition(&lattice, &env, &cond);
        assert_eq!(
            split.then_env.unwrap().get(0),
            &AbstractValue::exact(JuliaType::int64())
        );
        assert_eq!(
            split.else_env.unwrap().get(0),
            &AbstractValue::exact(JuliaType::nothing())
        );
    }

    #[test]
    fn test_egal_nothing() {
        let universe = TypeUniverse::new();
        let limits = InferenceLimits::default();
        let lattice = TypeLattice::new(&universe, &limits);
        let x = int_or_nothing(&lattice);
        let cond =
            egal_conditional(&lattice, 0, &x, &ConstValue::Nothing, AbstractValue::bool_type());
        assert_eq!(
            cond,
            AbstractValue::Conditional {
                slot: 0,
                then_type: Box::new(AbstractValue::Const(ConstValue::Nothing)),
                else_type: Box::new(AbstractValue::exact(JuliaType::int64())),
            }
        );
    }

    #[test]
    fn test_decided_answers_are_kept() {
        let universe = TypeUniverse::new();
        let limits = InferenceLimits::default();
        let lattice = TypeLattice::new(&universe, &limits);
        let x = AbstractValue::exact(JuliaType::int64());
        let t = AbstractValue::type_value(JuliaType::int64(), true);
        assert_eq!(
            isa_conditional(&lattice, 0, &x, &t, AbstractValue::boolean(true)),
            AbstractValue::boolean(true)
        );
    }

    #[test]
    fn test_split_constant_and_non_bool() {
        let universe = TypeUniverse::new();
        let limits = InferenceLimits::default();
        let lattice = TypeLattice::new(&universe, &limits);
        let env = VarTable::new(1);
        let split = split_env_by_condition(&lattice, &env, &AbstractValue::boolean(false));
        assert!(split.then_env.is_none() && split.else_env.is_some());
        let split = split_env_by_condition(&lattice, &env, &AbstractValue::int(1));
        assert!(split.then_env.is_none() && split.else_env.is_none());
        let split = split_env_by_condition(&lattice, &env, &AbstractValue::Top);
        assert!(split.then_env.is_some() && split.else_env.is_some());
    }
}
