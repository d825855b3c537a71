//! Transfer functions (tfuncs) for builtin operations.
//!
//! A transfer function maps the abstract values of a builtin's arguments to
//! an abstract value for its result. Every result over-approximates what
//! the operation can return at runtime.
//!
//! # Module structure
//!
//! - `registry`: `TransferFunctions`, the arity-checked dispatcher
//! - `arithmetic`: integer/float intrinsics, comparisons, checked arithmetic
//! - `predicates`: `isa`, `<:`, `typeassert`, `typeof`, `===`, `ifelse`
//! - `fields`: `getfield`, `setfield!`, `isdefined`, `nfields`, `sizeof`
//! - `apply_type`: parametric type application
//! - `tuple`: tuple construction
//! - `invoke`: exact dispatch through the calling frame

pub mod apply_type;
pub mod arithmetic;
pub mod fields;
pub mod invoke;
pub mod predicates;
pub mod registry;
pub mod tuple;

pub use fields::new_struct;
pub use registry::{
    builtins, CallContext, TFuncContext, TFuncEntry, TransferFn, TransferFunctions, VARIADIC,
};

use crate::error::RegistryError;
use crate::lattice::AbstractValue;
use crate::types::JuliaType;

/// Populate `registry` with every builtin family.
pub fn register_all(registry: &mut TransferFunctions) -> Result<(), RegistryError> {
    arithmetic::register_arithmetic(registry)?;
    arithmetic::register_comparison(registry)?;
    arithmetic::register_checked(registry)?;
    predicates::register_predicates(registry)?;
    fields::register_fields(registry)?;
    apply_type::register_apply_type(registry)?;
    tuple::register_tuple(registry)?;
    invoke::register_invoke(registry)?;
    Ok(())
}

/// An instance of `ty`, exact when `ty` has no proper subtypes.
pub(crate) fn leaf_value(ctx: &TFuncContext<'_>, ty: JuliaType) -> AbstractValue {
    let exact = ctx.oracle().is_leaf_type(&ty);
    AbstractValue::with_exactness(ty, exact)
}

/// The type denoted by an exactly known type value.
pub(crate) fn type_operand(v: &AbstractValue) -> Option<&JuliaType> {
    v.as_exact_type()
}

/// Upper bound of a type value and whether it is exact.
pub(crate) fn type_bound(v: &AbstractValue) -> Option<(JuliaType, bool)> {
    match v {
        AbstractValue::TypeOf { ty, exact } => Some((ty.clone(), *exact)),
        AbstractValue::PartialTypeVar(tv) => Some(((*tv.upper_bound).clone(), false)),
        _ => None,
    }
}

/// Whether `v` cannot be a type value at all.
pub(crate) fn cannot_be_type(ctx: &TFuncContext<'_>, v: &AbstractValue) -> bool {
    if type_bound(v).is_some() {
        return false;
    }
    let any_type = JuliaType::type_of(JuliaType::wildcard());
    ctx.oracle()
        .is_disjoint(&ctx.lattice.widen_type(v), &any_type)
}
