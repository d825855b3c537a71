//! Field access, reflection and struct construction.

use crate::diagnostics::emit_type_depth_limited;
use crate::error::RegistryError;
use crate::lattice::{AbstractValue, ConstValue};
use crate::types::JuliaType;

use super::registry::{TFuncContext, TransferFunctions};
use super::{leaf_value, type_operand};

pub fn register_fields(registry: &mut TransferFunctions) -> Result<(), RegistryError> {
    registry.register("getfield", 2, 3, tfunc_getfield, 1)?;
    registry.register("setfield!", 3, 3, tfunc_setfield, 2)?;
    registry.register("isdefined", 2, 2, tfunc_isdefined, 1)?;
    registry.register("nfields", 1, 1, tfunc_nfields, 1)?;
    registry.register("sizeof", 1, 1, tfunc_sizeof, 1)?;
    Ok(())
}

/// A field selector: a name or a 1-based position.
#[derive(Debug, Clone, PartialEq)]
enum FieldKey<'v> {
    Name(&'v str),
    Index(i64),
}

fn field_key(selector: &AbstractValue) -> Option<FieldKey<'_>> {
    match selector.as_const()? {
        ConstValue::Symbol(s) => Some(FieldKey::Name(s)),
        ConstValue::Int64(i) => Some(FieldKey::Index(*i)),
        _ => None,
    }
}

fn lookup<'f, T>(fields: &'f [(String, T)], key: &FieldKey<'_>) -> Option<&'f T> {
    match key {
        FieldKey::Name(name) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
        FieldKey::Index(i) => usize::try_from(*i)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| fields.get(i))
            .map(|(_, v)| v),
    }
}

/// Whether `selector` can be neither a `Symbol` nor an `Int`.
fn invalid_selector(ctx: &TFuncContext<'_>, selector: &AbstractValue) -> bool {
    let ts = ctx.lattice.widen_type(selector);
    let oracle = ctx.oracle();
    oracle.is_disjoint(&ts, &JuliaType::symbol()) && oracle.is_disjoint(&ts, &JuliaType::int64())
}

/// `getfield(x, f)`.
///
/// ```text
/// getfield(Const((a = 1, b = "s")), Const(:a))     => Const(1)
/// getfield(Tuple{Int64, String}, Int64)            => Union2(Int64, String)
/// getfield(Tuple{Int64}, Const(2))                 => Union{}
/// getfield(Any, Const(:a))                         => Any
/// ```
pub fn tfunc_getfield(
    _op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    if invalid_selector(ctx, &args[1]) {
        return AbstractValue::Bottom;
    }
    getfield_value(ctx, &args[0], &args[1])
}

fn getfield_value(
    ctx: &TFuncContext<'_>,
    x: &AbstractValue,
    selector: &AbstractValue,
) -> AbstractValue {
    let key = field_key(selector);
    match x {
        AbstractValue::Top => AbstractValue::Top,
        AbstractValue::Union2(..) => x
            .leaves()
            .into_iter()
            .map(|leaf| getfield_value(ctx, leaf, selector))
            .fold(AbstractValue::Bottom, |acc, v| ctx.lattice.merge(&acc, &v)),
        AbstractValue::Const(ConstValue::Type(_)) | AbstractValue::TypeOf { .. } => {
            AbstractValue::Top
        }
        AbstractValue::Const(c) => {
            let Some(fields) = c.fields() else {
                // Scalars have no fields.
                return AbstractValue::Bottom;
            };
            match key {
                Some(key) => lookup(&fields, &key)
                    .map(|v| AbstractValue::constant((*v).clone()))
                    .unwrap_or(AbstractValue::Bottom),
                None => merge_all(
                    ctx,
                    fields
                        .into_iter()
                        .map(|(_, v)| AbstractValue::constant(v.clone())),
                ),
            }
        }
        _ => {
            let ty = ctx.lattice.widen_type(x);
            let Some(fields) = ctx.oracle().field_types(&ty) else {
                return AbstractValue::Top;
            };
            match key {
                Some(key) => lookup(&fields, &key)
                    .map(|t| field_value(ctx, t))
                    .unwrap_or(AbstractValue::Bottom),
                None => merge_all(ctx, fields.iter().map(|(_, t)| field_value(ctx, t))),
            }
        }
    }
}

fn field_value(ctx: &TFuncContext<'_>, ty: &JuliaType) -> AbstractValue {
    if ty.is_any() {
        return AbstractValue::Top;
    }
    leaf_value(ctx, ty.clone())
}

fn merge_all(ctx: &TFuncContext<'_>, values: impl Iterator<Item = AbstractValue>) -> AbstractValue {
    let merged = values.fold(AbstractValue::Bottom, |acc, v| ctx.lattice.merge(&acc, &v));
    let limited = ctx.lattice.limit_value(&merged);
    if limited != merged {
        emit_type_depth_limited(ctx.limits().max_type_depth, &limited.to_string());
    }
    limited
}

/// `setfield!(x, f, v)` evaluates to `v`. Immutable receivers and values
/// that cannot be stored in the field make the call dead.
pub fn tfunc_setfield(
    _op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    let (x, selector, v) = (&args[0], &args[1], &args[2]);
    if matches!(x, AbstractValue::Const(_)) || invalid_selector(ctx, selector) {
        return AbstractValue::Bottom;
    }
    let ty = ctx.lattice.widen_type(x);
    let oracle = ctx.oracle();
    if !oracle.is_leaf_type(&ty) {
        return v.clone();
    }
    if !oracle.is_mutable(&ty) {
        return AbstractValue::Bottom;
    }
    let Some(fields) = oracle.field_types(&ty) else {
        return v.clone();
    };
    match field_key(selector) {
        Some(key) => match lookup(&fields, &key) {
            Some(ft) if oracle.is_disjoint(&ctx.lattice.widen_type(v), ft) => AbstractValue::Bottom,
            Some(ft) => ctx.lattice.narrow(v, ft),
            None => AbstractValue::Bottom,
        },
        None => v.clone(),
    }
}

/// `isdefined(x, f)`.
pub fn tfunc_isdefined(
    _op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    let Some(key) = field_key(&args[1]) else {
        return AbstractValue::bool_type();
    };
    match &args[0] {
        AbstractValue::Const(c) => match c.fields() {
            Some(fields) => AbstractValue::boolean(lookup(&fields, &key).is_some()),
            None => AbstractValue::boolean(false),
        },
        x => {
            let ty = ctx.lattice.widen_type(x);
            let oracle = ctx.oracle();
            if !oracle.is_leaf_type(&ty) {
                return AbstractValue::bool_type();
            }
            match oracle.field_types(&ty) {
                Some(fields) if lookup(&fields, &key).is_none() => AbstractValue::boolean(false),
                // Fields of immutable instances are set at construction.
                Some(_) if !oracle.is_mutable(&ty) => AbstractValue::boolean(true),
                _ => AbstractValue::bool_type(),
            }
        }
    }
}

/// `nfields(x)`.
pub fn tfunc_nfields(
    _op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    let count = match &args[0] {
        AbstractValue::Const(c) => Some(c.fields().map_or(0, |f| f.len())),
        x => {
            let ty = ctx.lattice.widen_type(x);
            match &ty {
                // Tuple arity is fixed even when element types are not.
                JuliaType::Tuple(elems) => Some(elems.len()),
                JuliaType::NamedTuple { names, .. } => Some(names.len()),
                _ if ctx.oracle().is_leaf_type(&ty) => {
                    ctx.oracle().field_types(&ty).map(|f| f.len())
                }
                _ => None,
            }
        }
    };
    match count.and_then(|n| i64::try_from(n).ok()) {
        Some(n) => AbstractValue::int(n),
        None => AbstractValue::exact(JuliaType::int64()),
    }
}

/// `sizeof(x)`, for a value or a type.
pub fn tfunc_sizeof(
    _op: &str,
    args: &[AbstractValue],
    ctx: &mut TFuncContext<'_>,
) -> AbstractValue {
    let oracle = ctx.oracle();
    let size = match &args[0] {
        AbstractValue::Const(ConstValue::String(s)) => Some(s.len()),
        AbstractValue::Const(c) if c.has_exact_type() => oracle.sizeof(&c.julia_type()),
        AbstractValue::Concrete { ty, exact: true } => oracle.sizeof(ty),
        v => type_operand(v).and_then(|t| oracle.sizeof(t)),
    };
    match size.and_then(|n| i64::try_from(n).ok()) {
        Some(n) => AbstractValue::int(n),
        None => AbstractValue::exact(JuliaType::int64()),
    }
}

/// Abstract result of constructing an instance of `ty` from `args`.
///
/// Wrong argument counts and arguments that cannot be stored in their
/// field make the construction dead. Immutable structs built from
/// constants fold to a constant.
pub fn new_struct(ctx: &TFuncContext<'_>, ty: &JuliaType, args: &[AbstractValue]) -> AbstractValue {
    let oracle = ctx.oracle();
    let Some(fields) = oracle.field_types(ty) else {
        return AbstractValue::concrete(ty.clone());
    };
    if fields.len() != args.len() {
        return AbstractValue::Bottom;
    }
    for ((_, ft), arg) in fields.iter().zip(args) {
        if arg.is_bottom() || oracle.is_disjoint(&ctx.lattice.widen_type(arg), ft) {
            return AbstractValue::Bottom;
        }
    }
    if !oracle.is_mutable(ty) {
        let consts: Option<Vec<(String, ConstValue)>> = fields
            .iter()
            .zip(args)
            .map(|((name, _), arg)| arg.as_const().map(|c| (name.clone(), c.clone())))
            .collect();
        if let Some(consts) = consts {
            return AbstractValue::Const(ConstValue::Struct {
                ty: ty.clone(),
                fields: consts,
            });
        }
    }
    leaf_value(ctx, ty.clone())
}
