//! Abstract values and compile-time constants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::ir::SlotId;
use crate::types::{JuliaType, TypeVar};

/// A compile-time known runtime value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConstValue {
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Char(char),
    String(String),
    Symbol(String),
    Nothing,
    Tuple(Vec<ConstValue>),
    NamedTuple(Vec<(String, ConstValue)>),
    /// An instance of an immutable struct.
    Struct {
        ty: JuliaType,
        fields: Vec<(String, ConstValue)>,
    },
    /// A type used as a value.
    Type(JuliaType),
    /// A named generic function.
    Function(String),
}

impl PartialEq for ConstValue {
    fn eq(&self, other: &Self) -> bool {
        use ConstValue::*;
        match (self, other) {
            (Int64(a), Int64(b)) => a == b,
            // Bitwise equality: NaN equals itself and -0.0 differs from 0.0 (`===`).
            (Float64(a), Float64(b)) => a.to_bits() == b.to_bits(),
            (Bool(a), Bool(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Symbol(a), Symbol(b)) => a == b,
            (Nothing, Nothing) => true,
            (Tuple(a), Tuple(b)) => a == b,
            (NamedTuple(a), NamedTuple(b)) => a == b,
            (Struct { ty: t1, fields: f1 }, Struct { ty: t2, fields: f2 }) => t1 == t2 && f1 == f2,
            (Type(a), Type(b)) => a == b,
            (Function(a), Function(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConstValue {}

impl Hash for ConstValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ConstValue::Int64(v) => v.hash(state),
            ConstValue::Float64(v) => v.to_bits().hash(state),
            ConstValue::Bool(v) => v.hash(state),
            ConstValue::Char(v) => v.hash(state),
            ConstValue::String(v) | ConstValue::Symbol(v) | ConstValue::Function(v) => {
                v.hash(state)
            }
            ConstValue::Nothing => {}
            ConstValue::Tuple(items) => items.hash(state),
            ConstValue::NamedTuple(items) => items.hash(state),
            ConstValue::Struct { ty, fields } => {
                ty.hash(state);
                fields.hash(state);
            }
            ConstValue::Type(t) => t.hash(state),
        }
    }
}

impl ConstValue {
    /// The runtime type of this value.
    pub fn julia_type(&self) -> JuliaType {
        match self {
            ConstValue::Int64(_) => JuliaType::int64(),
            ConstValue::Float64(_) => JuliaType::float64(),
            ConstValue::Bool(_) => JuliaType::bool(),
            ConstValue::Char(_) => JuliaType::char(),
            ConstValue::String(_) => JuliaType::string(),
            ConstValue::Symbol(_) => JuliaType::symbol(),
            ConstValue::Nothing => JuliaType::nothing(),
            ConstValue::Tuple(items) => {
                JuliaType::Tuple(items.iter().map(ConstValue::julia_type).collect())
            }
            ConstValue::NamedTuple(items) => JuliaType::NamedTuple {
                names: items.iter().map(|(n, _)| n.clone()).collect(),
                types: items.iter().map(|(_, v)| v.julia_type()).collect(),
            },
            ConstValue::Struct { ty, .. } => ty.clone(),
            ConstValue::Type(t) => JuliaType::type_of(t.clone()),
            ConstValue::Function(_) => JuliaType::named("Function"),
        }
    }

    /// Whether `julia_type` names the exact runtime type rather than a
    /// supertype of it.
    pub fn has_exact_type(&self) -> bool {
        match self {
            ConstValue::Function(_) => false,
            ConstValue::Tuple(items) => items.iter().all(ConstValue::has_exact_type),
            ConstValue::NamedTuple(items) => items.iter().all(|(_, v)| v.has_exact_type()),
            ConstValue::Type(t) => !t.has_free_type_vars(),
            _ => true,
        }
    }

    /// Fields addressable by `getfield`, in declaration order.
    pub fn fields(&self) -> Option<Vec<(String, &ConstValue)>> {
        match self {
            ConstValue::Tuple(items) => Some(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| ((i + 1).to_string(), v))
                    .collect(),
            ),
            ConstValue::NamedTuple(items) | ConstValue::Struct { fields: items, .. } => {
                Some(items.iter().map(|(n, v)| (n.clone(), v)).collect())
            }
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int64(v) => write!(f, "{}", v),
            ConstValue::Float64(v) => write!(f, "{:?}", v),
            ConstValue::Bool(v) => write!(f, "{}", v),
            ConstValue::Char(c) => write!(f, "'{}'", c),
            ConstValue::String(s) => write!(f, "{:?}", s),
            ConstValue::Symbol(s) => write!(f, ":{}", s),
            ConstValue::Nothing => write!(f, "nothing"),
            ConstValue::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            ConstValue::NamedTuple(items) => {
                write!(f, "(")?;
                for (i, (name, value)) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, value)?;
                }
                write!(f, ")")
            }
            ConstValue::Struct { ty, fields } => {
                write!(f, "{}(", ty)?;
                for (i, (_, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, ")")
            }
            ConstValue::Type(t) => write!(f, "{}", t),
            ConstValue::Function(name) => write!(f, "{}", name),
        }
    }
}

/// Lattice element attached to every slot, SSA value and expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbstractValue {
    /// Any value at all.
    Top,
    /// No value: unreachable code or a guaranteed error.
    Bottom,
    /// An instance of `ty` (exactly `ty` when `exact`, otherwise any subtype).
    Concrete { ty: JuliaType, exact: bool },
    /// Exactly this value.
    Const(ConstValue),
    /// A `Bool` whose truth narrows the type of another slot.
    Conditional {
        slot: SlotId,
        then_type: Box<AbstractValue>,
        else_type: Box<AbstractValue>,
    },
    /// A type value: exactly `ty` when `exact`, otherwise some subtype of `ty`.
    TypeOf { ty: JuliaType, exact: bool },
    /// A type parameter placeholder that has not been resolved.
    PartialTypeVar(TypeVar),
    /// Union of two lattice elements.
    Union2(Box<AbstractValue>, Box<AbstractValue>),
}

impl AbstractValue {
    /// An instance of `ty` or of any subtype.
    pub fn concrete(ty: JuliaType) -> Self {
        Self::with_exactness(ty, false)
    }

    /// An instance of exactly `ty`.
    pub fn exact(ty: JuliaType) -> Self {
        Self::with_exactness(ty, true)
    }

    pub fn with_exactness(ty: JuliaType, exact: bool) -> Self {
        match ty {
            JuliaType::Bottom => AbstractValue::Bottom,
            JuliaType::Any if !exact => AbstractValue::Top,
            ty => AbstractValue::Concrete { ty, exact },
        }
    }

    /// A known constant. Type values are represented as exact `TypeOf`.
    pub fn constant(value: ConstValue) -> Self {
        match value {
            ConstValue::Type(ty) => AbstractValue::type_value(ty, true),
            value => AbstractValue::Const(value),
        }
    }

    pub fn type_value(ty: JuliaType, exact: bool) -> Self {
        match ty {
            JuliaType::TypeVar(tv) if exact => AbstractValue::PartialTypeVar(tv),
            ty => AbstractValue::TypeOf { ty, exact },
        }
    }

    pub fn int(v: i64) -> Self {
        AbstractValue::Const(ConstValue::Int64(v))
    }

    pub fn boolean(v: bool) -> Self {
        AbstractValue::Const(ConstValue::Bool(v))
    }

    pub fn symbol(s: impl Into<String>) -> Self {
        AbstractValue::Const(ConstValue::Symbol(s.into()))
    }

    /// An unrefined `Bool`.
    pub fn bool_type() -> Self {
        AbstractValue::exact(JuliaType::bool())
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, AbstractValue::Bottom)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, AbstractValue::Top)
    }

    pub fn as_const(&self) -> Option<&ConstValue> {
        match self {
            AbstractValue::Const(c) => Some(c),
            _ => None,
        }
    }

    /// The type denoted by an exact type value.
    pub fn as_exact_type(&self) -> Option<&JuliaType> {
        match self {
            AbstractValue::TypeOf { ty, exact: true } => Some(ty),
            _ => None,
        }
    }

    /// Members of a `Union2` chain; a non-union value is its own only leaf.
    pub fn leaves(&self) -> Vec<&AbstractValue> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }
}

fn collect_leaves<'v>(v: &'v AbstractValue, out: &mut Vec<&'v AbstractValue>) {
    match v {
        AbstractValue::Union2(a, b) => {
            collect_leaves(a, out);
            collect_leaves(b, out);
        }
        other => out.push(other),
    }
}

impl fmt::Display for AbstractValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstractValue::Top => write!(f, "Any"),
            AbstractValue::Bottom => write!(f, "Union{{}}"),
            AbstractValue::Concrete { ty, exact: true } => write!(f, "{}", ty),
            AbstractValue::Concrete { ty, exact: false } => write!(f, "<:{}", ty),
            AbstractValue::Const(c) => write!(f, "Const({})", c),
            AbstractValue::Conditional {
                slot,
                then_type,
                else_type,
            } => write!(f, "Conditional(_{}, {}, {})", slot, then_type, else_type),
            AbstractValue::TypeOf { ty, exact: true } => write!(f, "Type{{{}}}", ty),
            AbstractValue::TypeOf { ty, exact: false } => write!(f, "Type{{<:{}}}", ty),
            AbstractValue::PartialTypeVar(tv) => write!(f, "PartialTypeVar({})", tv),
            AbstractValue::Union2(a, b) => write!(f, "Union2({}, {})", a, b),
        }
    }
}
