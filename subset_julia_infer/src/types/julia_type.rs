//! Type descriptors.
//!
//! `JuliaType` is the structural description of a runtime type. Nominal types
//! are referenced by name and resolved against a `TypeOracle`; structural
//! types (tuples, named tuples, unions, `Type{T}`) are self-describing.
//!
//! A `TypeVar` in a parameter position is an existential placeholder: the
//! type `Ref{T<:Real}` stands for every `Ref{S}` with `S <: Real`. Each
//! occurrence is treated independently.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name used for anonymous placeholders introduced by widening.
pub const WILDCARD_NAME: &str = "_";

/// An unresolved type parameter with an upper bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeVar {
    pub name: String,
    pub upper_bound: Box<JuliaType>,
}

impl TypeVar {
    pub fn new(name: impl Into<String>, upper_bound: JuliaType) -> Self {
        Self {
            name: name.into(),
            upper_bound: Box::new(upper_bound),
        }
    }

    /// An anonymous placeholder bounded by `upper_bound`.
    pub fn wildcard(upper_bound: JuliaType) -> Self {
        Self::new(WILDCARD_NAME, upper_bound)
    }
}

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper_bound.as_ref() {
            JuliaType::Any => write!(f, "{}", self.name),
            ub if self.name == WILDCARD_NAME => write!(f, "<:{}", ub),
            ub => write!(f, "{}<:{}", self.name, ub),
        }
    }
}

/// Structural description of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JuliaType {
    /// The top of the type hierarchy.
    Any,
    /// The empty type `Union{}`.
    Bottom,
    /// A nominal type, optionally applied to parameters. An unapplied
    /// parametric head denotes all of its instances.
    DataType { name: String, params: Vec<JuliaType> },
    /// `Tuple{...}` with covariant elements.
    Tuple(Vec<JuliaType>),
    /// `NamedTuple{names, Tuple{...}}` with covariant elements.
    NamedTuple {
        names: Vec<String>,
        types: Vec<JuliaType>,
    },
    /// `Union{...}`; normalized unions have at least two members.
    Union(Vec<JuliaType>),
    /// `Type{T}`: the type whose only instance is the type `T`.
    TypeOf(Box<JuliaType>),
    /// An existential placeholder.
    TypeVar(TypeVar),
}

impl JuliaType {
    pub fn named(name: impl Into<String>) -> Self {
        JuliaType::DataType {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn parametric(name: impl Into<String>, params: Vec<JuliaType>) -> Self {
        JuliaType::DataType {
            name: name.into(),
            params,
        }
    }

    pub fn int64() -> Self {
        Self::named("Int64")
    }

    pub fn float64() -> Self {
        Self::named("Float64")
    }

    pub fn bool() -> Self {
        Self::named("Bool")
    }

    pub fn char() -> Self {
        Self::named("Char")
    }

    pub fn string() -> Self {
        Self::named("String")
    }

    pub fn symbol() -> Self {
        Self::named("Symbol")
    }

    pub fn nothing() -> Self {
        Self::named("Nothing")
    }

    pub fn type_of(t: JuliaType) -> Self {
        JuliaType::TypeOf(Box::new(t))
    }

    pub fn var(name: impl Into<String>, upper_bound: JuliaType) -> Self {
        JuliaType::TypeVar(TypeVar::new(name, upper_bound))
    }

    pub fn wildcard() -> Self {
        JuliaType::TypeVar(TypeVar::wildcard(JuliaType::Any))
    }

    /// Build a normalized union. Nested unions are flattened, `Bottom`
    /// members dropped and duplicates removed; `Any` absorbs everything.
    pub fn union(members: impl IntoIterator<Item = JuliaType>) -> Self {
        let mut flat = Vec::new();
        for m in members {
            match m {
                JuliaType::Bottom => {}
                JuliaType::Any => return JuliaType::Any,
                JuliaType::Union(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        flat.sort();
        flat.dedup();
        match flat.len() {
            0 => JuliaType::Bottom,
            1 => flat.pop().unwrap_or(JuliaType::Bottom),
            _ => JuliaType::Union(flat),
        }
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, JuliaType::Bottom)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, JuliaType::Any)
    }

    /// Nominal name, if this is a `DataType`.
    pub fn datatype_name(&self) -> Option<&str> {
        match self {
            JuliaType::DataType { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether any `TypeVar` occurs anywhere in this type.
    pub fn has_free_type_vars(&self) -> bool {
        match self {
            JuliaType::Any | JuliaType::Bottom => false,
            JuliaType::TypeVar(_) => true,
            JuliaType::DataType { params, .. } => params.iter().any(|p| p.has_free_type_vars()),
            JuliaType::Tuple(elems) | JuliaType::Union(elems) => {
                elems.iter().any(|e| e.has_free_type_vars())
            }
            JuliaType::NamedTuple { types, .. } => types.iter().any(|t| t.has_free_type_vars()),
            JuliaType::TypeOf(inner) => inner.has_free_type_vars(),
        }
    }

    /// Nesting depth of type parameters. Unions do not add a level.
    pub fn depth(&self) -> usize {
        fn max_depth(items: &[JuliaType]) -> usize {
            items.iter().map(JuliaType::depth).max().unwrap_or(0)
        }
        match self {
            JuliaType::Any | JuliaType::Bottom | JuliaType::TypeVar(_) => 0,
            JuliaType::DataType { params, .. } if params.is_empty() => 0,
            JuliaType::DataType { params, .. } => 1 + max_depth(params),
            JuliaType::Tuple(elems) => 1 + max_depth(elems),
            JuliaType::NamedTuple { types, .. } => 1 + max_depth(types),
            JuliaType::Union(members) => max_depth(members),
            JuliaType::TypeOf(inner) => 1 + inner.depth(),
        }
    }

    /// Widen this type so that its depth does not exceed `max_depth`
    /// (a depth of at least one is always kept for applied types).
    ///
    /// The result is always a supertype of `self`: covariant positions
    /// widen to `Any`, invariant parameter positions to anonymous
    /// placeholders.
    ///
    /// ```
    /// use subset_julia_infer::types::JuliaType;
    ///
    /// let nested = JuliaType::Tuple(vec![JuliaType::Tuple(vec![JuliaType::int64()])]);
    /// let limited = nested.limit_depth(1);
    /// assert_eq!(limited, JuliaType::Tuple(vec![JuliaType::Any]));
    /// ```
    pub fn limit_depth(&self, max_depth: usize) -> JuliaType {
        if self.depth() <= max_depth {
            return self.clone();
        }
        limit(self, max_depth.max(1))
    }

    /// Replace `TypeVar`s by name.
    pub fn substitute(&self, bindings: &[(String, JuliaType)]) -> JuliaType {
        match self {
            JuliaType::TypeVar(tv) => bindings
                .iter()
                .find(|(name, _)| *name == tv.name)
                .map(|(_, t)| t.clone())
                .unwrap_or_else(|| self.clone()),
            JuliaType::DataType { name, params } => JuliaType::DataType {
                name: name.clone(),
                params: params.iter().map(|p| p.substitute(bindings)).collect(),
            },
            JuliaType::Tuple(elems) => {
                JuliaType::Tuple(elems.iter().map(|e| e.substitute(bindings)).collect())
            }
            JuliaType::NamedTuple { names, types } => JuliaType::NamedTuple {
                names: names.clone(),
                types: types.iter().map(|t| t.substitute(bindings)).collect(),
            },
            JuliaType::Union(members) => {
                JuliaType::union(members.iter().map(|m| m.substitute(bindings)))
            }
            JuliaType::TypeOf(inner) => JuliaType::type_of(inner.substitute(bindings)),
            JuliaType::Any | JuliaType::Bottom => self.clone(),
        }
    }
}

fn limit(t: &JuliaType, budget: usize) -> JuliaType {
    match t {
        JuliaType::DataType { name, params } if !params.is_empty() => JuliaType::DataType {
            name: name.clone(),
            params: params.iter().map(|p| limit_param(p, budget - 1)).collect(),
        },
        JuliaType::Tuple(elems) => {
            JuliaType::Tuple(elems.iter().map(|e| limit_covariant(e, budget - 1)).collect())
        }
        JuliaType::NamedTuple { names, types } => JuliaType::NamedTuple {
            names: names.clone(),
            types: types.iter().map(|e| limit_covariant(e, budget - 1)).collect(),
        },
        JuliaType::TypeOf(inner) => JuliaType::type_of(limit_param(inner, budget - 1)),
        JuliaType::Union(members) => JuliaType::union(members.iter().map(|m| limit(m, budget))),
        _ => t.clone(),
    }
}

fn limit_covariant(t: &JuliaType, budget: usize) -> JuliaType {
    if t.depth() <= budget {
        t.clone()
    } else if budget == 0 {
        JuliaType::Any
    } else {
        limit(t, budget)
    }
}

// Invariant positions only admit structural narrowing or a placeholder.
fn limit_param(t: &JuliaType, budget: usize) -> JuliaType {
    if t.depth() <= budget {
        return t.clone();
    }
    match t {
        JuliaType::DataType { .. }
        | JuliaType::Tuple(_)
        | JuliaType::NamedTuple { .. }
        | JuliaType::TypeOf(_)
            if budget > 0 =>
        {
            limit_nested_param(t, budget)
        }
        _ => JuliaType::wildcard(),
    }
}

fn limit_nested_param(t: &JuliaType, budget: usize) -> JuliaType {
    match t {
        JuliaType::DataType { name, params } => JuliaType::DataType {
            name: name.clone(),
            params: params.iter().map(|p| limit_param(p, budget - 1)).collect(),
        },
        JuliaType::Tuple(elems) => {
            JuliaType::Tuple(elems.iter().map(|e| limit_param(e, budget - 1)).collect())
        }
        JuliaType::NamedTuple { names, types } => JuliaType::NamedTuple {
            names: names.clone(),
            types: types.iter().map(|e| limit_param(e, budget - 1)).collect(),
        },
        JuliaType::TypeOf(inner) => JuliaType::type_of(limit_param(inner, budget - 1)),
        _ => JuliaType::wildcard(),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[JuliaType]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for JuliaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JuliaType::Any => write!(f, "Any"),
            JuliaType::Bottom => write!(f, "Union{{}}"),
            JuliaType::DataType { name, params } if params.is_empty() => write!(f, "{}", name),
            JuliaType::DataType { name, params } => {
                write!(f, "{}{{", name)?;
                write_list(f, params)?;
                write!(f, "}}")
            }
            JuliaType::Tuple(elems) => {
                write!(f, "Tuple{{")?;
                write_list(f, elems)?;
                write!(f, "}}")
            }
            JuliaType::NamedTuple { names, types } => {
                let names: Vec<String> = names.iter().map(|n| format!(":{}", n)).collect();
                let trailing = if names.len() == 1 { "," } else { "" };
                write!(f, "NamedTuple{{({}{}), Tuple{{", names.join(", "), trailing)?;
                write_list(f, types)?;
                write!(f, "}}}}")
            }
            JuliaType::Union(members) => {
                write!(f, "Union{{")?;
                write_list(f, members)?;
                write!(f, "}}")
            }
            JuliaType::TypeOf(inner) => write!(f, "Type{{{}}}", inner),
            JuliaType::TypeVar(tv) => write!(f, "{}", tv),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nest_ref(depth: usize) -> JuliaType {
        (0..depth).fold(JuliaType::int64(), |acc, _| {
            JuliaType::parametric("Ref", vec![acc])
        })
    }

    #[test]
    fn test_union_normalization() {
        let u = JuliaType::union(vec![
            JuliaType::int64(),
            JuliaType::Bottom,
            JuliaType::union(vec![JuliaType::string(), JuliaType::int64()]),
        ]);
        assert_eq!(
            u,
            JuliaType::Union(vec![JuliaType::int64(), JuliaType::string()])
        );
        assert_eq!(JuliaType::union(vec![]), JuliaType::Bottom);
        assert_eq!(
            JuliaType::union(vec![JuliaType::int64(), JuliaType::Any]),
            JuliaType::Any
        );
        assert_eq!(
            JuliaType::union(vec![JuliaType::int64()]),
            JuliaType::int64()
        );
    }

    #[test]
    fn test_depth() {
        assert_eq!(JuliaType::int64().depth(), 0);
        assert_eq!(nest_ref(3).depth(), 3);
        assert_eq!(JuliaType::Tuple(vec![]).depth(), 1);
        assert_eq!(JuliaType::type_of(JuliaType::int64()).depth(), 1);
    }

    #[test]
    fn test_limit_depth_invariant_params() {
        let limited = nest_ref(5).limit_depth(2);
        assert_eq!(
            limited,
            JuliaType::parametric(
                "Ref",
                vec![JuliaType::parametric("Ref", vec![JuliaType::wildcard()])]
            )
        );
        assert!(limited.depth() <= 2);
    }

    #[test]
    fn test_limit_depth_keeps_shallow_types() {
        let t = JuliaType::Tuple(vec![JuliaType::int64(), JuliaType::string()]);
        assert_eq!(t.limit_depth(1), t);
    }

    #[test]
    fn test_substitute() {
        let field = JuliaType::parametric("Ref", vec![JuliaType::var("T", JuliaType::Any)]);
        let bound = field.substitute(&[("T".to_string(), JuliaType::int64())]);
        assert_eq!(bound, nest_ref(1));
    }

    #[test]
    fn test_display() {
        insta::assert_snapshot!(
            JuliaType::union(vec![JuliaType::int64(), JuliaType::nothing()]).to_string(),
            @"Union{Int64, Nothing}"
        );
        insta::assert_snapshot!(
            JuliaType::parametric("Ref", vec![JuliaType::var("T", JuliaType::named("Real"))])
                .to_string(),
            @"Ref{T<:Real}"
        );
        insta::assert_snapshot!(
            JuliaType::NamedTuple {
                names: vec!["a".into(), "b".into()],
                types: vec![JuliaType::int64(), JuliaType::string()],
            }
            .to_string(),
            @"NamedTuple{(:a, :b), Tuple{Int64, String}}"
        );
        assert_eq!(JuliaType::Bottom.to_string(), "Union{}");
        assert_eq!(
            JuliaType::type_of(JuliaType::int64()).to_string(),
            "Type{Int64}"
        );
    }
}
