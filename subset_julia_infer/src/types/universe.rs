//! A nominal type hierarchy implementing `TypeOracle`.
//!
//! The universe is seeded with the builtin numeric, string and container
//! types and can be extended with user definitions via `define`.
//!
//! Hierarchy rules:
//! - single inheritance: every nominal type names one supertype
//! - nominal parameters are invariant, except that a `TypeVar` parameter
//!   matches any type within its bound
//! - tuple and named-tuple elements are covariant

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{JuliaType, TypeOracle, TypeVar};
use crate::error::InstantiationError;

/// Guard against malformed cyclic supertype declarations.
const MAX_HIERARCHY_DEPTH: usize = 64;

/// Declaration of a nominal type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTypeDef {
    pub name: String,
    /// Declared parameters; fields and supertype refer to them by name.
    pub params: Vec<TypeVar>,
    pub supertype: JuliaType,
    pub fields: Vec<(String, JuliaType)>,
    pub mutable: bool,
    pub is_abstract: bool,
    /// Fixed storage size for primitive types.
    pub size: Option<usize>,
}

impl DataTypeDef {
    pub fn abstract_type(name: impl Into<String>, supertype: JuliaType) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            supertype,
            fields: Vec::new(),
            mutable: false,
            is_abstract: true,
            size: None,
        }
    }

    pub fn primitive(name: impl Into<String>, supertype: JuliaType, size: usize) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            supertype,
            fields: Vec::new(),
            mutable: false,
            is_abstract: false,
            size: Some(size),
        }
    }

    pub fn struct_type(
        name: impl Into<String>,
        supertype: JuliaType,
        fields: Vec<(&str, JuliaType)>,
    ) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            supertype,
            fields: fields
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
            mutable: false,
            is_abstract: false,
            size: None,
        }
    }

    pub fn with_params(mut self, params: Vec<TypeVar>) -> Self {
        self.params = params;
        self
    }

    pub fn mutable_struct(mut self) -> Self {
        self.mutable = true;
        self
    }

    /// Bind declared parameters to `params`; missing ones become bounded
    /// placeholders.
    fn bindings(&self, params: &[JuliaType]) -> Vec<(String, JuliaType)> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, tv)| {
                let bound = params.get(i).cloned().unwrap_or_else(|| {
                    JuliaType::TypeVar(TypeVar::wildcard((*tv.upper_bound).clone()))
                });
                (tv.name.clone(), bound)
            })
            .collect()
    }
}

/// The set of nominal type declarations known to inference.
#[derive(Debug, Clone)]
pub struct TypeUniverse {
    defs: HashMap<String, DataTypeDef>,
}

impl Default for TypeUniverse {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeUniverse {
    /// A universe containing the builtin types.
    pub fn new() -> Self {
        let mut universe = Self::empty();
        for def in builtin_types() {
            universe.define(def);
        }
        universe
    }

    /// A universe with no declarations at all.
    pub fn empty() -> Self {
        Self {
            defs: HashMap::new(),
        }
    }

    /// Add or replace a declaration, returning the previous one.
    pub fn define(&mut self, def: DataTypeDef) -> Option<DataTypeDef> {
        self.defs.insert(def.name.clone(), def)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    fn supertype_of(&self, name: &str, params: &[JuliaType]) -> Option<JuliaType> {
        let def = self.defs.get(name)?;
        Some(def.supertype.substitute(&def.bindings(params)))
    }

    /// Proper nominal ancestors of `t`, nearest first, ending before `Any`.
    fn ancestors(&self, t: &JuliaType) -> Vec<JuliaType> {
        let mut out = Vec::new();
        let mut current = t.clone();
        while out.len() < MAX_HIERARCHY_DEPTH {
            let next = match &current {
                JuliaType::DataType { name, params } => self.supertype_of(name, params),
                _ => None,
            };
            match next {
                Some(sup @ JuliaType::DataType { .. }) => {
                    out.push(sup.clone());
                    current = sup;
                }
                _ => break,
            }
        }
        out
    }

    fn is_ancestor_name(&self, ancestor: &str, t: &JuliaType) -> bool {
        self.ancestors(t)
            .iter()
            .any(|a| a.datatype_name() == Some(ancestor))
    }

    /// Invariant parameter matching with placeholders on the right.
    fn param_matches(&self, p: &JuliaType, q: &JuliaType) -> bool {
        if p == q {
            return true;
        }
        match (p, q) {
            (JuliaType::TypeVar(u), JuliaType::TypeVar(v)) => {
                self.is_subtype(&u.upper_bound, &v.upper_bound)
            }
            (_, JuliaType::TypeVar(v)) => self.is_subtype(p, &v.upper_bound),
            (JuliaType::TypeVar(_), _) => false,
            (
                JuliaType::DataType {
                    name: n1,
                    params: p1,
                },
                JuliaType::DataType {
                    name: n2,
                    params: p2,
                },
            ) if n1 == n2 && p1.len() == p2.len() && q.has_free_type_vars() => p1
                .iter()
                .zip(p2)
                .all(|(a, b)| self.param_matches(a, b)),
            (JuliaType::Tuple(xs), JuliaType::Tuple(ys))
                if xs.len() == ys.len() && q.has_free_type_vars() =>
            {
                xs.iter().zip(ys).all(|(a, b)| self.param_matches(a, b))
            }
            (
                JuliaType::NamedTuple {
                    names: n1,
                    types: t1,
                },
                JuliaType::NamedTuple {
                    names: n2,
                    types: t2,
                },
            ) if n1 == n2 && q.has_free_type_vars() => {
                t1.iter().zip(t2).all(|(a, b)| self.param_matches(a, b))
            }
            (JuliaType::TypeOf(a), JuliaType::TypeOf(b)) if q.has_free_type_vars() => {
                self.param_matches(a, b)
            }
            _ => !q.has_free_type_vars() && self.type_equal(p, q),
        }
    }

    fn nominal_subtype(&self, name: &str, params: &[JuliaType], b: &JuliaType) -> bool {
        let JuliaType::DataType {
            name: n2,
            params: p2,
        } = b
        else {
            return false;
        };
        if name == n2 {
            if p2.is_empty() {
                return true;
            }
            if params.is_empty() {
                // An unapplied head covers only fully open applications.
                let Some(def) = self.defs.get(name) else {
                    return false;
                };
                return p2.len() == def.params.len()
                    && p2.iter().zip(&def.params).all(|(q, declared)| match q {
                        JuliaType::TypeVar(v) => {
                            self.is_subtype(&declared.upper_bound, &v.upper_bound)
                        }
                        _ => false,
                    });
            }
            return params.len() == p2.len()
                && params
                    .iter()
                    .zip(p2)
                    .all(|(p, q)| self.param_matches(p, q));
        }
        match self.supertype_of(name, params) {
            Some(sup) => self.is_subtype(&sup, b),
            None => false,
        }
    }

    fn intersect_params(&self, p: &JuliaType, q: &JuliaType) -> Option<Option<JuliaType>> {
        // Some(Some(t)): exact parameter; Some(None): undecidable; None: disjoint.
        match (p, q) {
            _ if p == q => Some(Some(p.clone())),
            (JuliaType::TypeVar(u), JuliaType::TypeVar(v)) => {
                let ub = self.intersect(&u.upper_bound, &v.upper_bound);
                if ub.is_bottom() {
                    None
                } else {
                    Some(Some(JuliaType::TypeVar(TypeVar::new(u.name.clone(), ub))))
                }
            }
            (JuliaType::TypeVar(v), other) | (other, JuliaType::TypeVar(v))
                if !other.has_free_type_vars() =>
            {
                if self.is_subtype(other, &v.upper_bound) {
                    Some(Some(other.clone()))
                } else if self.is_disjoint(other, &v.upper_bound) {
                    None
                } else {
                    Some(None)
                }
            }
            _ if !p.has_free_type_vars() && !q.has_free_type_vars() => {
                if self.type_equal(p, q) {
                    Some(Some(p.clone()))
                } else {
                    None
                }
            }
            _ => Some(None),
        }
    }

    fn intersect_nominal(&self, a: &JuliaType, b: &JuliaType) -> JuliaType {
        let (
            JuliaType::DataType {
                name: n1,
                params: p1,
            },
            JuliaType::DataType {
                name: n2,
                params: p2,
            },
        ) = (a, b)
        else {
            return JuliaType::Bottom;
        };
        if !self.defs.contains_key(n1) || !self.defs.contains_key(n2) {
            return a.clone();
        }
        if n1 == n2 {
            if p1.len() != p2.len() {
                return a.clone();
            }
            let mut params = Vec::with_capacity(p1.len());
            for (p, q) in p1.iter().zip(p2) {
                match self.intersect_params(p, q) {
                    None => return JuliaType::Bottom,
                    Some(Some(t)) => params.push(t),
                    Some(None) => return a.clone(),
                }
            }
            return JuliaType::parametric(n1.clone(), params);
        }
        // With single inheritance, two nominal types share instances only if
        // one is an ancestor of the other.
        if self.is_ancestor_name(n2, a) {
            a.clone()
        } else if self.is_ancestor_name(n1, b) {
            b.clone()
        } else {
            JuliaType::Bottom
        }
    }
}

impl TypeOracle for TypeUniverse {
    fn is_subtype(&self, a: &JuliaType, b: &JuliaType) -> bool {
        if a == b {
            return true;
        }
        match (a, b) {
            (JuliaType::Bottom, _) | (_, JuliaType::Any) => true,
            (JuliaType::Union(members), _) => members.iter().all(|m| self.is_subtype(m, b)),
            (JuliaType::TypeVar(u), _) => self.is_subtype(&u.upper_bound, b),
            (_, JuliaType::Union(members)) => members.iter().any(|m| self.is_subtype(a, m)),
            (_, JuliaType::TypeVar(v)) => self.is_subtype(a, &v.upper_bound),
            (JuliaType::Any, _) | (_, JuliaType::Bottom) => false,
            (JuliaType::Tuple(xs), JuliaType::Tuple(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.is_subtype(x, y))
            }
            (
                JuliaType::NamedTuple {
                    names: n1,
                    types: t1,
                },
                JuliaType::NamedTuple {
                    names: n2,
                    types: t2,
                },
            ) => n1 == n2 && t1.iter().zip(t2).all(|(x, y)| self.is_subtype(x, y)),
            (JuliaType::TypeOf(x), JuliaType::TypeOf(y)) => self.param_matches(x, y),
            (JuliaType::DataType { name, params }, _) => self.nominal_subtype(name, params, b),
            _ => false,
        }
    }

    fn intersect(&self, a: &JuliaType, b: &JuliaType) -> JuliaType {
        if self.is_subtype(a, b) {
            return a.clone();
        }
        if self.is_subtype(b, a) {
            return b.clone();
        }
        match (a, b) {
            (JuliaType::Union(members), _) => {
                JuliaType::union(members.iter().map(|m| self.intersect(m, b)))
            }
            (_, JuliaType::Union(members)) => {
                JuliaType::union(members.iter().map(|m| self.intersect(a, m)))
            }
            (JuliaType::TypeVar(u), _) => self.intersect(&u.upper_bound, b),
            (_, JuliaType::TypeVar(v)) => self.intersect(a, &v.upper_bound),
            (JuliaType::Tuple(xs), JuliaType::Tuple(ys)) => {
                if xs.len() != ys.len() {
                    return JuliaType::Bottom;
                }
                let elems: Vec<JuliaType> =
                    xs.iter().zip(ys).map(|(x, y)| self.intersect(x, y)).collect();
                if elems.iter().any(JuliaType::is_bottom) {
                    JuliaType::Bottom
                } else {
                    JuliaType::Tuple(elems)
                }
            }
            (
                JuliaType::NamedTuple {
                    names: n1,
                    types: t1,
                },
                JuliaType::NamedTuple {
                    names: n2,
                    types: t2,
                },
            ) => {
                if n1 != n2 {
                    return JuliaType::Bottom;
                }
                let types: Vec<JuliaType> =
                    t1.iter().zip(t2).map(|(x, y)| self.intersect(x, y)).collect();
                if types.iter().any(JuliaType::is_bottom) {
                    JuliaType::Bottom
                } else {
                    JuliaType::NamedTuple {
                        names: n1.clone(),
                        types,
                    }
                }
            }
            (JuliaType::TypeOf(x), JuliaType::TypeOf(y)) => {
                if !x.has_free_type_vars() && !y.has_free_type_vars() {
                    JuliaType::Bottom
                } else {
                    a.clone()
                }
            }
            (JuliaType::DataType { .. }, JuliaType::DataType { .. }) => {
                self.intersect_nominal(a, b)
            }
            (JuliaType::DataType { name, .. }, _) | (_, JuliaType::DataType { name, .. })
                if !self.defs.contains_key(name) =>
            {
                a.clone()
            }
            _ => JuliaType::Bottom,
        }
    }

    fn is_leaf_type(&self, t: &JuliaType) -> bool {
        match t {
            JuliaType::DataType { name, params } => match self.defs.get(name) {
                Some(def) => {
                    !def.is_abstract
                        && params.len() == def.params.len()
                        && !t.has_free_type_vars()
                        && params.iter().all(|p| !matches!(p, JuliaType::Bottom))
                }
                None => false,
            },
            JuliaType::Tuple(elems) => elems.iter().all(|e| self.is_leaf_type(e)),
            JuliaType::NamedTuple { types, .. } => types.iter().all(|e| self.is_leaf_type(e)),
            JuliaType::TypeOf(inner) => !inner.has_free_type_vars(),
            _ => false,
        }
    }

    fn type_join(&self, a: &JuliaType, b: &JuliaType) -> JuliaType {
        if self.is_subtype(a, b) {
            return b.clone();
        }
        if self.is_subtype(b, a) {
            return a.clone();
        }
        match (a, b) {
            (JuliaType::Union(members), other) | (other, JuliaType::Union(members)) => members
                .iter()
                .fold(other.clone(), |acc, m| self.type_join(&acc, m)),
            (JuliaType::TypeVar(u), other) | (other, JuliaType::TypeVar(u)) => {
                self.type_join(&u.upper_bound, other)
            }
            (JuliaType::Tuple(xs), JuliaType::Tuple(ys)) if xs.len() == ys.len() => {
                JuliaType::Tuple(xs.iter().zip(ys).map(|(x, y)| self.type_join(x, y)).collect())
            }
            (
                JuliaType::NamedTuple {
                    names: n1,
                    types: t1,
                },
                JuliaType::NamedTuple {
                    names: n2,
                    types: t2,
                },
            ) if n1 == n2 => JuliaType::NamedTuple {
                names: n1.clone(),
                types: t1.iter().zip(t2).map(|(x, y)| self.type_join(x, y)).collect(),
            },
            (JuliaType::TypeOf(x), JuliaType::TypeOf(y)) => JuliaType::type_of(
                JuliaType::TypeVar(TypeVar::wildcard(self.type_join(x, y))),
            ),
            (
                JuliaType::DataType {
                    name: n1,
                    params: p1,
                },
                JuliaType::DataType {
                    name: n2,
                    params: p2,
                },
            ) if n1 == n2 => {
                if p1.len() != p2.len() {
                    return JuliaType::named(n1.clone());
                }
                let params = p1
                    .iter()
                    .zip(p2)
                    .map(|(p, q)| {
                        if self.param_matches(p, q) {
                            q.clone()
                        } else if self.param_matches(q, p) {
                            p.clone()
                        } else {
                            JuliaType::TypeVar(TypeVar::wildcard(self.type_join(p, q)))
                        }
                    })
                    .collect();
                JuliaType::parametric(n1.clone(), params)
            }
            (JuliaType::DataType { .. }, _) => self
                .ancestors(a)
                .into_iter()
                .find(|sup| self.is_subtype(b, sup))
                .unwrap_or(JuliaType::Any),
            _ => JuliaType::Any,
        }
    }

    fn datatype(&self, name: &str) -> Option<&DataTypeDef> {
        self.defs.get(name)
    }

    fn field_types(&self, t: &JuliaType) -> Option<Vec<(String, JuliaType)>> {
        match t {
            JuliaType::DataType { name, params } => {
                let def = self.defs.get(name)?;
                if def.is_abstract {
                    return None;
                }
                let bindings = def.bindings(params);
                Some(
                    def.fields
                        .iter()
                        .map(|(n, ft)| (n.clone(), ft.substitute(&bindings)))
                        .collect(),
                )
            }
            JuliaType::Tuple(elems) => Some(
                elems
                    .iter()
                    .enumerate()
                    .map(|(i, e)| ((i + 1).to_string(), e.clone()))
                    .collect(),
            ),
            JuliaType::NamedTuple { names, types } => {
                Some(names.iter().cloned().zip(types.iter().cloned()).collect())
            }
            _ => None,
        }
    }

    fn is_mutable(&self, t: &JuliaType) -> bool {
        match t {
            JuliaType::DataType { name, .. } => {
                self.defs.get(name).map(|d| d.mutable).unwrap_or(false)
            }
            _ => false,
        }
    }

    fn sizeof(&self, t: &JuliaType) -> Option<usize> {
        match t {
            JuliaType::DataType { name, .. } => self
                .defs
                .get(name)
                .filter(|d| !d.is_abstract)
                .and_then(|d| d.size),
            _ => None,
        }
    }

    fn instantiate(
        &self,
        head: &str,
        params: &[JuliaType],
    ) -> Result<JuliaType, InstantiationError> {
        match head {
            "Tuple" => return Ok(JuliaType::Tuple(params.to_vec())),
            "Union" => return Ok(JuliaType::union(params.iter().cloned())),
            "Type" => {
                return match params {
                    [] => Ok(JuliaType::type_of(JuliaType::wildcard())),
                    [p] => Ok(JuliaType::type_of(p.clone())),
                    _ => Err(InstantiationError::TooManyParameters {
                        head: head.to_string(),
                        expected: 1,
                        got: params.len(),
                    }),
                }
            }
            _ => {}
        }
        let def = self
            .defs
            .get(head)
            .ok_or_else(|| InstantiationError::UnknownType(head.to_string()))?;
        if def.params.is_empty() {
            return if params.is_empty() {
                Ok(JuliaType::named(head))
            } else {
                Err(InstantiationError::NotParametric(head.to_string()))
            };
        }
        if params.len() > def.params.len() {
            return Err(InstantiationError::TooManyParameters {
                head: head.to_string(),
                expected: def.params.len(),
                got: params.len(),
            });
        }
        let mut applied: Vec<JuliaType> = Vec::with_capacity(def.params.len());
        let mut bound_so_far: Vec<(String, JuliaType)> = Vec::new();
        for (declared, param) in def.params.iter().zip(params) {
            let bound = declared.upper_bound.substitute(&bound_so_far);
            let checked = match param {
                JuliaType::TypeVar(v) => {
                    let ub = self.intersect(&v.upper_bound, &bound);
                    if ub.is_bottom() {
                        None
                    } else {
                        Some(JuliaType::TypeVar(TypeVar::new(v.name.clone(), ub)))
                    }
                }
                p if p.has_free_type_vars() || self.is_subtype(p, &bound) => Some(p.clone()),
                _ => None,
            };
            let checked = checked.ok_or_else(|| InstantiationError::BoundViolation {
                head: head.to_string(),
                param: declared.name.clone(),
                bound: bound.to_string(),
                got: param.to_string(),
            })?;
            bound_so_far.push((declared.name.clone(), checked.clone()));
            applied.push(checked);
        }
        for declared in def.params.iter().skip(params.len()) {
            let bound = declared.upper_bound.substitute(&bound_so_far);
            applied.push(JuliaType::TypeVar(TypeVar::wildcard(bound)));
        }
        Ok(JuliaType::parametric(head, applied))
    }
}

fn builtin_types() -> Vec<DataTypeDef> {
    let named = JuliaType::named;
    let t = || JuliaType::var("T", JuliaType::Any);
    vec![
        DataTypeDef::abstract_type("Number", JuliaType::Any),
        DataTypeDef::abstract_type("Real", named("Number")),
        DataTypeDef::abstract_type("Integer", named("Real")),
        DataTypeDef::abstract_type("Signed", named("Integer")),
        DataTypeDef::abstract_type("Unsigned", named("Integer")),
        DataTypeDef::abstract_type("AbstractFloat", named("Real")),
        DataTypeDef::primitive("Int64", named("Signed"), 8),
        DataTypeDef::primitive("Int32", named("Signed"), 4),
        DataTypeDef::primitive("Int8", named("Signed"), 1),
        DataTypeDef::primitive("UInt64", named("Unsigned"), 8),
        DataTypeDef::primitive("UInt8", named("Unsigned"), 1),
        DataTypeDef::primitive("Bool", named("Integer"), 1),
        DataTypeDef::primitive("Float64", named("AbstractFloat"), 8),
        DataTypeDef::primitive("Float32", named("AbstractFloat"), 4),
        DataTypeDef::abstract_type("AbstractChar", JuliaType::Any),
        DataTypeDef::primitive("Char", named("AbstractChar"), 4),
        DataTypeDef::abstract_type("AbstractString", JuliaType::Any),
        DataTypeDef::struct_type("String", named("AbstractString"), vec![]),
        DataTypeDef::struct_type("Symbol", JuliaType::Any, vec![]),
        DataTypeDef::primitive("Nothing", JuliaType::Any, 0),
        DataTypeDef::abstract_type("Function", JuliaType::Any),
        DataTypeDef::abstract_type("Exception", JuliaType::Any),
        DataTypeDef::struct_type(
            "ErrorException",
            named("Exception"),
            vec![("msg", JuliaType::string())],
        ),
        DataTypeDef::abstract_type("Ref", JuliaType::Any).with_params(vec![TypeVar::new(
            "T",
            JuliaType::Any,
        )]),
        DataTypeDef::struct_type(
            "RefValue",
            JuliaType::parametric("Ref", vec![t()]),
            vec![("x", t())],
        )
        .with_params(vec![TypeVar::new("T", JuliaType::Any)])
        .mutable_struct(),
        DataTypeDef::struct_type("Some", JuliaType::Any, vec![("value", t())])
            .with_params(vec![TypeVar::new("T", JuliaType::Any)]),
        DataTypeDef::struct_type(
            "Pair",
            JuliaType::Any,
            vec![
                ("first", JuliaType::var("A", JuliaType::Any)),
                ("second", JuliaType::var("B", JuliaType::Any)),
            ],
        )
        .with_params(vec![
            TypeVar::new("A", JuliaType::Any),
            TypeVar::new("B", JuliaType::Any),
        ]),
    ]
}
