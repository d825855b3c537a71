//! Lattice operations: partial order, widening merge and widening helpers.

use crate::config::InferenceLimits;
use crate::diagnostics::{emit_type_depth_limited, emit_union_widened};
use crate::types::{JuliaType, TypeOracle, TypeVar};

use super::value::AbstractValue;

/// Lattice operations parameterized by the type oracle and widening limits.
#[derive(Debug, Clone, Copy)]
pub struct TypeLattice<'a> {
    oracle: &'a dyn TypeOracle,
    limits: &'a InferenceLimits,
}

impl<'a> TypeLattice<'a> {
    pub fn new(oracle: &'a dyn TypeOracle, limits: &'a InferenceLimits) -> Self {
        Self { oracle, limits }
    }

    pub fn oracle(&self) -> &'a dyn TypeOracle {
        self.oracle
    }

    pub fn limits(&self) -> &'a InferenceLimits {
        self.limits
    }

    /// `a ⊒ b`.
    pub fn subsumes(&self, a: &AbstractValue, b: &AbstractValue) -> bool {
        self.le(b, a)
    }

    /// `x ⊑ y`.
    pub fn le(&self, x: &AbstractValue, y: &AbstractValue) -> bool {
        use AbstractValue::*;
        if x == y {
            return true;
        }
        match (x, y) {
            (Bottom, _) | (_, Top) => true,
            (Top, _) | (_, Bottom) => false,
            (Union2(p, q), _) => self.le(p, y) && self.le(q, y),
            (_, Union2(..)) => y.leaves().into_iter().any(|leaf| self.le(x, leaf)),
            (
                Conditional {
                    slot: s1,
                    then_type: t1,
                    else_type: e1,
                },
                Conditional {
                    slot: s2,
                    then_type: t2,
                    else_type: e2,
                },
            ) => s1 == s2 && self.le(t1, t2) && self.le(e1, e2),
            (Conditional { .. }, _) => self.le(&AbstractValue::bool_type(), y),
            (_, Conditional { .. }) => false,
            (Const(c), Const(d)) => c == d,
            (Const(c), Concrete { ty, exact }) => {
                let ct = c.julia_type();
                if *exact {
                    c.has_exact_type() && self.oracle.type_equal(&ct, ty)
                } else {
                    self.oracle.is_subtype(&ct, ty)
                }
            }
            (Const(_), _) => false,
            (
                Concrete {
                    ty: t1,
                    exact: e1,
                },
                Concrete {
                    ty: t2,
                    exact: e2,
                },
            ) => {
                if *e2 {
                    self.oracle.type_equal(t1, t2) && (*e1 || self.oracle.is_leaf_type(t2))
                } else {
                    self.oracle.is_subtype(t1, t2)
                }
            }
            (
                TypeOf {
                    ty: t1,
                    exact: e1,
                },
                TypeOf {
                    ty: t2,
                    exact: e2,
                },
            ) => {
                if *e2 {
                    *e1 && self.oracle.type_equal(t1, t2)
                } else {
                    self.oracle.is_subtype(t1, t2)
                }
            }
            (PartialTypeVar(tv), TypeOf { ty, exact: false }) => {
                self.oracle.is_subtype(&tv.upper_bound, ty)
            }
            (TypeOf { .. } | PartialTypeVar(_), Concrete { .. }) => {
                self.le(&self.widen_to_concrete(x), y)
            }
            _ => false,
        }
    }

    /// Widened join of `a` and `b`.
    ///
    /// The result subsumes both operands. Unions are capped at
    /// `max_union_length` leaves, after which they collapse to a depth
    /// limited common supertype.
    pub fn merge(&self, a: &AbstractValue, b: &AbstractValue) -> AbstractValue {
        use AbstractValue::*;
        if a == b {
            return a.clone();
        }
        match (a, b) {
            (Bottom, other) | (other, Bottom) => return other.clone(),
            (Top, _) | (_, Top) => return Top,
            (
                Conditional {
                    slot: s1,
                    then_type: t1,
                    else_type: e1,
                },
                Conditional {
                    slot: s2,
                    then_type: t2,
                    else_type: e2,
                },
            ) => {
                return if s1 == s2 {
                    Conditional {
                        slot: *s1,
                        then_type: Box::new(self.merge(t1, t2)),
                        else_type: Box::new(self.merge(e1, e2)),
                    }
                } else {
                    AbstractValue::bool_type()
                };
            }
            (Conditional { .. }, other) | (other, Conditional { .. }) => {
                return self.merge(&AbstractValue::bool_type(), other);
            }
            _ => {}
        }

        let below = self.le(a, b);
        let above = self.le(b, a);
        match (below, above) {
            (true, true) => return canonical_min(a, b).clone(),
            (true, false) => return b.clone(),
            (false, true) => return a.clone(),
            (false, false) => {}
        }

        let leaves: Vec<AbstractValue> = a
            .leaves()
            .into_iter()
            .chain(b.leaves())
            .cloned()
            .collect();
        self.normalize_leaves(leaves)
    }

    fn normalize_leaves(&self, mut leaves: Vec<AbstractValue>) -> AbstractValue {
        leaves.sort_by_key(sort_key);
        leaves.dedup();

        // Distinct constants degrade to their runtime types.
        if leaves
            .iter()
            .filter(|l| matches!(l, AbstractValue::Const(_)))
            .count()
            > 1
        {
            leaves = leaves
                .into_iter()
                .map(|l| match l {
                    AbstractValue::Const(_) => self.widen_to_concrete(&l),
                    other => other,
                })
                .collect();
        }

        // Distinct type values share one inexact `TypeOf`.
        let (type_values, mut rest): (Vec<_>, Vec<_>) = leaves.into_iter().partition(|l| {
            matches!(
                l,
                AbstractValue::TypeOf { .. } | AbstractValue::PartialTypeVar(_)
            )
        });
        if type_values.len() > 1 {
            let joined = type_values
                .iter()
                .map(type_value_bound)
                .reduce(|acc, t| self.oracle.type_join(&acc, &t))
                .unwrap_or(JuliaType::Any);
            rest.push(AbstractValue::type_value(self.limit_type(&joined), false));
        } else {
            rest.extend(type_values);
        }

        rest.sort_by_key(sort_key);
        rest.dedup();
        let kept = self.prune_subsumed(rest);

        match kept.len() {
            0 => AbstractValue::Bottom,
            1 => kept.into_iter().next().unwrap_or(AbstractValue::Bottom),
            n if n > self.limits.max_union_length => self.collapse(&kept),
            _ => build_union(kept),
        }
    }

    // Drop leaves strictly below another leaf; of equivalent leaves keep the
    // first in canonical order.
    fn prune_subsumed(&self, leaves: Vec<AbstractValue>) -> Vec<AbstractValue> {
        let keep: Vec<bool> = (0..leaves.len())
            .map(|i| {
                !(0..leaves.len()).any(|j| {
                    j != i
                        && self.le(&leaves[i], &leaves[j])
                        && (!self.le(&leaves[j], &leaves[i]) || j < i)
                })
            })
            .collect();
        leaves
            .into_iter()
            .zip(keep)
            .filter_map(|(l, k)| k.then_some(l))
            .collect()
    }

    fn collapse(&self, leaves: &[AbstractValue]) -> AbstractValue {
        let joined = leaves
            .iter()
            .map(|l| self.widen_type(l))
            .reduce(|acc, t| self.oracle.type_join(&acc, &t))
            .unwrap_or(JuliaType::Bottom);
        let limited = self.limit_type(&joined);
        emit_union_widened(leaves.len(), &limited.to_string());
        AbstractValue::concrete(limited)
    }

    /// Depth-limit a type, reporting when precision is lost.
    pub fn limit_type(&self, ty: &JuliaType) -> JuliaType {
        let max = self.limits.max_type_depth;
        if ty.depth() <= max {
            return ty.clone();
        }
        let limited = ty.limit_depth(max);
        emit_type_depth_limited(max, &limited.to_string());
        limited
    }

    /// Depth-limit the types carried by a value.
    pub fn limit_value(&self, v: &AbstractValue) -> AbstractValue {
        let max = self.limits.max_type_depth;
        match v {
            AbstractValue::Concrete { ty, .. } if ty.depth() > max => {
                AbstractValue::concrete(self.limit_type(ty))
            }
            AbstractValue::TypeOf { ty, .. } if ty.depth() > max => {
                AbstractValue::type_value(self.limit_type(ty), false)
            }
            AbstractValue::Union2(a, b) => {
                self.merge(&self.limit_value(a), &self.limit_value(b))
            }
            AbstractValue::Const(c) if c.julia_type().depth() > max => {
                AbstractValue::concrete(self.limit_type(&c.julia_type()))
            }
            other => other.clone(),
        }
    }

    /// The runtime type of values described by `v`.
    pub fn widen_type(&self, v: &AbstractValue) -> JuliaType {
        match v {
            AbstractValue::Top => JuliaType::Any,
            AbstractValue::Bottom => JuliaType::Bottom,
            AbstractValue::Concrete { ty, .. } => ty.clone(),
            AbstractValue::Const(c) => c.julia_type(),
            AbstractValue::Conditional { .. } => JuliaType::bool(),
            AbstractValue::TypeOf { ty, exact: true } => JuliaType::type_of(ty.clone()),
            AbstractValue::TypeOf { ty, exact: false } => {
                JuliaType::type_of(JuliaType::TypeVar(TypeVar::wildcard(ty.clone())))
            }
            AbstractValue::PartialTypeVar(tv) => JuliaType::type_of(JuliaType::TypeVar(
                TypeVar::wildcard((*tv.upper_bound).clone()),
            )),
            AbstractValue::Union2(a, b) => {
                JuliaType::union(vec![self.widen_type(a), self.widen_type(b)])
            }
        }
    }

    /// Strip constant, conditional and type-value refinement down to a
    /// runtime type.
    pub fn widen_to_concrete(&self, v: &AbstractValue) -> AbstractValue {
        match v {
            AbstractValue::Const(c) => {
                AbstractValue::with_exactness(c.julia_type(), c.has_exact_type())
            }
            AbstractValue::Conditional { .. } => AbstractValue::bool_type(),
            AbstractValue::TypeOf { ty, exact } => AbstractValue::with_exactness(
                self.widen_type(v),
                *exact && !ty.has_free_type_vars(),
            ),
            AbstractValue::PartialTypeVar(_) => AbstractValue::concrete(self.widen_type(v)),
            AbstractValue::Union2(..) => self.normalize_leaves(
                v.leaves()
                    .into_iter()
                    .map(|l| self.widen_to_concrete(l))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Drop `Conditional` refinement, which is only meaningful within the
    /// frame that created it.
    pub fn widen_conditional(&self, v: &AbstractValue) -> AbstractValue {
        match v {
            AbstractValue::Conditional { .. } => AbstractValue::bool_type(),
            AbstractValue::Union2(a, b) => {
                self.merge(&self.widen_conditional(a), &self.widen_conditional(b))
            }
            other => other.clone(),
        }
    }

    /// Narrow `v` to the values that are also instances of `ty`.
    pub fn narrow(&self, v: &AbstractValue, ty: &JuliaType) -> AbstractValue {
        match v {
            AbstractValue::Bottom => AbstractValue::Bottom,
            AbstractValue::Top => {
                AbstractValue::with_exactness(ty.clone(), self.oracle.is_leaf_type(ty))
            }
            AbstractValue::Union2(..) => v
                .leaves()
                .into_iter()
                .map(|leaf| self.narrow(leaf, ty))
                .fold(AbstractValue::Bottom, |acc, n| self.merge(&acc, &n)),
            AbstractValue::Conditional { .. } => {
                if self.oracle.is_disjoint(&JuliaType::bool(), ty) {
                    AbstractValue::Bottom
                } else {
                    v.clone()
                }
            }
            _ => {
                let vt = self.widen_type(v);
                if self.oracle.is_subtype(&vt, ty) {
                    return v.clone();
                }
                let meet = self.oracle.intersect(&vt, ty);
                if meet.is_bottom() {
                    return AbstractValue::Bottom;
                }
                match v {
                    // A constant or type value is a single value: it either
                    // passes or it does not, and it passes unless disjoint.
                    AbstractValue::Const(_)
                    | AbstractValue::TypeOf { exact: true, .. } => v.clone(),
                    AbstractValue::Concrete { exact: true, .. } => v.clone(),
                    _ => AbstractValue::with_exactness(
                        meet.clone(),
                        self.oracle.is_leaf_type(&meet),
                    ),
                }
            }
        }
    }

    /// Leaves of `v` that cannot be instances of `ty`.
    pub fn subtract(&self, v: &AbstractValue, ty: &JuliaType) -> AbstractValue {
        match v {
            AbstractValue::Union2(..) => v
                .leaves()
                .into_iter()
                .filter(|leaf| !self.oracle.is_subtype(&self.widen_type(leaf), ty))
                .fold(AbstractValue::Bottom, |acc, leaf| self.merge(&acc, leaf)),
            other if self.oracle.is_subtype(&self.widen_type(other), ty) => {
                AbstractValue::Bottom
            }
            other => other.clone(),
        }
    }
}

fn type_value_bound(v: &AbstractValue) -> JuliaType {
    match v {
        AbstractValue::TypeOf { ty, .. } => ty.clone(),
        AbstractValue::PartialTypeVar(tv) => (*tv.upper_bound).clone(),
        _ => JuliaType::Any,
    }
}

fn sort_key(v: &AbstractValue) -> String {
    format!("{:?}", v)
}

fn canonical_min<'v>(a: &'v AbstractValue, b: &'v AbstractValue) -> &'v AbstractValue {
    if sort_key(a) <= sort_key(b) {
        a
    } else {
        b
    }
}

fn build_union(leaves: Vec<AbstractValue>) -> AbstractValue {
    leaves
        .into_iter()
        .rev()
        .reduce(|acc, leaf| AbstractValue::Union2(Box::new(leaf), Box::new(acc)))
        .unwrap_or(AbstractValue::Bottom)
}
