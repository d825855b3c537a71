//! The subtyping oracle consumed by inference.

use super::{DataTypeDef, JuliaType};
use crate::error::InstantiationError;

/// Authoritative queries over the type system.
///
/// Implementations must be pure and total. `intersect` may over-approximate
/// but must only return `Bottom` for provably disjoint types, and
/// `type_join` must return a supertype of both operands.
pub trait TypeOracle: std::fmt::Debug + Send + Sync {
    fn is_subtype(&self, a: &JuliaType, b: &JuliaType) -> bool;

    fn intersect(&self, a: &JuliaType, b: &JuliaType) -> JuliaType;

    /// A leaf type has no proper subtypes other than `Bottom`.
    fn is_leaf_type(&self, t: &JuliaType) -> bool;

    fn has_free_type_vars(&self, t: &JuliaType) -> bool {
        t.has_free_type_vars()
    }

    /// A common supertype of `a` and `b`.
    fn type_join(&self, a: &JuliaType, b: &JuliaType) -> JuliaType;

    fn datatype(&self, name: &str) -> Option<&DataTypeDef>;

    /// Declared field names and types of instances of `t`, if `t` has a
    /// known concrete shape.
    fn field_types(&self, t: &JuliaType) -> Option<Vec<(String, JuliaType)>>;

    fn is_mutable(&self, t: &JuliaType) -> bool;

    /// Storage size of instances of `t` when it is fixed by the type alone.
    fn sizeof(&self, t: &JuliaType) -> Option<usize>;

    /// Apply the parametric type named `head` to `params`.
    fn instantiate(&self, head: &str, params: &[JuliaType])
        -> Result<JuliaType, InstantiationError>;

    fn type_equal(&self, a: &JuliaType, b: &JuliaType) -> bool {
        self.is_subtype(a, b) && self.is_subtype(b, a)
    }

    /// Whether no value can inhabit both `a` and `b`.
    fn is_disjoint(&self, a: &JuliaType, b: &JuliaType) -> bool {
        self.intersect(a, b).is_bottom()
    }
}
