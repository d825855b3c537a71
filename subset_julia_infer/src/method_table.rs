//! Method definitions and specialization lookup.
//!
//! The resolver is the engine's view of the method table: given a generic
//! function name and argument types, it selects the method whose code will
//! run, together with the world-age window in which that choice holds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::ipo::WorldRange;
use crate::ir::{CodeInfo, IrError};
use crate::types::{JuliaType, TypeOracle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodId(pub usize);

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method#{}", self.0)
    }
}

/// One method of a generic function.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    pub id: MethodId,
    pub name: String,
    /// Declared types of the fixed arguments.
    pub sig: Vec<JuliaType>,
    /// Element bound of a trailing varargs parameter.
    pub vararg: Option<JuliaType>,
    pub code: CodeInfo,
    pub world_range: WorldRange,
}

impl MethodDef {
    /// The declared signature expanded to `n` arguments, if it accepts `n`.
    pub fn expanded_sig(&self, n: usize) -> Option<Vec<JuliaType>> {
        match &self.vararg {
            None if n == self.sig.len() => Some(self.sig.clone()),
            Some(bound) if n >= self.sig.len() => {
                let mut sig = self.sig.clone();
                sig.resize(n, bound.clone());
                Some(sig)
            }
            _ => None,
        }
    }
}

/// A successful lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodMatch {
    pub method: MethodId,
    /// Worlds in which the same method would be selected.
    pub valid: WorldRange,
}

/// Method lookup consulted by the engine.
pub trait SpecializationResolver: fmt::Debug {
    /// The unique most specific method of `name` applicable to `argtypes`.
    fn resolve(
        &self,
        name: &str,
        argtypes: &[JuliaType],
        world: u64,
        oracle: &dyn TypeOracle,
    ) -> Option<MethodMatch>;

    /// The method of `name` declared with exactly `sig`.
    fn resolve_exact(
        &self,
        name: &str,
        sig: &[JuliaType],
        world: u64,
        oracle: &dyn TypeOracle,
    ) -> Option<MethodMatch>;

    fn method(&self, id: MethodId) -> Option<&MethodDef>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MethodTableError {
    #[error(transparent)]
    Ir(#[from] IrError),

    #[error("`{name}` declares {declared} argument slots but its code has {nargs}")]
    ArgumentCount {
        name: String,
        declared: usize,
        nargs: usize,
    },

    #[error("empty world range {0}")]
    EmptyWorldRange(WorldRange),
}

/// Registry of method definitions grouped by generic function.
#[derive(Debug, Default)]
pub struct MethodTable {
    methods: Vec<MethodDef>,
    by_name: HashMap<String, Vec<MethodId>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method, validating its lowered code.
    ///
    /// # Arguments
    ///
    /// * `name` - The generic function the method belongs to
    /// * `sig` - Declared types of the fixed arguments
    /// * `vararg` - Element bound of a trailing varargs slot, if any
    /// * `code` - Lowered body; its first `nargs` slots are the arguments
    /// * `world_range` - Worlds in which the definition exists
    pub fn add(
        &mut self,
        name: impl Into<String>,
        sig: Vec<JuliaType>,
        vararg: Option<JuliaType>,
        code: CodeInfo,
        world_range: WorldRange,
    ) -> Result<MethodId, MethodTableError> {
        let name = name.into();
        code.validate()?;
        let declared = sig.len() + usize::from(vararg.is_some());
        if declared != code.nargs {
            return Err(MethodTableError::ArgumentCount {
                name,
                declared,
                nargs: code.nargs,
            });
        }
        if world_range.is_empty() {
            return Err(MethodTableError::EmptyWorldRange(world_range));
        }
        let id = MethodId(self.methods.len());
        log::debug!("method table: {} {} defined in {}", id, name, world_range);
        self.by_name.entry(name.clone()).or_default().push(id);
        self.methods.push(MethodDef {
            id,
            name,
            sig,
            vararg,
            code,
            world_range,
        });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Methods of `name`, in definition order.
    pub fn methods_of(&self, name: &str) -> impl Iterator<Item = &MethodDef> {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.methods.get(id.0))
    }

    fn covers(def: &MethodDef, argtypes: &[JuliaType], oracle: &dyn TypeOracle) -> bool {
        def.expanded_sig(argtypes.len()).is_some_and(|sig| {
            sig.iter()
                .zip(argtypes)
                .all(|(declared, arg)| oracle.is_subtype(arg, declared))
        })
    }

    /// `a` is strictly more specific than `b` for calls with `n` arguments.
    fn more_specific(a: &MethodDef, b: &MethodDef, n: usize, oracle: &dyn TypeOracle) -> bool {
        let (Some(sa), Some(sb)) = (a.expanded_sig(n), b.expanded_sig(n)) else {
            return false;
        };
        let ta = JuliaType::Tuple(sa);
        let tb = JuliaType::Tuple(sb);
        if !oracle.is_subtype(&ta, &tb) {
            return false;
        }
        if oracle.is_subtype(&tb, &ta) {
            // Equal signatures: fixed arity beats varargs.
            return a.vararg.is_none() && b.vararg.is_some();
        }
        true
    }

    fn could_apply(def: &MethodDef, argtypes: &[JuliaType], oracle: &dyn TypeOracle) -> bool {
        def.expanded_sig(argtypes.len()).is_some_and(|sig| {
            sig.iter()
                .zip(argtypes)
                .all(|(declared, arg)| !oracle.is_disjoint(arg, declared))
        })
    }
}

impl SpecializationResolver for MethodTable {
    fn resolve(
        &self,
        name: &str,
        argtypes: &[JuliaType],
        world: u64,
        oracle: &dyn TypeOracle,
    ) -> Option<MethodMatch> {
        let n = argtypes.len();
        let candidates: Vec<&MethodDef> = self
            .methods_of(name)
            .filter(|m| m.world_range.contains(world) && Self::covers(m, argtypes, oracle))
            .collect();
        let best = candidates.iter().copied().find(|m| {
            candidates
                .iter()
                .all(|other| other.id == m.id || Self::more_specific(m, other, n, oracle))
        })?;

        // A method that is more specific and could apply, but is absent from
        // this world, takes over at the edge of its own range.
        let mut valid = best.world_range;
        for other in self.methods_of(name) {
            if other.id == best.id || other.world_range.contains(world) {
                continue;
            }
            if !Self::could_apply(other, argtypes, oracle)
                || !Self::more_specific(other, best, n, oracle)
            {
                continue;
            }
            if other.world_range.min > world {
                valid.max = valid.max.min(other.world_range.min - 1);
            } else if other.world_range.max < world {
                valid.min = valid.min.max(other.world_range.max + 1);
            }
        }
        log::trace!("resolve {}({:?}) in world {} => {} {}", name, argtypes, world, best.id, valid);
        Some(MethodMatch {
            method: best.id,
            valid,
        })
    }

    fn resolve_exact(
        &self,
        name: &str,
        sig: &[JuliaType],
        world: u64,
        oracle: &dyn TypeOracle,
    ) -> Option<MethodMatch> {
        self.methods_of(name)
            .find(|m| {
                m.vararg.is_none()
                    && m.world_range.contains(world)
                    && m.sig.len() == sig.len()
                    && m.sig.iter().zip(sig).all(|(a, b)| oracle.type_equal(a, b))
            })
            .map(|m| MethodMatch {
                method: m.id,
                valid: m.world_range,
            })
    }

    fn method(&self, id: MethodId) -> Option<&MethodDef> {
        self.methods.get(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Operand, Stmt};
    use crate::types::TypeUniverse;

    fn body(nargs: usize) -> CodeInfo {
        let slots: Vec<String> = (0..nargs.max(1)).map(|i| format!("x{}", i)).collect();
        let names: Vec<&str> = slots.iter().map(String::as_str).collect();
        CodeInfo::new("m", &names, nargs, vec![Stmt::Return(Operand::Slot(0))])
    }

    fn table() -> (MethodTable, MethodId, MethodId) {
        let mut table = MethodTable::new();
        let generic = table
            .add("f", vec![JuliaType::named("Real")], None, body(1), WorldRange::since(1))
            .unwrap();
        let int = table
            .add("f", vec![JuliaType::int64()], None, body(1), WorldRange::since(1))
            .unwrap();
        (table, generic, int)
    }

    #[test]
    fn test_most_specific_wins() {
        let universe = TypeUniverse::new();
        let (table, generic, int) = table();
        let m = table.resolve("f", &[JuliaType::int64()], 5, &universe).unwrap();
        assert_eq!(m.method, int);
        let m = table.resolve("f", &[JuliaType::float64()], 5, &universe).unwrap();
        assert_eq!(m.method, generic);
        assert!(table.resolve("f", &[JuliaType::string()], 5, &universe).is_none());
        assert!(table.resolve("g", &[JuliaType::int64()], 5, &universe).is_none());
    }

    #[test]
    fn test_abstract_argument_does_not_resolve_to_specific_method() {
        let universe = TypeUniverse::new();
        let (table, generic, _) = table();
        let m = table.resolve("f", &[JuliaType::named("Real")], 5, &universe).unwrap();
        assert_eq!(m.method, generic);
        assert_eq!(m.valid, WorldRange::since(1));
    }

    #[test]
    fn test_window_narrowed_by_later_definition() {
        let universe = TypeUniverse::new();
        let mut table = MethodTable::new();
        let generic = table
            .add("f", vec![JuliaType::named("Real")], None, body(1), WorldRange::since(1))
            .unwrap();
        table
            .add("f", vec![JuliaType::int64()], None, body(1), WorldRange::since(10))
            .unwrap();
        let m = table.resolve("f", &[JuliaType::int64()], 5, &universe).unwrap();
        assert_eq!(m.method, generic);
        assert_eq!(m.valid, WorldRange::new(1, 9));
    }

    #[test]
    fn test_window_narrowed_by_deleted_definition() {
        let universe = TypeUniverse::new();
        let mut table = MethodTable::new();
        table
            .add("f", vec![JuliaType::named("Real")], None, body(1), WorldRange::since(1))
            .unwrap();
        table
            .add("f", vec![JuliaType::int64()], None, body(1), WorldRange::new(1, 4))
            .unwrap();
        let m = table.resolve("f", &[JuliaType::int64()], 7, &universe).unwrap();
        assert_eq!(m.valid, WorldRange::since(5));
    }

    #[test]
    fn test_ambiguity_is_unresolved() {
        let universe = TypeUniverse::new();
        let mut table = MethodTable::new();
        let a = vec![JuliaType::int64(), JuliaType::named("Real")];
        let b = vec![JuliaType::named("Real"), JuliaType::int64()];
        table.add("f", a, None, body(2), WorldRange::ALL).unwrap();
        table.add("f", b, None, body(2), WorldRange::ALL).unwrap();
        assert!(table
            .resolve("f", &[JuliaType::int64(), JuliaType::int64()], 1, &universe)
            .is_none());
    }

    #[test]
    fn test_varargs_and_exact_lookup() {
        let universe = TypeUniverse::new();
        let mut table = MethodTable::new();
        let va = table
            .add("g", vec![], Some(JuliaType::int64()), body(1), WorldRange::ALL)
            .unwrap();
        let fixed = table
            .add("g", vec![JuliaType::int64()], None, body(1), WorldRange::ALL)
            .unwrap();
        let m = table.resolve("g", &[JuliaType::int64()], 1, &universe).unwrap();
        assert_eq!(m.method, fixed);
        let m = table
            .resolve("g", &[JuliaType::int64(), JuliaType::int64()], 1, &universe)
            .unwrap();
        assert_eq!(m.method, va);
        assert_eq!(
            table
                .resolve_exact("g", &[JuliaType::int64()], 1, &universe)
                .map(|m| m.method),
            Some(fixed)
        );
        assert!(table.resolve_exact("g", &[], 1, &universe).is_none());
    }

    #[test]
    fn test_add_validates() {
        let mut table = MethodTable::new();
        let err = table
            .add("f", vec![JuliaType::int64(), JuliaType::int64()], None, body(1), WorldRange::ALL)
            .unwrap_err();
        assert!(matches!(err, MethodTableError::ArgumentCount { declared: 2, nargs: 1, .. }));
        let bad = CodeInfo::new("bad", &["x"], 1, vec![Stmt::Goto(9)]);
        assert!(matches!(
            table.add("f", vec![JuliaType::int64()], None, bad, WorldRange::ALL),
            Err(MethodTableError::Ir(_))
        ));
        assert!(table.is_empty());
    }
}
