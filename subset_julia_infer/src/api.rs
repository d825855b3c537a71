//! Rust API for running inference requests.
//!
//! An `AbstractInterpreter` bundles the collaborators one request needs:
//! the subtyping oracle, the method table, the widening limits, the
//! transfer-function table, the global cache and the current world age.
//! Each call to `infer` builds a fresh set of frames, runs them to a
//! fixpoint and discards them; only cache entries outlive the request.

use serde::Serialize;

use crate::abstract_interp::InferenceEngine;
use crate::config::{InferenceConfig, InferenceLimits};
use crate::error::InferenceError;
use crate::ipo::{InferenceCache, SpecKey, WorldRange};
use crate::lattice::{AbstractValue, TypeLattice};
use crate::method_table::{MethodId, SpecializationResolver};
use crate::tfuncs::{builtins, TransferFunctions};
use crate::types::{JuliaType, TypeOracle};

/// Outcome of one inference request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceResult {
    pub return_type: AbstractValue,
    /// Worlds in which the result holds.
    pub valid: WorldRange,
    /// Whether the result was served from, or written to, the global cache.
    pub cached: bool,
    /// Whether widening thresholds were hit.
    pub limited: bool,
    /// Specializations the result depends on.
    pub edges: Vec<SpecKey>,
    /// Per-statement SSA values, retained with `optimize`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssa_types: Option<Vec<AbstractValue>>,
    /// Total statement cost, computed with `optimize`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<u64>,
}

impl InferenceResult {
    /// Result for a call that can never happen.
    fn unreachable(valid: WorldRange) -> Self {
        Self {
            return_type: AbstractValue::Bottom,
            valid,
            cached: false,
            limited: false,
            edges: Vec::new(),
            ssa_types: None,
            cost: None,
        }
    }

    /// Serialize the result to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Entry point for inference requests.
///
/// ```
/// use subset_julia_infer::api::AbstractInterpreter;
/// use subset_julia_infer::config::{InferenceConfig, InferenceLimits};
/// use subset_julia_infer::ipo::{InferenceCache, WorldRange};
/// use subset_julia_infer::ir::{CodeInfo, Expr, Operand, Stmt};
/// use subset_julia_infer::lattice::{AbstractValue, ConstValue};
/// use subset_julia_infer::method_table::MethodTable;
/// use subset_julia_infer::types::{JuliaType, TypeUniverse};
///
/// // f(x::Int64) = x + 1
/// let code = CodeInfo::new(
///     "f",
///     &["x"],
///     1,
///     vec![
///         Stmt::Expr(Expr::Builtin {
///             op: "add_int".into(),
///             args: vec![Operand::Slot(0), Operand::Const(ConstValue::Int64(1))],
///         }),
///         Stmt::Return(Operand::Ssa(0)),
///     ],
/// );
/// let mut table = MethodTable::new();
/// let f = table.add("f", vec![JuliaType::int64()], None, code, WorldRange::since(1)).unwrap();
///
/// let universe = TypeUniverse::new();
/// let limits = InferenceLimits::default();
/// let cache = InferenceCache::new();
/// let interp = AbstractInterpreter::new(&universe, &table, &limits, &cache, 1);
///
/// let result = interp.infer(f, &[AbstractValue::int(2)], &InferenceConfig::default()).unwrap();
/// assert_eq!(result.return_type, AbstractValue::int(3));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AbstractInterpreter<'a> {
    pub(crate) oracle: &'a dyn TypeOracle,
    pub(crate) methods: &'a dyn SpecializationResolver,
    pub(crate) limits: &'a InferenceLimits,
    pub(crate) tfuncs: &'a TransferFunctions,
    pub(crate) cache: &'a InferenceCache,
    pub(crate) world: u64,
}

impl<'a> AbstractInterpreter<'a> {
    pub fn new(
        oracle: &'a dyn TypeOracle,
        methods: &'a dyn SpecializationResolver,
        limits: &'a InferenceLimits,
        cache: &'a InferenceCache,
        world: u64,
    ) -> Self {
        Self {
            oracle,
            methods,
            limits,
            tfuncs: builtins(),
            cache,
            world,
        }
    }

    /// Use a custom transfer-function table instead of the builtin one.
    pub fn with_tfuncs(mut self, tfuncs: &'a TransferFunctions) -> Self {
        self.tfuncs = tfuncs;
        self
    }

    pub fn world(&self) -> u64 {
        self.world
    }

    pub fn lattice(&self) -> TypeLattice<'a> {
        TypeLattice::new(self.oracle, self.limits)
    }

    /// Infer the return type of `method` called with `argtypes`.
    ///
    /// # Arguments
    ///
    /// * `method` - The method to specialize
    /// * `argtypes` - Abstract values of the call's arguments
    /// * `config` - Per-request options
    ///
    /// # Returns
    ///
    /// The inferred result, or an internal invariant violation.
    pub fn infer(
        &self,
        method: MethodId,
        argtypes: &[AbstractValue],
        config: &InferenceConfig,
    ) -> Result<InferenceResult, InferenceError> {
        let methods: &'a dyn SpecializationResolver = self.methods;
        let def = methods
            .method(method)
            .ok_or(InferenceError::UnknownMethod(method))?;
        let lattice = self.lattice();
        let argtypes: Vec<AbstractValue> =
            argtypes.iter().map(|a| lattice.widen_conditional(a)).collect();
        if def.expanded_sig(argtypes.len()).is_none() {
            log::debug!("{}: no call with {} arguments", def.name, argtypes.len());
            return Ok(InferenceResult::unreachable(def.world_range));
        }
        let key = SpecKey::new(method, argtypes);

        if let Some(hit) = self.cache.get(&key, self.world) {
            if !config.optimize || hit.ssa_types.is_some() {
                log::debug!("cache hit for {}", key);
                return Ok(InferenceResult {
                    return_type: hit.return_type,
                    valid: hit.valid,
                    cached: true,
                    limited: hit.limited,
                    edges: hit.edges,
                    ssa_types: hit.ssa_types.filter(|_| config.optimize),
                    cost: hit.cost.filter(|_| config.optimize),
                });
            }
        }

        let mut engine = InferenceEngine::new(self, *config);
        let root = engine.add_frame(key, def, None);
        engine.typeinf(root)?;
        let frame = engine.frame(root);
        Ok(InferenceResult {
            return_type: frame.bestguess.clone(),
            valid: frame.valid,
            cached: frame.stored,
            limited: frame.limited,
            edges: frame.edges.clone(),
            ssa_types: config.optimize.then(|| frame.ssa_types.clone()),
            cost: config.optimize.then(|| engine.frame_cost(root)),
        })
    }

    /// Resolve `name` for `argtypes` through the method table and infer the
    /// selected method. An unresolved call infers as `Any`.
    pub fn infer_call(
        &self,
        name: &str,
        argtypes: &[AbstractValue],
        config: &InferenceConfig,
    ) -> Result<InferenceResult, InferenceError> {
        let lattice = self.lattice();
        let types: Vec<JuliaType> = argtypes.iter().map(|a| lattice.widen_type(a)).collect();
        match self.methods.resolve(name, &types, self.world, self.oracle) {
            Some(m) => {
                let mut result = self.infer(m.method, argtypes, config)?;
                result.valid = result.valid.intersect(&m.valid);
                Ok(result)
            }
            None => Ok(InferenceResult {
                return_type: AbstractValue::Top,
                ..InferenceResult::unreachable(WorldRange::ALL)
            }),
        }
    }
}
