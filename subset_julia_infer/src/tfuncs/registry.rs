//! Transfer-function registry.
//!
//! The registry maps builtin operation names to their abstract semantics.
//! Each entry declares the accepted argument count and a cost estimate used
//! by the optimizer. The standard table is built once, on first use, and is
//! read-only afterwards.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::config::InferenceLimits;
use crate::diagnostics::{emit_arity_mismatch, emit_unknown_builtin};
use crate::error::RegistryError;
use crate::lattice::{AbstractValue, TypeLattice};
use crate::types::{JuliaType, TypeOracle};

/// Upper arity bound for variadic operations.
pub const VARIADIC: usize = usize::MAX;

/// Re-entry point into the engine for call-like builtins.
pub trait CallContext {
    /// Infer the method `name` restricted to the declared signature `sig`
    /// and record a backedge from the callee to the current statement.
    fn invoke(&mut self, name: &str, sig: &[JuliaType], argtypes: &[AbstractValue])
        -> AbstractValue;
}

/// Everything a transfer function may consult.
pub struct TFuncContext<'c> {
    pub lattice: TypeLattice<'c>,
    /// The calling frame, when the builtin is evaluated inside inference.
    pub call: Option<&'c mut (dyn CallContext + 'c)>,
}

impl<'c> TFuncContext<'c> {
    pub fn new(lattice: TypeLattice<'c>) -> Self {
        Self {
            lattice,
            call: None,
        }
    }

    pub fn with_call(lattice: TypeLattice<'c>, call: &'c mut (dyn CallContext + 'c)) -> Self {
        Self {
            lattice,
            call: Some(call),
        }
    }

    pub fn oracle(&self) -> &'c dyn TypeOracle {
        self.lattice.oracle()
    }

    pub fn limits(&self) -> &'c InferenceLimits {
        self.lattice.limits()
    }
}

impl std::fmt::Debug for TFuncContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TFuncContext")
            .field("lattice", &self.lattice)
            .field("call", &self.call.is_some())
            .finish()
    }
}

/// Abstract semantics of one builtin. Receives the op name it was
/// registered under so one function can serve a family of ops.
pub type TransferFn = fn(&str, &[AbstractValue], &mut TFuncContext<'_>) -> AbstractValue;

/// One registered builtin.
#[derive(Debug, Clone, Copy)]
pub struct TFuncEntry {
    pub min_args: usize,
    pub max_args: usize,
    pub func: TransferFn,
    pub cost: u32,
}

/// Registry of transfer functions.
///
/// # Example
/// ```
/// use subset_julia_infer::config::InferenceLimits;
/// use subset_julia_infer::lattice::{AbstractValue, TypeLattice};
/// use subset_julia_infer::tfuncs::{TFuncContext, TransferFunctions};
/// use subset_julia_infer::types::TypeUniverse;
///
/// let mut registry = TransferFunctions::new();
/// registry
///     .register("identity", 1, 1, |_op, args, _ctx| args[0].clone(), 0)
///     .unwrap();
///
/// let universe = TypeUniverse::new();
/// let limits = InferenceLimits::default();
/// let mut ctx = TFuncContext::new(TypeLattice::new(&universe, &limits));
/// let result = registry.dispatch("identity", &[AbstractValue::int(1)], &mut ctx);
/// assert_eq!(result, AbstractValue::int(1));
///
/// // Wrong arity is a dead path, not an error.
/// assert_eq!(registry.dispatch("identity", &[], &mut ctx), AbstractValue::Bottom);
/// ```
#[derive(Debug, Default)]
pub struct TransferFunctions {
    entries: HashMap<String, TFuncEntry>,
}

impl TransferFunctions {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Declare the semantics of `op`. Each op may be registered once.
    pub fn register(
        &mut self,
        op: &str,
        min_args: usize,
        max_args: usize,
        func: TransferFn,
        cost: u32,
    ) -> Result<(), RegistryError> {
        if min_args > max_args {
            return Err(RegistryError::InvalidArity {
                op: op.to_string(),
                min: min_args,
                max: max_args,
            });
        }
        if self.entries.contains_key(op) {
            return Err(RegistryError::DuplicateRegistration(op.to_string()));
        }
        self.entries.insert(
            op.to_string(),
            TFuncEntry {
                min_args,
                max_args,
                func,
                cost,
            },
        );
        Ok(())
    }

    /// Evaluate `op` on abstract arguments.
    ///
    /// Unknown ops yield `Top`. Arity violations and `Bottom` arguments
    /// yield `Bottom`, since such a call can never complete.
    pub fn dispatch(
        &self,
        op: &str,
        args: &[AbstractValue],
        ctx: &mut TFuncContext<'_>,
    ) -> AbstractValue {
        let Some(entry) = self.entries.get(op) else {
            emit_unknown_builtin(op);
            return AbstractValue::Top;
        };
        if args.len() < entry.min_args || args.len() > entry.max_args {
            emit_arity_mismatch(op, args.len());
            return AbstractValue::Bottom;
        }
        if args.iter().any(AbstractValue::is_bottom) {
            return AbstractValue::Bottom;
        }
        let result = (entry.func)(op, args, ctx);
        log::trace!("tfunc {}({:?}) => {}", op, args, result);
        result
    }

    pub fn get(&self, op: &str) -> Option<&TFuncEntry> {
        self.entries.get(op)
    }

    pub fn cost(&self, op: &str) -> Option<u32> {
        self.entries.get(op).map(|e| e.cost)
    }

    pub fn has_function(&self, op: &str) -> bool {
        self.entries.contains_key(op)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static BUILTINS: Lazy<TransferFunctions> = Lazy::new(|| {
    let mut registry = TransferFunctions::new();
    if let Err(e) = super::register_all(&mut registry) {
        // The standard table is fixed at build time; a conflict is a bug.
        panic!("invalid builtin transfer-function table: {}", e);
    }
    registry
});

/// The process-wide table of builtin transfer functions.
pub fn builtins() -> &'static TransferFunctions {
    &BUILTINS
}
