//! Diagnostics for precision loss during inference.
//!
//! Inference never fails because of imprecision, but callers often want to
//! know where and why a result degraded to `Top` or a widened type. Those
//! events are recorded here when collection is enabled.
//!
//! Collection is thread-local and disabled by default:
//! - `DiagnosticsCollector::enable()` - start collecting
//! - `DiagnosticsCollector::take()` - retrieve and clear collected records
//!
//! Independently of collection, every event is also logged at debug level.

use std::cell::RefCell;

/// Reason a value was widened or a frame degraded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticReason {
    /// No transfer function is registered for the builtin.
    UnknownBuiltin(String),

    /// A builtin was dispatched with an unsupported number of arguments.
    ArityMismatch { op: String, got: usize },

    /// A union grew past the configured length and collapsed.
    UnionWidened(usize),

    /// A type exceeded the configured nesting depth.
    TypeDepthLimited(usize),

    /// A frame hit a complexity bound and switched to aggressive widening.
    FrameLimited(String),

    /// A recursion cycle between specializations was detected.
    RecursiveCycle(Vec<String>),

    /// Parametric instantiation failed; contains (head, message).
    InstantiationFailed(String, String),

    /// No unique method matched an ordinary call.
    UnresolvedCall(String),

    /// A cycle consumed half its iteration budget and its members were limited.
    CycleWidened(usize),
}

impl std::fmt::Display for DiagnosticReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticReason::UnknownBuiltin(op) => write!(f, "unknown builtin '{}'", op),
            DiagnosticReason::ArityMismatch { op, got } => {
                write!(f, "builtin '{}' called with {} arguments", op, got)
            }
            DiagnosticReason::UnionWidened(n) => {
                write!(f, "union of {} elements widened to a common supertype", n)
            }
            DiagnosticReason::TypeDepthLimited(depth) => {
                write!(f, "type nesting limited to depth {}", depth)
            }
            DiagnosticReason::FrameLimited(method) => {
                write!(f, "inference of '{}' hit a complexity limit", method)
            }
            DiagnosticReason::RecursiveCycle(names) => {
                write!(f, "recursive cycle: {}", names.join(" -> "))
            }
            DiagnosticReason::InstantiationFailed(head, msg) => {
                write!(f, "cannot instantiate '{}': {}", head, msg)
            }
            DiagnosticReason::UnresolvedCall(name) => {
                write!(f, "no unique method for call to '{}'", name)
            }
            DiagnosticReason::CycleWidened(rounds) => {
                write!(f, "recursion cycle widened after {} rounds", rounds)
            }
        }
    }
}

/// A single inference diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeInferenceDiagnostic {
    pub reason: DiagnosticReason,
    /// Method or expression the event belongs to, if known.
    pub context: Option<String>,
    /// Display form of the type the value was widened to, if any.
    pub widened_to: Option<String>,
}

impl TypeInferenceDiagnostic {
    pub fn new(reason: DiagnosticReason) -> Self {
        Self {
            reason,
            context: None,
            widened_to: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_widened_to(mut self, ty: impl Into<String>) -> Self {
        self.widened_to = Some(ty.into());
        self
    }
}

impl std::fmt::Display for TypeInferenceDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ctx) = &self.context {
            write!(f, "{}: ", ctx)?;
        }
        write!(f, "{}", self.reason)?;
        if let Some(ty) = &self.widened_to {
            write!(f, " (widened to {})", ty)?;
        }
        Ok(())
    }
}

thread_local! {
    static COLLECTOR: RefCell<CollectorState> = RefCell::new(CollectorState::default());
}

#[derive(Default)]
struct CollectorState {
    enabled: bool,
    records: Vec<TypeInferenceDiagnostic>,
}

/// Thread-local diagnostics collector.
#[derive(Debug)]
pub struct DiagnosticsCollector;

impl DiagnosticsCollector {
    pub fn enable() {
        COLLECTOR.with(|c| c.borrow_mut().enabled = true);
    }

    pub fn disable() {
        COLLECTOR.with(|c| c.borrow_mut().enabled = false);
    }

    pub fn is_enabled() -> bool {
        COLLECTOR.with(|c| c.borrow().enabled)
    }

    /// Record a diagnostic if collection is enabled.
    pub fn emit(diag: TypeInferenceDiagnostic) {
        log::debug!("inference diagnostic: {}", diag);
        COLLECTOR.with(|c| {
            let mut state = c.borrow_mut();
            if state.enabled {
                state.records.push(diag);
            }
        });
    }

    /// Retrieve and clear all collected diagnostics.
    pub fn take() -> Vec<TypeInferenceDiagnostic> {
        COLLECTOR.with(|c| std::mem::take(&mut c.borrow_mut().records))
    }

    pub fn clear() {
        COLLECTOR.with(|c| c.borrow_mut().records.clear());
    }

    pub fn count() -> usize {
        COLLECTOR.with(|c| c.borrow().records.len())
    }
}

pub fn emit_unknown_builtin(op: &str) {
    DiagnosticsCollector::emit(TypeInferenceDiagnostic::new(
        DiagnosticReason::UnknownBuiltin(op.to_string()),
    ));
}

pub fn emit_arity_mismatch(op: &str, got: usize) {
    DiagnosticsCollector::emit(TypeInferenceDiagnostic::new(
        DiagnosticReason::ArityMismatch {
            op: op.to_string(),
            got,
        },
    ));
}

pub fn emit_union_widened(len: usize, widened_to: &str) {
    DiagnosticsCollector::emit(
        TypeInferenceDiagnostic::new(DiagnosticReason::UnionWidened(len))
            .with_widened_to(widened_to),
    );
}

pub fn emit_type_depth_limited(depth: usize, widened_to: &str) {
    DiagnosticsCollector::emit(
        TypeInferenceDiagnostic::new(DiagnosticReason::TypeDepthLimited(depth))
            .with_widened_to(widened_to),
    );
}

pub fn emit_frame_limited(method: &str) {
    DiagnosticsCollector::emit(
        TypeInferenceDiagnostic::new(DiagnosticReason::FrameLimited(method.to_string()))
            .with_context(method),
    );
}

pub fn emit_recursive_cycle(methods: Vec<String>) {
    DiagnosticsCollector::emit(TypeInferenceDiagnostic::new(
        DiagnosticReason::RecursiveCycle(methods),
    ));
}

pub fn emit_instantiation_failed(head: &str, message: &str) {
    DiagnosticsCollector::emit(TypeInferenceDiagnostic::new(
        DiagnosticReason::InstantiationFailed(head.to_string(), message.to_string()),
    ));
}

pub fn emit_unresolved_call(name: &str, context: &str) {
    DiagnosticsCollector::emit(
        TypeInferenceDiagnostic::new(DiagnosticReason::UnresolvedCall(name.to_string()))
            .with_context(context)
            .with_widened_to("Any"),
    );
}

pub fn emit_cycle_widened(rounds: usize, root: &str) {
    DiagnosticsCollector::emit(
        TypeInferenceDiagnostic::new(DiagnosticReason::CycleWidened(rounds)).with_context(root),
    );
}
