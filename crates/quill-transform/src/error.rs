//! Closure conversion errors

use crate::closure::Captured;
use quill_codegen::CodegenError;
use quill_diagnostics::{Diagnostic, DiagnosticCode, Span};
use quill_types::ScopeId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClosureError {
    /// A lambda declares the same parameter name twice. The first
    /// declaration stays in effect and the session remains usable.
    #[error("parameter `{name}` is already declared in this lambda")]
    NamingConflict { name: String, span: Span, first: Span },

    /// More parameters than the bind adapter family supports. Counts the
    /// carrier parameter for closures that capture.
    #[error("lambda needs {count} parameter(s) but callables support at most {max}")]
    UnsupportedArity { count: usize, max: usize, span: Span },

    /// The builder broke the scope protocol, or a closure invariant failed
    #[error("internal invariant violated: {0}")]
    InvariantViolation(#[from] Invariant),

    #[error("host compiler rejected a generated lambda: {0}")]
    Codegen(#[from] CodegenError),
}

/// Internal invariants of the capture session and closure layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Invariant {
    #[error("no lambda scope is open")]
    NoOpenScope,
    #[error("scope {0} is still declaring parameters")]
    ParametersLocked(ScopeId),
    #[error("scope {0} has already started its body")]
    ParametersClosed(ScopeId),
    #[error("the session was finalized with {0} scope(s) still open")]
    UnclosedScopes(usize),
    #[error("expected exactly one top-level scope, found {0}")]
    RootCount(usize),
    #[error("scope {scope} uses {value} without having requested the capture")]
    UnrequestedCapture { scope: ScopeId, value: Captured },
    #[error("scope {scope} reads argument {index} without having requested it")]
    UnrequestedArgument { scope: ScopeId, index: usize },
    #[error("scope {parent} references scope {scope}, which is not one of its children")]
    UnknownScope { parent: ScopeId, scope: ScopeId },
    #[error("parent of scope {scope} does not provide {value}")]
    MissingParentSlot { scope: ScopeId, value: Captured },
    #[error("placeholder for scope {0} has no compiled replacement")]
    UnresolvedPlaceholder(ScopeId),
    #[error("carrier slot {index} is out of range for {len} captured value(s)")]
    SlotOutOfRange { index: usize, len: usize },
    #[error("carrier type with {arity} field(s) has no field at position {slot}")]
    MissingCarrierField { slot: usize, arity: usize },
    #[error("carrier layout expects {expected} value(s), got {found}")]
    CarrierValueCount { expected: usize, found: usize },
    #[error("a carrier must hold at least one value")]
    EmptyCarrier,
}

impl ClosureError {
    /// Only naming conflicts are recoverable; everything else aborts the
    /// current compilation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ClosureError::NamingConflict { .. })
    }

    /// Source location, if the error has one
    pub fn span(&self) -> Span {
        match self {
            ClosureError::NamingConflict { span, .. } | ClosureError::UnsupportedArity { span, .. } => *span,
            ClosureError::InvariantViolation(_) | ClosureError::Codegen(_) => Span::DUMMY,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let message = self.to_string();
        match self {
            ClosureError::NamingConflict { span, first, .. } => {
                Diagnostic::error(DiagnosticCode::DuplicateParameter, message)
                    .with_span(*span)
                    .with_label(*first, "first declared here")
                    .build()
            }
            ClosureError::UnsupportedArity { span, max, .. } => {
                Diagnostic::error(DiagnosticCode::UnsupportedArity, message)
                    .with_span(*span)
                    .with_help(format!(
                        "a capturing lambda may declare at most {} parameter(s)",
                        max - 1
                    ))
                    .build()
            }
            ClosureError::InvariantViolation(_) => {
                Diagnostic::error(DiagnosticCode::InvariantViolation, message).build()
            }
            ClosureError::Codegen(_) => Diagnostic::error(DiagnosticCode::CodegenFailure, message).build(),
        }
    }
}
