use quill_types::{LocalId, ScopeId};
use thiserror::Error;

/// Reasons the host compiler rejects a lambda
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    #[error("{count} parameter(s) exceed the maximum callable arity of {max}")]
    UnsupportedArity { count: usize, max: usize },

    #[error("local {0} is not a parameter of the lambda being compiled")]
    UnboundLocal(LocalId),

    #[error("lambda still contains the placeholder for scope {0}")]
    UnresolvedPlaceholder(ScopeId),

    #[error("lambda body refers to the root environment ({0}) instead of its carrier")]
    RootReference(String),

    #[error("carrier type has {arity} field(s), no field at slot {slot}")]
    CarrierSlot { slot: usize, arity: usize },

    #[error("carrier type has {expected} field(s) but {found} were supplied")]
    CarrierShape { expected: usize, found: usize },
}
