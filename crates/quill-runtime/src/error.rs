//! Errors raised while running compiled expressions.

use quill_types::Type;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("callable expects {expected} argument(s), got {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("expected a value of type {expected}, found {found}")]
    TypeMismatch { expected: Type, found: String },

    #[error("carrier has {arity} field(s), no field at slot {slot}")]
    MissingField { slot: usize, arity: usize },

    #[error("argument index {index} is out of bounds for {len} argument(s)")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("variable `{0}` is not bound in the root environment")]
    UnboundVariable(String),

    #[error("{count} parameter(s) exceed the maximum callable arity of {max}")]
    UnsupportedArity { count: usize, max: usize },

    #[error("{0}")]
    Invalid(String),
}
