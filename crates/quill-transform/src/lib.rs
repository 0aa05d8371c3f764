//! IR transformations for Quill
//!
//! This crate contains the transformation passes that run on the HIR:
//! - Closure conversion of nested lambda scopes

pub mod closure;
pub mod error;

pub use closure::{CaptureSession, CompiledExpression, FinalizedExpression};
pub use error::{ClosureError, Invariant};
