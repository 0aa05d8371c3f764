//! Host code generation for Quill
//!
//! Turns closed lambdas into fixed-arity runtime callables and evaluates
//! residual expressions against the root environment. Nothing in here
//! knows about nested closures: by the time a lambda reaches `compile`,
//! closure conversion has rewritten every outer reference into a carrier
//! access, and `compile` rejects anything it left behind.

pub mod codegen;
pub mod error;
pub mod eval;

pub use codegen::{compile, CompiledFunction};
pub use error::CodegenError;
pub use eval::{evaluate, RootContext};
