//! High-level Intermediate Representation (HIR) for Quill
//!
//! The HIR is the typed expression tree the builder produces for each
//! lambda body. Closure conversion reads it, and produces new trees in
//! which every outer reference has become a carrier access.

pub mod ir;
pub mod visit;

pub use ir::*;
