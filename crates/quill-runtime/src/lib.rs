//! Runtime Library for Quill
//!
//! The host runtime only knows statically-typed, fixed-arity callables.
//! It has no nested closures: a closure is a raw callable taking its
//! carrier as first argument, paired with a carrier instance by a bind
//! adapter. This crate provides:
//! - `Value`, the runtime value representation
//! - immutable carrier instances
//! - the `Callable` abstraction and the bind adapter family

pub mod carrier;
pub mod closure;
pub mod error;
pub mod value;

pub use carrier::Carrier;
pub use closure::{bind, bind_adapter, BindAdapter, Callable, FunctionValue, MAX_BOUND_PARAMS, MAX_CALLABLE_ARITY};
pub use error::RuntimeError;
pub use value::Value;
