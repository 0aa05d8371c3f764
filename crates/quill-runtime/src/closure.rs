//! Callables and the bind adapter family
//!
//! Every function value in the runtime has a fixed arity. A closure that
//! needs captured values is compiled to a raw callable taking its carrier
//! as the leading argument; a bind adapter pairs that raw callable with an
//! already-built carrier and exposes the plain `args -> result` signature,
//! so callers cannot tell it apart from a capture-free function.

use crate::error::RuntimeError;
use crate::value::Value;
use std::sync::Arc;

/// Largest number of parameters a callable may take
pub const MAX_CALLABLE_ARITY: usize = 16;

/// Largest declared parameter count a bound closure may have; the raw
/// callable behind it takes one more (the carrier).
pub const MAX_BOUND_PARAMS: usize = MAX_CALLABLE_ARITY - 1;

/// A fixed-arity function the host runtime can invoke
pub trait Callable: Send + Sync {
    fn arity(&self) -> usize;

    /// Invoke with exactly `arity()` arguments
    fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeError>;
}

pub type FunctionValue = Arc<dyn Callable>;

impl std::fmt::Debug for dyn Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<function/{}>", self.arity())
    }
}

/// Signature shared by every member of the adapter family
pub type BindAdapter = fn(Value, FunctionValue) -> FunctionValue;

/// Adapter for each declared parameter count, indexed by that count
static BIND_ADAPTERS: [BindAdapter; MAX_BOUND_PARAMS + 1] = [
    bind_n::<0>,
    bind_n::<1>,
    bind_n::<2>,
    bind_n::<3>,
    bind_n::<4>,
    bind_n::<5>,
    bind_n::<6>,
    bind_n::<7>,
    bind_n::<8>,
    bind_n::<9>,
    bind_n::<10>,
    bind_n::<11>,
    bind_n::<12>,
    bind_n::<13>,
    bind_n::<14>,
    bind_n::<15>,
];

struct Bound<const N: usize> {
    carrier: Value,
    raw: FunctionValue,
}

impl<const N: usize> Callable for Bound<N> {
    fn arity(&self) -> usize {
        N
    }

    fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        if args.len() != N {
            return Err(RuntimeError::ArityMismatch {
                expected: N,
                found: args.len(),
            });
        }
        let mut full = Vec::with_capacity(N + 1);
        full.push(self.carrier.clone());
        full.extend_from_slice(args);
        self.raw.invoke(&full)
    }
}

fn bind_n<const N: usize>(carrier: Value, raw: FunctionValue) -> FunctionValue {
    Arc::new(Bound::<N> { carrier, raw })
}

/// Look up the adapter for a closure with `params` declared parameters
pub fn bind_adapter(params: usize) -> Result<BindAdapter, RuntimeError> {
    BIND_ADAPTERS
        .get(params)
        .copied()
        .ok_or(RuntimeError::UnsupportedArity {
            count: params + 1,
            max: MAX_CALLABLE_ARITY,
        })
}

/// Pair `raw` (carrier first, then `params` arguments) with `carrier`
pub fn bind(params: usize, carrier: Value, raw: FunctionValue) -> Result<FunctionValue, RuntimeError> {
    let adapter = bind_adapter(params)?;
    if raw.arity() != params + 1 {
        return Err(RuntimeError::ArityMismatch {
            expected: params + 1,
            found: raw.arity(),
        });
    }
    Ok(adapter(carrier, raw))
}
