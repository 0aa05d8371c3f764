//! Closure conversion
//!
//! Turns nested lambdas that read values from enclosing lambdas, from the
//! shared argument vector or from external variables into pairs of a
//! carrier record and a closed raw callable:
//! 1. Track requested captures per scope while the expression is built
//! 2. Prune each scope's captures to what its finished body uses
//! 3. Lay the remaining values out in chained fixed-arity carriers
//! 4. Rewrite captured reads into carrier field accesses and compile

mod delegate;
mod env;
mod layout;
mod scope;
mod session;
mod slots;
mod usage;

pub use delegate::{InlineDelegate, UsedInputs};
pub use env::{CaptureSlot, Captured, CapturedEnvironment};
pub use layout::{segment_lengths, CarrierLayout, Segment, MAX_ARITY, TAIL_SLOT};
pub use scope::{FinalizedScope, ScopeKind, Usage};
pub use session::{CaptureSession, CompiledExpression, FinalizedExpression};
pub use slots::{map_slots, CarrierAccess, ParentFrame, SlotSource};
