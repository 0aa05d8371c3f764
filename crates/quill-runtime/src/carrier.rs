//! Closure carrier instances
//!
//! A carrier instance is built once, when the closure that owns it is
//! constructed, and is never mutated afterwards. Captures are by-value
//! snapshots. When a closure captures more values than one carrier can
//! hold, the last field of a carrier holds the next carrier in the chain.

use crate::error::RuntimeError;
use crate::value::Value;
use quill_types::CarrierType;
use std::sync::Arc;

#[derive(Clone)]
pub struct Carrier {
    inner: Arc<CarrierData>,
}

struct CarrierData {
    ty: Arc<CarrierType>,
    fields: Box<[Value]>,
}

impl Carrier {
    /// Construct a carrier, checking the field count and types against `ty`.
    pub fn new(ty: Arc<CarrierType>, fields: Vec<Value>) -> Result<Self, RuntimeError> {
        if fields.len() != ty.arity() {
            return Err(RuntimeError::ArityMismatch {
                expected: ty.arity(),
                found: fields.len(),
            });
        }
        for (value, expected) in fields.iter().zip(ty.fields()) {
            if !value.conforms_to(expected) {
                return Err(RuntimeError::TypeMismatch {
                    expected: expected.clone(),
                    found: value.kind().to_string(),
                });
            }
        }

        Ok(Self {
            inner: Arc::new(CarrierData {
                ty,
                fields: fields.into_boxed_slice(),
            }),
        })
    }

    pub fn carrier_type(&self) -> &Arc<CarrierType> {
        &self.inner.ty
    }

    /// Read the field at `slot`
    pub fn field(&self, slot: usize) -> Result<&Value, RuntimeError> {
        self.inner.fields.get(slot).ok_or(RuntimeError::MissingField {
            slot,
            arity: self.inner.fields.len(),
        })
    }
}

impl PartialEq for Carrier {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.ty.id == other.inner.ty.id && self.inner.fields == other.inner.fields)
    }
}

impl std::fmt::Debug for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "carrier#{}", self.inner.ty.id.0)?;
        f.debug_list().entries(self.inner.fields.iter()).finish()
    }
}
