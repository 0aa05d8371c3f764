//! Closure carrier record types
//!
//! A carrier is a fixed-arity record holding a closure's captured values.
//! Carrier *types* are interned process-wide: the cache is append-only and
//! keyed by the field types, so two compilations asking for the same shape
//! share one `CarrierType`. Carrier *instances* live in the runtime and are
//! never shared between compilations.

use crate::Type;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

/// Identity of an interned carrier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarrierTypeId(pub u32);

/// A generated fixed-arity carrier record type
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CarrierType {
    pub id: CarrierTypeId,
    fields: Vec<Type>,
}

impl CarrierType {
    /// Number of fields, including a trailing tail field if present
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Type of the field at `slot`, or `None` past the arity
    pub fn field(&self, slot: usize) -> Option<&Type> {
        self.fields.get(slot)
    }

    pub fn fields(&self) -> &[Type] {
        &self.fields
    }

    /// The type a value of this carrier has
    pub fn as_type(&self) -> Type {
        Type::Carrier(self.id)
    }
}

static NEXT_CARRIER_ID: AtomicU32 = AtomicU32::new(1);

static CARRIER_TYPES: Lazy<RwLock<HashMap<Vec<Type>, Arc<CarrierType>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Get or create the carrier type with the given field types.
///
/// Concurrent callers racing on the same key may both allocate an id, but
/// only the first insert wins and every caller gets that instance back.
pub fn carrier_type(fields: Vec<Type>) -> Arc<CarrierType> {
    {
        let cache = CARRIER_TYPES.read().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = cache.get(&fields) {
            return existing.clone();
        }
    }

    let mut cache = CARRIER_TYPES.write().unwrap_or_else(|e| e.into_inner());
    cache
        .entry(fields.clone())
        .or_insert_with(|| {
            let id = CarrierTypeId(NEXT_CARRIER_ID.fetch_add(1, Ordering::Relaxed));
            Arc::new(CarrierType { id, fields })
        })
        .clone()
}
