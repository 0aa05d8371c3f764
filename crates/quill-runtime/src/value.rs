//! Runtime value representation
//!
//! Values are immutable. Heap payloads (strings, arrays, functions,
//! carriers) are reference counted so that cloning a value never copies
//! the payload and values can cross threads.

use crate::carrier::Carrier;
use crate::closure::FunctionValue;
use quill_types::Type;
use std::sync::Arc;

#[derive(Clone)]
pub enum Value {
    Void,
    Bool(bool),
    Int(i64),
    Number(f64),
    Str(Arc<str>),
    Array(Arc<[Value]>),
    Function(FunctionValue),
    Carrier(Carrier),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Arc::from(s))
    }

    pub fn array(values: Vec<Value>) -> Value {
        Value::Array(Arc::from(values))
    }

    /// Short name of the value's kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
            Value::Carrier(_) => "carrier",
        }
    }

    /// Check whether this value may be stored where `ty` is expected
    pub fn conforms_to(&self, ty: &Type) -> bool {
        match (self, ty) {
            (_, Type::Any) => true,
            (Value::Void, Type::Void) => true,
            (Value::Bool(_), Type::Boolean) => true,
            (Value::Int(_), Type::Int) => true,
            (Value::Number(_), Type::Number) => true,
            (Value::Str(_), Type::String) => true,
            (Value::Array(items), Type::Array(elem)) => items.iter().all(|v| v.conforms_to(elem)),
            (Value::Function(func), Type::Function(sig)) => func.arity() == sig.arity(),
            (Value::Carrier(carrier), Type::Carrier(id)) => carrier.carrier_type().id == *id,
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionValue> {
        match self {
            Value::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn as_carrier(&self) -> Option<&Carrier> {
        match self {
            Value::Carrier(carrier) => Some(carrier),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            // Functions have identity, not structure
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Carrier(a), Value::Carrier(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{:?}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Function(func) => std::fmt::Debug::fmt(func, f),
            Value::Carrier(carrier) => std::fmt::Debug::fmt(carrier, f),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}
