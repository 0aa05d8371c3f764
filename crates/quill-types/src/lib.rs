//! Type system for Quill
//!
//! Defines the static types shared by the expression tree, the closure
//! conversion pass and the host runtime.

pub mod carrier;

pub use carrier::{carrier_type, CarrierType, CarrierTypeId};

/// Unique identifier for a lambda scope.
///
/// Scope ids are handed out by a capture session starting at 1; the value
/// [`ROOT_SCOPE`] stands for the root environment (the shared argument
/// vector and externally declared variables), never for a real lambda.
pub type ScopeId = u32;

/// Unique identifier for declared parameters
pub type LocalId = u32;

/// Owner id of everything captured from the root environment
pub const ROOT_SCOPE: ScopeId = 0;

/// Core type representation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value
    Void,
    /// Boolean type
    Boolean,
    /// 64-bit integer
    Int,
    /// Number type (f64)
    Number,
    /// String type
    String,
    /// Array type with element type
    Array(Box<Type>),
    /// Fixed-arity function type
    Function(FunctionType),
    /// A generated closure carrier record
    Carrier(CarrierTypeId),
    /// Any type (boxed value, escape hatch)
    Any,
}

/// Function type information
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    /// Parameter types
    pub params: Vec<Type>,
    /// Return type
    pub return_type: Box<Type>,
}

impl FunctionType {
    pub fn new(params: Vec<Type>, return_type: Type) -> Self {
        Self {
            params,
            return_type: Box::new(return_type),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl Type {
    /// Type of the shared root argument vector
    pub fn argument_vector() -> Type {
        Type::Array(Box::new(Type::Any))
    }

    /// Check if values of `other` can be stored where `self` is expected
    pub fn accepts(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Any, _) | (_, Type::Any) => true,
            (Type::Array(a), Type::Array(b)) => a.accepts(b),
            _ => self == other,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Boolean => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Number => write!(f, "number"),
            Type::String => write!(f, "string"),
            Type::Array(elem) => write!(f, "{}[]", elem),
            Type::Function(func) => {
                write!(f, "(")?;
                for (i, param) in func.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", func.return_type)
            }
            Type::Carrier(id) => write!(f, "carrier#{}", id.0),
            Type::Any => write!(f, "any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_any() {
        assert!(Type::Any.accepts(&Type::Int));
        assert!(Type::Int.accepts(&Type::Any));
        assert!(!Type::Int.accepts(&Type::Number));
        assert!(Type::argument_vector().accepts(&Type::Array(Box::new(Type::Int))));
    }

    #[test]
    fn test_display_function_type() {
        let ty = Type::Function(FunctionType::new(vec![Type::Int, Type::String], Type::Boolean));
        assert_eq!(ty.to_string(), "(int, string) -> bool");
    }
}
