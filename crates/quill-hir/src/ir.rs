//! HIR definitions

use once_cell::sync::OnceCell;
use quill_diagnostics::Span;
use quill_runtime::FunctionValue;
use quill_types::{CarrierType, LocalId, ScopeId, Type};
use std::sync::Arc;

/// A declared lambda parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub id: LocalId,
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

/// A lambda whose body only refers to its own parameters
#[derive(Debug, Clone)]
pub struct LambdaExpr {
    pub params: Vec<Param>,
    pub body: Expr,
    compiled: OnceCell<FunctionValue>,
}

impl LambdaExpr {
    pub fn new(params: Vec<Param>, body: Expr) -> Self {
        Self {
            params,
            body,
            compiled: OnceCell::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// The function compiled from this lambda, running `init` only the
    /// first time. Every holder of the same `Arc<LambdaExpr>` shares it.
    pub fn compiled_or_try_init<E, F>(&self, init: F) -> Result<&FunctionValue, E>
    where
        F: FnOnce() -> Result<FunctionValue, E>,
    {
        self.compiled.get_or_try_init(init)
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }
}

/// Expression
#[derive(Debug, Clone)]
pub enum Expr {
    // Literals
    Void,
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),

    // Variables
    /// A declared parameter of some lambda scope
    LocalGet(LocalId),
    /// The shared root argument vector
    ArgVector,
    /// Positional read from an argument vector
    Argument {
        vector: Box<Expr>,
        index: usize,
        ty: Type,
    },
    /// A local binding declared outside the expression
    Variable { name: String, ty: Type },

    // Operations
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },

    // Nested lambda results
    /// Stand-in for a nested lambda that has not been compiled yet
    Placeholder(ScopeId),
    /// A nested lambda that was already compiled to a function value
    Delegate {
        scope: ScopeId,
        function: FunctionValue,
    },
    /// A capture-free lambda left for the enclosing level to compile
    Lambda(Arc<LambdaExpr>),

    // Closure carriers
    NewCarrier {
        carrier: Arc<CarrierType>,
        fields: Vec<Expr>,
    },
    CarrierField {
        carrier: Box<Expr>,
        carrier_type: Arc<CarrierType>,
        slot: usize,
    },
    /// Pair a carrier with a raw callable through the bind adapter for
    /// `arity` declared parameters
    Bind {
        carrier: Box<Expr>,
        function: FunctionValue,
        arity: usize,
    },
}

impl Expr {
    /// Placeholder token for a lambda scope
    pub fn placeholder(scope: ScopeId) -> Expr {
        Expr::Placeholder(scope)
    }

    /// The scope a placeholder or compiled-lambda token stands for
    pub fn scope_token(&self) -> Option<ScopeId> {
        match self {
            Expr::Placeholder(scope) | Expr::Delegate { scope, .. } => Some(*scope),
            _ => None,
        }
    }

    /// Read argument `index` of the shared root argument vector
    pub fn argument(index: usize, ty: Type) -> Expr {
        Expr::Argument {
            vector: Box::new(Expr::ArgVector),
            index,
            ty,
        }
    }

    pub fn variable(name: impl Into<String>, ty: Type) -> Expr {
        Expr::Variable {
            name: name.into(),
            ty,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Expr {
        Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args,
        }
    }

    pub fn conditional(condition: Expr, then_expr: Expr, else_expr: Expr) -> Expr {
        Expr::Conditional {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
        }
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Short-circuit logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}
