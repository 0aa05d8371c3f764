//! Tree-walking evaluation of compiled bodies and residual expressions

use crate::codegen::{compile, verify_body};
use quill_hir::{BinaryOp, CompareOp, Expr, LogicalOp, UnaryOp};
use quill_runtime::{bind, Carrier, RuntimeError, Value};
use quill_types::{LocalId, Type};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Inputs of a whole compiled expression, supplied by its caller: the
/// shared argument vector and the externally declared variables.
#[derive(Debug, Clone, Default)]
pub struct RootContext {
    args: Vec<Value>,
    variables: HashMap<String, Value>,
}

impl RootContext {
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            variables: HashMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

/// Evaluate a residual expression against the root environment
pub fn evaluate(expr: &Expr, root: &RootContext) -> Result<Value, RuntimeError> {
    verify_body(expr, &HashSet::new(), true).map_err(|e| RuntimeError::Invalid(e.to_string()))?;
    Interpreter {
        locals: &[],
        root: Some(root),
    }
    .eval(expr)
}

pub(crate) struct Interpreter<'a> {
    locals: &'a [(LocalId, Value)],
    root: Option<&'a RootContext>,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn for_frame(locals: &'a [(LocalId, Value)]) -> Self {
        Self { locals, root: None }
    }

    fn root(&self) -> Result<&'a RootContext, RuntimeError> {
        self.root
            .ok_or_else(|| RuntimeError::Invalid("root environment is not available inside a callable".to_string()))
    }

    pub(crate) fn eval(&self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Void => Ok(Value::Void),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Integer(i) => Ok(Value::Int(*i)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::str(s)),

            Expr::LocalGet(id) => self
                .locals
                .iter()
                .find(|(local, _)| local == id)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| RuntimeError::Invalid(format!("local {} is not bound", id))),
            Expr::ArgVector => Ok(Value::array(self.root()?.args.clone())),
            Expr::Argument { vector, index, ty } => {
                let vector = self.eval(vector)?;
                let Value::Array(items) = &vector else {
                    return Err(mismatch(&Type::argument_vector(), &vector));
                };
                let value = items.get(*index).ok_or(RuntimeError::IndexOutOfBounds {
                    index: *index,
                    len: items.len(),
                })?;
                typed(value.clone(), ty)
            }
            Expr::Variable { name, ty } => {
                let value = self
                    .root()?
                    .variables
                    .get(name)
                    .ok_or_else(|| RuntimeError::UnboundVariable(name.clone()))?;
                typed(value.clone(), ty)
            }

            Expr::Binary { op, left, right } => arithmetic(*op, self.eval(left)?, self.eval(right)?),
            Expr::Unary { op, operand } => match (op, self.eval(operand)?) {
                (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
                (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, other) => Err(mismatch(&Type::Number, &other)),
                (UnaryOp::Not, other) => Err(mismatch(&Type::Boolean, &other)),
            },
            Expr::Compare { op, left, right } => compare(*op, &self.eval(left)?, &self.eval(right)?),
            Expr::Logical { op, left, right } => {
                let left = self.truth(left)?;
                match (op, left) {
                    (LogicalOp::And, false) => Ok(Value::Bool(false)),
                    (LogicalOp::Or, true) => Ok(Value::Bool(true)),
                    _ => Ok(Value::Bool(self.truth(right)?)),
                }
            }
            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.truth(condition)? {
                    self.eval(then_expr)
                } else {
                    self.eval(else_expr)
                }
            }
            Expr::Call { callee, args } => {
                let callee = self.eval(callee)?;
                let Value::Function(func) = &callee else {
                    return Err(RuntimeError::TypeMismatch {
                        expected: Type::Any,
                        found: format!("{} (not callable)", callee.kind()),
                    });
                };
                let args = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>, _>>()?;
                func.invoke(&args)
            }

            Expr::Placeholder(scope) => Err(RuntimeError::Invalid(format!(
                "placeholder for scope {} was never substituted",
                scope
            ))),
            Expr::Delegate { function, .. } => Ok(Value::Function(function.clone())),
            Expr::Lambda(lambda) => compile(lambda)
                .map(Value::Function)
                .map_err(|e| RuntimeError::Invalid(e.to_string())),

            Expr::NewCarrier { carrier, fields } => {
                let values = fields.iter().map(|f| self.eval(f)).collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Carrier(Carrier::new(Arc::clone(carrier), values)?))
            }
            Expr::CarrierField {
                carrier,
                carrier_type,
                slot,
            } => {
                let value = self.eval(carrier)?;
                let carrier = value
                    .as_carrier()
                    .ok_or_else(|| mismatch(&carrier_type.as_type(), &value))?;
                Ok(carrier.field(*slot)?.clone())
            }
            Expr::Bind {
                carrier,
                function,
                arity,
            } => {
                let carrier = self.eval(carrier)?;
                Ok(Value::Function(bind(*arity, carrier, function.clone())?))
            }
        }
    }

    fn truth(&self, expr: &Expr) -> Result<bool, RuntimeError> {
        let value = self.eval(expr)?;
        value.as_bool().ok_or_else(|| mismatch(&Type::Boolean, &value))
    }
}

fn mismatch(expected: &Type, found: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: expected.clone(),
        found: found.kind().to_string(),
    }
}

fn typed(value: Value, ty: &Type) -> Result<Value, RuntimeError> {
    if value.conforms_to(ty) {
        Ok(value)
    } else {
        Err(mismatch(ty, &value))
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Number(n) => Some(*n),
        _ => None,
    }
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div | BinaryOp::Mod if b == 0 => return Err(RuntimeError::DivisionByZero),
                BinaryOp::Div => a.wrapping_div(b),
                BinaryOp::Mod => a.wrapping_rem(b),
            };
            Ok(Value::Int(result))
        }
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::str(&format!("{}{}", a, b))),
        _ => {
            let a = as_number(&left).ok_or_else(|| mismatch(&Type::Number, &left))?;
            let b = as_number(&right).ok_or_else(|| mismatch(&Type::Number, &right))?;
            Ok(Value::Number(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Mod => a % b,
            }))
        }
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };

    let result = match op {
        CompareOp::Eq => ordering.map_or_else(|| left == right, |o| o.is_eq()),
        CompareOp::Ne => ordering.map_or_else(|| left != right, |o| o.is_ne()),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let Some(ordering) = ordering else {
                return Err(mismatch(&Type::Number, if as_number(left).is_none() { left } else { right }));
            };
            match op {
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }
        }
    };
    Ok(Value::Bool(result))
}
