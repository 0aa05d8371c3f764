//! Lambda compilation
//!
//! A lambda is compilable when its body is closed: every `LocalGet` names
//! one of its own parameters, no placeholder is left, the root environment
//! is not referenced directly, and every carrier access matches the
//! reflected carrier type.

use crate::error::CodegenError;
use crate::eval::Interpreter;
use log::trace;
use quill_hir::{Expr, LambdaExpr};
use quill_runtime::{Callable, FunctionValue, RuntimeError, Value, MAX_BOUND_PARAMS, MAX_CALLABLE_ARITY};
use quill_types::LocalId;
use std::collections::HashSet;
use std::sync::Arc;

/// A compiled lambda: fixed parameter list plus a verified body
pub struct CompiledFunction {
    params: Vec<LocalId>,
    body: Expr,
}

impl Callable for CompiledFunction {
    fn arity(&self) -> usize {
        self.params.len()
    }

    fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        if args.len() != self.params.len() {
            return Err(RuntimeError::ArityMismatch {
                expected: self.params.len(),
                found: args.len(),
            });
        }
        let locals: Vec<(LocalId, Value)> = self.params.iter().copied().zip(args.iter().cloned()).collect();
        Interpreter::for_frame(&locals).eval(&self.body)
    }
}

/// Compile a closed lambda into a runtime callable. A lambda is compiled
/// at most once; later calls return the same function.
pub fn compile(lambda: &LambdaExpr) -> Result<FunctionValue, CodegenError> {
    lambda
        .compiled_or_try_init(|| {
            verify_lambda(lambda)?;
            trace!("compiled lambda with {} parameter(s)", lambda.arity());
            let function: FunctionValue = Arc::new(CompiledFunction {
                params: lambda.params.iter().map(|p| p.id).collect(),
                body: lambda.body.clone(),
            });
            Ok(function)
        })
        .cloned()
}

pub(crate) fn verify_lambda(lambda: &LambdaExpr) -> Result<(), CodegenError> {
    if lambda.arity() > MAX_CALLABLE_ARITY {
        return Err(CodegenError::UnsupportedArity {
            count: lambda.arity(),
            max: MAX_CALLABLE_ARITY,
        });
    }
    let bound: HashSet<LocalId> = lambda.params.iter().map(|p| p.id).collect();
    verify_body(&lambda.body, &bound, false)
}

/// Check `body` against the parameters in scope. Residual expressions are
/// evaluated against the root environment, so they may reference it.
pub(crate) fn verify_body(body: &Expr, bound: &HashSet<LocalId>, allow_root: bool) -> Result<(), CodegenError> {
    let mut error = None;
    body.walk(&mut |expr| {
        if error.is_some() {
            return;
        }
        error = check_node(expr, bound, allow_root).err();
    });
    error.map_or(Ok(()), Err)
}

fn check_node(expr: &Expr, bound: &HashSet<LocalId>, allow_root: bool) -> Result<(), CodegenError> {
    match expr {
        Expr::LocalGet(id) if !bound.contains(id) => Err(CodegenError::UnboundLocal(*id)),
        Expr::Placeholder(scope) => Err(CodegenError::UnresolvedPlaceholder(*scope)),
        Expr::ArgVector if !allow_root => Err(CodegenError::RootReference("argument vector".to_string())),
        Expr::Variable { name, .. } if !allow_root => {
            Err(CodegenError::RootReference(format!("variable `{}`", name)))
        }
        Expr::Lambda(inner) if inner.is_compiled() => Ok(()),
        Expr::Lambda(inner) => verify_lambda(inner),
        Expr::NewCarrier { carrier, fields } if carrier.arity() != fields.len() => {
            Err(CodegenError::CarrierShape {
                expected: carrier.arity(),
                found: fields.len(),
            })
        }
        Expr::CarrierField {
            carrier_type, slot, ..
        } if carrier_type.field(*slot).is_none() => Err(CodegenError::CarrierSlot {
            slot: *slot,
            arity: carrier_type.arity(),
        }),
        Expr::Bind { function, arity, .. } => {
            if *arity > MAX_BOUND_PARAMS || function.arity() != arity + 1 {
                Err(CodegenError::UnsupportedArity {
                    count: function.arity(),
                    max: MAX_CALLABLE_ARITY,
                })
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_diagnostics::Span;
    use quill_hir::{BinaryOp, Param};
    use quill_types::{carrier_type, Type};

    fn param(id: LocalId) -> Param {
        Param {
            id,
            name: format!("p{}", id),
            ty: Type::Int,
            span: Span::DUMMY,
        }
    }

    #[test]
    fn test_compile_and_invoke() {
        let lambda = LambdaExpr::new(
            vec![param(1), param(2)],
            Expr::binary(BinaryOp::Mul, Expr::LocalGet(1), Expr::LocalGet(2)),
        );
        let func = compile(&lambda).unwrap();

        assert_eq!(func.arity(), 2);
        assert_eq!(func.invoke(&[Value::Int(6), Value::Int(7)]), Ok(Value::Int(42)));
        assert!(matches!(
            func.invoke(&[Value::Int(6)]),
            Err(RuntimeError::ArityMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_rejects_unbound_local() {
        let lambda = LambdaExpr::new(vec![param(1)], Expr::LocalGet(2));
        assert_eq!(compile(&lambda).err(), Some(CodegenError::UnboundLocal(2)));
    }

    #[test]
    fn test_rejects_placeholder_and_root() {
        let lambda = LambdaExpr::new(Vec::new(), Expr::call(Expr::Placeholder(3), Vec::new()));
        assert_eq!(compile(&lambda).err(), Some(CodegenError::UnresolvedPlaceholder(3)));

        let lambda = LambdaExpr::new(Vec::new(), Expr::argument(0, Type::Int));
        assert!(matches!(compile(&lambda), Err(CodegenError::RootReference(_))));
    }

    #[test]
    fn test_rejects_missing_carrier_field() {
        let ty = carrier_type(vec![Type::Int, Type::Int]);
        let body = Expr::CarrierField {
            carrier: Box::new(Expr::LocalGet(1)),
            carrier_type: ty.clone(),
            slot: 2,
        };
        let lambda = LambdaExpr::new(
            vec![Param {
                id: 1,
                name: "env".to_string(),
                ty: ty.as_type(),
                span: Span::DUMMY,
            }],
            body,
        );
        assert_eq!(
            compile(&lambda).err(),
            Some(CodegenError::CarrierSlot { slot: 2, arity: 2 })
        );
    }

    #[test]
    fn test_rejects_too_many_params() {
        let params = (0..=MAX_CALLABLE_ARITY as LocalId).map(param).collect();
        let lambda = LambdaExpr::new(params, Expr::Void);
        assert!(matches!(
            compile(&lambda),
            Err(CodegenError::UnsupportedArity { count: 17, max: 16 })
        ));
    }

    #[test]
    fn test_nested_lambda_must_be_closed() {
        let inner = LambdaExpr::new(Vec::new(), Expr::LocalGet(1));
        let outer = LambdaExpr::new(vec![param(1)], Expr::Lambda(Arc::new(inner)));
        assert_eq!(compile(&outer).err(), Some(CodegenError::UnboundLocal(1)));
    }

    #[test]
    fn test_nested_lambda_is_compiled_once() {
        let inner = Arc::new(LambdaExpr::new(vec![param(1)], Expr::LocalGet(1)));
        let outer = compile(&LambdaExpr::new(Vec::new(), Expr::Lambda(inner.clone()))).unwrap();
        assert!(!inner.is_compiled());

        let first = outer.invoke(&[]).unwrap();
        assert!(inner.is_compiled());
        let second = outer.invoke(&[]).unwrap();
        assert!(Arc::ptr_eq(first.as_function().unwrap(), second.as_function().unwrap()));
        assert_eq!(second.as_function().unwrap().invoke(&[Value::Int(8)]), Ok(Value::Int(8)));
    }
}
