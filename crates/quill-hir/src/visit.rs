//! Traversal over expression trees
//!
//! `walk` observes a tree in pre-order. `rewrite` builds a new tree; the
//! input is never modified, so a closed lambda body can be inspected by
//! several passes. Neither descends into `Expr::Lambda`: those bodies are
//! closed over their own parameters and opaque to the enclosing scope.

use crate::ir::Expr;

impl Expr {
    /// Visit every node in pre-order
    pub fn walk<F: FnMut(&Expr)>(&self, f: &mut F) {
        f(self);
        match self {
            Expr::Argument { vector, .. } => vector.walk(f),
            Expr::Binary { left, right, .. }
            | Expr::Compare { left, right, .. }
            | Expr::Logical { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::Unary { operand, .. } => operand.walk(f),
            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                condition.walk(f);
                then_expr.walk(f);
                else_expr.walk(f);
            }
            Expr::Call { callee, args } => {
                callee.walk(f);
                for arg in args {
                    arg.walk(f);
                }
            }
            Expr::NewCarrier { fields, .. } => {
                for field in fields {
                    field.walk(f);
                }
            }
            Expr::CarrierField { carrier, .. } | Expr::Bind { carrier, .. } => carrier.walk(f),
            Expr::Void
            | Expr::Bool(_)
            | Expr::Integer(_)
            | Expr::Number(_)
            | Expr::String(_)
            | Expr::LocalGet(_)
            | Expr::ArgVector
            | Expr::Variable { .. }
            | Expr::Placeholder(_)
            | Expr::Delegate { .. }
            | Expr::Lambda(_) => {}
        }
    }

    /// Check whether any node satisfies `pred`
    pub fn any<P: FnMut(&Expr) -> bool>(&self, mut pred: P) -> bool {
        let mut found = false;
        self.walk(&mut |e| found = found || pred(e));
        found
    }

    /// Build a new tree. `f` sees each node before its children; returning
    /// `Some` replaces the node (its children are not visited), `None`
    /// rebuilds the node from its rewritten children.
    pub fn rewrite<E, F>(&self, f: &mut F) -> Result<Expr, E>
    where
        F: FnMut(&Expr) -> Result<Option<Expr>, E>,
    {
        if let Some(replacement) = f(self)? {
            return Ok(replacement);
        }

        Ok(match self {
            Expr::Argument { vector, index, ty } => Expr::Argument {
                vector: boxed(vector, f)?,
                index: *index,
                ty: ty.clone(),
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: boxed(left, f)?,
                right: boxed(right, f)?,
            },
            Expr::Compare { op, left, right } => Expr::Compare {
                op: *op,
                left: boxed(left, f)?,
                right: boxed(right, f)?,
            },
            Expr::Logical { op, left, right } => Expr::Logical {
                op: *op,
                left: boxed(left, f)?,
                right: boxed(right, f)?,
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: boxed(operand, f)?,
            },
            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
            } => Expr::Conditional {
                condition: boxed(condition, f)?,
                then_expr: boxed(then_expr, f)?,
                else_expr: boxed(else_expr, f)?,
            },
            Expr::Call { callee, args } => Expr::Call {
                callee: boxed(callee, f)?,
                args: args.iter().map(|a| a.rewrite(f)).collect::<Result<_, _>>()?,
            },
            Expr::NewCarrier { carrier, fields } => Expr::NewCarrier {
                carrier: carrier.clone(),
                fields: fields.iter().map(|e| e.rewrite(f)).collect::<Result<_, _>>()?,
            },
            Expr::CarrierField {
                carrier,
                carrier_type,
                slot,
            } => Expr::CarrierField {
                carrier: boxed(carrier, f)?,
                carrier_type: carrier_type.clone(),
                slot: *slot,
            },
            Expr::Bind {
                carrier,
                function,
                arity,
            } => Expr::Bind {
                carrier: boxed(carrier, f)?,
                function: function.clone(),
                arity: *arity,
            },
            leaf => leaf.clone(),
        })
    }
}

fn boxed<E, F>(expr: &Expr, f: &mut F) -> Result<Box<Expr>, E>
where
    F: FnMut(&Expr) -> Result<Option<Expr>, E>,
{
    Ok(Box::new(expr.rewrite(f)?))
}

#[cfg(test)]
mod tests {
    use crate::ir::*;
    use quill_types::Type;
    use std::convert::Infallible;

    fn sample() -> Expr {
        // a + args[0] > p(b)
        Expr::compare(
            CompareOp::Gt,
            Expr::binary(BinaryOp::Add, Expr::LocalGet(1), Expr::argument(0, Type::Int)),
            Expr::call(Expr::Placeholder(3), vec![Expr::LocalGet(2)]),
        )
    }

    #[test]
    fn test_walk_preorder() {
        let mut locals = Vec::new();
        sample().walk(&mut |e| {
            if let Expr::LocalGet(id) = e {
                locals.push(*id);
            }
        });
        assert_eq!(locals, vec![1, 2]);
        assert!(sample().any(|e| matches!(e, Expr::ArgVector)));
        assert!(!sample().any(|e| matches!(e, Expr::Variable { .. })));
    }

    #[test]
    fn test_walk_skips_lambda_bodies() {
        let lambda = LambdaExpr::new(Vec::new(), Expr::LocalGet(9));
        let expr = Expr::call(Expr::Lambda(std::sync::Arc::new(lambda)), Vec::new());
        assert!(!expr.any(|e| matches!(e, Expr::LocalGet(9))));
    }

    #[test]
    fn test_rewrite_replaces_tokens() {
        let original = sample();
        let rewritten = original
            .rewrite(&mut |e| {
                Ok::<_, Infallible>(match e {
                    Expr::Placeholder(3) => Some(Expr::LocalGet(7)),
                    Expr::LocalGet(1) => Some(Expr::Integer(5)),
                    _ => None,
                })
            })
            .unwrap();

        assert!(rewritten.any(|e| matches!(e, Expr::LocalGet(7))));
        assert!(!rewritten.any(|e| matches!(e, Expr::Placeholder(_))));
        assert!(!rewritten.any(|e| matches!(e, Expr::LocalGet(1))));
        // The input tree is untouched
        assert!(original.any(|e| matches!(e, Expr::Placeholder(3))));
    }

    #[test]
    fn test_rewrite_propagates_errors() {
        let result: Result<Expr, &str> = sample().rewrite(&mut |e| match e {
            Expr::LocalGet(2) => Err("unbound"),
            _ => Ok(None),
        });
        assert_eq!(result.err(), Some("unbound"));
    }

    #[test]
    fn test_scope_token() {
        assert_eq!(Expr::placeholder(4).scope_token(), Some(4));
        assert_eq!(Expr::LocalGet(4).scope_token(), None);
    }
}
