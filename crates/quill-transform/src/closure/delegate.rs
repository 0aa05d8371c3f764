//! Delegate compilation
//!
//! Compiles a subtree of finalized scopes bottom-up. Each child is
//! compiled in the frame of its parent and its placeholder in the parent
//! body is replaced by the result: a function value, a closed lambda left
//! for the parent's compiler, or a carrier bound to a raw callable.

use super::env::Captured;
use super::scope::{carrier_access, FinalizedScope, ScopeKind};
use super::slots::{map_slots, source_expr, ParentFrame};
use crate::error::{ClosureError, Invariant};
use log::debug;
use quill_codegen::compile;
use quill_diagnostics::Span;
use quill_hir::{Expr, LambdaExpr, Param};
use quill_runtime::{MAX_BOUND_PARAMS, MAX_CALLABLE_ARITY};
use quill_types::ScopeId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Root inputs read anywhere in a compiled subtree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedInputs {
    pub arguments: BTreeSet<usize>,
    pub variables: BTreeSet<String>,
}

/// A live scope scheduled for compilation, with its live uncompiled
/// children
#[derive(Debug)]
pub struct InlineDelegate<'a> {
    scope: &'a FinalizedScope,
    children: Vec<InlineDelegate<'a>>,
}

impl<'a> InlineDelegate<'a> {
    /// Collect the subtree rooted at `id`, adding every root input a live
    /// scope in it reads to `used`.
    pub fn build(
        id: ScopeId,
        scopes: &'a BTreeMap<ScopeId, FinalizedScope>,
        used: &mut UsedInputs,
    ) -> Result<Self, ClosureError> {
        let scope = scopes.get(&id).ok_or(Invariant::UnknownScope {
            parent: id,
            scope: id,
        })?;
        if let Some(env) = scope.env() {
            used.arguments.extend(env.arguments().iter().copied());
            used.variables.extend(env.variables().iter().cloned());
        }

        let mut children = Vec::new();
        for child in &scope.children {
            let Some(finalized) = scopes.get(child) else {
                return Err(Invariant::UnknownScope {
                    parent: id,
                    scope: *child,
                }
                .into());
            };
            if !finalized.is_alive() || finalized.compiled.is_some() {
                continue;
            }
            children.push(InlineDelegate::build(*child, scopes, used)?);
        }

        Ok(Self { scope, children })
    }

    pub fn scope(&self) -> ScopeId {
        self.scope.id
    }

    /// Compile this subtree for use inside `parent`, returning the
    /// expression that replaces the scope's placeholder there.
    pub fn compile(&self, parent: &ParentFrame<'_>) -> Result<Expr, ClosureError> {
        let scope = self.scope;
        let frame = ParentFrame::Scope {
            id: scope.id,
            params: &scope.params,
            carrier: carrier_access(&scope.kind),
        };

        let mut replacements = HashMap::new();
        for child in &self.children {
            replacements.insert(child.scope(), child.compile(&frame)?);
        }
        let body = substitute(&scope.body, &frame, &replacements)?;

        match &scope.kind {
            ScopeKind::Static => {
                check_arity(scope.params.len(), MAX_CALLABLE_ARITY, scope.span)?;
                let lambda = LambdaExpr::new(scope.params.clone(), body);
                if scope.eager {
                    debug!("compiled static scope {}", scope.id);
                    Ok(Expr::Delegate {
                        scope: scope.id,
                        function: compile(&lambda)?,
                    })
                } else {
                    Ok(Expr::Lambda(Arc::new(lambda)))
                }
            }
            ScopeKind::Captured { env, layout, env_param } => {
                check_arity(scope.params.len(), MAX_BOUND_PARAMS, scope.span)?;

                let sources = map_slots(env, parent, scope.id)?;
                let values = env
                    .slots()
                    .iter()
                    .zip(sources)
                    .map(|(slot, source)| source_expr(slot, source, parent))
                    .collect::<Result<Vec<_>, _>>()?;
                let carrier = layout.construct(values)?;

                let function = compile(&LambdaExpr::new(with_carrier(env_param, &scope.params), body))?;
                debug!(
                    "compiled scope {} over {} captured slot(s) in {} carrier segment(s)",
                    scope.id,
                    env.len(),
                    layout.segments().len()
                );
                Ok(Expr::Bind {
                    carrier: Box::new(carrier),
                    function,
                    arity: scope.params.len(),
                })
            }
        }
    }
}

/// Fail when a lambda declares more than `max` parameters. The reported
/// count includes the carrier for capturing lambdas.
fn check_arity(params: usize, max: usize, span: Span) -> Result<(), ClosureError> {
    if params <= max {
        return Ok(());
    }
    let carrier = MAX_CALLABLE_ARITY - max;
    Err(ClosureError::UnsupportedArity {
        count: params + carrier,
        max: MAX_CALLABLE_ARITY,
        span,
    })
}

fn with_carrier(env_param: &Param, params: &[Param]) -> Vec<Param> {
    let mut signature = Vec::with_capacity(params.len() + 1);
    signature.push(env_param.clone());
    signature.extend(params.iter().cloned());
    signature
}

/// Replace child placeholders with their compiled forms and redirect
/// captured reads through the scope's own carrier.
fn substitute(body: &Expr, frame: &ParentFrame<'_>, replacements: &HashMap<ScopeId, Expr>) -> Result<Expr, ClosureError> {
    let carrier = match frame {
        ParentFrame::Scope { carrier, .. } => *carrier,
        ParentFrame::Root => None,
    };

    body.rewrite(&mut |expr| -> Result<Option<Expr>, ClosureError> {
        if let Expr::Placeholder(child) = expr {
            return replacements
                .get(child)
                .cloned()
                .map(Some)
                .ok_or_else(|| Invariant::UnresolvedPlaceholder(*child).into());
        }
        let Some(carrier) = carrier else {
            return Ok(None);
        };
        let value = match expr {
            Expr::LocalGet(id) => Captured::Local(*id),
            Expr::ArgVector => Captured::ArgVector,
            Expr::Variable { name, .. } => Captured::Variable(name.clone()),
            _ => return Ok(None),
        };
        carrier.env.index_of(&value).map(|index| carrier.read(index)).transpose()
    })
}
