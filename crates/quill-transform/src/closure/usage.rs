//! Usage validation
//!
//! Runs when a scope closes. Determines what the finished body actually
//! reads from outside, checks that against what was requested while the
//! body was built, and marks nested scopes whose tokens the body dropped.

use super::env::{Captured, CapturedEnvironment};
use super::scope::{FinalizedScope, Usage};
use crate::error::{ClosureError, Invariant};
use log::trace;
use quill_hir::{Expr, Param};
use quill_types::{LocalId, ScopeId};
use std::collections::{BTreeMap, HashSet};

/// The scope being closed, before it is recorded
pub(crate) struct ClosingScope<'a> {
    pub id: ScopeId,
    pub params: &'a [Param],
    /// Everything requested while the body was built
    pub requested: &'a CapturedEnvironment,
    pub children: &'a [ScopeId],
}

/// Compute the pruned environment of `scope`. Children the body does not
/// reference are marked dead in `scopes`, together with their subtrees.
pub(crate) fn validate(
    scope: &ClosingScope<'_>,
    body: &Expr,
    scopes: &mut BTreeMap<ScopeId, FinalizedScope>,
) -> Result<CapturedEnvironment, ClosureError> {
    let own: HashSet<LocalId> = scope.params.iter().map(|p| p.id).collect();
    let mut env = CapturedEnvironment::new();
    let mut referenced = HashSet::new();
    let mut failure = None;

    body.walk(&mut |expr| {
        if failure.is_some() {
            return;
        }
        let result = match expr {
            Expr::LocalGet(id) if !own.contains(id) => observe(scope, &mut env, Captured::Local(*id)),
            Expr::ArgVector => observe(scope, &mut env, Captured::ArgVector),
            Expr::Argument { vector, index, .. } if matches!(**vector, Expr::ArgVector) => {
                env.capture_argument(*index);
                Ok(())
            }
            Expr::Variable { name, ty } => {
                let observed = observe(scope, &mut env, Captured::Variable(name.clone()));
                if observed.is_ok() {
                    env.capture_variable(name, ty.clone());
                }
                observed
            }
            Expr::Placeholder(child) | Expr::Delegate { scope: child, .. } => {
                if scope.children.contains(child) {
                    referenced.insert(*child);
                    Ok(())
                } else {
                    Err(Invariant::UnknownScope {
                        parent: scope.id,
                        scope: *child,
                    }
                    .into())
                }
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            failure = Some(e);
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }

    for child in scope.children {
        if referenced.contains(child) {
            let child_env = scopes.get(child).and_then(|s| s.env()).cloned();
            if let Some(child_env) = child_env {
                env.forward_from(&child_env, scope.id);
            }
        } else {
            mark_dead(*child, scopes);
        }
    }

    if !env.is_subset_of(scope.requested) {
        return Err(unrequested(scope, &env));
    }

    trace!(
        "scope {}: {} of {} requested slot(s) used",
        scope.id,
        env.len(),
        scope.requested.len()
    );
    Ok(env)
}

/// Copy a requested slot into the used environment
fn observe(scope: &ClosingScope<'_>, env: &mut CapturedEnvironment, value: Captured) -> Result<(), ClosureError> {
    match scope.requested.slot(&value) {
        Some(slot) => {
            env.insert(slot.clone());
            Ok(())
        }
        None => Err(Invariant::UnrequestedCapture { scope: scope.id, value }.into()),
    }
}

/// The first use in `env` that `scope` never requested
fn unrequested(scope: &ClosingScope<'_>, env: &CapturedEnvironment) -> ClosureError {
    let requested = scope.requested;
    if let Some(slot) = env.slots().iter().find(|slot| !requested.contains(&slot.value)) {
        return Invariant::UnrequestedCapture {
            scope: scope.id,
            value: slot.value.clone(),
        }
        .into();
    }
    match env.arguments().difference(requested.arguments()).next() {
        Some(&index) => Invariant::UnrequestedArgument { scope: scope.id, index }.into(),
        None => Invariant::UnrequestedCapture {
            scope: scope.id,
            value: Captured::ArgVector,
        }
        .into(),
    }
}

/// Mark a scope and every scope nested in it as dead
pub(crate) fn mark_dead(root: ScopeId, scopes: &mut BTreeMap<ScopeId, FinalizedScope>) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(scope) = scopes.get_mut(&id) {
            if scope.usage == Usage::Dead {
                continue;
            }
            trace!("scope {} is never referenced", id);
            scope.usage = Usage::Dead;
            stack.extend(scope.children.iter().copied());
        }
    }
}
