//! Capture sessions
//!
//! A `CaptureSession` tracks the lambda scopes of one expression while a
//! front end builds it. Scopes nest as a stack: a scope is opened, its
//! parameters are declared, then its body is built (opening and closing
//! nested scopes along the way) and finally it is closed with the body.
//!
//! Every capture the body requests is registered speculatively on each
//! open scope between the reference and the scope that declares the
//! value. Closing a scope prunes that down to what the finished body
//! actually uses. Compilation happens when a capture-free scope is closed
//! eagerly, or for the whole expression in [`CaptureSession::finalize`].

use super::delegate::{InlineDelegate, UsedInputs};
use super::env::CapturedEnvironment;
use super::layout::CarrierLayout;
use super::scope::{FinalizedScope, ScopeKind, Usage};
use super::slots::ParentFrame;
use super::usage::{validate, ClosingScope};
use crate::error::{ClosureError, Invariant};
use log::debug;
use quill_codegen::{compile, evaluate, RootContext};
use quill_diagnostics::Span;
use quill_hir::{Expr, Param};
use quill_runtime::{FunctionValue, RuntimeError, Value};
use quill_types::{LocalId, ScopeId, Type, ROOT_SCOPE};
use std::collections::{BTreeMap, BTreeSet};

/// Name of the synthetic carrier parameter
const ENV_PARAM: &str = "$env";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Parameters may be declared; nothing else may happen yet
    DeclaringParameters,
    BuildingBody,
}

#[derive(Debug)]
struct OpenScope {
    id: ScopeId,
    span: Span,
    phase: Phase,
    params: Vec<Param>,
    requested: CapturedEnvironment,
    children: Vec<ScopeId>,
}

/// Result of compiling a whole expression
#[derive(Debug, Clone)]
pub enum CompiledExpression {
    /// Needs nothing from the root environment
    Callable(FunctionValue),
    /// Must be evaluated against the root environment to obtain the
    /// callable
    Residual(Expr),
}

impl CompiledExpression {
    /// The callable for a given set of root inputs
    pub fn instantiate(&self, root: &RootContext) -> Result<FunctionValue, RuntimeError> {
        match self {
            CompiledExpression::Callable(function) => Ok(function.clone()),
            CompiledExpression::Residual(expr) => match evaluate(expr, root)? {
                Value::Function(function) => Ok(function),
                other => Err(RuntimeError::Invalid(format!(
                    "expression produced {} instead of a function",
                    other.kind()
                ))),
            },
        }
    }

    pub fn is_residual(&self) -> bool {
        matches!(self, CompiledExpression::Residual(_))
    }
}

#[derive(Debug, Clone)]
pub struct FinalizedExpression {
    pub result: CompiledExpression,
    /// Argument vector positions read by any live lambda
    pub arguments: BTreeSet<usize>,
    /// External variables read by any live lambda
    pub variables: BTreeSet<String>,
}

#[derive(Debug)]
pub struct CaptureSession {
    open: Vec<OpenScope>,
    closed: BTreeMap<ScopeId, FinalizedScope>,
    top_level: Vec<ScopeId>,
    next_scope: ScopeId,
    next_local: LocalId,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            open: Vec::new(),
            closed: BTreeMap::new(),
            top_level: Vec::new(),
            next_scope: ROOT_SCOPE + 1,
            next_local: 0,
        }
    }

    /// Open a lambda scope nested in the current one
    pub fn open_scope(&mut self, span: Span) -> Result<ScopeId, ClosureError> {
        if !self.open.is_empty() {
            self.building()?;
        }
        let id = self.next_scope;
        self.next_scope += 1;
        self.open.push(OpenScope {
            id,
            span,
            phase: Phase::DeclaringParameters,
            params: Vec::new(),
            requested: CapturedEnvironment::new(),
            children: Vec::new(),
        });
        debug!("opened scope {} at depth {}", id, self.open.len());
        Ok(id)
    }

    /// Declare the next parameter of the current scope.
    ///
    /// A repeated name fails with a recoverable `NamingConflict`; the
    /// scope keeps its earlier parameters and stays open.
    pub fn declare_parameter(&mut self, ty: Type, name: &str, span: Span) -> Result<LocalId, ClosureError> {
        let scope = self.open.last_mut().ok_or(Invariant::NoOpenScope)?;
        if scope.phase != Phase::DeclaringParameters {
            return Err(Invariant::ParametersClosed(scope.id).into());
        }
        if let Some(first) = scope.params.iter().find(|p| p.name == name) {
            return Err(ClosureError::NamingConflict {
                name: name.to_string(),
                span,
                first: first.span,
            });
        }

        let id = self.next_local;
        self.next_local += 1;
        scope.params.push(Param {
            id,
            name: name.to_string(),
            ty,
            span,
        });
        Ok(id)
    }

    /// End the parameter list of the current scope and start its body
    pub fn begin_body(&mut self) -> Result<(), ClosureError> {
        let scope = self.open.last_mut().ok_or(Invariant::NoOpenScope)?;
        if scope.phase != Phase::DeclaringParameters {
            return Err(Invariant::ParametersClosed(scope.id).into());
        }
        scope.phase = Phase::BuildingBody;
        Ok(())
    }

    /// Resolve `name` against the open scopes, innermost first. A parameter
    /// of an enclosing scope is registered as a capture on every scope
    /// nested inside its owner.
    pub fn lookup(&mut self, name: &str) -> Result<Option<Expr>, ClosureError> {
        self.building()?;
        let Some(depth) = self
            .open
            .iter()
            .rposition(|scope| scope.params.iter().any(|p| p.name == name))
        else {
            return Ok(None);
        };

        let (owner, rest) = self.open[depth..].split_at_mut(1);
        let owner = &owner[0];
        let Some(param) = owner.params.iter().find(|p| p.name == name) else {
            return Ok(None);
        };
        for scope in rest {
            scope.requested.capture_local(param.id, param.ty.clone(), owner.id);
        }
        Ok(Some(Expr::LocalGet(param.id)))
    }

    /// Read from the shared argument vector
    pub fn capture_argument(&mut self, index: usize, ty: Type) -> Result<Expr, ClosureError> {
        self.building()?;
        for scope in &mut self.open {
            scope.requested.capture_argument(index);
        }
        Ok(Expr::argument(index, ty))
    }

    /// Read a variable declared outside the expression
    pub fn capture_variable(&mut self, name: &str, ty: Type) -> Result<Expr, ClosureError> {
        self.building()?;
        for scope in &mut self.open {
            scope.requested.capture_variable(name, ty.clone());
        }
        Ok(Expr::variable(name, ty))
    }

    /// Close the current scope with its finished body and return the token
    /// the enclosing body should use for it.
    ///
    /// With `eager`, a scope that turns out to capture nothing is compiled
    /// immediately together with its pending nested scopes and the token is
    /// a `Delegate`. Otherwise the token is a `Placeholder`.
    pub fn close_scope(&mut self, body: Expr, eager: bool) -> Result<Expr, ClosureError> {
        self.building()?;
        let scope = self.open.pop().ok_or(Invariant::NoOpenScope)?;

        let env = validate(
            &ClosingScope {
                id: scope.id,
                params: &scope.params,
                requested: &scope.requested,
                children: &scope.children,
            },
            &body,
            &mut self.closed,
        )?;

        let kind = if env.is_empty() {
            ScopeKind::Static
        } else {
            let layout = CarrierLayout::new(&env.types())?;
            let env_param = Param {
                id: self.next_local,
                name: ENV_PARAM.to_string(),
                ty: layout.head_type(),
                span: scope.span,
            };
            self.next_local += 1;
            ScopeKind::Captured { env, layout, env_param }
        };
        debug!(
            "closed scope {} ({} parameter(s), {} captured slot(s))",
            scope.id,
            scope.params.len(),
            match &kind {
                ScopeKind::Static => 0,
                ScopeKind::Captured { env, .. } => env.len(),
            }
        );

        let id = scope.id;
        let compile_now = eager && matches!(kind, ScopeKind::Static);
        self.closed.insert(
            id,
            FinalizedScope {
                id,
                span: scope.span,
                params: scope.params,
                body,
                kind,
                usage: Usage::Alive,
                eager,
                compiled: None,
                children: scope.children,
            },
        );

        if compile_now {
            let compiled = {
                let delegate = InlineDelegate::build(id, &self.closed, &mut UsedInputs::default())?;
                delegate.compile(&ParentFrame::Root)?
            };
            if let (Expr::Delegate { function, .. }, Some(scope)) = (compiled, self.closed.get_mut(&id)) {
                scope.compiled = Some(function);
            }
        }

        match self.open.last_mut() {
            Some(parent) => parent.children.push(id),
            None => self.top_level.push(id),
        }
        self.closed
            .get(&id)
            .map(FinalizedScope::token)
            .ok_or_else(|| Invariant::UnknownScope { parent: id, scope: id }.into())
    }

    /// Compile the whole expression. All scopes must be closed and exactly
    /// one must be at top level.
    pub fn finalize(self) -> Result<FinalizedExpression, ClosureError> {
        if !self.open.is_empty() {
            return Err(Invariant::UnclosedScopes(self.open.len()).into());
        }
        let &[root] = self.top_level.as_slice() else {
            return Err(Invariant::RootCount(self.top_level.len()).into());
        };

        let mut used = UsedInputs::default();
        let delegate = InlineDelegate::build(root, &self.closed, &mut used)?;
        let result = match self.closed.get(&root).and_then(|scope| scope.compiled.clone()) {
            Some(function) => CompiledExpression::Callable(function),
            None => match delegate.compile(&ParentFrame::Root)? {
                Expr::Delegate { function, .. } => CompiledExpression::Callable(function),
                Expr::Lambda(lambda) => CompiledExpression::Callable(compile(&lambda)?),
                residual => CompiledExpression::Residual(residual),
            },
        };
        debug!(
            "finalized expression: {} argument(s), {} variable(s), residual: {}",
            used.arguments.len(),
            used.variables.len(),
            result.is_residual()
        );

        Ok(FinalizedExpression {
            result,
            arguments: used.arguments,
            variables: used.variables,
        })
    }

    /// The innermost open scope
    pub fn current_scope(&self) -> Option<ScopeId> {
        self.open.last().map(|scope| scope.id)
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// A closed scope
    pub fn scope(&self, id: ScopeId) -> Option<&FinalizedScope> {
        self.closed.get(&id)
    }

    /// Parameters declared so far by an open scope
    pub fn parameters(&self, id: ScopeId) -> Option<&[Param]> {
        self.open
            .iter()
            .find(|scope| scope.id == id)
            .map(|scope| scope.params.as_slice())
            .or_else(|| self.closed.get(&id).map(|scope| scope.params.as_slice()))
    }

    fn building(&self) -> Result<(), ClosureError> {
        let scope = self.open.last().ok_or(Invariant::NoOpenScope)?;
        match scope.phase {
            Phase::BuildingBody => Ok(()),
            Phase::DeclaringParameters => Err(Invariant::ParametersLocked(scope.id).into()),
        }
    }
}
