//! Closed lambda scopes

use super::env::CapturedEnvironment;
use super::layout::CarrierLayout;
use super::slots::CarrierAccess;
use quill_diagnostics::Span;
use quill_hir::{Expr, Param};
use quill_runtime::FunctionValue;
use quill_types::ScopeId;

#[derive(Debug, Clone)]
pub enum ScopeKind {
    /// Reads nothing from outside; compiles to a plain callable
    Static,
    /// Receives its environment through a leading carrier parameter
    Captured {
        env: CapturedEnvironment,
        layout: CarrierLayout,
        env_param: Param,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Alive,
    /// The parent body never references the scope's token
    Dead,
}

/// A scope whose body is complete
#[derive(Debug, Clone)]
pub struct FinalizedScope {
    pub id: ScopeId,
    pub span: Span,
    pub params: Vec<Param>,
    pub body: Expr,
    pub kind: ScopeKind,
    pub usage: Usage,
    pub eager: bool,
    /// Set once the scope has been compiled on its own
    pub compiled: Option<FunctionValue>,
    pub children: Vec<ScopeId>,
}

impl FinalizedScope {
    pub fn is_static(&self) -> bool {
        matches!(self.kind, ScopeKind::Static)
    }

    pub fn is_alive(&self) -> bool {
        self.usage == Usage::Alive
    }

    /// Captured environment after pruning; `None` for static scopes
    pub fn env(&self) -> Option<&CapturedEnvironment> {
        match &self.kind {
            ScopeKind::Static => None,
            ScopeKind::Captured { env, .. } => Some(env),
        }
    }

    pub fn carrier_access(&self) -> Option<CarrierAccess<'_>> {
        carrier_access(&self.kind)
    }

    /// Parameters of the raw callable: the carrier first, if any, then the
    /// declared parameters
    pub fn signature(&self) -> Vec<Param> {
        let mut params = Vec::with_capacity(self.params.len() + 1);
        if let ScopeKind::Captured { env_param, .. } = &self.kind {
            params.push(env_param.clone());
        }
        params.extend(self.params.iter().cloned());
        params
    }

    /// Token the parent body refers to this scope with
    pub fn token(&self) -> Expr {
        match &self.compiled {
            Some(function) => Expr::Delegate {
                scope: self.id,
                function: function.clone(),
            },
            None => Expr::placeholder(self.id),
        }
    }
}

pub(crate) fn carrier_access(kind: &ScopeKind) -> Option<CarrierAccess<'_>> {
    match kind {
        ScopeKind::Static => None,
        ScopeKind::Captured { env, layout, env_param } => Some(CarrierAccess {
            env,
            layout,
            param: env_param.id,
        }),
    }
}
