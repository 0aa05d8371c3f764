//! Capture slot mapping
//!
//! Resolves where each slot of a child's environment comes from in the
//! context the child's carrier is built in.

use super::env::{CaptureSlot, Captured, CapturedEnvironment};
use super::layout::CarrierLayout;
use crate::error::{ClosureError, Invariant};
use quill_hir::{Expr, Param};
use quill_types::{LocalId, ScopeId, ROOT_SCOPE};

/// The carrier a scope receives as its leading parameter
#[derive(Debug, Clone, Copy)]
pub struct CarrierAccess<'a> {
    pub env: &'a CapturedEnvironment,
    pub layout: &'a CarrierLayout,
    pub param: LocalId,
}

impl CarrierAccess<'_> {
    /// Read captured value `index` out of the carrier parameter
    pub fn read(&self, index: usize) -> Result<Expr, ClosureError> {
        self.layout.access(index, Expr::LocalGet(self.param))
    }
}

/// Context a child carrier is constructed in
#[derive(Debug, Clone, Copy)]
pub enum ParentFrame<'a> {
    /// Top of the expression: root inputs are read directly
    Root,
    Scope {
        id: ScopeId,
        params: &'a [Param],
        carrier: Option<CarrierAccess<'a>>,
    },
}

impl ParentFrame<'_> {
    pub fn scope(&self) -> ScopeId {
        match self {
            ParentFrame::Root => ROOT_SCOPE,
            ParentFrame::Scope { id, .. } => *id,
        }
    }
}

/// Where one child slot's value is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSource {
    /// A parameter declared by the parent itself
    Direct(LocalId),
    /// Slot `n` of the parent's own carrier
    Forwarded(usize),
    /// The root argument vector or an external variable
    Root,
}

/// Map every slot of `env`, in order
pub fn map_slots(env: &CapturedEnvironment, parent: &ParentFrame<'_>, child: ScopeId) -> Result<Vec<SlotSource>, ClosureError> {
    env.slots()
        .iter()
        .map(|slot| map_slot(slot, parent, child))
        .collect()
}

fn map_slot(slot: &CaptureSlot, parent: &ParentFrame<'_>, child: ScopeId) -> Result<SlotSource, ClosureError> {
    let missing = || -> ClosureError {
        Invariant::MissingParentSlot {
            scope: child,
            value: slot.value.clone(),
        }
        .into()
    };

    match parent {
        ParentFrame::Root => match slot.value {
            Captured::ArgVector | Captured::Variable(_) => Ok(SlotSource::Root),
            Captured::Local(_) => Err(missing()),
        },
        ParentFrame::Scope { id, params, carrier } => {
            if slot.owner == *id {
                return match slot.value {
                    Captured::Local(local) if params.iter().any(|p| p.id == local) => Ok(SlotSource::Direct(local)),
                    _ => Err(missing()),
                };
            }
            carrier
                .as_ref()
                .and_then(|carrier| carrier.env.index_of(&slot.value))
                .map(SlotSource::Forwarded)
                .ok_or_else(missing)
        }
    }
}

/// Expression producing a slot's value inside the parent
pub fn source_expr(slot: &CaptureSlot, source: SlotSource, parent: &ParentFrame<'_>) -> Result<Expr, ClosureError> {
    match source {
        SlotSource::Direct(local) => Ok(Expr::LocalGet(local)),
        SlotSource::Forwarded(index) => match parent {
            ParentFrame::Scope {
                carrier: Some(carrier), ..
            } => carrier.read(index),
            _ => Err(Invariant::SlotOutOfRange { index, len: 0 }.into()),
        },
        SlotSource::Root => match &slot.value {
            Captured::ArgVector => Ok(Expr::ArgVector),
            Captured::Variable(name) => Ok(Expr::variable(name.clone(), slot.ty.clone())),
            Captured::Local(_) => Err(Invariant::MissingParentSlot {
                scope: parent.scope(),
                value: slot.value.clone(),
            }
            .into()),
        },
    }
}
