//! Captured environments
//!
//! The ordered set of values a lambda scope reads from outside itself. The
//! order of `slots` is the order values are stored in the scope's carrier.

use quill_types::{LocalId, ScopeId, Type, ROOT_SCOPE};
use std::collections::BTreeSet;
use std::fmt;

/// A value that can cross a lambda boundary
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Captured {
    /// Parameter of an enclosing lambda
    Local(LocalId),
    /// The shared argument vector of the whole expression
    ArgVector,
    /// Variable declared outside the expression
    Variable(String),
}

impl fmt::Display for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Captured::Local(id) => write!(f, "local {}", id),
            Captured::ArgVector => write!(f, "the argument vector"),
            Captured::Variable(name) => write!(f, "variable `{}`", name),
        }
    }
}

/// One entry of a captured environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSlot {
    pub value: Captured,
    pub ty: Type,
    /// Scope that declares the value; `ROOT_SCOPE` for the argument vector
    /// and external variables
    pub owner: ScopeId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedEnvironment {
    slots: Vec<CaptureSlot>,
    arguments: BTreeSet<usize>,
    variables: BTreeSet<String>,
}

impl CapturedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> &[CaptureSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Argument vector positions read by the scope or its live descendants
    pub fn arguments(&self) -> &BTreeSet<usize> {
        &self.arguments
    }

    /// External variables read by the scope or its live descendants
    pub fn variables(&self) -> &BTreeSet<String> {
        &self.variables
    }

    /// Carrier position of `value`
    pub fn index_of(&self, value: &Captured) -> Option<usize> {
        self.slots.iter().position(|slot| &slot.value == value)
    }

    pub fn slot(&self, value: &Captured) -> Option<&CaptureSlot> {
        self.slots.iter().find(|slot| &slot.value == value)
    }

    pub fn contains(&self, value: &Captured) -> bool {
        self.index_of(value).is_some()
    }

    /// Field types in carrier order
    pub fn types(&self) -> Vec<Type> {
        self.slots.iter().map(|slot| slot.ty.clone()).collect()
    }

    /// Add a slot unless the value is already present; returns its position
    pub fn insert(&mut self, slot: CaptureSlot) -> usize {
        match self.index_of(&slot.value) {
            Some(index) => index,
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        }
    }

    pub fn capture_local(&mut self, id: LocalId, ty: Type, owner: ScopeId) -> usize {
        self.insert(CaptureSlot {
            value: Captured::Local(id),
            ty,
            owner,
        })
    }

    /// Record a read of argument `index`; the whole vector is one slot
    pub fn capture_argument(&mut self, index: usize) -> usize {
        self.arguments.insert(index);
        self.insert(CaptureSlot {
            value: Captured::ArgVector,
            ty: Type::argument_vector(),
            owner: ROOT_SCOPE,
        })
    }

    pub fn capture_variable(&mut self, name: &str, ty: Type) -> usize {
        self.variables.insert(name.to_string());
        self.insert(CaptureSlot {
            value: Captured::Variable(name.to_string()),
            ty,
            owner: ROOT_SCOPE,
        })
    }

    /// Take over what a live child needs from further out: every slot not
    /// owned by `scope`, plus the child's root inputs.
    pub fn forward_from(&mut self, child: &CapturedEnvironment, scope: ScopeId) {
        for slot in child.slots.iter().filter(|slot| slot.owner != scope) {
            self.insert(slot.clone());
        }
        self.arguments.extend(child.arguments.iter().copied());
        self.variables.extend(child.variables.iter().cloned());
    }

    /// Whether every slot and argument index of `self` also appears in
    /// `other`
    pub fn is_subset_of(&self, other: &CapturedEnvironment) -> bool {
        self.slots.iter().all(|slot| other.contains(&slot.value)) && self.arguments.is_subset(&other.arguments)
    }
}
