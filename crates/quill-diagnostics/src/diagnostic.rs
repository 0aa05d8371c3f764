//! Diagnostic types for compiler errors.

use crate::span::{Label, Span};
use serde::{Deserialize, Serialize};

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Note,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Naming (N001-N099)
    /// A lambda declares the same parameter name twice
    DuplicateParameter,

    // Compiler limits (A001-A099)
    /// A callable needs more parameters than the bind adapter family covers
    UnsupportedArity,

    // Internal errors (I001-I099)
    /// The builder broke the scope protocol or a closure invariant
    InvariantViolation,
    /// The host compiler rejected a generated callable
    CodegenFailure,
}

impl DiagnosticCode {
    /// Get the error code string (e.g., "N001").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateParameter => "N001",
            Self::UnsupportedArity => "A001",
            Self::InvariantViolation => "I001",
            Self::CodegenFailure => "I002",
        }
    }

    /// Internal codes point at a compiler bug rather than at user input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InvariantViolation | Self::CodegenFailure)
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A compiler diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Short message (single line)
    pub message: String,
    /// Longer explanation (optional)
    pub help: Option<String>,
    /// Primary span (where the error is)
    pub span: Span,
    pub labels: Vec<Label>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, Severity::Error, message)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Builder for constructing diagnostics fluently.
pub struct DiagnosticBuilder {
    inner: Diagnostic,
}

impl DiagnosticBuilder {
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            inner: Diagnostic {
                code,
                severity,
                message: message.into(),
                help: None,
                span: Span::DUMMY,
                labels: Vec::new(),
            },
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.inner.span = span;
        self
    }

    /// Add a secondary label; dummy spans are dropped.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        if !span.is_dummy() {
            self.inner.labels.push(Label::new(span, message));
        }
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.inner.help = Some(help.into());
        self
    }

    pub fn build(self) -> Diagnostic {
        self.inner
    }
}
