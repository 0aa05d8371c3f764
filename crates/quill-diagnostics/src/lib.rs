//! Diagnostic infrastructure for the Quill expression compiler.
//!
//! Compilation of one expression reports at most one located error. This
//! crate carries the location types and renders diagnostics either as plain
//! text or as JSON lines for tooling.
//!
//! # Example
//!
//! ```
//! use quill_diagnostics::{
//!     Diagnostic, DiagnosticCode, DiagnosticEmitter, SimpleEmitter, SourceCache, Span,
//! };
//!
//! let mut cache = SourceCache::new();
//! let file_id = cache.add_file("expr.q", "(x, x) => x".to_string());
//!
//! let diag = Diagnostic::error(DiagnosticCode::DuplicateParameter, "parameter `x` is declared twice")
//!     .with_span(Span::new(file_id, 4, 5))
//!     .build();
//!
//! let mut out = Vec::new();
//! SimpleEmitter::new(&mut out).emit(&diag, &cache).unwrap();
//! assert!(String::from_utf8(out).unwrap().starts_with("expr.q:1:5: error"));
//! ```

pub mod diagnostic;
pub mod emitter;
pub mod source_cache;
pub mod span;

pub use diagnostic::{Diagnostic, DiagnosticBuilder, DiagnosticCode, Severity};
pub use emitter::{DiagnosticEmitter, JsonEmitter, SimpleEmitter};
pub use source_cache::{SourceCache, SourceFile};
pub use span::{FileId, Label, Location, Span};
