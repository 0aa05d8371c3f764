//! Diagnostic emitters for different output formats.

use crate::diagnostic::Diagnostic;
use crate::source_cache::SourceCache;
use std::io::Write;

/// Trait for emitting diagnostics in various formats.
pub trait DiagnosticEmitter {
    fn emit(&mut self, diagnostic: &Diagnostic, cache: &SourceCache) -> std::io::Result<()>;
}

/// Simple text output, one line per diagnostic plus its labels.
pub struct SimpleEmitter<W: Write> {
    writer: W,
}

impl<W: Write> SimpleEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> DiagnosticEmitter for SimpleEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic, cache: &SourceCache) -> std::io::Result<()> {
        if let Some(loc) = cache.location(diagnostic.span) {
            write!(self.writer, "{}: ", loc)?;
        }
        writeln!(
            self.writer,
            "{}: {} [{}]",
            diagnostic.severity.as_str(),
            diagnostic.message,
            diagnostic.code.as_str()
        )?;

        for label in &diagnostic.labels {
            if let Some(loc) = cache.location(label.span) {
                writeln!(self.writer, "  note: {} ({})", label.message, loc)?;
            }
        }
        if let Some(ref help) = diagnostic.help {
            writeln!(self.writer, "  = help: {}", help)?;
        }
        Ok(())
    }
}

/// JSON lines output for tooling integration.
pub struct JsonEmitter<W: Write> {
    writer: W,
}

impl<W: Write> JsonEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> DiagnosticEmitter for JsonEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic, cache: &SourceCache) -> std::io::Result<()> {
        let location = |span| {
            cache.location(span).map(|l| {
                serde_json::json!({
                    "file": l.file,
                    "line": l.line,
                    "column": l.column,
                })
            })
        };

        let json = serde_json::json!({
            "code": diagnostic.code.as_str(),
            "severity": diagnostic.severity.as_str(),
            "message": diagnostic.message,
            "location": location(diagnostic.span),
            "span": if diagnostic.span.is_dummy() {
                serde_json::Value::Null
            } else {
                serde_json::json!({
                    "start": diagnostic.span.start,
                    "end": diagnostic.span.end,
                })
            },
            "labels": diagnostic.labels.iter().map(|label| {
                serde_json::json!({
                    "message": label.message,
                    "location": location(label.span),
                })
            }).collect::<Vec<_>>(),
            "help": diagnostic.help,
        });

        serde_json::to_writer(&mut self.writer, &json)?;
        writeln!(self.writer)?;
        Ok(())
    }
}
