//! Expression sources kept for diagnostic rendering.

use crate::span::{FileId, Location, Span};

/// One expression source with its line table.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: FileId,
    /// Display name (a file path or a synthetic name such as `<expr>`)
    pub name: String,
    pub source: String,
    line_starts: Vec<u32>,
}

impl SourceFile {
    fn new(id: FileId, name: String, source: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(
                source
                    .char_indices()
                    .filter(|&(_, c)| c == '\n')
                    .map(|(i, _)| (i + 1) as u32),
            )
            .collect();
        Self {
            id,
            name,
            source,
            line_starts,
        }
    }

    /// Line and column (both 1-indexed) for a byte offset.
    pub fn line_column(&self, offset: u32) -> (u32, u32) {
        let offset = offset.min(self.source.len() as u32);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let column = offset - self.line_starts[line_idx] + 1;
        ((line_idx + 1) as u32, column)
    }

    pub fn slice(&self, span: Span) -> Option<&str> {
        self.source.get(span.start as usize..span.end as usize)
    }
}

/// Cache of expression sources, indexed by [`FileId`].
#[derive(Debug, Default)]
pub struct SourceCache {
    files: Vec<SourceFile>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, name: impl Into<String>, source: String) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile::new(id, name.into(), source));
        id
    }

    pub fn get_file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0 as usize)
    }

    /// Resolve a span to a Location with name, line, and column.
    pub fn location(&self, span: Span) -> Option<Location> {
        if span.is_dummy() {
            return None;
        }
        let file = self.get_file(span.file_id)?;
        let (line, column) = file.line_column(span.start);
        Some(Location {
            file: file.name.clone(),
            line,
            column,
        })
    }

    pub fn source_text(&self, span: Span) -> Option<&str> {
        if span.is_dummy() {
            return None;
        }
        self.get_file(span.file_id)?.slice(span)
    }
}
