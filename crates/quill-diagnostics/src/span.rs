//! Source span types for tracking locations in source code.

use serde::{Deserialize, Serialize};

/// Unique identifier for a source file in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    /// A dummy file ID for spans without a known file.
    pub const DUMMY: FileId = FileId(u32::MAX);
}

/// A byte range in one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub file_id: FileId,
    /// Byte offset of start (inclusive)
    pub start: u32,
    /// Byte offset of end (exclusive)
    pub end: u32,
}

impl Span {
    /// A dummy span for cases where no location is available.
    pub const DUMMY: Span = Span {
        file_id: FileId::DUMMY,
        start: 0,
        end: 0,
    };

    pub fn new(file_id: FileId, start: u32, end: u32) -> Self {
        Self { file_id, start, end }
    }

    pub fn is_dummy(&self) -> bool {
        self.file_id == FileId::DUMMY
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::DUMMY
    }
}

/// Resolved location with file path, line, and column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A secondary location attached to a diagnostic, e.g. the first
/// declaration of a name that was declared again.
#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

impl Label {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}
