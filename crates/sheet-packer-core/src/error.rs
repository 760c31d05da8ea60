use std::collections::BTreeSet;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetPackerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid texture size {size}: must be a power of two between 8 and 65536")]
    InvalidDimensions { size: u32 },
    #[error(
        "Can't pack any sprite ({remaining} remaining). Probably max texture size {max_size} should be altered"
    )]
    NoProgress { remaining: usize, max_size: u32 },
    #[error("Can't find rect in all of packers for frame - {frame}. Definition file - {definition}")]
    FrameNotPacked { frame: usize, definition: String },
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Nothing to pack")]
    Empty,
}

pub type Result<T> = std::result::Result<T, SheetPackerError>;

/// Run-scoped, ordered, de-duplicated collection of human readable errors.
///
/// Every packing run owns one of these. Recoverable failures (an unresolved GPU
/// export key, a definition file that could not be written) land here while the
/// run keeps going; the caller decides how to surface them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorLog {
    entries: BTreeSet<String>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: impl Into<String>) {
        self.entries.insert(message.into());
    }

    /// Records the display form of an error value.
    pub fn add_error(&mut self, err: &SheetPackerError) {
        self.add(err.to_string());
    }

    pub fn extend(&mut self, other: ErrorLog) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, message: &str) -> bool {
        self.entries.contains(message)
    }

    /// True when any entry contains `needle` as a substring.
    pub fn mentions(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.contains(needle))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Emits every entry through `tracing::error!`.
    pub fn report(&self) {
        for e in &self.entries {
            tracing::error!("{e}");
        }
    }
}

impl<'a> IntoIterator for &'a ErrorLog {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
