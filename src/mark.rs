//! Byte-provenance side channel.
//!
//! Every decoded element records where in the 8,192-byte page its value was
//! read from, as a plain `(offset, length, label)` triple. Consumers that
//! highlight or cross-reference raw bytes walk these; nothing in the decoder
//! itself depends on them.

/// One decoded element's position within the page buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mark {
    pub offset: usize,
    pub length: usize,
    pub label: String,
}

/// Ordered collection of marks gathered during a decode.
#[derive(Debug, Clone, Default)]
pub struct Marks(Vec<Mark>);

impl Marks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, offset: usize, length: usize) {
        self.0.push(Mark {
            offset,
            length,
            label: label.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mark> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Mark] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Marks whose byte range covers `offset`.
    pub fn covering(&self, offset: usize) -> impl Iterator<Item = &Mark> {
        self.0
            .iter()
            .filter(move |m| offset >= m.offset && offset < m.offset + m.length)
    }
}
