use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A source page with its provenance metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A retrieval-sized piece of a document.
///
/// Metadata carries both the structural heading context the chunk was cut
/// from and the provenance of its parent document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    #[must_use]
    pub fn new(content: impl Into<String>, metadata: BTreeMap<String, String>) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// The `source` metadata value, when the chunk has one.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").map(String::as_str)
    }
}
