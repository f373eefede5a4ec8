//! Documents flowing between pipeline stages

use serde::{Deserialize, Serialize};

/// Free-form options and settings passed to adapters
pub type AdapterOptions = serde_json::Map<String, serde_json::Value>;

/// Arguments for [`InputSource::load_data`](crate::core::traits::InputSource::load_data)
pub type LoadArgs = AdapterOptions;

/// Document metadata map
pub type DocumentMetadata = serde_json::Map<String, serde_json::Value>;

/// A document as produced by an input adapter, before preprocessing.
///
/// Every field is optional so malformed records survive deserialization and
/// can be dropped (and logged) by the orchestrator instead of failing a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Document identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Document body
    #[serde(default)]
    pub text: Option<String>,
    /// Arbitrary metadata
    #[serde(default)]
    pub metadata: Option<DocumentMetadata>,
}

impl RawDocument {
    /// Create a well-formed raw document with empty metadata
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: Some(text.into()),
            metadata: Some(DocumentMetadata::new()),
        }
    }

    /// Replace the metadata map
    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A normalized document: non-empty id, trimmed non-empty text, metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within a batch
    pub id: String,
    /// Trimmed document body
    pub text: String,
    /// Arbitrary metadata
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Create a new document with empty metadata
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: DocumentMetadata::new(),
        }
    }
}

/// A document returned by a vector search, with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// The matched document
    pub document: Document,
    /// Similarity score, higher is closer
    pub score: f32,
}
