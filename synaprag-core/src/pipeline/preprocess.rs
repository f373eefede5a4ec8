//! Document normalisation between loading and embedding

use std::collections::HashSet;

use crate::core::{Document, RawDocument};

/// Why a raw document was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// `id` absent or blank
    MissingId,
    /// `text` absent or whitespace only
    MissingText,
    /// `metadata` absent
    MissingMetadata,
    /// `id` already seen earlier in the batch
    DuplicateId,
}

impl DropReason {
    fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingId => "missing id",
            DropReason::MissingText => "missing text",
            DropReason::MissingMetadata => "missing metadata",
            DropReason::DuplicateId => "duplicate id",
        }
    }
}

fn normalise(raw: RawDocument, seen: &mut HashSet<String>) -> Result<Document, DropReason> {
    let id = raw
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or(DropReason::MissingId)?;
    let text = raw
        .text
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(DropReason::MissingText)?;
    let metadata = raw.metadata.ok_or(DropReason::MissingMetadata)?;

    if !seen.insert(id.clone()) {
        return Err(DropReason::DuplicateId);
    }
    Ok(Document { id, text, metadata })
}

/// Keep well-formed documents with trimmed text, in input order.
///
/// Malformed documents are logged and dropped; this never fails.
pub fn preprocess(raw: Vec<RawDocument>) -> Vec<Document> {
    let total = raw.len();
    let mut seen = HashSet::with_capacity(total);
    let mut documents = Vec::with_capacity(total);

    for (index, doc) in raw.into_iter().enumerate() {
        let id = doc.id.clone();
        match normalise(doc, &mut seen) {
            Ok(document) => documents.push(document),
            Err(reason) => {
                tracing::warn!(index, id = ?id, reason = reason.as_str(), "dropping invalid document");
            },
        }
    }

    tracing::debug!(kept = documents.len(), dropped = total - documents.len(), "documents preprocessed");
    documents
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::DocumentMetadata;

    fn meta() -> DocumentMetadata {
        let mut metadata = DocumentMetadata::new();
        metadata.insert("source".to_string(), json!("test"));
        metadata
    }

    #[test]
    fn test_drops_malformed_and_trims_text() {
        let raw = vec![
            RawDocument::new("1", "  primero  ").with_metadata(meta()),
            RawDocument {
                id: None,
                text: Some("sin id".to_string()),
                metadata: Some(meta()),
            },
            RawDocument::new("3", "   ").with_metadata(meta()),
            RawDocument {
                metadata: None,
                ..RawDocument::new("4", "sin metadata")
            },
            RawDocument::new("1", "repetido").with_metadata(meta()),
            RawDocument::new(" 6 ", "segundo").with_metadata(meta()),
        ];

        let documents = preprocess(raw);
        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["1", "6"]);
        assert_eq!(documents[0].text, "primero");
    }

    #[test]
    fn test_empty_metadata_map_is_accepted() {
        let raw = vec![RawDocument::new("a", "text").with_metadata(Default::default())];
        assert_eq!(preprocess(raw).len(), 1);
    }
}
