use std::fmt;

use serde::{Deserialize, Serialize};

/// Steps of one pipeline run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PipelineStage {
    /// Run created, nothing executed yet
    Pending,
    /// Merge pre-context JSON files (optional, first)
    ConsolidatePreContext,
    /// Fetch raw documents from the input adapter
    LoadData,
    /// Validate and normalise documents
    Preprocess,
    /// Embed document texts (cached)
    ComputeEmbeddings,
    /// Index documents in the vector store
    StoreVectors,
    /// Search and generate the answer
    RetrieveAndGenerate,
    /// Run finished successfully
    Done,
}

impl PipelineStage {
    /// Stage label
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Pending => "Pending",
            PipelineStage::ConsolidatePreContext => "ConsolidatePreContext",
            PipelineStage::LoadData => "LoadData",
            PipelineStage::Preprocess => "Preprocess",
            PipelineStage::ComputeEmbeddings => "ComputeEmbeddings",
            PipelineStage::StoreVectors => "StoreVectors",
            PipelineStage::RetrieveAndGenerate => "RetrieveAndGenerate",
            PipelineStage::Done => "Done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
