use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three independent pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    PdfProcessing,
    Embedding,
    Summarization,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [
        StageKind::PdfProcessing,
        StageKind::Embedding,
        StageKind::Summarization,
    ];

    /// Path segment used by the worker's job-control routes.
    pub fn route_segment(self) -> &'static str {
        match self {
            StageKind::PdfProcessing => "process_pdfs",
            StageKind::Embedding => "embed_chunks",
            StageKind::Summarization => "summarize",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StageKind::PdfProcessing => "Processing",
            StageKind::Embedding => "Embedding",
            StageKind::Summarization => "Summarization",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            StageKind::PdfProcessing => 0,
            StageKind::Embedding => 1,
            StageKind::Summarization => 2,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::PdfProcessing => "pdf-processing",
            StageKind::Embedding => "embedding",
            StageKind::Summarization => "summarization",
        };
        f.write_str(name)
    }
}

/// A started remote job, owned by the poller of its stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    pub stage: StageKind,
    pub job_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPdfsParams {
    pub chunk_size: u32,
    pub overlap: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    pub skip_existing: bool,
}

impl Default for ProcessPdfsParams {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            overlap: 200,
            limit: None,
            skip_existing: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_chunks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persist_dir: Option<String>,
    pub batch_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_api_key: Option<String>,
    pub skip_existing: bool,
}

impl Default for EmbedParams {
    fn default() -> Self {
        Self {
            limit_chunks: None,
            collection: None,
            persist_dir: None,
            batch_size: 16,
            embed_base_url: None,
            embed_model: None,
            embed_api_key: None,
            skip_existing: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    pub chunk_chars: u32,
    pub skip_existing: bool,
    pub dry_run: bool,
}

impl Default for SummarizeParams {
    fn default() -> Self {
        Self {
            limit: None,
            chunk_chars: 4000,
            skip_existing: true,
            dry_run: false,
        }
    }
}

/// Start request body for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartParams {
    PdfProcessing(ProcessPdfsParams),
    Embedding(EmbedParams),
    Summarization(SummarizeParams),
}

impl StartParams {
    pub fn default_for(stage: StageKind) -> Self {
        match stage {
            StageKind::PdfProcessing => StartParams::PdfProcessing(ProcessPdfsParams::default()),
            StageKind::Embedding => StartParams::Embedding(EmbedParams::default()),
            StageKind::Summarization => StartParams::Summarization(SummarizeParams::default()),
        }
    }

    pub fn stage(&self) -> StageKind {
        match self {
            StartParams::PdfProcessing(_) => StageKind::PdfProcessing,
            StartParams::Embedding(_) => StageKind::Embedding,
            StartParams::Summarization(_) => StageKind::Summarization,
        }
    }

    /// The caller-supplied item limit, if it is usable as a target total.
    pub fn explicit_limit(&self) -> Option<u64> {
        let limit = match self {
            StartParams::PdfProcessing(params) => params.limit,
            StartParams::Embedding(params) => params.limit_chunks,
            StartParams::Summarization(params) => params.limit,
        };
        limit.filter(|limit| *limit > 0)
    }

    /// JSON body for `POST /pipeline/<stage>/start`.
    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            StartParams::PdfProcessing(params) => serde_json::to_value(params),
            StartParams::Embedding(params) => serde_json::to_value(params),
            StartParams::Summarization(params) => serde_json::to_value(params),
        };
        // Plain structs of numbers, strings and bools always serialize.
        value.unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_is_not_an_explicit_target() {
        let params = StartParams::Summarization(SummarizeParams {
            limit: Some(0),
            ..SummarizeParams::default()
        });
        assert_eq!(params.explicit_limit(), None);
    }

    #[test]
    fn embed_body_omits_unset_options() {
        let body = StartParams::Embedding(EmbedParams {
            embed_model: Some("nomic-embed-text".to_string()),
            ..EmbedParams::default()
        })
        .to_json();

        assert_eq!(body["embed_model"], "nomic-embed-text");
        assert_eq!(body["batch_size"], 16);
        assert!(body.get("limit_chunks").is_none());
        assert!(body.get("embed_api_key").is_none());
    }
}
