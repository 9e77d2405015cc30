//! Decoded worker responses.
use serde::{Deserialize, Serialize};

/// Body of `GET /pipeline/<stage>/status`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JobStatus {
    pub running: bool,
    #[serde(default)]
    pub returncode: Option<i64>,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub stats: serde_json::Value,
    #[serde(default)]
    pub last_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MissingPdf {
    pub paper_id: i64,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedEstimate {
    #[serde(default)]
    pub persist_dir: String,
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub embedded_count: u64,
}

/// Body of `GET /pipeline/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineStats {
    pub pdf_count: u64,
    pub papers_with_pdf: u64,
    pub papers_with_chunks: u64,
    pub missing_papers: u64,
    pub missing_pdfs: u64,
    pub sample_missing: Vec<MissingPdf>,
    pub summary_rows: u64,
    pub papers_with_summary: u64,
    pub missing_summary: u64,
    pub chunks_total: Option<u64>,
    pub embed_estimate: Option<EmbedEstimate>,
}

/// Body of `POST /pipeline/dedupe_attachments`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DedupeOutcome {
    pub status: String,
    #[serde(default)]
    pub result: serde_json::Value,
}
