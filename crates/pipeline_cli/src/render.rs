//! Plain-text lines for the terminal.
use std::fmt::Write;

use pipeline_core::{
    CompletionNotice, DedupeOutcome, JobHandle, Outcome, PipelineStats, ProgressSnapshot,
    StageKind,
};

pub fn started_line(handle: &JobHandle) -> String {
    format!("[{}] started job {}", handle.stage, handle.job_id)
}

pub fn progress_line(stage: StageKind, snapshot: &ProgressSnapshot, percent: u8) -> String {
    let total = snapshot
        .total
        .map_or_else(|| "?".to_string(), |total| total.to_string());
    let mut line = format!("[{stage}] {percent:>3}% {}/{total}", snapshot.processed);
    if snapshot.skipped > 0 {
        let _ = write!(line, ", {} skipped", snapshot.skipped);
    }
    if snapshot.errors > 0 {
        let _ = write!(line, ", {} errors", snapshot.errors);
    }
    line
}

pub fn completion_line(notice: &CompletionNotice) -> String {
    let processed = notice.final_progress.processed;
    match notice.outcome {
        Outcome::Succeeded => format!("[{}] done, {processed} processed", notice.stage),
        Outcome::Failed => format!(
            "[{}] {}",
            notice.stage,
            notice.error.as_deref().unwrap_or("failed")
        ),
        Outcome::Stopped => format!("[{}] stopped after {processed} processed", notice.stage),
    }
}

pub fn stats_lines(stats: &PipelineStats) -> Vec<String> {
    let row = |label: &str, value: String| format!("{label:<24}{value}");
    let mut lines = vec![
        row("PDFs on disk:", stats.pdf_count.to_string()),
        row("Papers with PDF:", stats.papers_with_pdf.to_string()),
        row("Papers with chunks:", stats.papers_with_chunks.to_string()),
        row("Papers without chunks:", stats.missing_papers.to_string()),
        row("PDFs not chunked:", stats.missing_pdfs.to_string()),
        row("Summaries:", stats.summary_rows.to_string()),
        row("Papers with summary:", stats.papers_with_summary.to_string()),
        row("Papers missing summary:", stats.missing_summary.to_string()),
    ];
    if let Some(chunks) = stats.chunks_total {
        lines.push(row("Chunks:", chunks.to_string()));
    }
    if let Some(estimate) = &stats.embed_estimate {
        lines.push(row(
            "Embedded chunks:",
            format!(
                "{} ({}/{})",
                estimate.embedded_count, estimate.persist_dir, estimate.collection
            ),
        ));
    }
    for missing in &stats.sample_missing {
        lines.push(format!("  unchunked: paper {} at {}", missing.paper_id, missing.path));
    }
    lines
}

pub fn dedupe_line(outcome: &DedupeOutcome) -> String {
    if outcome.result.is_null() {
        return format!("dedupe {}", outcome.status);
    }
    format!("dedupe {}: {}", outcome.status, outcome.result)
}
