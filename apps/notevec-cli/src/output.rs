//! Human and JSON renderings of build, search and status results.

use std::fmt::Write as _;

use chrono::Local;
use serde_json::{json, Value};

use notevec_core::Scope;
use notevec_index::{BuildOutcome, BuildReport, SearchOutcome, StatusReport};

pub fn format_build(report: &BuildReport) -> String {
    let summary = format!(
        "Index updated: {} chunks from {} files. ({} files re-embedded)",
        report.chunks_total, report.files_scanned, report.files_reembedded
    );
    match report.outcome {
        BuildOutcome::NothingToDo => "No files found to index.".to_string(),
        BuildOutcome::UpToDate => format!("All files up to date, nothing to embed.\n{summary}"),
        BuildOutcome::Updated => format!(
            "Embedded {} chunks from {} files in {} batches.\n{summary}",
            report.chunks_written, report.files_reembedded, report.batches
        ),
    }
}

pub fn format_search(outcome: &SearchOutcome, scope: &Scope, preview_chars: usize) -> String {
    match outcome {
        SearchOutcome::NoIndex => "Index is empty. Run 'index' first.".to_string(),
        SearchOutcome::Unreadable(reason) => format!("Index is unreadable ({reason}). Run 'index' to rebuild it."),
        SearchOutcome::EmptyScope => format!("No indexed entries in scope '{scope}'."),
        SearchOutcome::Ranked(hits) if hits.is_empty() => "No results above threshold.".to_string(),
        SearchOutcome::Ranked(hits) => {
            let mut out = String::new();
            for (i, hit) in hits.iter().enumerate() {
                let _ = writeln!(out, "\n--- Result {} (score: {:.4}) ---", i + 1, hit.score);
                let _ = writeln!(out, "File: {}", hit.file);
                let _ = writeln!(out, "{}", hit.preview(preview_chars));
            }
            out.trim().to_string()
        }
    }
}

pub fn search_json(query: &str, scope: &Scope, outcome: &SearchOutcome) -> Value {
    let (state, results) = match outcome {
        SearchOutcome::NoIndex => ("no_index", Vec::new()),
        SearchOutcome::Unreadable(_) => ("unreadable", Vec::new()),
        SearchOutcome::EmptyScope => ("empty_scope", Vec::new()),
        SearchOutcome::Ranked(hits) => (
            "ranked",
            hits.iter()
                .enumerate()
                .map(|(i, h)| {
                    json!({
                        "rank": i + 1,
                        "score": h.score,
                        "file": h.file,
                        "chunk_index": h.chunk_index,
                        "text": h.text,
                    })
                })
                .collect(),
        ),
    };
    json!({ "query": query, "scope": scope.name(), "state": state, "results": results })
}

pub fn format_status(report: &StatusReport) -> String {
    let st = match report {
        StatusReport::NoIndex => return "No index found. Run 'index' to build one.".to_string(),
        StatusReport::Present(st) => st,
    };
    let last = st
        .last_built_at
        .map_or_else(|| "never".to_string(), |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string());
    let or_unknown = |s: String| if s.is_empty() || s == "0" { "unknown".to_string() } else { s };

    let mut out = String::new();
    if st.recovered_from_corruption {
        let _ = writeln!(out, "Warning: {} is unreadable; the next index run rebuilds it.", st.path.display());
    }
    let _ = writeln!(out, "Model: {}", or_unknown(st.model.clone()));
    let _ = writeln!(out, "Dimensions: {}", or_unknown(st.dimensions.to_string()));
    let _ = writeln!(out, "Last indexed: {last}");
    let _ = writeln!(out, "Total chunks: {}", st.chunk_count);
    let _ = writeln!(out, "Total files: {}", st.file_count);
    for (scope, count) in &st.per_scope_counts {
        let _ = writeln!(out, "  {} chunks: {count}", capitalize(scope));
    }
    let _ = write!(out, "Index size: {:.2} MB", st.size_mb());
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| first.to_uppercase().chain(chars).collect())
}
