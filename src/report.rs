use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analysis::AnalysisResult;

/// Render an analysis as the plain-text report.
///
/// Section order is fixed: header (timestamp, URL), RESULTS, accent
/// score table, TRANSCRIPT, SUMMARY.
pub fn render_report(result: &AnalysisResult, url: &str, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();

    writeln!(out, "ACCENT ANALYSIS REPORT").unwrap();
    writeln!(out, "======================").unwrap();
    writeln!(
        out,
        "Generated: {}",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )
    .unwrap();
    writeln!(out, "Video URL: {}", url).unwrap();
    writeln!(out).unwrap();

    writeln!(out, "RESULTS").unwrap();
    writeln!(out, "-------").unwrap();
    writeln!(out, "Accent:              {}", result.accent).unwrap();
    writeln!(out, "Confidence:          {:.2}%", result.confidence).unwrap();
    writeln!(out, "Language:            {}", result.language).unwrap();
    writeln!(out, "Language confidence: {:.2}%", result.language_score).unwrap();
    writeln!(out).unwrap();

    writeln!(out, "ACCENT SCORES").unwrap();
    writeln!(out, "-------------").unwrap();
    if result.all_scores.is_empty() {
        writeln!(out, "(not available)").unwrap();
    } else {
        for (label, score) in &result.all_scores {
            writeln!(out, "{:<12} {:>6.2}%", label, score).unwrap();
        }
    }
    writeln!(out).unwrap();

    writeln!(out, "TRANSCRIPT").unwrap();
    writeln!(out, "----------").unwrap();
    writeln!(out, "{}", result.transcript).unwrap();
    writeln!(out).unwrap();

    writeln!(out, "SUMMARY").unwrap();
    writeln!(out, "-------").unwrap();
    writeln!(out, "{}", result.summary).unwrap();

    out
}

/// Write the report into `output_dir`, named by timestamp.
pub async fn save_report(
    result: &AnalysisResult,
    url: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    let generated_at = Utc::now();
    let content = render_report(result, url, generated_at);

    tokio::fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(format!(
        "accent_report_{}.txt",
        generated_at.format("%Y%m%d_%H%M%S")
    ));
    tokio::fs::write(&path, content).await?;

    info!("💾 Report saved: {}", path.display());
    Ok(path)
}
