//! Request handlers bridging HTTP to the analysis pipeline.

use chrono::Utc;

use crate::analysis::{AccentAnalyzer, AnalysisResult};
use crate::report::render_report;

/// Health check payload.
pub fn health_check() -> serde_json::Value {
    serde_json::json!({
        "status": "healthy",
        "service": "accent-analyzer",
        "version": env!("CARGO_PKG_VERSION"),
    })
}

/// Run one analysis for the API. Mirrors the orchestrator contract:
/// always a result, never an error.
pub async fn analyze(analyzer: &AccentAnalyzer, url: &str) -> AnalysisResult {
    analyzer.analyze(url).await
}

/// Run one analysis and render it as the downloadable text report.
pub async fn analyze_to_report(analyzer: &AccentAnalyzer, url: &str) -> String {
    let result = analyzer.analyze(url).await;
    render_report(&result, url, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_check_payload() {
        let payload = health_check();
        assert_eq!(payload["status"], "healthy");
        assert_eq!(payload["service"], "accent-analyzer");
    }
}
