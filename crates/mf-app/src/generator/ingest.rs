use std::path::{Path, PathBuf};
use tracing::{error, warn};
use uuid::Uuid;
use mf_core::analysis::parse_results;
use mf_core::AnalysisResult;
use crate::error::PipelineError;

pub const RESULTS_FILE: &str = "results.json";

/// `<analysis_dir>/<job_id>/results.json`
pub fn results_path(analysis_dir: &Path, job_id: Uuid) -> PathBuf {
    analysis_dir.join(job_id.to_string()).join(RESULTS_FILE)
}

/// Reads and parses the results artifact the analysis script left behind.
pub async fn ingest_results(path: &Path) -> Result<AnalysisResult, PipelineError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::ResultMissing(path.to_path_buf()));
        }
        Err(e) => return Err(PipelineError::Io(e)),
    };

    let result = parse_results(&raw).map_err(PipelineError::from).inspect_err(|e| {
        if let PipelineError::ResultParse { message, snippet } = e {
            error!(path = %path.display(), "Unparseable results: {message}\n{snippet}");
        }
    })?;

    for e in &result.errors {
        warn!("Analysis reported: {e}");
    }
    Ok(result)
}
