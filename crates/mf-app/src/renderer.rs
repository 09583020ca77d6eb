pub mod osascript;

use std::path::PathBuf;
use std::time::Duration;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// One dispatch of a script against a config artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub job_id: Uuid,
    pub script: PathBuf,
    pub config: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderErrorKind {
    Timeout,
    NonZeroExit,
    Exception,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("Renderer timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("Renderer script error: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Renderer invocation failed: {0}")]
    Exception(String),
}

impl RenderError {
    pub fn kind(&self) -> RenderErrorKind {
        match self {
            Self::Timeout(_) => RenderErrorKind::Timeout,
            Self::NonZeroExit { .. } => RenderErrorKind::NonZeroExit,
            Self::Exception(_) => RenderErrorKind::Exception,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Success { output: PathBuf },
    Failure(RenderError),
}

impl RenderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn into_result(self) -> Result<PathBuf, RenderError> {
        match self {
            Self::Success { output } => Ok(output),
            Self::Failure(e) => Err(e),
        }
    }
}

/// The external application that turns config artifacts into documents.
///
/// Implementations run the request at most once and never retry.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn invoke(&self, request: RenderRequest) -> RenderOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_and_messages() {
        let timeout = RenderError::Timeout(Duration::from_secs(300));
        assert_eq!(timeout.kind(), RenderErrorKind::Timeout);
        assert_eq!(timeout.to_string(), "Renderer timed out after 300s");

        let exit = RenderError::NonZeroExit {
            code: Some(1),
            stderr: "execution error".into(),
        };
        assert_eq!(exit.kind(), RenderErrorKind::NonZeroExit);
        assert!(exit.to_string().contains("execution error"));

        assert_eq!(
            serde_json::to_string(&RenderErrorKind::NonZeroExit).unwrap(),
            "\"non_zero_exit\""
        );
    }

    #[test]
    fn test_outcome_into_result() {
        let ok = RenderOutcome::Success {
            output: PathBuf::from("output/x.indd"),
        };
        assert!(ok.is_success());
        assert_eq!(ok.into_result().unwrap(), PathBuf::from("output/x.indd"));

        let failed = RenderOutcome::Failure(RenderError::Exception("boom".into()));
        assert!(!failed.is_success());
        assert!(failed.into_result().is_err());
    }
}
