use std::path::PathBuf;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use crate::renderer::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Client,
    NotFound,
    Server,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("Unsupported template type: {0}")]
    UnsupportedTemplate(String),

    #[error("No images could be downloaded from the given URLs")]
    NoImagesDownloaded,

    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("Output not found for job {0}")]
    OutputNotFound(String),

    #[error("Thumbnail not found: {0}")]
    ThumbnailNotFound(String),

    #[error("Script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Analysis results not found: {}", .0.display())]
    ResultMissing(PathBuf),

    #[error("Invalid JSON from renderer: {message}")]
    ResultParse { message: String, snippet: String },

    #[error("Template analysis failed")]
    AnalysisFailed { errors: Vec<String> },

    /// A failure after an uploaded template was already saved.
    #[error("{source}")]
    StoredTemplate {
        template_path: PathBuf,
        source: Box<PipelineError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Serializable failure body handed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) | Self::UnsupportedTemplate(_) | Self::NoImagesDownloaded => {
                ErrorClass::Client
            }
            Self::TemplateNotFound(_) | Self::OutputNotFound(_) | Self::ThumbnailNotFound(_) => {
                ErrorClass::NotFound
            }
            Self::StoredTemplate { source, .. } => source.class(),
            _ => ErrorClass::Server,
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            success: false,
            error: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            Self::Render(e) => Some(match e {
                RenderError::NonZeroExit { code, stderr } => {
                    json!({"kind": e.kind(), "exit_code": code, "stderr": stderr})
                }
                _ => json!({"kind": e.kind()}),
            }),
            Self::ResultParse { snippet, .. } if !snippet.is_empty() => {
                Some(json!({"snippet": snippet}))
            }
            Self::AnalysisFailed { errors } => Some(json!({"errors": errors})),
            Self::StoredTemplate {
                template_path,
                source,
            } => {
                let mut details = match source.details() {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                details.insert(
                    "template_path".into(),
                    Value::String(template_path.to_string_lossy().into_owned()),
                );
                Some(Value::Object(details))
            }
            _ => None,
        }
    }
}

impl From<mf_core::error::Error> for PipelineError {
    fn from(e: mf_core::error::Error) -> Self {
        use mf_core::error::Error;
        match e {
            Error::ResultParse { message, snippet } => Self::ResultParse { message, snippet },
            Error::AnalysisFailed { errors } => Self::AnalysisFailed { errors },
            Error::Validation(msg) => Self::Validation(msg),
            other @ (Error::MissingTemplate | Error::Json(_)) => Self::ResultParse {
                message: other.to_string(),
                snippet: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classes() {
        assert_eq!(PipelineError::Validation("prompt is required".into()).class(), ErrorClass::Client);
        assert_eq!(PipelineError::NoImagesDownloaded.class(), ErrorClass::Client);
        assert_eq!(
            PipelineError::TemplateNotFound("/t/x.indt".into()).class(),
            ErrorClass::NotFound
        );
        assert_eq!(
            PipelineError::Render(RenderError::Timeout(Duration::from_secs(300))).class(),
            ErrorClass::Server
        );
        assert_eq!(PipelineError::ResultMissing("/a".into()).class(), ErrorClass::Server);
    }

    #[test]
    fn test_distinct_render_reasons() {
        let reasons: Vec<String> = [
            RenderError::Timeout(Duration::from_secs(300)),
            RenderError::NonZeroExit {
                code: Some(1),
                stderr: "boom".into(),
            },
            RenderError::Exception("No such file".into()),
        ]
        .into_iter()
        .map(|e| PipelineError::from(e).payload().error)
        .collect();
        assert_ne!(reasons[0], reasons[1]);
        assert_ne!(reasons[1], reasons[2]);
        assert_ne!(reasons[0], reasons[2]);
    }

    #[test]
    fn test_payload_shape() {
        let payload = PipelineError::AnalysisFailed {
            errors: vec!["No document open".into()],
        }
        .payload();
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["details"]["errors"][0], "No document open");

        let value = serde_json::to_value(PipelineError::NoImagesDownloaded.payload()).unwrap();
        assert!(value.get("details").is_none());

        let payload = PipelineError::from(RenderError::NonZeroExit {
            code: Some(2),
            stderr: "execution error".into(),
        })
        .payload();
        let details = payload.details.unwrap();
        assert_eq!(details["kind"], "non_zero_exit");
        assert_eq!(details["exit_code"], 2);
    }

    #[test]
    fn test_stored_template_keeps_cause() {
        let e = PipelineError::StoredTemplate {
            template_path: "/templates/summer.indt".into(),
            source: Box::new(PipelineError::AnalysisFailed {
                errors: vec!["No document open".into()],
            }),
        };
        assert_eq!(e.class(), ErrorClass::Server);
        let payload = e.payload();
        assert_eq!(payload.error, "Template analysis failed");
        let details = payload.details.unwrap();
        assert_eq!(details["template_path"], "/templates/summer.indt");
        assert_eq!(details["errors"][0], "No document open");

        let e = PipelineError::StoredTemplate {
            template_path: "/templates/gone.indt".into(),
            source: Box::new(PipelineError::TemplateNotFound("/templates/gone.indt".into())),
        };
        assert_eq!(e.class(), ErrorClass::NotFound);
        assert_eq!(e.payload().details.unwrap(), json!({"template_path": "/templates/gone.indt"}));
    }

    #[test]
    fn test_from_core_errors() {
        let e = PipelineError::from(mf_core::error::Error::MissingTemplate);
        assert!(matches!(e, PipelineError::ResultParse { .. }));
        assert_eq!(e.class(), ErrorClass::Server);
    }
}
