use std::path::PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::error::{Error, Result};
use crate::layout::LayoutInstructions;

pub const DEFAULT_TEMPLATE: &str = "default";

/// Everything the renderer needs to lay out one document.
///
/// Field order is the key order of the config artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub project_id: Uuid,
    pub prompt: String,
    pub text_content: String,
    pub subtitle: String,
    pub images: Vec<PathBuf>,
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rectangle_index: Option<String>,
    pub layout_instructions: LayoutInstructions,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied part of a layout job, before images and instructions are resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobInputs {
    pub prompt: String,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub rectangle_index: Option<String>,
}

impl JobInputs {
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::Validation("prompt is required".to_string()));
        }
        Ok(())
    }

    pub fn template_or_default(&self) -> String {
        match self.template.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl Job {
    pub fn new(
        project_id: Uuid,
        inputs: JobInputs,
        images: Vec<PathBuf>,
        layout_instructions: LayoutInstructions,
    ) -> Self {
        let template = inputs.template_or_default();
        Self {
            project_id,
            prompt: inputs.prompt,
            text_content: inputs.text_content,
            subtitle: inputs.subtitle,
            images,
            template,
            rectangle_index: inputs.rectangle_index,
            layout_instructions,
            created_at: Utc::now(),
        }
    }
}

pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 800;
pub const DEFAULT_THUMBNAIL_HEIGHT: u32 = 600;

/// Config artifact for a template analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub template_path: PathBuf,
    /// Thumbnail directory, always with a trailing separator.
    pub output_dir: String,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub results_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_required() {
        let inputs = JobInputs {
            prompt: "   ".into(),
            ..Default::default()
        };
        assert!(matches!(inputs.validate(), Err(Error::Validation(_))));

        let inputs = JobInputs {
            prompt: "Summer feature".into(),
            ..Default::default()
        };
        assert!(inputs.validate().is_ok());
    }

    #[test]
    fn test_template_defaults() {
        let mut inputs = JobInputs::default();
        assert_eq!(inputs.template_or_default(), "default");
        inputs.template = Some(" ".into());
        assert_eq!(inputs.template_or_default(), "default");
        inputs.template = Some("magazine_a4".into());
        assert_eq!(inputs.template_or_default(), "magazine_a4");
    }

    #[test]
    fn test_config_keys() {
        let job = Job::new(
            Uuid::new_v4(),
            JobInputs {
                prompt: "Summer feature".into(),
                ..Default::default()
            },
            vec![PathBuf::from("/tmp/image_1.png")],
            LayoutInstructions::default(),
        );
        let value = serde_json::to_value(&job).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "project_id",
            "prompt",
            "text_content",
            "subtitle",
            "images",
            "template",
            "layout_instructions",
            "created_at",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert!(!obj.contains_key("rectangle_index"));
        assert_eq!(obj["template"], "default");
    }
}
