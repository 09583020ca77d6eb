use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use mf_core::{JobInputs, TemplateMetadata, ThumbnailInfo};
use crate::generator::images::resolve_image_urls;

/// `image_urls` arrives either as a JSON list or as one comma-separated string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ImageUrlsField {
    List(Vec<String>),
    Csv(String),
}

/// Body of a layout job request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LayoutRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub rectangle_index: Option<String>,
    #[serde(default)]
    pub image_urls: Option<ImageUrlsField>,
}

impl LayoutRequest {
    pub fn inputs(&self) -> JobInputs {
        JobInputs {
            prompt: self.prompt.clone(),
            text_content: self.text_content.clone(),
            subtitle: self.subtitle.clone(),
            template: self.template.clone(),
            rectangle_index: self.rectangle_index.clone(),
        }
    }

    /// All URLs from the body plus any repeated form values.
    pub fn image_urls(&self, repeated: &[String]) -> Vec<String> {
        match &self.image_urls {
            Some(ImageUrlsField::List(list)) => resolve_image_urls(list, None, repeated),
            Some(ImageUrlsField::Csv(csv)) => resolve_image_urls(&[], Some(csv), repeated),
            None => resolve_image_urls(&[], None, repeated),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutCreated {
    pub success: bool,
    pub project_id: Uuid,
    pub message: String,
    pub output_file: PathBuf,
    pub images: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub success: bool,
    pub job_id: Uuid,
    pub template: TemplateMetadata,
    pub thumbnail: Option<ThumbnailInfo>,
    pub errors: Vec<String>,
}

/// An uploaded template after analysis, with its display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateInfo {
    pub name: String,
    #[serde(flatten)]
    pub metadata: TemplateMetadata,
    pub thumbnail: Option<ThumbnailInfo>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct TemplateSummary {
    pub name: String,
    pub filename: String,
}
