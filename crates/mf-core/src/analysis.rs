use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::error::{Error, Result};

const SNIPPET_RADIUS: usize = 50;

/// Metadata the renderer extracts from a template document.
///
/// Unknown keys are carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub placeholders: Vec<String>,
    #[serde(default)]
    pub image_slots: u32,
    #[serde(default)]
    pub fonts: Vec<Value>,
    #[serde(default)]
    pub colors: Vec<Value>,
    #[serde(default = "default_page_count")]
    pub page_count: u32,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_page_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub template: TemplateMetadata,
    pub thumbnail: Option<ThumbnailInfo>,
    /// Non-fatal problems, e.g. a failed thumbnail export.
    pub errors: Vec<String>,
}

/// The renderer writes font names such as `"Playfair Display<TAB>Bold"` without
/// escaping the tab, which is not valid JSON.
pub fn repair_results_text(raw: &str) -> String {
    raw.replace('\t', " ")
}

/// Parses a results artifact after the tab repair pass.
pub fn parse_results(raw: &str) -> Result<AnalysisResult> {
    let cleaned = repair_results_text(raw);

    let value: Value = serde_json::from_str(&cleaned).map_err(|e| Error::ResultParse {
        message: e.to_string(),
        snippet: snippet_around(&cleaned, e.line(), e.column()).to_string(),
    })?;

    let errors = value.get("errors").map(error_list).unwrap_or_default();

    if !value.get("success").and_then(Value::as_bool).unwrap_or(false) {
        return Err(Error::AnalysisFailed { errors });
    }

    let template = match value.get("template") {
        Some(t @ Value::Object(_)) => serde_json::from_value(t.clone())?,
        _ => return Err(Error::MissingTemplate),
    };

    let thumbnail = match value.get("thumbnail") {
        None | Some(Value::Null) => None,
        Some(t) => Some(serde_json::from_value(t.clone())?),
    };

    Ok(AnalysisResult {
        template,
        thumbnail,
        errors,
    })
}

fn error_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::Null => Vec::new(),
        Value::String(s) => vec![s.clone()],
        other => vec![other.to_string()],
    }
}

/// Up to `SNIPPET_RADIUS` bytes either side of a 1-based line/column position.
fn snippet_around(text: &str, line: usize, column: usize) -> &str {
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let offset = (line_start + column.saturating_sub(1)).min(text.len());

    let mut start = offset.saturating_sub(SNIPPET_RADIUS);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (offset + SNIPPET_RADIUS).min(text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }
    &text[start..end]
}
