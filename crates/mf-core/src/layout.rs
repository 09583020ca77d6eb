use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use crate::error::Result;

pub const TITLE_FONT_SIZE: (u32, u32) = (12, 48);
pub const BODY_FONT_SIZE: (u32, u32) = (8, 16);
pub const LINE_SPACING: (u32, u32) = (10, 24);
pub const COLUMNS: (u32, u32) = (1, 3);

/// Presentation schema handed to the renderer alongside a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutInstructions {
    pub title_text: String,
    pub title_style: TitleStyle,
    pub text_layout: TextLayout,
    pub image_placement: Vec<ImagePlacement>,
    pub color_scheme: Vec<String>,
    pub typography: Typography,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleStyle {
    pub font_size: u32,
    pub font_family: String,
    pub color: String,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLayout {
    pub columns: u32,
    pub alignment: String,
    pub font_size: u32,
    pub line_spacing: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePlacement {
    #[serde(default, deserialize_with = "lenient_string")]
    pub position: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub width: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub height: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Typography {
    pub heading_font: String,
    pub body_font: String,
}

impl Default for LayoutInstructions {
    fn default() -> Self {
        Self {
            title_text: "Titre de l'article".to_string(),
            title_style: TitleStyle::default(),
            text_layout: TextLayout::default(),
            image_placement: vec![
                ImagePlacement::new("top_right", "40%", "auto"),
                ImagePlacement::new("bottom_left", "60%", "auto"),
            ],
            color_scheme: vec![
                "#000000".to_string(),
                "#333333".to_string(),
                "#666666".to_string(),
            ],
            typography: Typography::default(),
        }
    }
}

impl Default for TitleStyle {
    fn default() -> Self {
        Self {
            font_size: 24,
            font_family: "Arial Bold".to_string(),
            color: "#000000".to_string(),
            position: "top_center".to_string(),
        }
    }
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            columns: 2,
            alignment: "justified".to_string(),
            font_size: 11,
            line_spacing: 14,
        }
    }
}

impl Default for Typography {
    fn default() -> Self {
        Self {
            heading_font: "Arial Bold".to_string(),
            body_font: "Arial Regular".to_string(),
        }
    }
}

impl ImagePlacement {
    pub fn new(position: &str, width: &str, height: &str) -> Self {
        Self {
            position: position.to_string(),
            width: width.to_string(),
            height: height.to_string(),
        }
    }
}

impl LayoutInstructions {
    /// True when every numeric field sits inside its allowed range.
    pub fn is_within_bounds(&self) -> bool {
        let within = |v: u32, (lo, hi): (u32, u32)| (lo..=hi).contains(&v);
        within(self.title_style.font_size, TITLE_FONT_SIZE)
            && within(self.text_layout.font_size, BODY_FONT_SIZE)
            && within(self.text_layout.line_spacing, LINE_SPACING)
            && within(self.text_layout.columns, COLUMNS)
    }
}

/// Numbers like `40` are accepted where a CSS-ish string such as `"40%"` is expected.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string, got {other}"))),
    }
}

/// The four range-checked fields. They are validated as one unit: if any of them
/// cannot be read as an integer, all four fall back to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NumericFields {
    title_font_size: i64,
    body_font_size: i64,
    line_spacing: i64,
    columns: i64,
}

impl Default for NumericFields {
    fn default() -> Self {
        let title = TitleStyle::default();
        let text = TextLayout::default();
        Self {
            title_font_size: title.font_size.into(),
            body_font_size: text.font_size.into(),
            line_spacing: text.line_spacing.into(),
            columns: text.columns.into(),
        }
    }
}

impl NumericFields {
    /// A section that is absent or not an object contributes its default values;
    /// a section that is present but lacks a field is a failure.
    fn coerce(map: &Map<String, Value>) -> Option<Self> {
        let defaults = Self::default();
        let title = map.get("title_style").filter(|v| v.is_object());
        let text = map.get("text_layout").filter(|v| v.is_object());

        let title_font_size = match title {
            Some(t) => coerce_int(t.get("font_size")?)?,
            None => defaults.title_font_size,
        };
        let (body_font_size, line_spacing, columns) = match text {
            Some(t) => (
                coerce_int(t.get("font_size")?)?,
                coerce_int(t.get("line_spacing")?)?,
                coerce_int(t.get("columns")?)?,
            ),
            None => (defaults.body_font_size, defaults.line_spacing, defaults.columns),
        };

        Some(Self {
            title_font_size,
            body_font_size,
            line_spacing,
            columns,
        })
    }

    fn apply(self, out: &mut LayoutInstructions) {
        out.title_style.font_size = clamp(self.title_font_size, TITLE_FONT_SIZE);
        out.text_layout.font_size = clamp(self.body_font_size, BODY_FONT_SIZE);
        out.text_layout.line_spacing = clamp(self.line_spacing, LINE_SPACING);
        out.text_layout.columns = clamp(self.columns, COLUMNS);
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn clamp(value: i64, (lo, hi): (u32, u32)) -> u32 {
    value.clamp(lo.into(), hi.into()) as u32
}

fn section<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    map.remove(key).and_then(|v| serde_json::from_value(v).ok())
}

fn strip_keys(map: &mut Map<String, Value>, section: &str, keys: &[&str]) {
    if let Some(Value::Object(obj)) = map.get_mut(section) {
        for key in keys {
            obj.remove(*key);
        }
    }
}

/// Turns arbitrary, possibly malformed assistant output into complete,
/// range-safe instructions. Never fails.
pub fn repair(raw: Value) -> LayoutInstructions {
    let Value::Object(mut map) = raw else {
        return LayoutInstructions::default();
    };

    let numbers = NumericFields::coerce(&map).unwrap_or_default();

    strip_keys(&mut map, "title_style", &["font_size"]);
    strip_keys(&mut map, "text_layout", &["font_size", "line_spacing", "columns"]);

    let defaults = LayoutInstructions::default();
    let mut out = LayoutInstructions {
        title_text: section(&mut map, "title_text").unwrap_or(defaults.title_text),
        title_style: section(&mut map, "title_style").unwrap_or(defaults.title_style),
        text_layout: section(&mut map, "text_layout").unwrap_or(defaults.text_layout),
        image_placement: section(&mut map, "image_placement").unwrap_or(defaults.image_placement),
        color_scheme: section(&mut map, "color_scheme").unwrap_or(defaults.color_scheme),
        typography: section(&mut map, "typography").unwrap_or(defaults.typography),
    };
    numbers.apply(&mut out);
    out
}

/// Removes a Markdown code fence (optionally tagged `json`) around a response.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Fence-strips, parses and repairs an assistant reply.
pub fn parse_assistant_reply(text: &str) -> Result<LayoutInstructions> {
    let raw: Value = serde_json::from_str(strip_code_fences(text))?;
    Ok(repair(raw))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const KEYS: [&str; 6] = [
        "title_text",
        "title_style",
        "text_layout",
        "image_placement",
        "color_scheme",
        "typography",
    ];

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            any::<u64>().prop_map(Value::from),
            // non-finite floats become null
            any::<f64>().prop_map(Value::from),
            (-100i64..200).prop_map(|n| Value::String(format!(" {n} "))),
            "[a-zA-Z0-9 %#._-]{0,12}".prop_map(Value::String),
        ]
    }

    fn json_value() -> impl Strategy<Value = Value> {
        json_leaf().prop_recursive(3, 32, 5, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,10}", inner, 0..5)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// Objects shaped like `title_style` / `text_layout`, with arbitrary field values.
    fn style_section() -> impl Strategy<Value = Value> {
        let field = prop::sample::select(vec![
            "font_size",
            "line_spacing",
            "columns",
            "alignment",
            "font_family",
            "position",
        ]);
        prop::collection::btree_map(field.prop_map(String::from), json_value(), 0..6)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    fn layout_like() -> impl Strategy<Value = Value> {
        let key = prop::sample::select(KEYS.iter().copied().chain(["unexpected"]).collect::<Vec<_>>());
        let value = prop_oneof![json_value(), style_section()];
        prop::collection::btree_map(key.prop_map(String::from), value, 0..7)
            .prop_map(|m| Value::Object(m.into_iter().collect()))
    }

    fn any_input() -> impl Strategy<Value = Value> {
        prop_oneof![json_value(), layout_like()]
    }

    proptest! {
        #[test]
        fn test_repair_is_always_within_bounds(raw in any_input()) {
            let repaired = repair(raw);
            prop_assert!(repaired.is_within_bounds(), "out of bounds: {repaired:?}");
        }

        #[test]
        fn test_repair_emits_every_key(raw in any_input()) {
            let out = serde_json::to_value(repair(raw)).unwrap();
            let obj = out.as_object().unwrap();
            prop_assert_eq!(obj.len(), KEYS.len());
            for key in KEYS {
                prop_assert!(obj.contains_key(key), "missing {}", key);
            }
            prop_assert!(obj["title_style"]["font_size"].is_u64());
            for field in ["columns", "font_size", "line_spacing"] {
                prop_assert!(obj["text_layout"][field].is_u64(), "missing text_layout.{}", field);
            }
        }

        #[test]
        fn test_repair_is_idempotent(raw in any_input()) {
            let once = repair(raw);
            let twice = repair(serde_json::to_value(&once).unwrap());
            prop_assert_eq!(once, twice);
        }
    }
}
