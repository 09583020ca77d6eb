use std::fmt;
use std::path::PathBuf;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Image file types the renderer knows how to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageExt {
    Png,
    Jpg,
    Jpeg,
    Gif,
    Tiff,
    Psd,
}

impl ImageExt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
            Self::Psd => "psd",
        }
    }

    pub fn all() -> [ImageExt; 6] {
        [Self::Png, Self::Jpg, Self::Jpeg, Self::Gif, Self::Tiff, Self::Psd]
    }

    /// Case-insensitive lookup against the whitelist.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::all().into_iter().find(|e| e.as_str() == ext)
    }

    /// Extension of a filename, if it is whitelisted. `"photo"` and `".png"` have none.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (stem, ext) = filename.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Self::from_extension(ext)
    }

    /// Maps a response `Content-Type` to an extension. Media-type parameters are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match media_type.as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/tiff" | "image/x-tiff" => Some(Self::Tiff),
            "image/vnd.adobe.photoshop" => Some(Self::Psd),
            _ => None,
        }
    }

    /// Suffix of the last segment of a URL path, whitelisted or not.
    pub fn url_suffix(path: &str) -> Option<String> {
        let segment = path.rsplit('/').next().unwrap_or_default();
        let (_, ext) = segment.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Classifies raw bytes by their image signature.
    pub fn from_signature(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpg),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }
}

impl fmt::Display for ImageExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated image written to local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub path: PathBuf,
    pub ext: ImageExt,
}

/// Reduces a client-supplied filename to a safe, flat ASCII name.
///
/// Returns an empty string when nothing usable is left.
pub fn sanitize_filename(filename: &str) -> String {
    // decompose first so accented letters keep their base character
    let ascii: String = filename
        .nfkd()
        .filter(|c| c.is_ascii())
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}
