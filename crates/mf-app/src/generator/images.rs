use std::collections::HashSet;
use std::path::{Path, PathBuf};
use futures::stream::{self, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::{debug, info, warn};
use mf_core::image_kind::sanitize_filename;
use mf_core::{ImageExt, ImageRef};
use crate::generator::config::DownloadConfig;

/// An image blob as received from the caller.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Error, Debug)]
enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("not a supported image type")]
    Unclassified,

    #[error("failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns uploads and remote URLs into validated files inside a job directory.
///
/// Individual failures are logged and skipped; neither method fails the batch.
pub struct ImageAcquirer {
    client: Client,
    concurrency: usize,
}

impl ImageAcquirer {
    pub fn new(config: &DownloadConfig) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            concurrency: config.concurrency.max(1),
        })
    }

    /// Writes whitelisted uploads into `dir` under their sanitized names.
    pub async fn store_uploads(&self, dir: &Path, uploads: Vec<UploadedFile>) -> Vec<ImageRef> {
        let mut taken = HashSet::new();
        let mut stored = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let name = sanitize_filename(&upload.filename);
            let Some(ext) = ImageExt::from_filename(&name) else {
                debug!(filename = %upload.filename, "Skipping upload with unsupported type");
                continue;
            };

            let name = unique_name(&name, &mut taken);
            let path = dir.join(&name);
            match tokio::fs::write(&path, &upload.bytes).await {
                Ok(()) => stored.push(ImageRef {
                    path: absolute(path),
                    ext,
                }),
                Err(e) => warn!("Failed to store upload {name}: {e}"),
            }
        }

        info!("Stored {} uploaded image(s)", stored.len());
        stored
    }

    /// Downloads each URL into `dir` as `image_<n>.<ext>`, `n` being its 1-based position.
    ///
    /// Up to `concurrency` downloads run at once. Results keep input order.
    pub async fn download(&self, dir: &Path, urls: &[String]) -> Vec<ImageRef> {
        let results: Vec<Option<ImageRef>> = stream::iter(urls.iter().enumerate())
            .map(|(i, url)| async move {
                match self.fetch(dir, i + 1, url).await {
                    Ok(image) => Some(image),
                    Err(e) => {
                        warn!(%url, "Dropping image: {e}");
                        None
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let images: Vec<ImageRef> = results.into_iter().flatten().collect();
        info!("Downloaded {} of {} image(s)", images.len(), urls.len());
        images
    }

    async fn fetch(&self, dir: &Path, ordinal: usize, url: &str) -> Result<ImageRef, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;

        let ext = classify(content_type.as_deref(), &parsed, &bytes).ok_or(FetchError::Unclassified)?;
        let path = dir.join(format!("image_{ordinal}.{ext}"));
        tokio::fs::write(&path, &bytes).await?;

        debug!(%url, path = %path.display(), "Downloaded image");
        Ok(ImageRef {
            path: absolute(path),
            ext,
        })
    }
}

/// Content type first, then the URL suffix, then the bytes themselves.
fn classify(content_type: Option<&str>, url: &Url, bytes: &[u8]) -> Option<ImageExt> {
    content_type
        .and_then(ImageExt::from_content_type)
        .or_else(|| ImageExt::url_suffix(url.path()).and_then(|s| ImageExt::from_extension(&s)))
        .or_else(|| ImageExt::from_signature(bytes))
}

fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
    let mut n = 2;
    loop {
        let candidate = format!("{stem}_{n}.{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

/// Merges the list, comma-separated and repeated forms of `image_urls`.
///
/// Repeated values may themselves be comma-separated. Entries are trimmed,
/// blanks dropped and duplicates removed keeping the first.
pub fn resolve_image_urls(list: &[String], csv: Option<&str>, repeated: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    list.iter()
        .map(String::as_str)
        .chain(csv.into_iter().flat_map(|s| s.split(',')))
        .chain(repeated.iter().flat_map(|s| s.split(',')))
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .filter(|url| seen.insert(url.to_string()))
        .map(str::to_string)
        .collect()
}
