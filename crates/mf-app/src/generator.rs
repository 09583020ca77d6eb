pub mod assistant;
pub mod config;
pub mod images;
pub mod ingest;
pub mod job_config;
pub mod schemas;

use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use mf_core::image_kind::sanitize_filename;
use mf_core::job::{DEFAULT_THUMBNAIL_HEIGHT, DEFAULT_THUMBNAIL_WIDTH};
use mf_core::{AnalysisConfig, ImageRef, Job, JobInputs};
use crate::error::PipelineError;
use crate::generator::assistant::LayoutSynthesizer;
use crate::generator::config::AppConfig;
use crate::generator::images::{ImageAcquirer, UploadedFile};
use crate::generator::ingest::{ingest_results, results_path};
use crate::generator::job_config::{config_path, write_job_config};
use crate::generator::schemas::{AnalysisReport, LayoutCreated, TemplateInfo, TemplateSummary};
use crate::renderer::osascript::OsaScriptRenderer;
use crate::renderer::{RenderRequest, Renderer};
use crate::worker::RenderQueue;

const TEMPLATE_EXTENSIONS: [&str; 2] = ["indt", "indd"];

#[derive(Debug, Clone, Default)]
pub struct AnalyzeRequest {
    pub template_path: PathBuf,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
}

/// Runs layout and template-analysis jobs end to end.
pub struct Generator {
    config: AppConfig,
    images: ImageAcquirer,
    assistant: LayoutSynthesizer,
    queue: RenderQueue,
}

impl Generator {
    /// Must be called from within a tokio runtime.
    pub fn new(config: AppConfig) -> Result<Self, PipelineError> {
        let renderer = Arc::new(OsaScriptRenderer::new(config.renderer.clone()));
        Self::with_renderer(config, renderer)
    }

    pub fn with_renderer(
        config: AppConfig,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            images: ImageAcquirer::new(&config.download)?,
            assistant: LayoutSynthesizer::new(config.assistant.clone())?,
            queue: RenderQueue::new(renderer),
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Layout job from uploaded blobs. Zero usable images is allowed.
    pub async fn create_layout(
        &self,
        inputs: JobInputs,
        uploads: Vec<UploadedFile>,
    ) -> Result<LayoutCreated, PipelineError> {
        inputs.validate()?;
        let job_id = Uuid::new_v4();
        info!(%job_id, "Layout job from {} upload(s)", uploads.len());

        let job_dir = self.job_dir(job_id).await?;
        let images = self.images.store_uploads(&job_dir, uploads).await;
        self.dispatch_layout(job_id, inputs, images).await
    }

    /// Layout job from remote images. Fails before anything is dispatched
    /// when no URL is given or none of them yields an image.
    pub async fn create_layout_from_urls(
        &self,
        inputs: JobInputs,
        urls: Vec<String>,
    ) -> Result<LayoutCreated, PipelineError> {
        inputs.validate()?;
        if urls.is_empty() {
            return Err(PipelineError::Validation("image_urls is required".into()));
        }
        let job_id = Uuid::new_v4();
        info!(%job_id, "Layout job from {} URL(s)", urls.len());

        let job_dir = self.job_dir(job_id).await?;
        let images = self.images.download(&job_dir, &urls).await;
        if images.is_empty() {
            if let Err(e) = tokio::fs::remove_dir_all(&job_dir).await {
                debug!("Failed to remove {}: {e}", job_dir.display());
            }
            return Err(PipelineError::NoImagesDownloaded);
        }
        self.dispatch_layout(job_id, inputs, images).await
    }

    async fn job_dir(&self, job_id: Uuid) -> Result<PathBuf, PipelineError> {
        let dir = self.config.upload_dir.join(job_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    async fn dispatch_layout(
        &self,
        job_id: Uuid,
        inputs: JobInputs,
        images: Vec<ImageRef>,
    ) -> Result<LayoutCreated, PipelineError> {
        let layout = self
            .assistant
            .synthesize(&inputs.prompt, &inputs.text_content, images.len())
            .await;

        let images: Vec<PathBuf> = images.into_iter().map(|i| i.path).collect();
        let image_count = images.len();
        let job = Job::new(job_id, inputs, images, layout);

        let config = config_path(&self.config.upload_dir, job_id);
        write_job_config(&config, &job).await?;

        let output = self
            .queue
            .submit(RenderRequest {
                job_id,
                script: self.config.layout_script_path(),
                config,
                timeout: self.config.layout_timeout,
            })
            .await
            .into_result()?;

        info!(%job_id, output = %output.display(), "Layout created");
        Ok(LayoutCreated {
            success: true,
            project_id: job_id,
            message: "Layout created".to_string(),
            output_file: output,
            images: image_count,
        })
    }

    /// Extracts metadata and a thumbnail from an existing template.
    pub async fn analyze_template(
        &self,
        request: AnalyzeRequest,
    ) -> Result<AnalysisReport, PipelineError> {
        if request.template_path.as_os_str().is_empty() {
            return Err(PipelineError::Validation("template_path is required".into()));
        }
        if !exists(&request.template_path).await {
            return Err(PipelineError::TemplateNotFound(request.template_path));
        }
        let script = self.config.analysis_script_path();
        if !exists(&script).await {
            return Err(PipelineError::ScriptNotFound(script));
        }

        let job_id = Uuid::new_v4();
        let results = std::path::absolute(results_path(&self.config.analysis_dir, job_id))?;
        let mut output_dir = std::path::absolute(&self.config.thumbnails_dir)?
            .to_string_lossy()
            .into_owned();
        if !output_dir.ends_with(MAIN_SEPARATOR) {
            output_dir.push(MAIN_SEPARATOR);
        }

        let analysis = AnalysisConfig {
            template_path: std::path::absolute(&request.template_path)?,
            output_dir,
            thumbnail_width: request.thumbnail_width.unwrap_or(DEFAULT_THUMBNAIL_WIDTH),
            thumbnail_height: request.thumbnail_height.unwrap_or(DEFAULT_THUMBNAIL_HEIGHT),
            results_path: results.clone(),
        };
        info!(
            %job_id,
            template = %analysis.template_path.display(),
            "Analyzing template at {}x{}",
            analysis.thumbnail_width,
            analysis.thumbnail_height
        );

        let config = config_path(&self.config.analysis_dir, job_id);
        write_job_config(&config, &analysis).await?;

        self.queue
            .submit(RenderRequest {
                job_id,
                script,
                config,
                timeout: self.config.analysis_timeout,
            })
            .await
            .into_result()?;

        let result = ingest_results(&results).await?;
        info!(
            %job_id,
            "Found {} placeholder(s) and {} image slot(s)",
            result.template.placeholders.len(),
            result.template.image_slots
        );
        Ok(AnalysisReport {
            success: true,
            job_id,
            template: result.template,
            thumbnail: result.thumbnail,
            errors: result.errors,
        })
    }

    /// Stores an uploaded `.indt`/`.indd` in the templates directory and analyzes it.
    pub async fn upload_and_analyze_template(
        &self,
        upload: UploadedFile,
        name: Option<String>,
    ) -> Result<TemplateInfo, PipelineError> {
        let filename = sanitize_filename(&upload.filename);
        if filename.is_empty() {
            return Err(PipelineError::Validation("Empty filename".into()));
        }
        let ext = Path::new(&filename)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !TEMPLATE_EXTENSIONS.contains(&ext.as_str()) {
            return Err(PipelineError::UnsupportedTemplate(filename));
        }

        tokio::fs::create_dir_all(&self.config.templates_dir).await?;
        let path = std::path::absolute(self.config.templates_dir.join(&filename))?;
        tokio::fs::write(&path, &upload.bytes).await?;
        info!("Saved template to {}", path.display());

        let report = self
            .analyze_template(AnalyzeRequest {
                template_path: path.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| PipelineError::StoredTemplate {
                template_path: path.clone(),
                source: Box::new(e),
            })?;

        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| display_name(&filename));

        let mut metadata = report.template;
        metadata.filename = Some(filename);
        metadata.path = Some(path.to_string_lossy().into_owned());

        Ok(TemplateInfo {
            name,
            metadata,
            thumbnail: report.thumbnail,
            errors: report.errors,
        })
    }

    /// `.indt` files in the templates directory, sorted by filename.
    pub async fn list_templates(&self) -> Result<Vec<TemplateSummary>, PipelineError> {
        let mut entries = match tokio::fs::read_dir(&self.config.templates_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut templates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().into_owned();
            if let Some(name) = filename.strip_suffix(".indt") {
                templates.push(TemplateSummary {
                    name: name.to_string(),
                    filename: filename.clone(),
                });
            }
        }
        templates.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(templates)
    }

    pub async fn locate_output(&self, job_id: &str) -> Result<PathBuf, PipelineError> {
        let not_found = || PipelineError::OutputNotFound(job_id.to_string());
        let id = Uuid::parse_str(job_id).map_err(|_| not_found())?;
        let path = self.config.renderer.output_dir.join(format!(
            "{id}.{}",
            self.config.renderer.output_extension
        ));
        if is_file(&path).await { Ok(path) } else { Err(not_found()) }
    }

    pub async fn locate_thumbnail(&self, filename: &str) -> Result<PathBuf, PipelineError> {
        let safe = sanitize_filename(filename);
        let path = self.config.thumbnails_dir.join(&safe);
        if !safe.is_empty() && is_file(&path).await {
            Ok(path)
        } else {
            Err(PipelineError::ThumbnailNotFound(filename.to_string()))
        }
    }

    pub async fn shutdown(&mut self) {
        self.queue.shutdown().await;
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

/// `summer_feature-a4.indt` -> `Summer Feature A4`
fn display_name(filename: &str) -> String {
    let stem = filename.rsplit_once('.').map_or(filename, |(stem, _)| stem);
    stem.replace(['-', '_'], " ")
        .split(' ')
        .map(title_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
