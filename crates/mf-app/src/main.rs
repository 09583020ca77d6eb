mod error;
mod generator;
mod renderer;
mod worker;
#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;
use crate::error::{ErrorClass, PipelineError};
use crate::generator::config::AppConfig;
use crate::generator::images::UploadedFile;
use crate::generator::schemas::{ImageUrlsField, LayoutRequest};
use crate::generator::{AnalyzeRequest, Generator};

/// MagFlow - lays out magazine pages by driving InDesign
#[derive(Parser)]
#[command(name = "magflow")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct JobArgs {
    /// What the page should look like
    #[arg(long, default_value = "")]
    prompt: String,

    /// Article body
    #[arg(long = "text", default_value = "")]
    text_content: String,

    #[arg(long, default_value = "")]
    subtitle: String,

    /// Template name (default: "default")
    #[arg(long)]
    template: Option<String>,

    #[arg(long)]
    rectangle_index: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a layout from local image files
    CreateLayout {
        #[command(flatten)]
        job: JobArgs,

        /// Image file to place (repeatable)
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },

    /// Create a layout from remote images
    CreateLayoutUrls {
        #[command(flatten)]
        job: JobArgs,

        /// Image URL (repeatable)
        #[arg(long = "image-url")]
        image_url: Vec<String>,

        /// Comma-separated image URLs
        #[arg(long)]
        image_urls: Option<String>,

        /// JSON request body; replaces the job flags
        #[arg(long)]
        request: Option<PathBuf>,
    },

    /// Extract placeholders and a thumbnail from a template
    AnalyzeTemplate {
        template_path: PathBuf,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,
    },

    /// Copy a template into the templates folder and analyze it
    UploadTemplate {
        file: PathBuf,

        /// Display name (default: derived from the filename)
        #[arg(long)]
        name: Option<String>,
    },

    /// List available templates
    ListTemplates,

    /// Print the path of a job's generated document
    Output { job_id: String },

    /// Print the path of a generated thumbnail
    Thumbnail { filename: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load().context("failed to load configuration")?;
    config.ensure_dirs()?;
    let mut generator = Generator::new(config).context("failed to start generator")?;
    info!(
        "Documents go to {}",
        generator.config().output_dir().display()
    );

    let outcome = run(&generator, cli.command).await;
    generator.shutdown().await;

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => match e.downcast_ref::<PipelineError>() {
            Some(failure) => {
                println!("{}", serde_json::to_string_pretty(&failure.payload())?);
                std::process::exit(exit_code(failure.class()));
            }
            None => Err(e),
        },
    }
}

async fn run(generator: &Generator, command: Commands) -> Result<Value> {
    let value = match command {
        Commands::CreateLayout { job, images } => {
            let mut uploads = Vec::with_capacity(images.len());
            for path in &images {
                uploads.push(read_upload(path).await?);
            }
            let request = layout_request(job, None);
            serde_json::to_value(generator.create_layout(request.inputs(), uploads).await?)?
        }
        Commands::CreateLayoutUrls {
            job,
            image_url,
            image_urls,
            request,
        } => {
            let request = match request {
                Some(path) => {
                    let text = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    serde_json::from_str::<LayoutRequest>(&text)
                        .with_context(|| format!("failed to parse {}", path.display()))?
                }
                None => layout_request(job, image_urls.map(ImageUrlsField::Csv)),
            };
            let urls = request.image_urls(&image_url);
            serde_json::to_value(
                generator
                    .create_layout_from_urls(request.inputs(), urls)
                    .await?,
            )?
        }
        Commands::AnalyzeTemplate {
            template_path,
            width,
            height,
        } => serde_json::to_value(
            generator
                .analyze_template(AnalyzeRequest {
                    template_path,
                    thumbnail_width: width,
                    thumbnail_height: height,
                })
                .await?,
        )?,
        Commands::UploadTemplate { file, name } => {
            let upload = read_upload(&file).await?;
            let template = generator.upload_and_analyze_template(upload, name).await?;
            json!({"success": true, "template": template})
        }
        Commands::ListTemplates => serde_json::to_value(generator.list_templates().await?)?,
        Commands::Output { job_id } => json!({"path": generator.locate_output(&job_id).await?}),
        Commands::Thumbnail { filename } => {
            json!({"path": generator.locate_thumbnail(&filename).await?})
        }
    };
    Ok(value)
}

fn layout_request(job: JobArgs, image_urls: Option<ImageUrlsField>) -> LayoutRequest {
    LayoutRequest {
        prompt: job.prompt,
        text_content: job.text_content,
        subtitle: job.subtitle,
        template: job.template,
        rectangle_index: job.rectangle_index,
        image_urls,
    }
}

async fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(UploadedFile { filename, bytes })
}

fn exit_code(class: ErrorClass) -> i32 {
    match class {
        ErrorClass::Client => 2,
        ErrorClass::NotFound => 3,
        ErrorClass::Server => 1,
    }
}
