use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use crate::renderer::osascript::ScriptMode;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} must be a number, got {value:?}")]
    NotANumber { key: &'static str, value: String },

    #[error("{key} has an unsupported value {value:?}")]
    Unsupported { key: &'static str, value: String },

    #[error("Failed to read .env: {0}")]
    Dotenv(#[from] dotenvy::Error),

    #[error("Failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// How the renderer is reached.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub app_name: String,
    pub interpreter: String,
    pub interpreter_args: Vec<String>,
    pub script_mode: ScriptMode,
    pub output_dir: PathBuf,
    pub output_extension: String,
    /// Where temporary scripting files go. `None` means the system temp dir.
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub timeout: Duration,
    pub concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    pub preview_chars: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub upload_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub analysis_dir: PathBuf,
    pub thumbnails_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub layout_script: String,
    pub analysis_script: String,
    pub layout_timeout: Duration,
    pub analysis_timeout: Duration,
    pub renderer: RendererConfig,
    pub download: DownloadConfig,
    pub assistant: AssistantConfig,
}

impl AppConfig {
    /// Reads `.env` if there is one, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let secs = |key: &'static str, default: u64| -> Result<Duration, ConfigError> {
            Ok(Duration::from_secs(number(&lookup, key, default)?))
        };

        let script_mode = {
            let value = string("RENDERER_SCRIPT_MODE", "temp_file");
            ScriptMode::from_str(&value).map_err(|_| ConfigError::Unsupported {
                key: "RENDERER_SCRIPT_MODE",
                value,
            })?
        };

        Ok(Self {
            upload_dir: string("UPLOAD_FOLDER", "uploads").into(),
            templates_dir: string("TEMPLATES_FOLDER", "indesign_templates").into(),
            analysis_dir: string("ANALYSIS_FOLDER", "analysis").into(),
            thumbnails_dir: string("THUMBNAILS_FOLDER", "thumbnails").into(),
            scripts_dir: string("SCRIPTS_FOLDER", "scripts").into(),
            layout_script: string("LAYOUT_SCRIPT", "template_simple_working.jsx"),
            analysis_script: string("ANALYSIS_SCRIPT", "analyze_and_thumbnail.jsx"),
            layout_timeout: secs("LAYOUT_TIMEOUT_SECS", 300)?,
            analysis_timeout: secs("ANALYSIS_TIMEOUT_SECS", 600)?,
            renderer: RendererConfig {
                app_name: string("INDESIGN_APP_NAME", "Adobe InDesign 2026"),
                interpreter: string("RENDERER_INTERPRETER", "osascript"),
                interpreter_args: lookup("RENDERER_INTERPRETER_ARGS")
                    .map(|v| v.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
                script_mode,
                output_dir: string("OUTPUT_FOLDER", "output").into(),
                output_extension: string("OUTPUT_EXTENSION", "indd"),
                scratch_dir: lookup("RENDERER_SCRATCH_DIR").map(PathBuf::from),
            },
            download: DownloadConfig {
                timeout: secs("DOWNLOAD_TIMEOUT_SECS", 20)?,
                concurrency: number(&lookup, "DOWNLOAD_CONCURRENCY", 4)?.max(1) as usize,
            },
            assistant: AssistantConfig {
                api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
                base_url: string("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                model: string("OPENAI_MODEL", "gpt-3.5-turbo"),
                timeout: secs("OPENAI_TIMEOUT_SECS", 60)?,
                max_tokens: 800,
                temperature: 0.7,
                preview_chars: 300,
            },
        })
    }

    pub fn layout_script_path(&self) -> PathBuf {
        self.scripts_dir.join(&self.layout_script)
    }

    pub fn analysis_script_path(&self) -> PathBuf {
        self.scripts_dir.join(&self.analysis_script)
    }

    pub fn output_dir(&self) -> &Path {
        &self.renderer.output_dir
    }

    /// Creates every working directory the pipeline writes into.
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for dir in [
            &self.upload_dir,
            &self.templates_dir,
            &self.renderer.output_dir,
            &self.analysis_dir,
            &self.thumbnails_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Test configuration with every directory under `root` and no AI key.
    #[cfg(test)]
    pub fn rooted_at(root: &Path) -> Self {
        let dir = |name: &str| root.join(name).to_string_lossy().into_owned();
        let vars = std::collections::HashMap::from([
            ("UPLOAD_FOLDER", dir("uploads")),
            ("TEMPLATES_FOLDER", dir("templates")),
            ("OUTPUT_FOLDER", dir("output")),
            ("ANALYSIS_FOLDER", dir("analysis")),
            ("THUMBNAILS_FOLDER", dir("thumbnails")),
            ("SCRIPTS_FOLDER", dir("scripts")),
            ("RENDERER_SCRATCH_DIR", dir("scratch")),
        ]);
        let config = Self::from_lookup(|k| vars.get(k).cloned()).unwrap();
        std::fs::create_dir_all(root.join("scratch")).unwrap();
        std::fs::create_dir_all(root.join("scripts")).unwrap();
        config.ensure_dirs().unwrap();
        config
    }
}

fn number<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::NotANumber { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.renderer.output_dir, PathBuf::from("output"));
        assert_eq!(config.renderer.app_name, "Adobe InDesign 2026");
        assert_eq!(config.renderer.interpreter, "osascript");
        assert!(config.renderer.interpreter_args.is_empty());
        assert_eq!(config.renderer.script_mode, ScriptMode::TempFile);
        assert_eq!(config.layout_timeout, Duration::from_secs(300));
        assert_eq!(config.analysis_timeout, Duration::from_secs(600));
        assert_eq!(config.download.timeout, Duration::from_secs(20));
        assert!(config.assistant.api_key.is_none());
        assert_eq!(config.assistant.model, "gpt-3.5-turbo");
        assert_eq!(
            config.layout_script_path(),
            PathBuf::from("scripts/template_simple_working.jsx")
        );
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("RENDERER_INTERPRETER", "sh"),
            ("RENDERER_INTERPRETER_ARGS", "-c  'exit 0'"),
            ("RENDERER_SCRIPT_MODE", "inline"),
            ("LAYOUT_TIMEOUT_SECS", "5"),
            ("DOWNLOAD_CONCURRENCY", "0"),
        ])
        .unwrap();
        assert_eq!(config.assistant.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.renderer.interpreter_args, vec!["-c", "'exit", "0'"]);
        assert_eq!(config.renderer.script_mode, ScriptMode::Inline);
        assert_eq!(config.layout_timeout, Duration::from_secs(5));
        assert_eq!(config.download.concurrency, 1);
    }

    #[test]
    fn test_blank_api_key_means_none() {
        let config = config_from(&[("OPENAI_API_KEY", "  ")]).unwrap();
        assert!(config.assistant.api_key.is_none());
    }

    #[test]
    fn test_bad_values() {
        assert!(matches!(
            config_from(&[("LAYOUT_TIMEOUT_SECS", "five")]),
            Err(ConfigError::NotANumber { key: "LAYOUT_TIMEOUT_SECS", .. })
        ));
        assert!(matches!(
            config_from(&[("RENDERER_SCRIPT_MODE", "jsx")]),
            Err(ConfigError::Unsupported { .. })
        ));
    }
}
