use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{info, warn};
use uuid::Uuid;
use crate::generator::config::RendererConfig;
use super::{RenderError, RenderOutcome, RenderRequest, Renderer};

/// How the AppleScript wrapper reaches the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    /// Written to a temporary `.applescript` file that is removed afterwards.
    TempFile,
    /// Passed on the command line with `-e`.
    Inline,
}

impl FromStr for ScriptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temp_file" | "tempfile" | "file" => Ok(Self::TempFile),
            "inline" => Ok(Self::Inline),
            other => Err(format!("unknown script mode: {other}")),
        }
    }
}

/// Drives the renderer through an AppleScript wrapper around a JSX script.
pub struct OsaScriptRenderer {
    config: RendererConfig,
}

impl OsaScriptRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn output_path(&self, job_id: Uuid) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{job_id}.{}", self.config.output_extension))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.interpreter);
        cmd.args(&self.config.interpreter_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn write_temp_script(&self, source: &str) -> Result<NamedTempFile, RenderError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("magflow-").suffix(".applescript");
        let created = match &self.config.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        let mut file = created
            .map_err(|e| RenderError::Exception(format!("Failed to create script file: {e}")))?;
        file.write_all(source.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| RenderError::Exception(format!("Failed to write script file: {e}")))?;
        Ok(file)
    }

    async fn run(&self, request: &RenderRequest) -> Result<(), RenderError> {
        let script = absolute(&request.script)?;
        let config = absolute(&request.config)?;

        match self.config.script_mode {
            ScriptMode::TempFile => {
                let source = applescript_source(&self.config.app_name, &script, &config);
                let file = self.write_temp_script(&source)?;
                let mut cmd = self.command();
                cmd.arg(file.path());
                let result = wait(cmd, request.timeout).await;
                if let Err(e) = file.close() {
                    warn!("Failed to remove temporary script: {e}");
                }
                result
            }
            ScriptMode::Inline => {
                let mut cmd = self.command();
                cmd.arg("-e")
                    .arg(applescript_inline(&self.config.app_name, &script, &config));
                wait(cmd, request.timeout).await
            }
        }
    }
}

#[async_trait]
impl Renderer for OsaScriptRenderer {
    async fn invoke(&self, request: RenderRequest) -> RenderOutcome {
        info!(
            job_id = %request.job_id,
            script = %request.script.display(),
            "Invoking renderer"
        );
        let start = Instant::now();
        match self.run(&request).await {
            Ok(()) => {
                info!(
                    job_id = %request.job_id,
                    "Renderer finished in {:.2}s",
                    start.elapsed().as_secs_f32()
                );
                RenderOutcome::Success {
                    output: self.output_path(request.job_id),
                }
            }
            Err(e) => {
                warn!(job_id = %request.job_id, kind = ?e.kind(), "{e}");
                RenderOutcome::Failure(e)
            }
        }
    }
}

async fn wait(mut cmd: Command, timeout: Duration) -> Result<(), RenderError> {
    let child = cmd
        .spawn()
        .map_err(|e| RenderError::Exception(format!("Failed to start interpreter: {e}")))?;

    // Dropping the future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Err(_) => return Err(RenderError::Timeout(timeout)),
        Ok(Err(e)) => return Err(RenderError::Exception(e.to_string())),
        Ok(Ok(output)) => output,
    };

    if output.status.success() {
        Ok(())
    } else {
        Err(RenderError::NonZeroExit {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf, RenderError> {
    std::path::absolute(path)
        .map_err(|e| RenderError::Exception(format!("Bad path {}: {e}", path.display())))
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn do_script_line(script: &Path, config: &Path) -> String {
    format!(
        "do script POSIX file {} language javascript with arguments {{{}}}",
        quote(&script.to_string_lossy()),
        quote(&config.to_string_lossy()),
    )
}

/// The wrapper written to a scripting file.
pub fn applescript_source(app_name: &str, script: &Path, config: &Path) -> String {
    format!(
        "tell application {}\n    activate\n    {}\nend tell\n",
        quote(app_name),
        do_script_line(script, config),
    )
}

/// Single-line form for `-e`.
pub fn applescript_inline(app_name: &str, script: &Path, config: &Path) -> String {
    format!(
        "tell application {} to {}",
        quote(app_name),
        do_script_line(script, config),
    )
}
