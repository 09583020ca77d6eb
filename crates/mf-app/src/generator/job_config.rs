use std::io::Write;
use std::path::{Path, PathBuf};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

pub const CONFIG_FILE: &str = "config.json";

/// `<root>/<job_id>/config.json`
pub fn config_path(root: &Path, job_id: Uuid) -> PathBuf {
    root.join(job_id.to_string()).join(CONFIG_FILE)
}

/// Writes `value` as pretty JSON to `path` atomically.
///
/// The bytes go to a temporary file next to `path` which is then renamed over
/// it, so readers never observe a partial artifact. The file work runs on the
/// blocking pool.
pub async fn write_job_config<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || persist(&path, json.as_bytes()))
        .await
        .map_err(std::io::Error::other)?
}

fn persist(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    debug!("Wrote job config {}", path.display());
    Ok(())
}

pub fn read_job_config<T: DeserializeOwned>(path: &Path) -> std::io::Result<T> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_core::{AnalysisConfig, Job, JobInputs, LayoutInstructions};

    #[tokio::test]
    async fn test_round_trip_keeps_non_ascii() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let job = Job::new(
            id,
            JobInputs {
                prompt: "Été à Montréal, 夏の特集".into(),
                text_content: "Crème brûlée\nnaïve café".into(),
                subtitle: "Numéro spécial".into(),
                template: Some("magazine_a4".into()),
                rectangle_index: Some("2".into()),
            },
            vec![dir.path().join("image_1.png")],
            LayoutInstructions::default(),
        );

        let path = config_path(dir.path(), id);
        write_job_config(&path, &job).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Été à Montréal, 夏の特集"));
        assert!(text.contains("\n  \"prompt\""));

        let back: Job = read_job_config(&path).unwrap();
        assert_eq!(back, job);

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from(CONFIG_FILE)]);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_whole_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(dir.path(), Uuid::new_v4());
        let config = |w| AnalysisConfig {
            template_path: "/templates/summer.indt".into(),
            output_dir: "/thumbnails/".into(),
            thumbnail_width: w,
            thumbnail_height: 600,
            results_path: "/analysis/results.json".into(),
        };

        write_job_config(&path, &config(800)).await.unwrap();
        write_job_config(&path, &config(1200)).await.unwrap();
        let back: AnalysisConfig = read_job_config(&path).unwrap();
        assert_eq!(back, config(1200));
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_separate_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let jobs: Vec<Job> = (0..8)
            .map(|n| {
                Job::new(
                    Uuid::new_v4(),
                    JobInputs {
                        prompt: format!("Issue {n}"),
                        ..Default::default()
                    },
                    vec![],
                    LayoutInstructions::default(),
                )
            })
            .collect();

        let writes = jobs
            .iter()
            .map(|job| async move { write_job_config(&config_path(root, job.project_id), job).await });
        for result in futures::future::join_all(writes).await {
            result.unwrap();
        }

        for job in &jobs {
            let back: Job = read_job_config(&config_path(root, job.project_id)).unwrap();
            assert_eq!(&back, job);
        }
    }

    #[test]
    fn test_read_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_job_config::<Job>(&dir.path().join("nope.json")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
