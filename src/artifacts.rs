//! On-disk artifact layout: one directory per job under a base artifacts
//! directory, holding the job request, attempt history, scene spec,
//! final prompt, provider responses, and the rendered output (or a URL
//! to it) when a provider succeeds.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::model::{AttemptRecord, JobRequest};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    fn job_dir(&self, job_id: &str) -> PathBuf {
        self.base_dir.join(job_id)
    }

    fn write_json(path: &Path, value: &impl Serialize) -> std::io::Result<()> {
        let text = serde_json::to_string_pretty(value).expect("value serializes to JSON");
        std::fs::write(path, text)
    }

    pub fn init_job(&self, job_id: &str, job: &JobRequest) -> std::io::Result<PathBuf> {
        let dir = self.job_dir(job_id);
        std::fs::create_dir_all(&dir)?;
        Self::write_json(&dir.join("job.json"), job)?;
        Self::write_json(&dir.join("attempts.json"), &Vec::<AttemptRecord>::new())?;
        Ok(dir)
    }

    pub fn write_attempts(&self, job_id: &str, attempts: &[AttemptRecord]) -> std::io::Result<()> {
        Self::write_json(&self.job_dir(job_id).join("attempts.json"), &attempts)
    }

    pub fn write_final_prompt(&self, job_id: &str, prompt: &str) -> std::io::Result<String> {
        let path = self.job_dir(job_id).join("final_prompt.txt");
        std::fs::write(&path, prompt)?;
        Ok(path.display().to_string())
    }

    pub fn write_scene_spec(&self, job_id: &str, spec: &Map<String, Value>) -> std::io::Result<String> {
        let path = self.job_dir(job_id).join("scene_spec.json");
        Self::write_json(&path, spec)?;
        Ok(path.display().to_string())
    }

    pub fn write_output(&self, job_id: &str, data: &[u8], output_format: &str) -> std::io::Result<String> {
        let path = self.job_dir(job_id).join(format!("output.{}", output_format));
        std::fs::write(&path, data)?;
        Ok(path.display().to_string())
    }

    pub fn write_output_url(&self, job_id: &str, url: &str) -> std::io::Result<String> {
        let path = self.job_dir(job_id).join("output_url.txt");
        std::fs::write(&path, url)?;
        Ok(path.display().to_string())
    }

    pub fn write_provider_response(
        &self,
        job_id: &str,
        provider: &str,
        payload: &Map<String, Value>,
    ) -> std::io::Result<String> {
        let dir = self.job_dir(job_id).join("provider_responses");
        std::fs::create_dir_all(&dir)?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S");
        let path = dir.join(format!("{}-{}.json", provider, timestamp));
        Self::write_json(&path, payload)?;
        Ok(path.display().to_string())
    }

    /// Best-effort thumbnail generation via `ffmpeg`. Any spawn failure
    /// or non-zero exit is swallowed: a missing thumbnail never fails
    /// the job.
    pub async fn try_generate_thumbnail(&self, job_id: &str, output_path: &str) -> Option<String> {
        let thumb_path = self.job_dir(job_id).join("thumbnail.jpg");
        let status = Command::new("ffmpeg")
            .args([
                "-y",
                "-i",
                output_path,
                "-ss",
                "00:00:01",
                "-vframes",
                "1",
                thumb_path.to_str()?,
            ])
            .output()
            .await
            .ok()?;
        if status.status.success() {
            Some(thumb_path.display().to_string())
        } else {
            None
        }
    }
}
