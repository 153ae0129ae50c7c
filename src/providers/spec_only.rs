//! The always-available fallback provider: never calls out to a remote
//! backend, just confirms the scene spec and final prompt that the
//! orchestrator writes for every job regardless of which provider wins.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::ProviderError;
use crate::model::JobRequest;

use super::{ProviderAdapter, ProviderResult};

#[derive(Debug, Default)]
pub struct SpecOnlyProvider;

impl SpecOnlyProvider {
    pub fn new() -> Self {
        Self
    }

    /// The declarative scene description written alongside every job,
    /// independent of which provider ultimately produced the render.
    pub fn build_scene_spec(&self, job: &JobRequest) -> Map<String, Value> {
        let object = json!({
            "prompt": job.prompt,
            "negative_prompt": job.negative_prompt,
            "duration_s": job.duration_s,
            "aspect_ratio": job.aspect_ratio,
            "resolution": job.resolution,
            "fps": job.fps,
            "seed": job.seed,
            "style": job.style,
            "input_image_url": job.input_image_url,
            "output_format": job.output_format,
            "metadata": job.metadata,
        });
        match object {
            Value::Object(map) => map,
            _ => unreachable!("json! object literal always produces Value::Object"),
        }
    }

    /// The single-string prompt rendering used as a human-readable
    /// artifact even when no provider produced a video.
    pub fn build_final_prompt(&self, job: &JobRequest) -> String {
        let mut parts = vec![job.prompt.clone()];
        if let Some(style) = &job.style {
            parts.push(format!("style: {}", style));
        }
        if let Some(negative) = &job.negative_prompt {
            parts.push(format!("negative: {}", negative));
        }
        parts.join(" | ")
    }
}

#[async_trait]
impl ProviderAdapter for SpecOnlyProvider {
    async fn submit(
        &self,
        job: &JobRequest,
        _headers: &HashMap<String, String>,
    ) -> Result<String, ProviderError> {
        let slug: String = job.prompt.chars().take(8).map(|c| if c == ' ' { '_' } else { c }).collect();
        Ok(format!("spec-{}", slug))
    }

    async fn poll(
        &self,
        _provider_job_id: &str,
        _headers: &HashMap<String, String>,
    ) -> Result<Map<String, Value>, ProviderError> {
        let mut map = Map::new();
        map.insert("status".to_string(), json!("succeeded"));
        map.insert("progress".to_string(), json!(1.0));
        Ok(map)
    }

    async fn fetch(
        &self,
        provider_job_id: &str,
        _headers: &HashMap<String, String>,
    ) -> Result<ProviderResult, ProviderError> {
        let mut metadata = Map::new();
        metadata.insert("spec_only".to_string(), json!(true));
        Ok(ProviderResult {
            provider_job_id: provider_job_id.to_string(),
            status: "succeeded".to_string(),
            output_url: None,
            output_bytes: None,
            metadata: Some(metadata),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AspectRatio, OutputFormat, Resolution};

    fn sample_job() -> JobRequest {
        JobRequest {
            prompt: "a quiet harbor at dawn".to_string(),
            negative_prompt: Some("no people".to_string()),
            duration_s: 6,
            aspect_ratio: AspectRatio::Widescreen,
            resolution: Resolution::R1080p,
            fps: 24,
            seed: None,
            style: Some("watercolor".to_string()),
            input_image_url: None,
            output_format: OutputFormat::Mp4,
            priority: 0,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn submit_builds_slug_from_prompt() {
        let provider = SpecOnlyProvider::new();
        let id = provider.submit(&sample_job(), &HashMap::new()).await.unwrap();
        assert_eq!(id, "spec-a_quiet_");
    }

    #[test]
    fn final_prompt_includes_style_and_negative() {
        let provider = SpecOnlyProvider::new();
        let prompt = provider.build_final_prompt(&sample_job());
        assert_eq!(prompt, "a quiet harbor at dawn | style: watercolor | negative: no people");
    }

    #[test]
    fn scene_spec_carries_every_field() {
        let provider = SpecOnlyProvider::new();
        let spec = provider.build_scene_spec(&sample_job());
        assert_eq!(spec.get("prompt").unwrap().as_str().unwrap(), "a quiet harbor at dawn");
        assert_eq!(spec.get("fps").unwrap().as_u64().unwrap(), 24);
    }
}
