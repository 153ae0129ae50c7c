//! Degrade plan: an ordered list of partial-override steps applied to a
//! job on successive retries of the same provider, clamped to the last
//! step once the plan is exhausted. Also carries job-template
//! application, a related "apply partial overrides" operation used once
//! up front rather than per degrade step.

use crate::config::{DegradeStep, JobTemplate};
use crate::model::JobRequest;

#[derive(Debug, Clone)]
pub struct DegradePlan {
    steps: Vec<DegradeStep>,
}

impl DegradePlan {
    pub fn new(steps: Vec<DegradeStep>) -> Self {
        Self { steps }
    }

    /// Step indices to walk for one provider attempt loop: `[0]` for an
    /// empty plan (a single, unmodified attempt), `0..len` otherwise.
    pub fn indices(&self) -> Vec<usize> {
        if self.steps.is_empty() {
            vec![0]
        } else {
            (0..self.steps.len()).collect()
        }
    }

    /// Apply the step at `step_index`, clamped to the last configured
    /// step. Returns the job unchanged when the plan has no steps.
    pub fn apply(&self, job: &JobRequest, step_index: usize) -> JobRequest {
        if self.steps.is_empty() {
            return job.clone();
        }
        let step = &self.steps[step_index.min(self.steps.len() - 1)];
        let mut out = job.clone();
        if let Some(resolution) = step.resolution {
            out.resolution = resolution;
        }
        if let Some(fps) = step.fps {
            out.fps = fps;
        }
        if let Some(duration_s) = step.duration_s {
            out.duration_s = duration_s;
        }
        if let Some(steps) = step.steps {
            out.metadata.insert("steps".to_string(), steps.into());
        }
        if let Some(guidance) = step.guidance {
            out.metadata.insert("guidance".to_string(), guidance.into());
        }
        out
    }
}

/// Apply a named job template's overrides, used once before the provider
/// chain is walked (not part of the degrade loop).
pub fn apply_template(job: &JobRequest, template: &JobTemplate) -> JobRequest {
    let mut out = job.clone();
    if let Some(resolution) = template.resolution {
        out.resolution = resolution;
    }
    if let Some(fps) = template.fps {
        out.fps = fps;
    }
    if let Some(duration_s) = template.duration_s {
        out.duration_s = duration_s;
    }
    if let Some(output_format) = template.output_format {
        out.output_format = output_format;
    }
    if let Some(aspect_ratio) = template.aspect_ratio {
        out.aspect_ratio = aspect_ratio;
    }
    out
}
