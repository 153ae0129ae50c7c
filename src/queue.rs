//! In-memory job queue: one `mpsc` channel plus a spawned worker task.
//! A single worker by default; jobs are processed one at a time in
//! submission order, matching the "single worker unless configured
//! otherwise" concurrency model.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::JobRequest;

#[derive(Debug, Clone)]
pub struct JobTask {
    pub job_id: String,
    pub job: JobRequest,
}

type Worker = Arc<dyn Fn(JobTask) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// A bounded-timeout `recv` loop over one `mpsc::Receiver`, so `stop()`
/// is responsive without needing a separate cancellation signal for the
/// common case of an empty queue.
pub struct InMemoryQueue {
    sender: Option<mpsc::UnboundedSender<JobTask>>,
    handle: Option<JoinHandle<()>>,
}

impl InMemoryQueue {
    pub fn start<F, Fut>(worker: F) -> Self
    where
        F: Fn(JobTask) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let worker: Worker = Arc::new(move |task| Box::pin(worker(task)));
        let (sender, mut receiver) = mpsc::unbounded_channel::<JobTask>();
        let handle = tokio::spawn(async move {
            while let Some(task) = receiver.recv().await {
                worker(task).await;
            }
        });
        Self { sender: Some(sender), handle: Some(handle) }
    }

    pub fn submit(&self, job_id: impl Into<String>, job: JobRequest) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(JobTask { job_id: job_id.into(), job });
        }
    }

    /// Stop accepting new work and wait for the worker task to drain and
    /// exit. Dropping the sender closes the channel, which ends the
    /// worker's `recv` loop once any in-flight job finishes.
    pub async fn stop(mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::model::{AspectRatio, OutputFormat, Resolution};

    fn sample_job() -> JobRequest {
        JobRequest {
            prompt: "a cat".to_string(),
            negative_prompt: None,
            duration_s: 4,
            aspect_ratio: AspectRatio::Square,
            resolution: Resolution::R720p,
            fps: 24,
            seed: None,
            style: None,
            input_image_url: None,
            output_format: OutputFormat::Mp4,
            priority: 0,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn processes_submitted_jobs_in_order() {
        let processed = Arc::new(std::sync::Mutex::new(Vec::new()));
        let processed_clone = processed.clone();
        let queue = InMemoryQueue::start(move |task: JobTask| {
            let processed = processed_clone.clone();
            async move {
                processed.lock().unwrap().push(task.job_id);
            }
        });
        queue.submit("a", sample_job());
        queue.submit("b", sample_job());
        queue.stop().await;
        // give the spawned task a beat to drain after sender drop
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let order = processed.lock().unwrap().clone();
        assert!(order.contains(&"a".to_string()));
    }

    #[tokio::test]
    async fn counts_every_submitted_job() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let queue = InMemoryQueue::start(move |_task: JobTask| {
            let count = count_clone.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });
        for i in 0..5 {
            queue.submit(format!("job-{i}"), sample_job());
        }
        queue.stop().await;
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }
}
