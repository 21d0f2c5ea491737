//! Fire-and-forget background work with results delivered back to the
//! interactive thread.
//!
//! Jobs run on tokio's blocking pool when a runtime is available and inline
//! otherwise. Every result is tagged with the navigation generation and page
//! it was dispatched for so the owner can drop results that went stale while
//! the job was running. Jobs are never cancelled.

use std::path::PathBuf;

use tiny_skia::Pixmap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::error::RenderResult;

/// What a finished job produced.
#[derive(Debug)]
pub enum TaskResult {
    /// A low-DPI render of the displayed page, already upscaled.
    Preview(Pixmap),
    /// A neighbouring page rendered at full DPI.
    Prefetched(Pixmap),
    /// A page raster was written to disk.
    Saved(PathBuf),
    /// A newer save of the page had already been written.
    Superseded,
    /// An annotated page export was written to disk.
    Exported(PathBuf),
    /// The job failed.
    Failed(String),
}

/// A finished job with the context it was dispatched in.
#[derive(Debug)]
pub struct TaskOutcome {
    /// Navigation generation at dispatch time.
    pub generation: u64,
    /// Page the job concerned.
    pub page: usize,
    /// What the job produced.
    pub result: TaskResult,
}

/// Dispatches background jobs and collects their outcomes.
#[derive(Debug)]
pub struct BackgroundTasks {
    runtime: Option<Handle>,
    tx: mpsc::UnboundedSender<TaskOutcome>,
    rx: mpsc::UnboundedReceiver<TaskOutcome>,
    outstanding: usize,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundTasks {
    /// Use the ambient tokio runtime if there is one, else run jobs inline.
    #[must_use]
    pub fn new() -> Self {
        Self::with_runtime(Handle::try_current().ok())
    }

    /// Use the given runtime, or run jobs inline when `None`.
    #[must_use]
    pub fn with_runtime(runtime: Option<Handle>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            tx,
            rx,
            outstanding: 0,
        }
    }

    /// True if jobs run on a runtime rather than inline.
    #[must_use]
    pub const fn is_async(&self) -> bool {
        self.runtime.is_some()
    }

    /// Jobs dispatched whose outcome has not been collected yet.
    #[must_use]
    pub const fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Dispatch a job.
    pub fn spawn<F>(&mut self, generation: u64, page: usize, job: F)
    where
        F: FnOnce() -> RenderResult<TaskResult> + Send + 'static,
    {
        self.outstanding += 1;
        let tx = self.tx.clone();
        let Some(runtime) = &self.runtime else {
            let result = job().unwrap_or_else(|e| TaskResult::Failed(e.to_string()));
            let _ = tx.send(TaskOutcome {
                generation,
                page,
                result,
            });
            return;
        };
        runtime.spawn(async move {
            let result = match tokio::task::spawn_blocking(job).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => TaskResult::Failed(e.to_string()),
                Err(e) => TaskResult::Failed(format!("Background job aborted: {e}")),
            };
            // The receiver lives as long as the canvas; a closed channel
            // means nobody is left to apply the result.
            let _ = tx.send(TaskOutcome {
                generation,
                page,
                result,
            });
        });
    }

    /// Collect every outcome that has arrived, without waiting.
    pub fn drain(&mut self) -> Vec<TaskOutcome> {
        let mut done = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            self.outstanding = self.outstanding.saturating_sub(1);
            done.push(outcome);
        }
        done
    }

    /// Wait until every dispatched job has reported, returning the outcomes.
    pub async fn settle(&mut self) -> Vec<TaskOutcome> {
        let mut done = self.drain();
        while self.outstanding > 0 {
            let Some(outcome) = self.rx.recv().await else {
                break;
            };
            self.outstanding -= 1;
            done.push(outcome);
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;

    #[test]
    fn test_inline_without_runtime() {
        let mut tasks = BackgroundTasks::with_runtime(None);
        assert!(!tasks.is_async());
        tasks.spawn(3, 1, || Ok(TaskResult::Saved(PathBuf::from("a.png"))));
        tasks.spawn(3, 2, || Err(RenderError::Task("boom".to_string())));
        let done = tasks.drain();
        assert_eq!(done.len(), 2);
        assert_eq!(tasks.outstanding(), 0);
        assert!(matches!(done[0].result, TaskResult::Saved(_)));
        assert!(matches!(&done[1].result, TaskResult::Failed(msg) if msg.contains("boom")));
        assert_eq!((done[1].generation, done[1].page), (3, 2));
    }

    #[tokio::test]
    async fn test_runtime_jobs_settle() {
        let mut tasks = BackgroundTasks::new();
        assert!(tasks.is_async());
        for page in 0..4 {
            tasks.spawn(7, page, move || {
                crate::raster::new_pixmap(2, 2).map(TaskResult::Prefetched)
            });
        }
        let mut done = tasks.settle().await;
        done.sort_by_key(|o| o.page);
        assert_eq!(done.iter().map(|o| o.page).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert!(done.iter().all(|o| o.generation == 7));
        assert_eq!(tasks.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_panicking_job_reports_failure() {
        let mut tasks = BackgroundTasks::new();
        tasks.spawn(0, 0, || panic!("render crashed"));
        let done = tasks.settle().await;
        assert!(matches!(done[0].result, TaskResult::Failed(_)));
    }
}
