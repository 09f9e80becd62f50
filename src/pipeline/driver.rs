//! Pipeline driver: one search query in, dataset lines out.
//!
//! [`PipelineDriver::start`] returns immediately. The run itself (search,
//! job fan-out, queue drain) happens on a spawned task; callers observe it
//! through the [`PipelineHandle`]'s line channel and [`PipelineHandle::wait`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::accumulator::Accumulator;
use crate::bugzilla::{BugId, BugSource, BugzillaEndpoints, SearchResponse};
use crate::error::{FetchError, PipelineError};
use crate::export::{DatasetLine, DatasetWriter};
use crate::scheduler::{FetchJob, FetchQueue, FetchQueueConfig};

/// Outcome of one query's run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub query: String,
    pub label: i32,
    pub bugs_found: usize,
    pub jobs_enqueued: u64,
    pub jobs_completed: u64,
    pub jobs_dropped: u64,
    pub lines_emitted: usize,
    pub write_failures: usize,
    /// Mean wall time of a fetch job, successful or dropped.
    pub average_job_ms: u64,
    /// Bugs that never received all nine features, sorted.
    pub incomplete: Vec<BugId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Handle to a running query.
pub struct PipelineHandle {
    lines: mpsc::UnboundedReceiver<DatasetLine>,
    task: JoinHandle<Result<PipelineReport, PipelineError>>,
}

impl PipelineHandle {
    /// Receive the next emitted line. Returns `None` once the run is over and
    /// every line has been received.
    pub async fn next_line(&mut self) -> Option<DatasetLine> {
        self.lines.recv().await
    }

    /// Wait for the run to finish.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Search` if the search request failed, or
    /// `PipelineError::Join` if the run task panicked.
    pub async fn wait(self) -> Result<PipelineReport, PipelineError> {
        self.task
            .await
            .map_err(|e| PipelineError::Join(e.to_string()))?
    }

    /// Wait for the run to finish, collecting every emitted line on the way.
    pub async fn collect(mut self) -> Result<(Vec<DatasetLine>, PipelineReport), PipelineError> {
        let mut lines = Vec::new();
        while let Some(line) = self.lines.recv().await {
            lines.push(line);
        }
        let report = self.wait().await?;
        Ok((lines, report))
    }
}

/// Runs search queries against one bug source, appending to one dataset.
#[derive(Clone)]
pub struct PipelineDriver {
    source: Arc<dyn BugSource>,
    endpoints: BugzillaEndpoints,
    queue_config: FetchQueueConfig,
    writer: Arc<DatasetWriter>,
}

impl PipelineDriver {
    pub fn new(
        source: Arc<dyn BugSource>,
        endpoints: BugzillaEndpoints,
        queue_config: FetchQueueConfig,
        writer: Arc<DatasetWriter>,
    ) -> Self {
        Self {
            source,
            endpoints,
            queue_config,
            writer,
        }
    }

    /// Start harvesting the bugs matched by `query`, labelling each line
    /// with `label`. Must be called inside a Tokio runtime.
    pub fn start(&self, query: impl Into<String>, label: i32) -> PipelineHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let run = QueryRun {
            driver: self.clone(),
            query: query.into(),
            label,
        };
        let task = tokio::spawn(run.execute(tx));
        PipelineHandle { lines: rx, task }
    }
}

struct QueryRun {
    driver: PipelineDriver,
    query: String,
    label: i32,
}

impl QueryRun {
    async fn execute(
        self,
        tx: mpsc::UnboundedSender<DatasetLine>,
    ) -> Result<PipelineReport, PipelineError> {
        let started_at = Utc::now();
        info!(query = %self.query, label = self.label, "Running search query");

        let bug_ids = self.search().await?;
        info!(query = %self.query, bugs = bug_ids.len(), "Search returned bugs");

        let accumulator = Arc::new(
            Accumulator::new(self.label, Arc::clone(&self.driver.writer)).with_emitted_channel(tx),
        );
        let queue = FetchQueue::start(
            self.driver.queue_config.clone(),
            Arc::clone(&self.driver.source),
            Arc::clone(&accumulator),
        );

        for bug_id in &bug_ids {
            for job in FetchJob::pair_for(*bug_id, &self.driver.endpoints) {
                queue.push(job).map_err(|_| PipelineError::QueueClosed)?;
            }
        }
        debug!(jobs = bug_ids.len() * 2, "All fetch jobs queued");

        let stats = queue.drain().await;
        let incomplete = accumulator.incomplete_of(&bug_ids).await;
        if !incomplete.is_empty() {
            warn!(
                query = %self.query,
                incomplete = incomplete.len(),
                "Some bugs never received every feature"
            );
        }

        let report = PipelineReport {
            query: self.query,
            label: self.label,
            bugs_found: bug_ids.len(),
            jobs_enqueued: stats.enqueued,
            jobs_completed: stats.completed,
            jobs_dropped: stats.dropped,
            lines_emitted: accumulator.emitted(),
            write_failures: accumulator.write_failures(),
            average_job_ms: stats.average_job_duration.as_millis() as u64,
            incomplete,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            query = %report.query,
            bugs = report.bugs_found,
            emitted = report.lines_emitted,
            dropped = report.jobs_dropped,
            duration_secs = report.duration_secs(),
            "Query finished"
        );

        // The accumulator (and with it the line sender) drops here, closing
        // the handle's channel.
        Ok(report)
    }

    async fn search(&self) -> Result<Vec<BugId>, PipelineError> {
        let body = self
            .driver
            .source
            .fetch_json(&self.query)
            .await
            .map_err(PipelineError::Search)?;

        let response: SearchResponse = serde_json::from_value(body)
            .map_err(|e| PipelineError::Search(FetchError::parse("search result", e)))?;

        Ok(response.bugs.into_iter().map(|bug| bug.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    struct EmptySearch;

    #[async_trait]
    impl BugSource for EmptySearch {
        async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, FetchError> {
            if url.contains("search") {
                Ok(json!({"bugs": []}))
            } else {
                Err(FetchError::NotFound(url.to_string()))
            }
        }
    }

    async fn driver(dir: &TempDir, source: Arc<dyn BugSource>) -> PipelineDriver {
        let writer = DatasetWriter::open_append(dir.path().join("out.ds"))
            .await
            .expect("writer");
        PipelineDriver::new(
            source,
            BugzillaEndpoints::new("http://bz.test/rest"),
            FetchQueueConfig::default(),
            Arc::new(writer),
        )
    }

    #[tokio::test]
    async fn test_empty_search_produces_empty_report() {
        let dir = TempDir::new().expect("tempdir");
        let driver = driver(&dir, Arc::new(EmptySearch)).await;

        let (lines, report) = driver
            .start("http://bz.test/rest/search", 1)
            .collect()
            .await
            .expect("run");

        assert!(lines.is_empty());
        assert_eq!(report.bugs_found, 0);
        assert_eq!(report.jobs_enqueued, 0);
        assert_eq!(report.label, 1);
        assert!(report.incomplete.is_empty());
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test]
    async fn test_search_failure_surfaces_on_wait() {
        let dir = TempDir::new().expect("tempdir");
        let driver = driver(&dir, Arc::new(EmptySearch)).await;

        let err = driver
            .start("http://bz.test/rest/elsewhere", 0)
            .wait()
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Search(FetchError::NotFound(_))));
    }

    #[test]
    fn test_report_serializes() {
        let now = Utc::now();
        let report = PipelineReport {
            query: "q".to_string(),
            label: 0,
            bugs_found: 1,
            jobs_enqueued: 2,
            jobs_completed: 1,
            jobs_dropped: 1,
            lines_emitted: 0,
            write_failures: 0,
            average_job_ms: 12,
            incomplete: vec![BugId::new(7)],
            started_at: now,
            finished_at: now,
        };
        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["incomplete"], json!([7]));
        assert_eq!(value["jobs_dropped"], 1);
        assert_eq!(value["average_job_ms"], 12);
        assert!(report.duration_secs().abs() < f64::EPSILON);
    }
}
