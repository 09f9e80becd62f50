//! Shared per-run accumulator of bug records.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::record::{BugRecord, SlotUpdate};
use crate::bugzilla::BugId;
use crate::error::DatasetError;
use crate::export::{DatasetLine, DatasetWriter};
use crate::metrics;

/// Owns the mapping from bug to partial record for one pipeline run.
///
/// Fetch jobs never touch records directly: they hand their slot updates to
/// [`Accumulator::merge`] and then ask for [`Accumulator::try_emit`]. Records
/// are created lazily on first update and live until the accumulator is dropped.
pub struct Accumulator {
    label: i32,
    records: Mutex<HashMap<BugId, BugRecord>>,
    writer: Arc<DatasetWriter>,
    emitted_tx: Option<mpsc::UnboundedSender<DatasetLine>>,
    emitted: AtomicUsize,
    write_failures: AtomicUsize,
}

impl Accumulator {
    /// Create an accumulator that writes completed records with `label`.
    pub fn new(label: i32, writer: Arc<DatasetWriter>) -> Self {
        Self {
            label,
            records: Mutex::new(HashMap::new()),
            writer,
            emitted_tx: None,
            emitted: AtomicUsize::new(0),
            write_failures: AtomicUsize::new(0),
        }
    }

    /// Also publish every emitted line on `tx`.
    pub fn with_emitted_channel(mut self, tx: mpsc::UnboundedSender<DatasetLine>) -> Self {
        self.emitted_tx = Some(tx);
        self
    }

    /// Set the given slots on the record for `bug_id`, creating it if absent.
    pub async fn merge(&self, bug_id: BugId, updates: impl IntoIterator<Item = SlotUpdate>) {
        let mut records = self.records.lock().await;
        let record = records.entry(bug_id).or_default();
        for update in updates {
            record.set(update);
        }
        debug!(bug_id = %bug_id, filled = record.filled(), "Merged slot updates");
    }

    /// Whether all nine slots of `bug_id` are set.
    pub async fn is_complete(&self, bug_id: BugId) -> bool {
        self.records
            .lock()
            .await
            .get(&bug_id)
            .is_some_and(BugRecord::is_complete)
    }

    /// Write the record for `bug_id` if it is complete and not yet written.
    ///
    /// Safe to call after every merge and from any job: the record is claimed
    /// under the lock, so at most one caller ever appends its line. Returns the
    /// line when this call emitted it.
    pub async fn try_emit(&self, bug_id: BugId) -> Result<Option<DatasetLine>, DatasetError> {
        let line = {
            let mut records = self.records.lock().await;
            match records.get_mut(&bug_id) {
                Some(record) if !record.is_written() => match record.features() {
                    Some(features) => {
                        record.mark_written();
                        DatasetLine::new(self.label, features, bug_id)
                    }
                    None => return Ok(None),
                },
                _ => return Ok(None),
            }
        };

        if let Err(e) = self.writer.append(&line).await {
            self.write_failures.fetch_add(1, Ordering::SeqCst);
            metrics::record_write_failure();
            warn!(bug_id = %bug_id, error = %e, "Failed to append dataset line");
            return Err(e);
        }

        self.emitted.fetch_add(1, Ordering::SeqCst);
        metrics::record_line_emitted(self.label);
        info!(
            bug_id = %bug_id,
            label = self.label,
            path = %self.writer.path().display(),
            "Wrote dataset line"
        );

        if let Some(ref tx) = self.emitted_tx {
            // Receiver may be gone; the line is already on disk.
            let _ = tx.send(line.clone());
        }

        Ok(Some(line))
    }

    /// A copy of the current record for `bug_id`.
    pub async fn record(&self, bug_id: BugId) -> Option<BugRecord> {
        self.records.lock().await.get(&bug_id).cloned()
    }

    /// Which of `bug_ids` never received all nine features, sorted.
    ///
    /// A bug with no record at all (every job for it failed) counts as
    /// incomplete.
    pub async fn incomplete_of(&self, bug_ids: &[BugId]) -> Vec<BugId> {
        let records = self.records.lock().await;
        let mut ids: Vec<BugId> = bug_ids
            .iter()
            .filter(|id| !records.get(*id).is_some_and(BugRecord::is_complete))
            .copied()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Number of records created so far.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }

    pub fn write_failures(&self) -> usize {
        self.write_failures.load(Ordering::SeqCst)
    }
}
