//! Best-effort activity recording.
//!
//! Writers hand entries to a bounded queue and move on; a background
//! task appends them to the activity log. A full queue or a failed
//! append never reaches the caller. Both are logged and counted so
//! `/system-status` can report them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use storegate_core::models::activity::CreateActivityLogEntry;
use storegate_core::repository::ActivityLogRepository;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Default queue depth.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

enum Command {
    Record(Box<CreateActivityLogEntry>),
    Flush(oneshot::Sender<()>),
}

#[derive(Default)]
struct Counters {
    recorded: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time recorder counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecorderStats {
    /// Entries appended to the activity log.
    pub recorded: u64,
    /// Entries the datastore rejected.
    pub failed: u64,
    /// Entries discarded because the queue was full or closed.
    pub dropped: u64,
}

/// Cloneable handle to the activity recording worker.
#[derive(Clone)]
pub struct ActivityRecorder {
    tx: mpsc::Sender<Command>,
    counters: Arc<Counters>,
}

impl ActivityRecorder {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// The worker stops once every handle has been dropped and the
    /// queue is drained.
    pub fn spawn<A>(repo: A, capacity: usize) -> Self
    where
        A: ActivityLogRepository + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        tokio::spawn(run_worker(repo, rx, Arc::clone(&counters)));
        Self { tx, counters }
    }

    /// Queue an entry. Never blocks and never fails the caller.
    pub fn record(&self, entry: CreateActivityLogEntry) {
        if let Err(err) = self.tx.try_send(Command::Record(Box::new(entry))) {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            let (reason, entry) = match err {
                mpsc::error::TrySendError::Full(Command::Record(e)) => ("queue full", Some(e)),
                mpsc::error::TrySendError::Closed(Command::Record(e)) => {
                    ("recorder stopped", Some(e))
                }
                _ => ("recorder stopped", None),
            };
            warn!(
                reason,
                action = entry.as_ref().map(|e| e.action.as_str()),
                "Activity log entry dropped"
            );
        }
    }

    /// Wait until every entry queued before this call has been
    /// processed.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            recorded: self.counters.recorded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn run_worker<A: ActivityLogRepository>(
    repo: A,
    mut rx: mpsc::Receiver<Command>,
    counters: Arc<Counters>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Record(entry) => {
                let action = entry.action.clone();
                match repo.append(*entry).await {
                    Ok(stored) => {
                        counters.recorded.fetch_add(1, Ordering::Relaxed);
                        debug!(entry_id = %stored.id, %action, "Activity recorded");
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %e, %action, "Failed to append activity log entry");
                    }
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Activity recorder stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use storegate_core::error::{GateError, GateResult};
    use storegate_core::models::activity::ActivityLogEntry;
    use storegate_core::repository::{ActivityLogFilter, PaginatedResult, Pagination};
    use uuid::Uuid;

    use super::*;

    #[derive(Clone, Default)]
    struct MemoryLog {
        entries: Arc<Mutex<Vec<CreateActivityLogEntry>>>,
        fail: bool,
    }

    impl ActivityLogRepository for MemoryLog {
        async fn append(&self, input: CreateActivityLogEntry) -> GateResult<ActivityLogEntry> {
            if self.fail {
                return Err(GateError::Transient("datastore offline".into()));
            }
            self.entries.lock().unwrap().push(input.clone());
            Ok(ActivityLogEntry {
                id: Uuid::new_v4(),
                principal_id: input.principal_id,
                action: input.action,
                resource_type: input.resource_type,
                resource_id: input.resource_id,
                details: input.details,
                ip_address: input.ip_address,
                user_agent: input.user_agent,
                created_at: chrono::Utc::now(),
            })
        }

        async fn list(
            &self,
            _filter: ActivityLogFilter,
            pagination: Pagination,
        ) -> GateResult<PaginatedResult<ActivityLogEntry>> {
            Ok(PaginatedResult {
                items: vec![],
                total: 0,
                offset: pagination.offset,
                limit: pagination.limit,
            })
        }
    }

    #[tokio::test]
    async fn entries_are_appended_in_order() {
        let log = MemoryLog::default();
        let recorder = ActivityRecorder::spawn(log.clone(), 16);

        recorder.record(CreateActivityLogEntry::new(None, "FIRST", "TEST"));
        recorder.record(CreateActivityLogEntry::new(None, "SECOND", "TEST"));
        recorder.flush().await;

        let actions: Vec<String> = log
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.action.clone())
            .collect();
        assert_eq!(actions, vec!["FIRST", "SECOND"]);
        assert_eq!(
            recorder.stats(),
            RecorderStats {
                recorded: 2,
                failed: 0,
                dropped: 0
            }
        );
    }

    #[tokio::test]
    async fn append_failures_are_counted_not_raised() {
        let log = MemoryLog {
            fail: true,
            ..Default::default()
        };
        let recorder = ActivityRecorder::spawn(log, 16);

        recorder.record(CreateActivityLogEntry::new(None, "LOST", "TEST"));
        recorder.flush().await;

        let stats = recorder.stats();
        assert_eq!(stats.recorded, 0);
        assert_eq!(stats.failed, 1);
    }
}
