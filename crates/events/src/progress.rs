//! Batch progress aggregation
//!
//! One mutex guards the whole record and every critical section is a few
//! map operations. Events are built under the lock and sent after it is
//! released.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::{AppEvent, EventEmitter, EventSender, ProgressEvent};

/// Minimum byte delta between updates for blobs of unknown length
const UNKNOWN_LENGTH_STEP: u64 = 1024 * 1024;

#[derive(Debug, Default, Clone)]
struct BlobProgress {
    bytes: u64,
    percent: Option<u8>,
    last_reported_bytes: u64,
    completed: bool,
}

#[derive(Debug)]
struct ProgressRecord {
    completed: usize,
    total: usize,
    start: Instant,
    blobs: HashMap<String, BlobProgress>,
}

/// Point-in-time view of the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

/// Thread-safe counters shared by every blob worker of a pull
#[derive(Debug)]
pub struct ProgressAggregator {
    record: Mutex<ProgressRecord>,
    tx: Option<EventSender>,
}

impl ProgressAggregator {
    #[must_use]
    pub fn new(tx: Option<EventSender>) -> Self {
        Self {
            record: Mutex::new(ProgressRecord {
                completed: 0,
                total: 0,
                start: Instant::now(),
                blobs: HashMap::new(),
            }),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset the counters for a batch of `total` blobs and restart the clock
    pub fn begin_batch(&self, total: usize) {
        {
            let mut record = self.lock();
            record.completed = 0;
            record.total = total;
            record.start = Instant::now();
            record.blobs.clear();
        }
        self.emit(AppEvent::Progress(ProgressEvent::BatchStarted { total }));
    }

    /// Register a blob; calling it again for the same digest is a no-op
    pub fn on_blob_started(&self, digest: &str) {
        let created = {
            let mut record = self.lock();
            if record.blobs.contains_key(digest) {
                false
            } else {
                record
                    .blobs
                    .insert(digest.to_string(), BlobProgress::default());
                true
            }
        };
        if created {
            self.emit(AppEvent::Progress(ProgressEvent::BlobStarted {
                digest: digest.to_string(),
            }));
        }
    }

    /// Record that `bytes_total` bytes of the blob are on disk.
    ///
    /// Returns the percentage in `[0, 100]` when the declared length is
    /// known and non-zero, `None` otherwise.
    pub fn on_blob_bytes_advanced(
        &self,
        digest: &str,
        bytes_total: u64,
        declared_total: Option<u64>,
    ) -> Option<u8> {
        let percent = percentage(bytes_total, declared_total);

        let event = {
            let mut record = self.lock();
            let blob = record.blobs.entry(digest.to_string()).or_default();
            blob.bytes = bytes_total;

            let changed = match percent {
                Some(_) => percent != blob.percent,
                None => {
                    bytes_total < blob.last_reported_bytes
                        || bytes_total - blob.last_reported_bytes >= UNKNOWN_LENGTH_STEP
                }
            };
            blob.percent = percent;
            if changed {
                blob.last_reported_bytes = bytes_total;
                Some(ProgressEvent::BlobAdvanced {
                    digest: digest.to_string(),
                    bytes: bytes_total,
                    percent,
                })
            } else {
                None
            }
        };

        if let Some(event) = event {
            self.emit(AppEvent::Progress(event));
        }
        percent
    }

    /// Reset a blob's record ahead of another attempt
    pub fn on_blob_retrying(&self, digest: &str, attempt: u32, reason: &str) {
        {
            let mut record = self.lock();
            record
                .blobs
                .insert(digest.to_string(), BlobProgress::default());
        }
        self.emit(AppEvent::Progress(ProgressEvent::BlobRetrying {
            digest: digest.to_string(),
            attempt,
            reason: reason.to_string(),
        }));
    }

    /// Mark a blob complete and return the global summary line:
    /// `[Global] <done>/<total> layers | Elapsed: HH:MM:SS`.
    ///
    /// Completing the same digest twice counts it once.
    pub fn on_blob_completed(&self, digest: &str) -> String {
        let (completed, total, elapsed) = {
            let mut record = self.lock();
            let blob = record.blobs.entry(digest.to_string()).or_default();
            let newly_completed = !blob.completed;
            blob.completed = true;
            if let Some(percent) = blob.percent.as_mut() {
                *percent = 100;
            }
            if newly_completed {
                record.completed += 1;
            }
            (record.completed, record.total, record.start.elapsed())
        };

        let summary = format!(
            "[Global] {completed}/{total} layers | Elapsed: {}",
            format_elapsed(elapsed)
        );
        self.emit(AppEvent::Progress(ProgressEvent::BlobCompleted {
            digest: digest.to_string(),
            completed,
            total,
            elapsed,
            summary: summary.clone(),
        }));
        summary
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let record = self.lock();
        ProgressSnapshot {
            completed: record.completed,
            total: record.total,
            elapsed: record.start.elapsed(),
        }
    }

    /// Last known percentage for a blob
    #[must_use]
    pub fn blob_percent(&self, digest: &str) -> Option<u8> {
        self.lock().blobs.get(digest).and_then(|b| b.percent)
    }
}

impl EventEmitter for ProgressAggregator {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

fn percentage(bytes: u64, declared: Option<u64>) -> Option<u8> {
    let total = declared.filter(|t| *t > 0)?;
    let pct = (u128::from(bytes) * 100 / u128::from(total)).min(100);
    u8::try_from(pct).ok()
}

/// Format a duration as `HH:MM:SS` (hours are not wrapped)
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{channel, EventMessage};
    use std::sync::Arc;

    fn drain(rx: &mut crate::EventReceiver) -> Vec<EventMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn percentage_is_clamped_and_optional() {
        assert_eq!(percentage(50, Some(200)), Some(25));
        assert_eq!(percentage(500, Some(200)), Some(100));
        assert_eq!(percentage(10, None), None);
        assert_eq!(percentage(10, Some(0)), None);
    }

    #[test]
    fn elapsed_format() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(3_723)), "01:02:03");
    }

    #[tokio::test]
    async fn started_is_idempotent() {
        let (tx, mut rx) = channel();
        let progress = ProgressAggregator::new(Some(tx));
        progress.begin_batch(2);
        progress.on_blob_started("sha256:a");
        progress.on_blob_started("sha256:a");

        let started = drain(&mut rx)
            .into_iter()
            .filter(|m| {
                matches!(
                    m.event,
                    AppEvent::Progress(ProgressEvent::BlobStarted { .. })
                )
            })
            .count();
        assert_eq!(started, 1);
    }

    #[test]
    fn completion_summary_counts_once() {
        let progress = ProgressAggregator::new(None);
        progress.begin_batch(3);
        progress.on_blob_started("sha256:a");
        let first = progress.on_blob_completed("sha256:a");
        let again = progress.on_blob_completed("sha256:a");
        assert!(first.starts_with("[Global] 1/3 layers | Elapsed: "));
        assert!(again.starts_with("[Global] 1/3 layers"));
        assert_eq!(progress.snapshot().completed, 1);
    }

    #[test]
    fn retry_resets_blob_progress() {
        let progress = ProgressAggregator::new(None);
        progress.on_blob_started("sha256:a");
        assert_eq!(
            progress.on_blob_bytes_advanced("sha256:a", 60, Some(100)),
            Some(60)
        );
        progress.on_blob_retrying("sha256:a", 1, "timeout");
        assert_eq!(progress.blob_percent("sha256:a"), None);
    }

    #[test]
    fn concurrent_completions_are_all_counted() {
        let progress = Arc::new(ProgressAggregator::new(None));
        progress.begin_batch(16);
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let progress = Arc::clone(&progress);
                std::thread::spawn(move || {
                    let digest = format!("sha256:{i}");
                    progress.on_blob_started(&digest);
                    progress.on_blob_bytes_advanced(&digest, 10, Some(10));
                    progress.on_blob_completed(&digest);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(progress.snapshot().completed, 16);
    }
}
