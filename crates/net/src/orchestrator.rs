//! Bounded-concurrency scheduling of blob downloads

use futures::stream::{FuturesUnordered, StreamExt};
use layerpull_config::clamp_concurrency;
use layerpull_errors::Error;
use layerpull_events::ProgressAggregator;
use layerpull_types::{BlobDescriptor, VerifiedBlobFile};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Something that can turn a descriptor into a verified file
pub trait BlobFetcher: Send + Sync + 'static {
    /// Fetch one blob; `cancel` fires when the batch is abandoned
    fn fetch(
        &self,
        descriptor: BlobDescriptor,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<VerifiedBlobFile, Error>> + Send;
}

/// Runs one fetch per distinct digest with at most `concurrency` in flight
pub struct Orchestrator<F> {
    fetcher: Arc<F>,
    concurrency: usize,
    progress: Option<Arc<ProgressAggregator>>,
}

impl<F: BlobFetcher> Orchestrator<F> {
    #[must_use]
    pub fn new(fetcher: F, concurrency: usize) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            concurrency: clamp_concurrency(concurrency),
            progress: None,
        }
    }

    /// Report batch size to a progress aggregator
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<ProgressAggregator>) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Download every blob and return the files in descriptor order.
    ///
    /// The first terminal error stops blobs that have not started yet and is
    /// returned; blobs already streaming are left to finish on their own.
    ///
    /// # Errors
    ///
    /// Returns the first blob error, or `Error::Cancelled` as soon as
    /// `cancel` fires.
    pub async fn run(
        &self,
        descriptors: &[BlobDescriptor],
        cancel: &CancellationToken,
    ) -> Result<Vec<VerifiedBlobFile>, Error> {
        let mut seen = HashSet::new();
        let unique: Vec<BlobDescriptor> = descriptors
            .iter()
            .filter(|d| seen.insert(d.digest.clone()))
            .cloned()
            .collect();

        if let Some(progress) = &self.progress {
            progress.begin_batch(unique.len());
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let batch = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = FuturesUnordered::new();
        let total = unique.len();

        for (index, descriptor) in unique.into_iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let batch = batch.clone();

            tasks.push(tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    () = batch.cancelled() => return (index, Err(Error::Cancelled)),
                    permit = semaphore.acquire_owned() => permit,
                };
                let Ok(_permit) = permit else {
                    return (index, Err(Error::Cancelled));
                };
                if batch.is_cancelled() {
                    return (index, Err(Error::Cancelled));
                }
                (index, fetcher.fetch(descriptor, batch).await)
            }));
        }

        let mut results: Vec<Option<VerifiedBlobFile>> = vec![None; total];
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    batch.cancel();
                    return Err(Error::Cancelled);
                }
                next = tasks.next() => next,
            };
            let Some(joined) = next else { break };

            match joined {
                Ok((index, Ok(file))) => results[index] = Some(file),
                Ok((_, Err(error))) => {
                    batch.cancel();
                    if cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    tracing::debug!(error = %error, "blob failed, abandoning batch");
                    return Err(error);
                }
                Err(join_error) => {
                    batch.cancel();
                    return Err(Error::internal(format!("blob task failed: {join_error}")));
                }
            }
        }

        results
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::internal("blob task finished without a result"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerpull_types::{Digest, DigestAlgorithm};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn descriptor(n: usize) -> BlobDescriptor {
        BlobDescriptor::new(Digest::new(DigestAlgorithm::Sha256, format!("{n:064x}")).unwrap())
    }

    #[derive(Default)]
    struct CountingFetcher {
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl BlobFetcher for CountingFetcher {
        async fn fetch(
            &self,
            descriptor: BlobDescriptor,
            _cancel: CancellationToken,
        ) -> Result<VerifiedBlobFile, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            // later digests finish first
            let n = u64::from_str_radix(descriptor.digest.hex(), 16).unwrap();
            tokio::time::sleep(Duration::from_millis(5 * (10 - n % 10))).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(VerifiedBlobFile {
                path: PathBuf::from(descriptor.digest.hex()),
                digest: descriptor.digest,
                size: 0,
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn respects_concurrency_and_keeps_order() {
        let orchestrator = Orchestrator::new(CountingFetcher::default(), 3);
        let descriptors: Vec<_> = (0..10).map(descriptor).collect();

        let files = orchestrator
            .run(&descriptors, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(files.len(), 10);
        for (file, descriptor) in files.iter().zip(&descriptors) {
            assert_eq!(file.digest, descriptor.digest);
        }
        assert!(orchestrator.fetcher.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn duplicate_digests_are_fetched_once() {
        let orchestrator = Orchestrator::new(CountingFetcher::default(), 5);
        let descriptors = vec![descriptor(1), descriptor(2), descriptor(1)];

        let files = orchestrator
            .run(&descriptors, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(orchestrator.fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrency_is_clamped() {
        assert_eq!(Orchestrator::new(CountingFetcher::default(), 0).concurrency(), 1);
        assert_eq!(Orchestrator::new(CountingFetcher::default(), 64).concurrency(), 20);
    }
}
