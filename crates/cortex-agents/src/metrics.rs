//! Non-blocking metric emission.
//!
//! The sink hands samples to a writer task through a bounded channel.
//! The hot path never waits: on backpressure the sample is dropped and
//! a counter incremented.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cortex_core::models::metric::MetricSample;
use cortex_core::repository::MetricRepository;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Clone)]
pub struct MetricSink {
    tx: mpsc::Sender<MetricSample>,
    dropped: Arc<AtomicU64>,
}

impl MetricSink {
    /// Emit a sample without blocking. Dropped on backpressure.
    pub fn emit(&self, sample: MetricSample) {
        if self.tx.try_send(sample).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Samples dropped due to backpressure since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Start the writer task draining the sink into the repository.
pub fn spawn_metric_writer<M>(
    repo: M,
    capacity: usize,
    shutdown: CancellationToken,
) -> (MetricSink, JoinHandle<()>)
where
    M: MetricRepository + 'static,
{
    let (tx, mut rx) = mpsc::channel::<MetricSample>(capacity);
    let sink = MetricSink {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                sample = rx.recv() => match sample {
                    Some(sample) => {
                        if let Err(e) = repo.append(sample).await {
                            warn!(error = %e, "failed to persist metric sample");
                        }
                    }
                    None => break,
                },
                _ = shutdown.cancelled() => {
                    // Drain whatever is already buffered, then stop.
                    while let Ok(sample) = rx.try_recv() {
                        if let Err(e) = repo.append(sample).await {
                            warn!(error = %e, "failed to persist metric sample");
                        }
                    }
                    break;
                }
            }
        }
    });

    (sink, handle)
}
