use crate::engine::exchange::{execute, Endpoint};
use bytes::Bytes;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result of one fully joined batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub launched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Wall time from the first launch until the last exchange terminated.
    pub elapsed: Duration,
    /// Duration of the slowest single exchange in the batch.
    pub slowest: Duration,
}

/// Launches `concurrency` exchanges at once and waits for every one of them.
///
/// Each exchange runs as its own task with its own copy of the endpoint and
/// payload handles. Timing stops only after the last task has terminated,
/// whether it succeeded, failed or panicked; failures are counted, never
/// short-circuited.
///
/// `concurrency` must be at least 1; an empty batch has no exchange to time.
pub async fn dispatch(
    endpoint: Arc<Endpoint>,
    payload: Bytes,
    concurrency: usize,
    deadline: Option<Duration>,
    cancel: &CancellationToken,
) -> BatchOutcome {
    debug_assert!(concurrency >= 1, "dispatch requires at least one exchange");
    let mut handles = Vec::with_capacity(concurrency);

    let start = Instant::now();
    for _ in 0..concurrency {
        let endpoint = Arc::clone(&endpoint);
        let payload = payload.clone();
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let began = Instant::now();
            let result = execute(&endpoint, &payload, deadline, &cancel).await;
            (result.is_ok(), began.elapsed())
        }));
    }

    let mut succeeded = 0;
    let mut failed = 0;
    let mut slowest = Duration::ZERO;
    for handle in handles {
        match handle.await {
            Ok((ok, took)) => {
                if ok {
                    succeeded += 1;
                } else {
                    failed += 1;
                }
                slowest = slowest.max(took);
            }
            Err(e) => {
                failed += 1;
                warn!(error = %e, "Exchange task did not finish cleanly");
            }
        }
    }
    let elapsed = start.elapsed();

    crate::metrics::record_batch();
    debug!(
        target_addr = %endpoint,
        concurrency,
        succeeded,
        failed,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "Batch joined"
    );

    BatchOutcome {
        launched: concurrency,
        succeeded,
        failed,
        elapsed,
        slowest,
    }
}
