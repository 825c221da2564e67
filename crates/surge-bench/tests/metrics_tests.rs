mod common;

use surge_bench::metrics;
use surge_bench::{execute, Endpoint};
use tokio_util::sync::CancellationToken;

fn failures(kind: &str) -> u64 {
    metrics::EXCHANGE_FAILURES.with_label_values(&[kind]).get()
}

// One test per binary: enabling metrics is process-wide.
#[tokio::test]
async fn test_recording_is_inert_until_enabled() {
    let endpoint: Endpoint = common::unreachable_endpoint().await;
    let token = CancellationToken::new();

    assert!(!metrics::is_enabled());
    let _ = execute(&endpoint, b"SEND a", None, &token).await;
    metrics::record_batch();
    metrics::record_cell("send", 12.5);

    assert_eq!(metrics::EXCHANGES_TOTAL.get(), 0);
    assert_eq!(failures("connect"), 0);
    assert_eq!(metrics::BATCHES_TOTAL.get(), 0);
    assert_eq!(metrics::CELLS_RECORDED.get(), 0);
    assert!(!metrics::render_metrics().contains("surge_exchanges_total"));

    metrics::enable();
    let _ = execute(&endpoint, b"SEND a", None, &token).await;
    metrics::record_batch();
    metrics::record_cell("send", 12.5);

    assert_eq!(metrics::EXCHANGES_TOTAL.get(), 1);
    assert_eq!(failures("connect"), 1);
    assert_eq!(metrics::BATCHES_TOTAL.get(), 1);
    assert_eq!(metrics::CELLS_RECORDED.get(), 1);
    assert_eq!(
        metrics::LAST_THROUGHPUT.with_label_values(&["send"]).get(),
        12.5
    );

    let text = metrics::render_metrics();
    assert!(text.contains("surge_exchanges_total 1"));
    assert!(text.contains("surge_in_flight_exchanges 0"));
}
