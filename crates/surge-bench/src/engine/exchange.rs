use std::fmt;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub static IN_FLIGHT_EXCHANGES: AtomicUsize = AtomicUsize::new(0);

/// Size of the single response read. Anything the target sends beyond this
/// is left unread and discarded when the connection closes.
pub const RESPONSE_BUFFER_SIZE: usize = 1024;

/// Target service address. Shared read-only by every exchange of a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),
    #[error("payload write failed: {0}")]
    Write(#[source] io::Error),
    #[error("response read failed: {0}")]
    Read(#[source] io::Error),
    #[error("exchange exceeded deadline of {0:?}")]
    Timeout(Duration),
    #[error("exchange cancelled")]
    Cancelled,
}

impl ExchangeError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::Connect(_) => "connect",
            ExchangeError::Write(_) => "write",
            ExchangeError::Read(_) => "read",
            ExchangeError::Timeout(_) => "timeout",
            ExchangeError::Cancelled => "cancelled",
        }
    }
}

struct ExchangeGuard;

impl ExchangeGuard {
    fn new() -> Self {
        IN_FLIGHT_EXCHANGES.fetch_add(1, Ordering::SeqCst);
        Self
    }
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        IN_FLIGHT_EXCHANGES.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Connect, write the whole payload, read once, close.
async fn run_exchange(endpoint: &Endpoint, payload: &[u8]) -> Result<usize, ExchangeError> {
    let mut stream = TcpStream::connect((endpoint.host(), endpoint.port()))
        .await
        .map_err(ExchangeError::Connect)?;

    stream
        .write_all(payload)
        .await
        .map_err(ExchangeError::Write)?;

    let mut response = [0u8; RESPONSE_BUFFER_SIZE];
    let n = stream
        .read(&mut response)
        .await
        .map_err(ExchangeError::Read)?;

    Ok(n)
}

async fn with_deadline<F>(fut: F, deadline: Option<Duration>) -> Result<usize, ExchangeError>
where
    F: Future<Output = Result<usize, ExchangeError>>,
{
    match deadline {
        Some(limit) => match timeout(limit, fut).await {
            Ok(res) => res,
            Err(_) => Err(ExchangeError::Timeout(limit)),
        },
        None => fut.await,
    }
}

/// Performs one request/response exchange over a fresh connection.
///
/// Returns the number of response bytes received by the single bounded read
/// (zero when the target closes without answering). The connection is
/// dropped on every exit path, including timeout and cancellation.
///
/// `deadline` bounds connect, write and read together; `None` leaves the
/// exchange to the operating system's own timeouts.
pub async fn execute(
    endpoint: &Endpoint,
    payload: &[u8],
    deadline: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<usize, ExchangeError> {
    let _guard = ExchangeGuard::new();
    crate::metrics::record_exchange();

    let result = tokio::select! {
        res = with_deadline(run_exchange(endpoint, payload), deadline) => res,
        _ = cancel.cancelled() => Err(ExchangeError::Cancelled),
    };

    match &result {
        Ok(n) => debug!(target_addr = %endpoint, bytes = n, "Exchange completed"),
        Err(e) => {
            crate::metrics::record_failure(e.kind());
            debug!(target_addr = %endpoint, kind = e.kind(), error = %e, "Exchange failed");
        }
    }

    result
}
