use crate::engine::dispatcher::{dispatch, BatchOutcome};
use crate::engine::exchange::Endpoint;
use crate::matrix::{MatrixError, ThroughputMatrix};
use bytes::Bytes;
use std::sync::Arc;
use surge_common::{
    validate_axes, validate_command_names, CommandConfig, ConfigError, SweepConfig,
    ThroughputBasis,
};
use thiserror::Error;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Elapsed times below this are treated as this, so a batch that finished
/// faster than the clock can resolve still yields a finite throughput.
const MIN_ELAPSED_SECS: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid sweep parameters: {0}")]
    Config(#[from] ConfigError),
    #[error("sweep cancelled after {completed} of {total} batches")]
    Cancelled { completed: usize, total: usize },
    #[error("failed to record throughput: {0}")]
    Matrix(#[from] MatrixError),
    #[error("matrix for '{0}' is incomplete after the sweep")]
    Incomplete(String),
    #[error("sweep controller has already run")]
    AlreadyRun,
}

/// A named command payload. The payload is reference counted, so handing a
/// copy to every exchange of a batch does not copy the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub name: String,
    pub payload: Bytes,
}

impl CommandTemplate {
    pub fn new(name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

impl From<&CommandConfig> for CommandTemplate {
    fn from(cmd: &CommandConfig) -> Self {
        Self::new(cmd.name.clone(), cmd.payload())
    }
}

#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub volumes: Vec<u64>,
    pub concurrency_levels: Vec<usize>,
    pub templates: Vec<CommandTemplate>,
    pub exchange_timeout: Option<Duration>,
    pub basis: ThroughputBasis,
}

impl SweepPlan {
    pub fn from_config(config: &SweepConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            volumes: config.volumes.clone(),
            concurrency_levels: config.concurrency_levels.clone(),
            templates: config.commands.iter().map(CommandTemplate::from).collect(),
            exchange_timeout: config.exchange_timeout_ms.map(Duration::from_millis),
            basis: config.throughput_basis,
        })
    }

    /// Number of batches a complete sweep dispatches.
    pub fn total_batches(&self) -> usize {
        self.volumes.len() * self.concurrency_levels.len() * self.templates.len()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_axes(&self.volumes, &self.concurrency_levels)?;
        if self.exchange_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroTimeout);
        }
        validate_command_names(self.templates.iter().map(|t| t.name.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    Sweeping {
        concurrency_index: usize,
        volume_index: usize,
        template_index: usize,
    },
    Complete,
    Cancelled,
}

/// One visited (command, volume, concurrency) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRecord {
    pub command: String,
    pub volume: u64,
    pub concurrency: usize,
    pub outcome: BatchOutcome,
    pub throughput: f64,
}

#[derive(Debug, Clone)]
pub struct SweepResults {
    pub endpoint: Endpoint,
    pub basis: ThroughputBasis,
    /// One matrix per command, in template order.
    pub matrices: Vec<ThroughputMatrix>,
    /// Every cell in visiting order.
    pub cells: Vec<CellRecord>,
}

impl SweepResults {
    pub fn matrix(&self, command: &str) -> Option<&ThroughputMatrix> {
        self.matrices.iter().find(|m| m.command() == command)
    }

    pub fn total_failures(&self) -> usize {
        self.cells.iter().map(|c| c.outcome.failed).sum()
    }
}

/// Requests per second for one batch.
///
/// With [`ThroughputBasis::Configured`] the numerator is the configured
/// volume whether or not the exchanges succeeded, so a batch of fast
/// failures reports a high number. [`ThroughputBasis::Completed`] scales the
/// volume by the fraction of exchanges that succeeded.
pub fn throughput(volume: u64, outcome: &BatchOutcome, basis: ThroughputBasis) -> f64 {
    let secs = outcome.elapsed.as_secs_f64().max(MIN_ELAPSED_SECS);
    let numerator = match basis {
        ThroughputBasis::Configured => volume as f64,
        ThroughputBasis::Completed if outcome.launched == 0 => 0.0,
        ThroughputBasis::Completed => {
            volume as f64 * outcome.succeeded as f64 / outcome.launched as f64
        }
    };
    numerator / secs
}

/// Drives the concurrency × volume × command sweep against one endpoint.
///
/// Concurrency levels form the outer loop and volumes the inner loop; each
/// cell dispatches one batch per command, in template order. Matrices are
/// only touched here, after a batch has fully joined.
pub struct SweepController {
    endpoint: Arc<Endpoint>,
    plan: SweepPlan,
    cancel: CancellationToken,
    state: SweepState,
}

impl SweepController {
    pub fn new(endpoint: Endpoint, plan: SweepPlan, cancel: CancellationToken) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
            plan,
            cancel,
            state: SweepState::Idle,
        }
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    pub async fn run(&mut self) -> Result<SweepResults, SweepError> {
        if self.state != SweepState::Idle {
            return Err(SweepError::AlreadyRun);
        }
        self.plan.validate()?;

        let mut matrices: Vec<ThroughputMatrix> = self
            .plan
            .templates
            .iter()
            .map(|t| {
                ThroughputMatrix::new(
                    t.name.clone(),
                    &self.plan.volumes,
                    &self.plan.concurrency_levels,
                )
            })
            .collect();
        let total = self.plan.total_batches();
        let mut cells = Vec::with_capacity(total);

        info!(
            target_addr = %self.endpoint,
            total_batches = total,
            basis = ?self.plan.basis,
            "Sweep started"
        );

        for (concurrency_index, &concurrency) in self.plan.concurrency_levels.iter().enumerate() {
            for (volume_index, &volume) in self.plan.volumes.iter().enumerate() {
                for (template_index, template) in self.plan.templates.iter().enumerate() {
                    if self.cancel.is_cancelled() {
                        self.state = SweepState::Cancelled;
                        return Err(SweepError::Cancelled {
                            completed: cells.len(),
                            total,
                        });
                    }
                    self.state = SweepState::Sweeping {
                        concurrency_index,
                        volume_index,
                        template_index,
                    };

                    let outcome = dispatch(
                        Arc::clone(&self.endpoint),
                        template.payload.clone(),
                        concurrency,
                        self.plan.exchange_timeout,
                        &self.cancel,
                    )
                    .await;

                    // a batch interrupted by cancellation is not a measurement
                    if self.cancel.is_cancelled() {
                        self.state = SweepState::Cancelled;
                        return Err(SweepError::Cancelled {
                            completed: cells.len(),
                            total,
                        });
                    }

                    let value = throughput(volume, &outcome, self.plan.basis);
                    matrices[template_index].record(volume, concurrency, value)?;

                    crate::metrics::record_cell(&template.name, value);

                    if outcome.failed > 0 {
                        warn!(
                            command = %template.name,
                            volume,
                            concurrency,
                            failed = outcome.failed,
                            launched = outcome.launched,
                            "Batch finished with failed exchanges"
                        );
                    }
                    info!(
                        command = %template.name,
                        volume,
                        concurrency,
                        elapsed_ms = outcome.elapsed.as_secs_f64() * 1000.0,
                        throughput = value,
                        progress = %format!("{}/{}", cells.len() + 1, total),
                        "Cell recorded"
                    );

                    cells.push(CellRecord {
                        command: template.name.clone(),
                        volume,
                        concurrency,
                        outcome,
                        throughput: value,
                    });
                }
            }
        }

        if let Some(m) = matrices.iter().find(|m| !m.is_complete()) {
            return Err(SweepError::Incomplete(m.command().to_string()));
        }

        self.state = SweepState::Complete;
        info!(
            target_addr = %self.endpoint,
            batches = cells.len(),
            "Sweep complete"
        );

        Ok(SweepResults {
            endpoint: self.endpoint.as_ref().clone(),
            basis: self.plan.basis,
            matrices,
            cells,
        })
    }
}

/// Runs a complete sweep and returns the filled matrices.
pub async fn run_sweep(
    endpoint: Endpoint,
    plan: SweepPlan,
    cancel: CancellationToken,
) -> Result<SweepResults, SweepError> {
    SweepController::new(endpoint, plan, cancel).run().await
}
