pub mod engine;
pub mod matrix;
pub mod metrics;
pub mod report;

pub use engine::dispatcher::{dispatch, BatchOutcome};
pub use engine::exchange::{execute, Endpoint, ExchangeError, IN_FLIGHT_EXCHANGES};
pub use engine::sweep::{
    run_sweep, throughput, CellRecord, CommandTemplate, SweepController, SweepError, SweepPlan,
    SweepResults, SweepState,
};
pub use matrix::{MatrixError, ThroughputMatrix};
