use crate::engine::sweep::SweepResults;
use crate::matrix::ThroughputMatrix;
use serde::Serialize;
use std::fs;
use std::path::Path;
use surge_common::ThroughputBasis;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write results to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize results: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize)]
struct ResultsDocument<'a> {
    endpoint: String,
    throughput_basis: ThroughputBasis,
    commands: Vec<MatrixDocument<'a>>,
    cells: Vec<CellDocument<'a>>,
}

#[derive(Debug, Serialize)]
struct MatrixDocument<'a> {
    command: &'a str,
    volumes: &'a [u64],
    concurrency_levels: &'a [usize],
    /// One entry per volume, values ordered like `concurrency_levels`.
    rows: Vec<&'a [Option<f64>]>,
}

#[derive(Debug, Serialize)]
struct CellDocument<'a> {
    command: &'a str,
    volume: u64,
    concurrency: usize,
    elapsed_secs: f64,
    succeeded: usize,
    failed: usize,
    throughput: f64,
}

fn matrix_document(matrix: &ThroughputMatrix) -> MatrixDocument<'_> {
    MatrixDocument {
        command: matrix.command(),
        volumes: matrix.volumes(),
        concurrency_levels: matrix.concurrency_levels(),
        rows: matrix
            .volumes()
            .iter()
            .filter_map(|&v| matrix.row(v))
            .collect(),
    }
}

pub fn to_yaml(results: &SweepResults) -> Result<String, ReportError> {
    let doc = ResultsDocument {
        endpoint: results.endpoint.to_string(),
        throughput_basis: results.basis,
        commands: results.matrices.iter().map(matrix_document).collect(),
        cells: results
            .cells
            .iter()
            .map(|c| CellDocument {
                command: &c.command,
                volume: c.volume,
                concurrency: c.concurrency,
                elapsed_secs: c.outcome.elapsed.as_secs_f64(),
                succeeded: c.outcome.succeeded,
                failed: c.outcome.failed,
                throughput: c.throughput,
            })
            .collect(),
    };
    Ok(serde_yaml::to_string(&doc)?)
}

/// Writes the YAML results document, creating parent directories as needed.
pub fn write_results(path: impl AsRef<Path>, results: &SweepResults) -> Result<(), ReportError> {
    let path = path.as_ref();
    let io_err = |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    };

    let yaml = to_yaml(results)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, yaml).map_err(io_err)?;

    info!(path = %path.display(), "Results written");
    Ok(())
}

fn title(command: &str) -> String {
    let mut chars = command.chars();
    match chars.next() {
        Some(first) => format!("{}{} Requests", first.to_uppercase(), chars.as_str()),
        None => "Requests".to_string(),
    }
}

/// One titled table per command: requests per second by total requests
/// (rows) and concurrent exchanges (columns).
pub fn render_tables(results: &SweepResults) -> String {
    let mut out = String::new();
    for matrix in &results.matrices {
        out.push_str(&format!(
            "{} (requests per second, {})\n",
            title(matrix.command()),
            results.endpoint
        ));
        out.push_str(&matrix.render_table());
        out.push('\n');
    }
    out
}
