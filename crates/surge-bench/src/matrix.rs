//! Throughput tables produced by a sweep.
//!
//! One [`ThroughputMatrix`] exists per command. Rows are volumes and columns
//! are concurrency levels, both in configured order. A cell is written at
//! most once; the matrix refuses overwrites so a sweep that visits a cell
//! twice fails loudly instead of silently replacing a measurement.

use std::fmt::Write;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MatrixError {
    #[error("volume {0} is not a row of this matrix")]
    UnknownVolume(u64),
    #[error("concurrency level {0} is not a column of this matrix")]
    UnknownConcurrency(usize),
    #[error("cell (volume {volume}, concurrency {concurrency}) is already set")]
    AlreadySet { volume: u64, concurrency: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputMatrix {
    command: String,
    volumes: Vec<u64>,
    concurrency_levels: Vec<usize>,
    // row-major, one row per volume
    cells: Vec<Option<f64>>,
}

impl ThroughputMatrix {
    /// Creates a matrix with every cell unset.
    pub fn new(command: impl Into<String>, volumes: &[u64], concurrency_levels: &[usize]) -> Self {
        Self {
            command: command.into(),
            volumes: volumes.to_vec(),
            concurrency_levels: concurrency_levels.to_vec(),
            cells: vec![None; volumes.len() * concurrency_levels.len()],
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn volumes(&self) -> &[u64] {
        &self.volumes
    }

    pub fn concurrency_levels(&self) -> &[usize] {
        &self.concurrency_levels
    }

    fn index(&self, volume: u64, concurrency: usize) -> Result<usize, MatrixError> {
        let row = self
            .volumes
            .iter()
            .position(|&v| v == volume)
            .ok_or(MatrixError::UnknownVolume(volume))?;
        let col = self
            .concurrency_levels
            .iter()
            .position(|&c| c == concurrency)
            .ok_or(MatrixError::UnknownConcurrency(concurrency))?;
        Ok(row * self.concurrency_levels.len() + col)
    }

    pub fn record(&mut self, volume: u64, concurrency: usize, value: f64) -> Result<(), MatrixError> {
        let idx = self.index(volume, concurrency)?;
        let cell = &mut self.cells[idx];
        if cell.is_some() {
            return Err(MatrixError::AlreadySet {
                volume,
                concurrency,
            });
        }
        *cell = Some(value);
        Ok(())
    }

    pub fn get(&self, volume: u64, concurrency: usize) -> Option<f64> {
        self.index(volume, concurrency)
            .ok()
            .and_then(|idx| self.cells[idx])
    }

    /// Total number of cells, set or not.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn populated(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Values for one volume, ordered by concurrency level.
    pub fn row(&self, volume: u64) -> Option<&[Option<f64>]> {
        let row = self.volumes.iter().position(|&v| v == volume)?;
        let width = self.concurrency_levels.len();
        Some(&self.cells[row * width..(row + 1) * width])
    }

    /// Values for one concurrency level, ordered by volume. This is one
    /// curve of the throughput chart.
    pub fn column(&self, concurrency: usize) -> Option<Vec<Option<f64>>> {
        let col = self
            .concurrency_levels
            .iter()
            .position(|&c| c == concurrency)?;
        let width = self.concurrency_levels.len();
        Some(
            (0..self.volumes.len())
                .map(|row| self.cells[row * width + col])
                .collect(),
        )
    }

    /// Fixed-width text table, unset cells shown as `-`.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "{:>10}", "volume");
        for level in &self.concurrency_levels {
            let _ = write!(out, " {:>12}", format!("c={}", level));
        }
        out.push('\n');

        for (row, volume) in self.volumes.iter().enumerate() {
            let _ = write!(out, "{:>10}", volume);
            for col in 0..self.concurrency_levels.len() {
                match self.cells[row * self.concurrency_levels.len() + col] {
                    Some(value) => {
                        let _ = write!(out, " {:>12.2}", value);
                    }
                    None => {
                        let _ = write!(out, " {:>12}", "-");
                    }
                }
            }
            out.push('\n');
        }
        out
    }
}
