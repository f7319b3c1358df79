//! Intrazonal imputation: the final sequential pass over a finished matrix.
//!
//! For each destination column, the k smallest strictly-positive values are
//! averaged, dampened, and written into every still-unset cell of that
//! column. This covers both the true intrazonal diagonal cell and any
//! off-diagonal cell whose search failed to resolve a path; the latter count
//! is reported as a diagnostic, never silently dropped.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::matrix::SkimMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntrazonalFillParameters {
    /// Number of smallest column values averaged (k).
    pub neighbor_count: usize,
    /// Padding value when a column has fewer than k resolved entries.
    pub ceiling_minutes: f64,
    /// Dampening proportion applied to the neighbor mean (p).
    pub dampening: f64,
}

impl Default for IntrazonalFillParameters {
    fn default() -> Self {
        Self {
            neighbor_count: 5,
            ceiling_minutes: 9_999.0,
            dampening: 0.66,
        }
    }
}

pub struct IntrazonalImputer {
    params: IntrazonalFillParameters,
}

impl IntrazonalImputer {
    pub fn new(params: IntrazonalFillParameters) -> Self {
        Self { params }
    }

    /// Fill every unset cell, column by column. Runs sequentially per matrix;
    /// independent matrices may be imputed concurrently with each other.
    /// Returns the number of filled off-diagonal cells (failed searches).
    pub fn impute(&self, matrix: &mut SkimMatrix) -> usize {
        let n = matrix.zone_count();
        let k = self.params.neighbor_count.max(1);
        let mut off_diagonal_fills = 0usize;
        let mut smallest: Vec<f64> = Vec::with_capacity(n);

        for j in 0..n {
            smallest.clear();
            for i in 0..n {
                let value = matrix.get_by_index(i, j);
                if !SkimMatrix::is_unset(value) && value > 0.0 && value.is_finite() {
                    smallest.push(value as f64);
                }
            }
            smallest.sort_by(|a, b| a.total_cmp(b));
            smallest.truncate(k);
            while smallest.len() < k {
                smallest.push(self.params.ceiling_minutes);
            }
            let mean = smallest.iter().sum::<f64>() / k as f64;
            let fill = (mean * self.params.dampening) as f32;

            for i in 0..n {
                if SkimMatrix::is_unset(matrix.get_by_index(i, j)) {
                    matrix.set_by_index(i, j, fill);
                    if i != j {
                        off_diagonal_fills += 1;
                    }
                }
            }
        }

        if off_diagonal_fills > 0 {
            warn!("imputed {off_diagonal_fills} unresolved off-diagonal cell(s)");
        }
        off_diagonal_fills
    }
}
