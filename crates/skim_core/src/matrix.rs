//! Dense zone-to-zone skim matrix.
//!
//! Square, row-major, indexed by zone id on both axes through an id→index
//! map (ids need not be contiguous). Values are travel times in minutes.
//! Not assumed symmetric. Cells start out as a distinguished "unset" marker
//! ([`SkimMatrix::UNSET`], NaN) rather than literal zero, so a genuinely
//! zero-minute measurement can never be mistaken for "unresolved".

use std::collections::HashMap;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::SkimError;
use crate::zones::ZoneId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkimMatrix {
    ids: Vec<ZoneId>,
    index_of: HashMap<ZoneId, usize>,
    /// Row-major `n * n` values in minutes; row = origin, column = destination.
    values: Vec<f32>,
}

impl SkimMatrix {
    /// Marker for a cell no search has resolved yet.
    pub const UNSET: f32 = f32::NAN;

    pub fn new(ids: Vec<ZoneId>) -> Self {
        let n = ids.len();
        let index_of = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        Self {
            ids,
            index_of,
            values: vec![Self::UNSET; n * n],
        }
    }

    pub fn is_unset(value: f32) -> bool {
        value.is_nan()
    }

    /// Number of zones on each axis.
    pub fn zone_count(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[ZoneId] {
        &self.ids
    }

    pub fn index_of(&self, id: ZoneId) -> Option<usize> {
        self.index_of.get(&id).copied()
    }

    /// Travel time in minutes, `None` for unknown zone ids. The value itself
    /// may still be [`SkimMatrix::UNSET`] before imputation has run.
    pub fn get(&self, origin: ZoneId, destination: ZoneId) -> Option<f32> {
        let i = self.index_of(origin)?;
        let j = self.index_of(destination)?;
        Some(self.get_by_index(i, j))
    }

    pub fn get_by_index(&self, origin: usize, destination: usize) -> f32 {
        self.values[origin * self.ids.len() + destination]
    }

    pub fn set_by_index(&mut self, origin: usize, destination: usize, minutes: f32) {
        let n = self.ids.len();
        self.values[origin * n + destination] = minutes;
    }

    pub fn row(&self, origin: usize) -> &[f32] {
        let n = self.ids.len();
        &self.values[origin * n..(origin + 1) * n]
    }

    /// Full backing slice, used by the parallel phase to hand out disjoint
    /// row chunks. The matrix is pre-sized; workers never resize.
    pub(crate) fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Multiply every resolved cell by `factor`, leaving unset cells alone.
    pub fn scale(&mut self, factor: f32) {
        for value in &mut self.values {
            if !value.is_nan() {
                *value *= factor;
            }
        }
    }

    /// Bitwise equality including unset cells; the determinism and
    /// thread-invariance guarantees are stated in these terms.
    pub fn bit_identical(&self, other: &SkimMatrix) -> bool {
        self.ids == other.ids
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }

    /// CSV export: header row of destination ids, one record per origin.
    /// Unset cells are written as empty fields.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), SkimError> {
        let mut csv = csv::Writer::from_writer(writer);
        let mut header = vec!["origin".to_string()];
        header.extend(self.ids.iter().map(|id| id.to_string()));
        csv.write_record(&header)
            .map_err(|e| SkimError::Persist(e.to_string()))?;

        for (i, id) in self.ids.iter().enumerate() {
            let mut record = vec![id.to_string()];
            record.extend(self.row(i).iter().map(|&v| {
                if Self::is_unset(v) {
                    String::new()
                } else {
                    v.to_string()
                }
            }));
            csv.write_record(&record)
                .map_err(|e| SkimError::Persist(e.to_string()))?;
        }
        csv.flush()?;
        Ok(())
    }
}

/// Binary matrix container for caching finished skims between runs.
#[cfg(feature = "persist")]
pub mod container {
    use std::fs;
    use std::path::Path;

    use super::SkimMatrix;
    use crate::error::SkimError;

    pub fn save(matrix: &SkimMatrix, path: impl AsRef<Path>) -> Result<(), SkimError> {
        let data = bincode::serialize(matrix).map_err(|e| SkimError::Persist(e.to_string()))?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<SkimMatrix, SkimError> {
        let data = fs::read(path)?;
        bincode::deserialize(&data).map_err(|e| SkimError::Persist(e.to_string()))
    }
}
