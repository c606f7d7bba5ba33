//! Mean/variance standardization over aligned feature matrices

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::table::FeatureMatrix;

/// Standard deviation substituted for zero-variance columns. A constant
/// training column would otherwise divide by zero at inference; with the
/// substitute its scaled value is simply `x - mean`, so the column contributes
/// a bounded (usually zero) signal downstream.
const MIN_STD: f64 = 1.0;

/// Per-column affine transform `(x - mean) / std`, fit once at training time
/// and applied unchanged at inference time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
    fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute per-column mean and (population) standard deviation.
    pub fn fit(&mut self, matrix: &FeatureMatrix) {
        let cols = matrix.num_columns();
        let n = matrix.num_rows() as f64;
        let mut means = vec![0.0; cols];
        let mut stds = vec![MIN_STD; cols];

        if n > 0.0 {
            for row in &matrix.rows {
                for (i, value) in row.iter().enumerate() {
                    means[i] += value;
                }
            }
            for mean in means.iter_mut() {
                *mean /= n;
            }
            let mut variances = vec![0.0; cols];
            for row in &matrix.rows {
                for (i, value) in row.iter().enumerate() {
                    variances[i] += (value - means[i]).powi(2);
                }
            }
            for (i, variance) in variances.iter().enumerate() {
                let std = (variance / n).sqrt();
                stds[i] = if std > f64::EPSILON { std } else { MIN_STD };
            }
        }

        self.means = means;
        self.stds = stds;
        self.fitted = true;
    }

    /// Apply the stored transform. Fails with `ScalerNotFitted` before `fit`,
    /// and with `DataQuality` on a column-count mismatch.
    pub fn transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        if !self.fitted {
            return Err(PipelineError::ScalerNotFitted);
        }
        if matrix.num_columns() != self.means.len() {
            return Err(PipelineError::DataQuality(format!(
                "scaler fitted on {} columns, input has {}",
                self.means.len(),
                matrix.num_columns()
            )));
        }

        let rows = matrix
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, value)| (value - self.means[i]) / self.stds[i])
                    .collect()
            })
            .collect();
        Ok(FeatureMatrix {
            columns: matrix.columns.clone(),
            rows,
        })
    }

    pub fn fit_transform(&mut self, matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        self.fit(matrix);
        self.transform(matrix)
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }
}
