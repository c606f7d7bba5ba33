//! Feature preprocessing: imputation, one-hot encoding, derived amount feature
//!
//! Imputation statistics and category vocabularies are captured once at
//! training time (`Preprocessor::fit`) and persisted inside the model bundle,
//! so a single transaction scored alone is imputed from the training
//! distribution instead of from its own degenerate one-row statistics.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::table::{Column, FeatureMatrix, FeatureTable};

/// Raw amount column expected in transaction data.
pub const AMOUNT_COLUMN: &str = "TransactionAmt";
/// Derived `ln(1 + amount)` column appended by the preprocessor.
pub const LOG_AMOUNT_COLUMN: &str = "TransactionAmt_log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum ColumnStats {
    Numeric {
        median: f64,
    },
    Categorical {
        /// Most frequent category; ties broken by the lexicographically
        /// smallest value so imputation is deterministic.
        mode: String,
        /// Observed categories, sorted; one indicator column per entry.
        categories: Vec<String>,
    },
    /// Column present at fit time in a zero-row table. Keeps the name so a
    /// zero-row transform round-trips the same unexpanded columns; actual
    /// rows cannot be imputed through it.
    Unobserved,
}

/// Entry point for fitting the preprocessing statistics.
pub struct Preprocessor;

impl Preprocessor {
    /// Compute imputation statistics and category vocabularies over `table`.
    ///
    /// A column whose entries are all missing (or all non-finite) has no
    /// median/mode to impute from and fails with `DataQuality`. A zero-row
    /// table has no statistics to compute; its column names are kept so the
    /// transform round-trips them unexpanded, and imputing actual rows
    /// through such a state fails with `DataQuality`.
    pub fn fit(table: &FeatureTable) -> Result<FittedPreprocessor> {
        let mut stats = Vec::with_capacity(table.num_columns());
        if table.num_rows() == 0 {
            for (name, _) in table.iter() {
                stats.push((name.to_string(), ColumnStats::Unobserved));
            }
            return Ok(FittedPreprocessor { stats });
        }

        for (name, column) in table.iter() {
            match column {
                Column::Numeric(values) => {
                    let mut present: Vec<f64> = values
                        .iter()
                        .filter_map(|v| *v)
                        .filter(|v| v.is_finite())
                        .collect();
                    if present.is_empty() {
                        return Err(PipelineError::DataQuality(format!(
                            "numeric column '{name}' has no observed values to impute from"
                        )));
                    }
                    stats.push((
                        name.to_string(),
                        ColumnStats::Numeric {
                            median: median_of(&mut present),
                        },
                    ));
                }
                Column::Categorical(values) => {
                    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                    for value in values.iter().flatten() {
                        *counts.entry(value.as_str()).or_insert(0) += 1;
                    }
                    if counts.is_empty() {
                        return Err(PipelineError::DataQuality(format!(
                            "categorical column '{name}' has no observed values to impute from"
                        )));
                    }
                    // BTreeMap iterates keys in order; strict > keeps the
                    // smallest key among tied counts.
                    let mut mode = "";
                    let mut best = 0usize;
                    for (value, count) in &counts {
                        if *count > best {
                            best = *count;
                            mode = value;
                        }
                    }
                    let categories: BTreeSet<&str> = counts.keys().copied().collect();
                    stats.push((
                        name.to_string(),
                        ColumnStats::Categorical {
                            mode: mode.to_string(),
                            categories: categories.into_iter().map(str::to_string).collect(),
                        },
                    ));
                }
            }
        }
        Ok(FittedPreprocessor { stats })
    }

    /// Fit on `table` and immediately transform it (training path).
    pub fn fit_transform(table: &FeatureTable) -> Result<(FittedPreprocessor, FeatureMatrix)> {
        let fitted = Self::fit(table)?;
        let matrix = fitted.transform(table)?;
        Ok((fitted, matrix))
    }
}

/// Trained preprocessing state, persisted inside the model bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    stats: Vec<(String, ColumnStats)>,
}

impl FittedPreprocessor {
    /// Produce a fully numeric matrix:
    /// - missing numeric entries imputed with the fitted median,
    /// - missing categorical entries imputed with the fitted mode,
    /// - each categorical column expanded into one indicator per fitted
    ///   category (unseen categories yield all-zero indicators),
    /// - `TransactionAmt_log` appended when the amount column is fitted.
    ///
    /// A fitted column absent from `table` is treated as all-missing. Input
    /// columns unknown to the fitted state are dropped.
    pub fn transform(&self, table: &FeatureTable) -> Result<FeatureMatrix> {
        let n = table.num_rows();
        let mut names: Vec<String> = Vec::new();
        let mut data: Vec<Vec<f64>> = Vec::new();
        let mut log_amount: Option<Vec<f64>> = None;

        // Numeric columns first, then indicator expansions, then the derived
        // amount column; the order only has to be stable between fit-time and
        // serve-time, which a shared fitted state guarantees.
        for (name, stat) in &self.stats {
            match stat {
                ColumnStats::Numeric { median } => {
                    let values = match table.column(name) {
                        Some(Column::Numeric(v)) => v
                            .iter()
                            .map(|x| x.filter(|x| x.is_finite()).unwrap_or(*median))
                            .collect(),
                        Some(Column::Categorical(_)) => {
                            return Err(PipelineError::DataQuality(format!(
                                "column '{name}' was numeric at fit time but is categorical"
                            )));
                        }
                        None => vec![*median; n],
                    };
                    if name == AMOUNT_COLUMN {
                        log_amount = Some(values.iter().map(|a: &f64| a.ln_1p()).collect());
                    }
                    names.push(name.clone());
                    data.push(values);
                }
                ColumnStats::Unobserved => {
                    if n > 0 {
                        return Err(PipelineError::DataQuality(format!(
                            "column '{name}' had no training rows to impute from"
                        )));
                    }
                    names.push(name.clone());
                    data.push(Vec::new());
                }
                ColumnStats::Categorical { .. } => {}
            }
        }

        for (name, stat) in &self.stats {
            if let ColumnStats::Categorical { mode, categories } = stat {
                let values: Vec<&str> = match table.column(name) {
                    Some(Column::Categorical(v)) => v
                        .iter()
                        .map(|x| x.as_deref().unwrap_or(mode.as_str()))
                        .collect(),
                    Some(Column::Numeric(_)) => {
                        return Err(PipelineError::DataQuality(format!(
                            "column '{name}' was categorical at fit time but is numeric"
                        )));
                    }
                    None => vec![mode.as_str(); n],
                };
                for category in categories {
                    names.push(format!("{name}_{category}"));
                    data.push(
                        values
                            .iter()
                            .map(|v| if *v == category { 1.0 } else { 0.0 })
                            .collect(),
                    );
                }
            }
        }

        if let Some(log_values) = log_amount {
            names.push(LOG_AMOUNT_COLUMN.to_string());
            data.push(log_values);
        }

        for name in table.column_names() {
            if !self.stats.iter().any(|(n, _)| n == name) {
                debug!(column = %name, "dropping column unknown to fitted preprocessor");
            }
        }

        // Transpose column-major data into rows.
        let rows = (0..n)
            .map(|i| data.iter().map(|col| col[i]).collect())
            .collect();
        Ok(FeatureMatrix {
            columns: names,
            rows,
        })
    }

    /// Column names the transform will emit, in order.
    pub fn output_columns(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut has_amount = false;
        for (name, stat) in &self.stats {
            match stat {
                ColumnStats::Numeric { .. } => {
                    if name == AMOUNT_COLUMN {
                        has_amount = true;
                    }
                    names.push(name.clone());
                }
                ColumnStats::Unobserved => names.push(name.clone()),
                ColumnStats::Categorical { .. } => {}
            }
        }
        for (name, stat) in &self.stats {
            if let ColumnStats::Categorical { categories, .. } = stat {
                for category in categories {
                    names.push(format!("{name}_{category}"));
                }
            }
        }
        if has_amount {
            names.push(LOG_AMOUNT_COLUMN.to_string());
        }
        names
    }

    /// True when the state carries no usable imputation statistics.
    pub fn is_empty(&self) -> bool {
        self.stats
            .iter()
            .all(|(_, stat)| matches!(stat, ColumnStats::Unobserved))
    }
}

fn median_of(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).expect("non-finite values filtered before sort"));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
