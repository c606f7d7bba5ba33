//! Column-oriented feature tables
//!
//! `FeatureTable` holds raw transaction data with missing entries and mixed
//! column types; `FeatureMatrix` is the fully numeric, dense form produced by
//! preprocessing and consumed by the aligner, scaler, and models.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PipelineError, Result};

/// A single named column: numeric or categorical, with per-entry missingness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl Column {
    /// Number of entries in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// New column of the same type with entries taken at `indices`.
    fn gather(&self, indices: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(indices.iter().map(|&i| v[i]).collect()),
            Column::Categorical(v) => {
                Column::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }

    /// String key for a row entry, used for joins. Missing entries yield `None`.
    fn key_at(&self, row: usize) -> Option<String> {
        match self {
            Column::Numeric(v) => v[row].map(|x| {
                // Integer-valued keys render without a fractional part so that
                // "12345" and 12345.0 join up.
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    format!("{}", x as i64)
                } else {
                    format!("{x}")
                }
            }),
            Column::Categorical(v) => v[row].clone(),
        }
    }
}

/// Ordered collection of named columns sharing a common row count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    columns: Vec<(String, Column)>,
    rows: usize,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Append a column. The first column fixes the table's row count.
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.columns.is_empty() {
            self.rows = column.len();
        } else if column.len() != self.rows {
            return Err(PipelineError::DataQuality(format!(
                "column '{}' has {} entries, table has {} rows",
                name,
                column.len(),
                self.rows
            )));
        }
        if self.column(&name).is_some() {
            return Err(PipelineError::DataQuality(format!(
                "duplicate column '{name}'"
            )));
        }
        self.columns.push((name, column));
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Remove and return a column, if present.
    pub fn take_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.columns.iter().position(|(n, _)| n == name)?;
        let (_, column) = self.columns.remove(idx);
        if self.columns.is_empty() {
            self.rows = 0;
        }
        Some(column)
    }

    /// Drop the named columns if present; unknown names are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        self.columns.retain(|(n, _)| !names.contains(&n.as_str()));
        if self.columns.is_empty() {
            self.rows = 0;
        }
    }

    /// New table with rows taken at `indices` (duplicates allowed).
    pub fn select_rows(&self, indices: &[usize]) -> FeatureTable {
        FeatureTable {
            columns: self
                .columns
                .iter()
                .map(|(n, c)| (n.clone(), c.gather(indices)))
                .collect(),
            rows: indices.len(),
        }
    }

    /// Random sample of `fraction` of the rows, without replacement.
    pub fn sample_fraction(&self, fraction: f64, rng: &mut StdRng) -> FeatureTable {
        let fraction = fraction.clamp(0.0, 1.0);
        let keep = ((self.rows as f64) * fraction).round() as usize;
        let mut indices: Vec<usize> = (0..self.rows).collect();
        indices.shuffle(rng);
        indices.truncate(keep);
        indices.sort_unstable();
        self.select_rows(&indices)
    }

    /// Left join on `key`: every row of `self` is kept, matched against the
    /// first occurrence of the key in `other`. Unmatched rows get missing
    /// entries for the joined columns.
    pub fn left_join(&self, other: &FeatureTable, key: &str) -> Result<FeatureTable> {
        let left_key = self.column(key).ok_or_else(|| {
            PipelineError::Dataset(format!("join key '{key}' missing from left table"))
        })?;
        let right_key = other.column(key).ok_or_else(|| {
            PipelineError::Dataset(format!("join key '{key}' missing from right table"))
        })?;

        let mut index: HashMap<String, usize> = HashMap::with_capacity(other.rows);
        for row in 0..other.rows {
            if let Some(k) = right_key.key_at(row) {
                index.entry(k).or_insert(row);
            }
        }

        let matches: Vec<Option<usize>> = (0..self.rows)
            .map(|row| left_key.key_at(row).and_then(|k| index.get(&k).copied()))
            .collect();

        let mut joined = self.clone();
        for (name, column) in other.iter() {
            if name == key || joined.column(name).is_some() {
                continue;
            }
            let gathered = match column {
                Column::Numeric(v) => Column::Numeric(
                    matches.iter().map(|m| m.and_then(|i| v[i])).collect(),
                ),
                Column::Categorical(v) => Column::Categorical(
                    matches
                        .iter()
                        .map(|m| m.and_then(|i| v[i].clone()))
                        .collect(),
                ),
            };
            joined.push_column(name, gathered)?;
        }
        Ok(joined)
    }
}

/// Dense, fully numeric table: output of preprocessing, input to the models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// New matrix with rows taken at `indices`.
    pub fn select_rows(&self, indices: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn numeric(values: &[f64]) -> Column {
        Column::Numeric(values.iter().map(|&v| Some(v)).collect())
    }

    #[test]
    fn test_push_column_row_count_mismatch() {
        let mut table = FeatureTable::new();
        table.push_column("a", numeric(&[1.0, 2.0])).unwrap();
        let err = table.push_column("b", numeric(&[1.0])).unwrap_err();
        assert!(matches!(err, PipelineError::DataQuality(_)));
    }

    #[test]
    fn test_drop_and_take_columns() {
        let mut table = FeatureTable::new();
        table.push_column("a", numeric(&[1.0, 2.0])).unwrap();
        table.push_column("b", numeric(&[3.0, 4.0])).unwrap();

        let taken = table.take_column("a").unwrap();
        assert_eq!(taken.len(), 2);
        assert!(table.column("a").is_none());

        table.drop_columns(&["b", "not_there"]);
        assert_eq!(table.num_columns(), 0);
        assert_eq!(table.num_rows(), 0);
    }

    #[test]
    fn test_sample_fraction() {
        let mut table = FeatureTable::new();
        table
            .push_column("a", numeric(&(0..100).map(|i| i as f64).collect::<Vec<_>>()))
            .unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        let sampled = table.sample_fraction(0.1, &mut rng);
        assert_eq!(sampled.num_rows(), 10);

        // Same seed reproduces the same sample
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(table.sample_fraction(0.1, &mut rng), sampled);
    }

    #[test]
    fn test_left_join() {
        let mut left = FeatureTable::new();
        left.push_column("TransactionID", numeric(&[1.0, 2.0, 3.0]))
            .unwrap();
        left.push_column("TransactionAmt", numeric(&[10.0, 20.0, 30.0]))
            .unwrap();

        let mut right = FeatureTable::new();
        right.push_column("TransactionID", numeric(&[2.0, 3.0])).unwrap();
        right
            .push_column(
                "DeviceType",
                Column::Categorical(vec![Some("mobile".into()), Some("desktop".into())]),
            )
            .unwrap();

        let joined = left.left_join(&right, "TransactionID").unwrap();
        assert_eq!(joined.num_rows(), 3);
        match joined.column("DeviceType").unwrap() {
            Column::Categorical(v) => {
                assert_eq!(v[0], None); // no identity row for id 1
                assert_eq!(v[1].as_deref(), Some("mobile"));
                assert_eq!(v[2].as_deref(), Some("desktop"));
            }
            _ => panic!("expected categorical column"),
        }
    }

    #[test]
    fn test_matrix_select_rows() {
        let matrix = FeatureMatrix {
            columns: vec!["a".into(), "b".into()],
            rows: vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
        };
        let picked = matrix.select_rows(&[2, 0]);
        assert_eq!(picked.rows, vec![vec![5.0, 6.0], vec![1.0, 2.0]]);
        assert_eq!(picked.columns, matrix.columns);
    }
}
