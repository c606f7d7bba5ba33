//! Training dataset loading: CSV parsing, joining, sampling
//!
//! Column types are inferred from the data: a column where every present
//! value parses as a float is numeric, anything else is categorical. Empty
//! cells are missing values.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::table::{Column, FeatureTable};

/// Shared transaction identifier joining the two input tables.
pub const TRANSACTION_ID_COLUMN: &str = "TransactionID";
/// Supervised label column in the transaction table.
pub const LABEL_COLUMN: &str = "isFraud";

/// Read one CSV file into a typed feature table.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<FeatureTable> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .from_path(path)
        .map_err(|e| PipelineError::Dataset(format!("{}: {e}", path.display())))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::Dataset(format!("{}: {e}", path.display())))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record =
            record.map_err(|e| PipelineError::Dataset(format!("{}: {e}", path.display())))?;
        if record.len() != headers.len() {
            return Err(PipelineError::Dataset(format!(
                "{}: row has {} fields, header has {}",
                path.display(),
                record.len(),
                headers.len()
            )));
        }
        for (i, field) in record.iter().enumerate() {
            raw[i].push(if field.is_empty() {
                None
            } else {
                Some(field.to_string())
            });
        }
    }

    let mut table = FeatureTable::new();
    for (name, values) in headers.into_iter().zip(raw) {
        table.push_column(name, infer_column(values))?;
    }

    info!(
        path = %path.display(),
        rows = table.num_rows(),
        columns = table.num_columns(),
        "Loaded CSV dataset"
    );
    Ok(table)
}

fn infer_column(values: Vec<Option<String>>) -> Column {
    let numeric = values
        .iter()
        .flatten()
        .all(|v| v.parse::<f64>().is_ok());
    let has_present = values.iter().any(|v| v.is_some());

    if numeric && has_present {
        Column::Numeric(
            values
                .into_iter()
                .map(|v| v.and_then(|s| s.parse::<f64>().ok()))
                .collect(),
        )
    } else {
        Column::Categorical(values)
    }
}

/// Load the transaction table, sample it, and left-join the identity table.
///
/// Sampling happens before the join, mirroring the training procedure: the
/// transaction facts are subsampled, identity facts are attached to whatever
/// survives.
pub fn load_training_table<P: AsRef<Path>>(
    transactions_path: P,
    identity_path: Option<P>,
    sample_fraction: f64,
    seed: u64,
) -> Result<FeatureTable> {
    let mut table = load_csv(transactions_path)?;

    if sample_fraction < 1.0 {
        let mut rng = StdRng::seed_from_u64(seed);
        let before = table.num_rows();
        table = table.sample_fraction(sample_fraction, &mut rng);
        info!(
            before = before,
            after = table.num_rows(),
            fraction = sample_fraction,
            "Sampled transaction table"
        );
    }

    if let Some(identity_path) = identity_path {
        let identity = load_csv(identity_path)?;
        table = table.left_join(&identity, TRANSACTION_ID_COLUMN)?;
    }
    Ok(table)
}

/// Remove the label column and return it as a 0/1 vector.
pub fn split_labels(table: &mut FeatureTable, label: &str) -> Result<Vec<f64>> {
    let column = table.take_column(label).ok_or_else(|| {
        PipelineError::Dataset(format!("label column '{label}' not found in training table"))
    })?;
    match column {
        Column::Numeric(values) => values
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| {
                    PipelineError::Dataset(format!("label column '{label}' missing at row {i}"))
                })
            })
            .collect(),
        Column::Categorical(_) => Err(PipelineError::Dataset(format!(
            "label column '{label}' must be numeric"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_csv_infers_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "tx.csv",
            "TransactionID,TransactionAmt,card4\n1,10.5,visa\n2,,mastercard\n3,30.0,\n",
        );

        let table = load_csv(&path).unwrap();
        assert_eq!(table.num_rows(), 3);

        match table.column("TransactionAmt").unwrap() {
            Column::Numeric(v) => {
                assert_eq!(v[0], Some(10.5));
                assert_eq!(v[1], None);
            }
            _ => panic!("expected numeric column"),
        }
        match table.column("card4").unwrap() {
            Column::Categorical(v) => assert_eq!(v[2], None),
            _ => panic!("expected categorical column"),
        }
    }

    #[test]
    fn test_join_and_labels() {
        let dir = tempfile::tempdir().unwrap();
        let tx = write_csv(
            dir.path(),
            "tx.csv",
            "TransactionID,isFraud,TransactionAmt\n1,0,10.0\n2,1,500.0\n",
        );
        let id = write_csv(
            dir.path(),
            "id.csv",
            "TransactionID,DeviceType\n2,mobile\n",
        );

        let mut table = load_training_table(&tx, Some(&id), 1.0, 42).unwrap();
        assert!(table.column("DeviceType").is_some());

        let labels = split_labels(&mut table, LABEL_COLUMN).unwrap();
        assert_eq!(labels, vec![0.0, 1.0]);
        assert!(table.column(LABEL_COLUMN).is_none());
    }

    #[test]
    fn test_missing_label_column_fails() {
        let mut table = FeatureTable::new();
        table
            .push_column("a", Column::Numeric(vec![Some(1.0)]))
            .unwrap();
        let err = split_labels(&mut table, LABEL_COLUMN).unwrap_err();
        assert!(matches!(err, PipelineError::Dataset(_)));
    }
}
