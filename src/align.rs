//! Feature alignment against the bundle's canonical column list

use std::collections::{HashMap, HashSet};
use tracing::warn;

use crate::table::FeatureMatrix;

/// Columns the aligner added (zero-filled) or dropped.
///
/// Dropping is silent information loss from the caller's point of view, so the
/// report is returned alongside the aligned matrix as a diagnostic channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentReport {
    pub added: Vec<String>,
    pub dropped: Vec<String>,
}

impl AlignmentReport {
    /// True when the input already matched the canonical columns exactly.
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.dropped.is_empty()
    }
}

/// Reconcile `matrix` against the canonical column list: the output has
/// exactly the canonical columns, in canonical order. Canonical columns
/// absent from the input are zero-filled; input columns not in the canonical
/// list are dropped. Never fails.
pub fn align(matrix: &FeatureMatrix, canonical: &[String]) -> (FeatureMatrix, AlignmentReport) {
    let input_index: HashMap<&str, usize> = matrix
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();
    let canonical_set: HashSet<&str> = canonical.iter().map(String::as_str).collect();

    let report = AlignmentReport {
        added: canonical
            .iter()
            .filter(|name| !input_index.contains_key(name.as_str()))
            .cloned()
            .collect(),
        dropped: matrix
            .columns
            .iter()
            .filter(|name| !canonical_set.contains(name.as_str()))
            .cloned()
            .collect(),
    };
    if !report.dropped.is_empty() {
        warn!(
            dropped = report.dropped.len(),
            columns = ?report.dropped,
            "alignment dropped columns not present at training time"
        );
    }

    let sources: Vec<Option<usize>> = canonical
        .iter()
        .map(|name| input_index.get(name.as_str()).copied())
        .collect();
    let rows = matrix
        .rows
        .iter()
        .map(|row| {
            sources
                .iter()
                .map(|src| src.map(|i| row[i]).unwrap_or(0.0))
                .collect()
        })
        .collect();

    (
        FeatureMatrix {
            columns: canonical.to_vec(),
            rows,
        },
        report,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn test_alignment_idempotence() {
        let matrix = FeatureMatrix {
            columns: canonical(),
            rows: vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
        };
        let (aligned, report) = align(&matrix, &canonical());
        assert_eq!(aligned, matrix);
        assert!(report.is_clean());
    }

    #[test]
    fn test_alignment_completeness() {
        // Missing canonical column "c", extra column "x", shuffled order.
        let matrix = FeatureMatrix {
            columns: vec!["x".into(), "b".into(), "a".into()],
            rows: vec![vec![9.0, 2.0, 1.0]],
        };
        let (aligned, report) = align(&matrix, &canonical());

        assert_eq!(aligned.columns, canonical());
        assert_eq!(aligned.rows, vec![vec![1.0, 2.0, 0.0]]);
        assert_eq!(report.added, vec!["c".to_string()]);
        assert_eq!(report.dropped, vec!["x".to_string()]);
    }

    #[test]
    fn test_align_empty_input() {
        let matrix = FeatureMatrix::default();
        let (aligned, report) = align(&matrix, &canonical());
        assert_eq!(aligned.columns, canonical());
        assert_eq!(aligned.num_rows(), 0);
        assert_eq!(report.added.len(), 3);
    }
}
