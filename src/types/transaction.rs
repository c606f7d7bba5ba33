//! Transaction record submitted for scoring

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::preprocess::AMOUNT_COLUMN;
use crate::table::{Column, FeatureTable};

/// One payment event handed to the pipeline. Immutable once constructed;
/// validated at the pipeline boundary before preprocessing.
///
/// Serde aliases accept the dataset's original column names, so a JSON payload
/// like `{"TransactionAmt": 250.0, "card4": "visa"}` deserializes directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction amount (required)
    #[serde(alias = "TransactionAmt")]
    pub transaction_amt: f64,

    /// Primary card identifier
    #[serde(default)]
    pub card1: Option<f64>,

    /// Secondary card identifier
    #[serde(default)]
    pub card2: Option<f64>,

    /// Card network (visa, mastercard, ...)
    #[serde(default)]
    pub card4: Option<String>,

    /// Purchaser email domain
    #[serde(default, alias = "P_emaildomain")]
    pub p_emaildomain: Option<String>,

    /// Device type used for the transaction
    #[serde(default, alias = "DeviceType")]
    pub device_type: Option<String>,

    /// Distance feature
    #[serde(default)]
    pub dist1: Option<f64>,

    /// Derived count feature
    #[serde(default, alias = "C1")]
    pub c1: Option<f64>,

    /// Derived timedelta feature
    #[serde(default, alias = "D1")]
    pub d1: Option<f64>,

    /// Match-flag feature
    #[serde(default, alias = "V318")]
    pub v318: Option<String>,
}

impl TransactionRecord {
    /// Create a record with the required amount and no optional fields
    pub fn new(transaction_amt: f64) -> Self {
        Self {
            transaction_amt,
            card1: None,
            card2: None,
            card4: None,
            p_emaildomain: None,
            device_type: None,
            dist1: None,
            c1: None,
            d1: None,
            v318: None,
        }
    }

    /// Boundary validation: the amount must be a finite, non-negative number.
    pub fn validate(&self) -> Result<()> {
        if !self.transaction_amt.is_finite() || self.transaction_amt < 0.0 {
            return Err(PipelineError::DataQuality(format!(
                "transaction amount must be finite and non-negative, got {}",
                self.transaction_amt
            )));
        }
        Ok(())
    }

    /// One-row feature table using the dataset's column names, ready for the
    /// fitted preprocessor.
    pub fn to_table(&self) -> FeatureTable {
        let mut table = FeatureTable::new();
        let numeric = [
            (AMOUNT_COLUMN, Some(self.transaction_amt)),
            ("card1", self.card1),
            ("card2", self.card2),
            ("dist1", self.dist1),
            ("C1", self.c1),
            ("D1", self.d1),
        ];
        for (name, value) in numeric {
            table
                .push_column(name, Column::Numeric(vec![value]))
                .expect("one-row table columns cannot mismatch");
        }
        let categorical = [
            ("card4", self.card4.clone()),
            ("P_emaildomain", self.p_emaildomain.clone()),
            ("DeviceType", self.device_type.clone()),
            ("V318", self.v318.clone()),
        ];
        for (name, value) in categorical {
            table
                .push_column(name, Column::Categorical(vec![value]))
                .expect("one-row table columns cannot mismatch");
        }
        table
    }
}
