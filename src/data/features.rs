//! Feature Transformer
//!
//! A fitted, deterministic mapping from raw feature rows to a fixed-width
//! numeric matrix. Numeric columns are median-imputed then standardized;
//! categorical columns are mode-imputed then one-hot encoded against the
//! vocabulary seen at fit time, with unseen values encoding to all zeros.
//! Training and prediction both route through this one type, so the column
//! layout cannot drift between the two.

use crate::models::FeatureRow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fitted scaler for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericEncoder {
    pub median: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl NumericEncoder {
    /// Fit on a column with missing entries: the median comes from the
    /// present values, mean and standard deviation from the median-imputed
    /// column (imputation happens before scaling, so the fitted scale
    /// matches what `encode` sees).
    fn fit(column: &[Option<f64>]) -> Self {
        let mut present: Vec<f64> = column.iter().flatten().copied().collect();
        let median = if present.is_empty() {
            0.0
        } else {
            present.sort_by(|a, b| a.total_cmp(b));
            let mid = present.len() / 2;
            if present.len() % 2 == 0 {
                (present[mid - 1] + present[mid]) / 2.0
            } else {
                present[mid]
            }
        };

        let imputed: Vec<f64> = column.iter().map(|v| v.unwrap_or(median)).collect();
        let n = imputed.len().max(1) as f64;
        let mean = imputed.iter().sum::<f64>() / n;
        let variance = imputed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        Self {
            median,
            mean,
            std_dev,
        }
    }

    fn encode(&self, value: Option<f64>) -> f64 {
        let v = value.unwrap_or(self.median);
        if self.std_dev > 0.0 {
            (v - self.mean) / self.std_dev
        } else {
            0.0
        }
    }
}

/// Fitted one-hot encoder for one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    /// Imputation value: the most frequent category at fit time
    pub mode: String,
    /// Sorted fit-time vocabulary; one output column per entry
    pub vocabulary: Vec<String>,
}

impl CategoryEncoder {
    fn fit(column: &[Option<&str>]) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for value in column.iter().flatten() {
            *counts.entry(value).or_insert(0) += 1;
        }
        // Ties break to the lexicographically smallest value so refits on
        // the same data produce the same encoder.
        let mode = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(value, _)| value.to_string())
            .unwrap_or_default();

        let mut vocabulary: Vec<String> = column
            .iter()
            .map(|v| v.unwrap_or(&mode).to_string())
            .collect();
        vocabulary.sort();
        vocabulary.dedup();

        Self { mode, vocabulary }
    }

    /// One indicator column per vocabulary entry; a value outside the
    /// vocabulary (unseen at fit time) leaves every indicator at zero.
    fn encode_into(&self, value: Option<&str>, out: &mut Vec<f64>) {
        let v = value.unwrap_or(&self.mode);
        for category in &self.vocabulary {
            out.push(if category == v { 1.0 } else { 0.0 });
        }
    }
}

/// The fitted transformer embedded in every trained artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTransformer {
    pub grid: NumericEncoder,
    pub points: NumericEncoder,
    pub team: CategoryEncoder,
    pub driver: CategoryEncoder,
}

impl FeatureTransformer {
    /// Fit all encoders on the training rows
    pub fn fit(rows: &[FeatureRow]) -> Self {
        let grid: Vec<Option<f64>> = rows.iter().map(|r| r.grid_position).collect();
        let points: Vec<Option<f64>> = rows.iter().map(|r| r.points_before).collect();
        let team: Vec<Option<&str>> = rows.iter().map(|r| r.team.as_deref()).collect();
        let driver: Vec<Option<&str>> = rows.iter().map(|r| r.driver_code.as_deref()).collect();

        Self {
            grid: NumericEncoder::fit(&grid),
            points: NumericEncoder::fit(&points),
            team: CategoryEncoder::fit(&team),
            driver: CategoryEncoder::fit(&driver),
        }
    }

    /// Output width: two scaled numerics plus both one-hot blocks
    pub fn width(&self) -> usize {
        2 + self.team.vocabulary.len() + self.driver.vocabulary.len()
    }

    /// Encode one row. Row-independent by construction: the same row
    /// encodes to the same vector alone or inside any batch.
    pub fn transform_row(&self, row: &FeatureRow) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.width());
        out.push(self.grid.encode(row.grid_position));
        out.push(self.points.encode(row.points_before));
        self.team.encode_into(row.team.as_deref(), &mut out);
        self.driver.encode_into(row.driver_code.as_deref(), &mut out);
        out
    }

    pub fn transform(&self, rows: &[FeatureRow]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }

    /// Column labels in output order
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = vec!["grid_position".to_string(), "points_before".to_string()];
        names.extend(self.team.vocabulary.iter().map(|t| format!("team={}", t)));
        names.extend(self.driver.vocabulary.iter().map(|d| format!("driver={}", d)));
        names
    }
}
