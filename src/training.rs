//! Model Trainer
//!
//! Fits a class-weighted logistic regression on the historical table and
//! persists transformer + classifier + metadata as one artifact. Training
//! is deterministic: a fixed seed drives the stratified split and the fit
//! itself is zero-initialized full-batch gradient descent.

use crate::data::features::FeatureTransformer;
use crate::error::PipelineError;
use crate::models::{FeatureRow, HistoricalDataset};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Artifact file name, one directory per model store
const ARTIFACT_FILE: &str = "top10_logreg.json";
/// Companion metrics record written alongside the artifact
const METRICS_FILE: &str = "metrics.json";

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Fraction of labeled rows held out for accuracy reporting
    pub test_fraction: f64,
    /// Seed for the stratified split
    pub seed: u64,
    /// Gradient descent step size
    pub learning_rate: f64,
    /// Full-batch gradient descent passes
    pub epochs: usize,
    /// L2 penalty on the weights
    pub l2: f64,
    /// Below this many labeled rows training refuses to run
    pub min_labeled_rows: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            learning_rate: 0.5,
            epochs: 500,
            l2: 1e-4,
            min_labeled_rows: 20,
        }
    }
}

/// Fitted binary logistic regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticModel {
    /// Probability of the positive (top-10) class for one feature vector
    pub fn probability(&self, features: &[f64]) -> Result<f64, PipelineError> {
        if features.len() != self.weights.len() {
            return Err(PipelineError::FeatureShape {
                produced: features.len(),
                expected: self.weights.len(),
            });
        }
        let z: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        Ok(sigmoid(z))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Metadata persisted with every artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub trained_at: String,
    pub seed: u64,
    pub rows_total: usize,
    pub rows_train: usize,
    pub rows_holdout: usize,
    pub positive_rate: f64,
    pub holdout_accuracy: f64,
}

/// Immutable training artifact: fitted transformer, fitted classifier,
/// and the metadata of the run that produced them. Replaced wholesale by
/// re-training, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub transformer: FeatureTransformer,
    pub classifier: LogisticModel,
    pub metadata: TrainingMetadata,
}

impl TrainedModel {
    pub fn artifact_path(model_dir: &Path) -> PathBuf {
        model_dir.join(ARTIFACT_FILE)
    }

    pub fn metrics_path(model_dir: &Path) -> PathBuf {
        model_dir.join(METRICS_FILE)
    }

    /// Persist the artifact atomically (write to a temp name, then rename)
    /// with the metrics sidecar next to it.
    pub fn save(&self, model_dir: &Path) -> Result<(), PipelineError> {
        fs::create_dir_all(model_dir)?;

        let path = Self::artifact_path(model_dir);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| PipelineError::Artifact(e.to_string()))?;
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;

        let metrics = serde_json::json!({
            "test_accuracy": self.metadata.holdout_accuracy,
            "trained_at": self.metadata.trained_at,
            "rows_total": self.metadata.rows_total,
        });
        fs::write(
            Self::metrics_path(model_dir),
            serde_json::to_vec_pretty(&metrics)
                .map_err(|e| PipelineError::Artifact(e.to_string()))?,
        )?;

        info!(
            "saved model to {} (holdout accuracy {:.3})",
            path.display(),
            self.metadata.holdout_accuracy
        );
        Ok(())
    }

    /// Load a persisted artifact read-only
    pub fn load(model_dir: &Path) -> Result<Self, PipelineError> {
        let path = Self::artifact_path(model_dir);
        if !path.exists() {
            return Err(PipelineError::ModelNotFound { path });
        }
        let body = fs::read(&path)?;
        serde_json::from_slice(&body).map_err(|e| {
            PipelineError::Artifact(format!("cannot decode {}: {}", path.display(), e))
        })
    }
}

/// Train a model on the labeled rows of the dataset.
///
/// Deterministic given the same dataset and config. Fails with
/// [`PipelineError::Training`] when there are too few labeled rows or only
/// one class is present; nothing is written in that case.
pub fn train(
    dataset: &HistoricalDataset,
    config: &TrainConfig,
) -> Result<TrainedModel, PipelineError> {
    // Rows without a starting position carry no grid signal
    let labeled: Vec<(FeatureRow, bool)> = dataset
        .labeled_rows()
        .into_iter()
        .filter(|(row, _)| row.grid_position.is_some())
        .collect();

    if labeled.len() < config.min_labeled_rows {
        return Err(PipelineError::Training(format!(
            "only {} labeled rows, need at least {}",
            labeled.len(),
            config.min_labeled_rows
        )));
    }
    let positives = labeled.iter().filter(|(_, y)| *y).count();
    let negatives = labeled.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(PipelineError::Training(format!(
            "both outcome classes are required, got {} top-10 and {} other rows",
            positives, negatives
        )));
    }

    let (train_idx, holdout_idx) = stratified_split(&labeled, config.test_fraction, config.seed);
    info!(
        "training on {} rows, holding out {} ({} positive of {} total)",
        train_idx.len(),
        holdout_idx.len(),
        positives,
        labeled.len()
    );

    let train_rows: Vec<FeatureRow> = train_idx.iter().map(|&i| labeled[i].0.clone()).collect();
    let transformer = FeatureTransformer::fit(&train_rows);

    let x_train = transformer.transform(&train_rows);
    let y_train: Vec<bool> = train_idx.iter().map(|&i| labeled[i].1).collect();
    let classifier = fit_logistic(&x_train, &y_train, config);

    // Holdout accuracy at the 0.5 threshold
    let mut correct = 0usize;
    for &i in &holdout_idx {
        let vector = transformer.transform_row(&labeled[i].0);
        let p = classifier.probability(&vector)?;
        if (p >= 0.5) == labeled[i].1 {
            correct += 1;
        }
    }
    let holdout_accuracy = correct as f64 / holdout_idx.len() as f64;

    Ok(TrainedModel {
        transformer,
        classifier,
        metadata: TrainingMetadata {
            trained_at: chrono::Utc::now().to_rfc3339(),
            seed: config.seed,
            rows_total: labeled.len(),
            rows_train: train_idx.len(),
            rows_holdout: holdout_idx.len(),
            positive_rate: positives as f64 / labeled.len() as f64,
            holdout_accuracy,
        },
    })
}

/// Seeded stratified split: shuffle each class separately and take the
/// holdout fraction from both, so both partitions keep the class balance.
fn stratified_split(
    labeled: &[(FeatureRow, bool)],
    test_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut holdout = Vec::new();

    for class in [true, false] {
        let mut indices: Vec<usize> = labeled
            .iter()
            .enumerate()
            .filter(|(_, (_, y))| *y == class)
            .map(|(i, _)| i)
            .collect();
        indices.shuffle(&mut rng);

        // A single-member class stays entirely in the training partition
        let n_holdout = if indices.len() < 2 {
            0
        } else {
            ((indices.len() as f64 * test_fraction).round() as usize)
                .clamp(1, indices.len() - 1)
        };
        holdout.extend(indices.drain(..n_holdout));
        train.extend(indices);
    }
    (train, holdout)
}

/// Full-batch gradient descent on weighted cross-entropy. Class weights
/// follow the "balanced" rule: n / (2 * n_class), so the minority class
/// pulls as hard as the majority.
fn fit_logistic(x: &[Vec<f64>], y: &[bool], config: &TrainConfig) -> LogisticModel {
    let n = x.len();
    let width = x.first().map(Vec::len).unwrap_or(0);
    let positives = y.iter().filter(|&&v| v).count().max(1);
    let negatives = (n - y.iter().filter(|&&v| v).count()).max(1);
    let w_pos = n as f64 / (2.0 * positives as f64);
    let w_neg = n as f64 / (2.0 * negatives as f64);
    let total_weight = w_pos * positives as f64 + w_neg * negatives as f64;

    let mut weights = vec![0.0f64; width];
    let mut bias = 0.0f64;

    for _ in 0..config.epochs {
        let mut grad_w = vec![0.0f64; width];
        let mut grad_b = 0.0f64;

        for (features, &label) in x.iter().zip(y) {
            let z: f64 = weights
                .iter()
                .zip(features)
                .map(|(w, v)| w * v)
                .sum::<f64>()
                + bias;
            let target = if label { 1.0 } else { 0.0 };
            let sample_weight = if label { w_pos } else { w_neg };
            let residual = sample_weight * (sigmoid(z) - target);

            for (g, v) in grad_w.iter_mut().zip(features) {
                *g += residual * v;
            }
            grad_b += residual;
        }

        for (w, g) in weights.iter_mut().zip(&grad_w) {
            *w -= config.learning_rate * (g / total_weight + config.l2 * *w);
        }
        bias -= config.learning_rate * grad_b / total_weight;
    }

    LogisticModel { weights, bias }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DriverRaceRecord;

    /// Dataset where grid position decides the outcome: grid <= 10 always
    /// finishes top 10.
    fn grid_dominant_dataset(events: u32) -> HistoricalDataset {
        let mut ds = HistoricalDataset::new();
        for round in 1..=events {
            for grid in 1..=20u32 {
                ds.push(DriverRaceRecord {
                    season: 2023,
                    round,
                    event: format!("Round {}", round),
                    driver_code: format!("D{:02}", grid),
                    team: format!("Team {}", grid % 5),
                    grid_position: Some(grid),
                    points_before: Some((21 - grid) as f64 * round as f64),
                    avg_lap_ms: Some(90_000.0),
                    fastest_lap_ms: Some(88_000.0),
                    total_laps: Some(50),
                    final_position: Some(grid),
                });
            }
        }
        ds
    }

    fn single_class_dataset() -> HistoricalDataset {
        let mut ds = HistoricalDataset::new();
        for round in 1..=3u32 {
            for grid in 1..=10u32 {
                ds.push(DriverRaceRecord {
                    season: 2023,
                    round,
                    event: format!("Round {}", round),
                    driver_code: format!("D{:02}", grid),
                    team: "Team".to_string(),
                    grid_position: Some(grid),
                    points_before: None,
                    avg_lap_ms: None,
                    fastest_lap_ms: None,
                    total_laps: None,
                    final_position: Some(grid), // everyone top 10
                });
            }
        }
        ds
    }

    #[test]
    fn test_training_learns_grid_signal() {
        let model = train(&grid_dominant_dataset(6), &TrainConfig::default()).unwrap();

        let front = model.transformer.transform_row(&FeatureRow {
            grid_position: Some(1.0),
            points_before: Some(100.0),
            team: Some("Team 1".to_string()),
            driver_code: Some("D01".to_string()),
        });
        let back = model.transformer.transform_row(&FeatureRow {
            grid_position: Some(20.0),
            points_before: Some(1.0),
            team: Some("Team 0".to_string()),
            driver_code: Some("D20".to_string()),
        });
        let p_front = model.classifier.probability(&front).unwrap();
        let p_back = model.classifier.probability(&back).unwrap();
        assert!(p_front > 0.8, "front row should be likely top 10: {}", p_front);
        assert!(p_back < 0.2, "back row should be unlikely top 10: {}", p_back);
        assert!(model.metadata.holdout_accuracy > 0.8);
    }

    #[test]
    fn test_training_is_deterministic() {
        let ds = grid_dominant_dataset(4);
        let config = TrainConfig::default();
        let a = train(&ds, &config).unwrap();
        let b = train(&ds, &config).unwrap();
        assert_eq!(a.classifier.weights, b.classifier.weights);
        assert_eq!(a.classifier.bias, b.classifier.bias);
        assert_eq!(a.metadata.holdout_accuracy, b.metadata.holdout_accuracy);
    }

    #[test]
    fn test_too_few_rows_is_a_training_error() {
        let mut ds = HistoricalDataset::new();
        ds.extend(grid_dominant_dataset(1).records().iter().take(5).cloned());
        let err = train(&ds, &TrainConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));
    }

    #[test]
    fn test_single_class_is_a_training_error() {
        let err = train(&single_class_dataset(), &TrainConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Training(_)));
        assert!(err.to_string().contains("classes"));
    }

    #[test]
    fn test_stratified_split_keeps_both_classes() {
        let ds = grid_dominant_dataset(2);
        let labeled = ds.labeled_rows();
        let (train_idx, holdout_idx) = stratified_split(&labeled, 0.2, 42);
        assert_eq!(train_idx.len() + holdout_idx.len(), labeled.len());
        for idx in [&train_idx, &holdout_idx] {
            assert!(idx.iter().any(|&i| labeled[i].1));
            assert!(idx.iter().any(|&i| !labeled[i].1));
        }
    }

    #[test]
    fn test_probability_rejects_wrong_width() {
        let model = LogisticModel {
            weights: vec![0.5, -0.2],
            bias: 0.0,
        };
        let err = model.probability(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::FeatureShape {
                produced: 3,
                expected: 2
            }
        ));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let model = train(&grid_dominant_dataset(3), &TrainConfig::default()).unwrap();
        model.save(dir.path()).unwrap();

        assert!(TrainedModel::artifact_path(dir.path()).exists());
        assert!(TrainedModel::metrics_path(dir.path()).exists());

        let loaded = TrainedModel::load(dir.path()).unwrap();
        assert_eq!(loaded.classifier.weights, model.classifier.weights);
        assert_eq!(loaded.transformer, model.transformer);
    }

    #[test]
    fn test_load_missing_artifact_is_model_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = TrainedModel::load(dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::ModelNotFound { .. }));
    }
}
