//! Prediction Service
//!
//! Loads the persisted training artifact and serves ranked per-driver
//! top-10 probabilities for one event. Feature rows come from the same
//! dataset builder path the trainer uses (minus the label), and encoding
//! goes through the artifact's embedded transformer, so there is no
//! second feature list that could drift.

use crate::data::DatasetBuilder;
use crate::error::PipelineError;
use crate::models::{DriverPrediction, FeatureRow};
use crate::training::TrainedModel;
use std::cmp::Ordering;
use std::path::Path;
use tracing::info;

pub struct PredictionService {
    model: TrainedModel,
    builder: DatasetBuilder,
}

impl PredictionService {
    /// Load the artifact from `model_dir`. Fails with
    /// [`PipelineError::ModelNotFound`] when no model has been trained;
    /// there is no on-demand training fallback, so a caller always knows
    /// which artifact answered.
    pub fn load(model_dir: &Path, builder: DatasetBuilder) -> Result<Self, PipelineError> {
        let model = TrainedModel::load(model_dir)?;
        info!(
            "loaded model trained at {} (holdout accuracy {:.3})",
            model.metadata.trained_at, model.metadata.holdout_accuracy
        );
        Ok(Self { model, builder })
    }

    /// Wrap an already-loaded artifact (tests, embedding callers)
    pub fn from_model(model: TrainedModel, builder: DatasetBuilder) -> Self {
        Self { model, builder }
    }

    pub fn metadata(&self) -> &crate::training::TrainingMetadata {
        &self.model.metadata
    }

    /// Per-driver top-10 probabilities for one event, sorted by
    /// descending probability. Provider failures propagate; the model
    /// artifact is never touched.
    pub async fn predict(
        &self,
        season: u16,
        event_name: &str,
    ) -> Result<Vec<DriverPrediction>, PipelineError> {
        let records = self.builder.build_for_event(season, event_name).await?;

        let mut predictions = Vec::with_capacity(records.len());
        for record in records {
            let row: FeatureRow = record.feature_row();
            let vector = self.model.transformer.transform_row(&row);
            let probability = self.model.classifier.probability(&vector)?;
            predictions.push(DriverPrediction {
                driver_code: record.driver_code,
                team: record.team,
                grid_position: record.grid_position,
                final_position: record.final_position,
                top10_probability: probability,
            });
        }

        predictions.sort_by(|a, b| {
            b.top10_probability
                .partial_cmp(&a.top10_probability)
                .unwrap_or(Ordering::Equal)
        });
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::fakes::{FakeResults, FakeSchedule, FakeStandings};
    use crate::models::{DriverRaceRecord, Event, HistoricalDataset};
    use crate::providers::RawDriverRow;
    use crate::training::{train, TrainConfig};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn trained_on_grid() -> TrainedModel {
        let mut ds = HistoricalDataset::new();
        for round in 1..=6u32 {
            for grid in 1..=20u32 {
                ds.push(DriverRaceRecord {
                    season: 2022,
                    round,
                    event: format!("Round {}", round),
                    driver_code: format!("D{:02}", grid),
                    team: format!("Team {}", grid % 5),
                    grid_position: Some(grid),
                    points_before: Some((21 - grid) as f64),
                    avg_lap_ms: None,
                    fastest_lap_ms: None,
                    total_laps: None,
                    final_position: Some(grid),
                });
            }
        }
        train(&ds, &TrainConfig::default()).unwrap()
    }

    /// Builder serving a synthetic 3-driver event at grids [1, 2, 3] with
    /// pre-race points [50, 40, 0]
    fn three_driver_builder() -> DatasetBuilder {
        let event = Event {
            season: 2023,
            round: 4,
            name: "Synthetic Grand Prix".to_string(),
        };
        let rows = vec![
            RawDriverRow {
                driver_code: "AAA".to_string(),
                team: "Team 1".to_string(),
                grid_position: Some(1),
                final_position: None,
                lap_ms: Vec::new(),
            },
            RawDriverRow {
                driver_code: "BBB".to_string(),
                team: "Team 2".to_string(),
                grid_position: Some(2),
                final_position: None,
                lap_ms: Vec::new(),
            },
            RawDriverRow {
                driver_code: "CCC".to_string(),
                team: "Team 3".to_string(),
                grid_position: Some(3),
                final_position: None,
                lap_ms: Vec::new(),
            },
        ];
        let points = HashMap::from([(
            (2023u16, 4u32),
            HashMap::from([("AAA".to_string(), 50.0), ("BBB".to_string(), 40.0)]),
        )]);

        DatasetBuilder::new(
            Arc::new(FakeSchedule {
                events: HashMap::from([(2023u16, vec![event])]),
            }),
            Arc::new(FakeStandings { points }),
            Arc::new(FakeResults {
                rows: HashMap::from([((2023u16, 4u32), rows)]),
            }),
        )
    }

    #[tokio::test]
    async fn test_ranking_follows_grid_position() {
        let service = PredictionService::from_model(trained_on_grid(), three_driver_builder());
        let predictions = service.predict(2023, "Synthetic").await.unwrap();

        assert_eq!(predictions.len(), 3);
        assert_eq!(predictions[0].grid_position, Some(1));
        assert!(predictions[0].top10_probability > predictions[1].top10_probability);
        assert!(predictions[1].top10_probability > predictions[2].top10_probability);
    }

    #[tokio::test]
    async fn test_predict_is_bit_identical_across_runs() {
        let service = PredictionService::from_model(trained_on_grid(), three_driver_builder());
        let first = service.predict(2023, "Synthetic").await.unwrap();
        let second = service.predict(2023, "Synthetic").await.unwrap();

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.driver_code, b.driver_code);
            assert_eq!(
                a.top10_probability.to_bits(),
                b.top10_probability.to_bits()
            );
        }
    }

    #[tokio::test]
    async fn test_unseen_drivers_are_scored_not_rejected() {
        // AAA/BBB/CCC never appeared in the 2022 training data
        let service = PredictionService::from_model(trained_on_grid(), three_driver_builder());
        let predictions = service.predict(2023, "Synthetic").await.unwrap();
        assert!(predictions
            .iter()
            .all(|p| p.top10_probability.is_finite()));
    }

    #[test]
    fn test_load_without_artifact_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let Err(err) = PredictionService::load(dir.path(), three_driver_builder()) else {
            panic!("loading from an empty model directory must fail");
        };
        assert!(matches!(err, PipelineError::ModelNotFound { .. }));
        assert!(err.to_string().contains("train the model first"));
    }
}
