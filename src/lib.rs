//! Race Prophet - pre-race top-10 finish probability prediction
//!
//! This library provides:
//! - Historical dataset construction from schedule, standings, and session
//!   result providers, with partial-failure tolerance across events
//! - A fitted feature transformer (impute + scale + one-hot) shared by
//!   training and prediction
//! - Class-weighted logistic regression training with a persisted artifact
//! - A prediction service returning ranked per-driver probabilities
//!
//! # Example
//!
//! ```no_run
//! use race_prophet::data::DatasetBuilder;
//! use race_prophet::providers::{
//!     ClientConfig, ErgastClient, ErgastScheduleProvider, ErgastSessionResultProvider,
//!     ErgastStandingsProvider,
//! };
//! use race_prophet::training::{train, TrainConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(ErgastClient::new(ClientConfig::default())?);
//!     let builder = DatasetBuilder::new(
//!         Arc::new(ErgastScheduleProvider::new(client.clone())),
//!         Arc::new(ErgastStandingsProvider::new(client.clone())),
//!         Arc::new(ErgastSessionResultProvider::new(client)),
//!     );
//!
//!     let dataset = builder.build_historical(2022..=2023).await?;
//!     let model = train(&dataset, &TrainConfig::default())?;
//!     model.save("models".as_ref())?;
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod error;
pub mod models;
pub mod predictor;
pub mod providers;
pub mod training;

// Re-export commonly used types
pub use data::{DatasetBuilder, FeatureTransformer};
pub use error::{PipelineError, ProviderError};
pub use models::{DriverPrediction, DriverRaceRecord, Event, FeatureRow, HistoricalDataset};
pub use predictor::PredictionService;
pub use training::{train, TrainConfig, TrainedModel};
