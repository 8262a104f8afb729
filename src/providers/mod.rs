//! External data providers for schedule, standings, and session results
//!
//! Each provider is a trait so the dataset builder receives injected
//! collaborators instead of reaching for ambient clients, and tests swap in
//! in-memory fakes. The shipped implementations talk to an Ergast-compatible
//! JSON API (Jolpica).
//!
//! # Example
//!
//! ```no_run
//! use race_prophet::providers::{ClientConfig, ErgastClient, ErgastScheduleProvider, ScheduleProvider};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(ErgastClient::new(ClientConfig::default())?);
//!     let schedule = ErgastScheduleProvider::new(client);
//!     let events = schedule.schedule(2023).await?;
//!     println!("{} events in 2023", events.len());
//!     Ok(())
//! }
//! ```

mod client;
mod results;
mod schedule;
mod standings;

pub use client::{ClientConfig, ErgastClient, DEFAULT_BASE_URL};
pub use results::{ErgastSessionResultProvider, RawDriverRow};
pub use schedule::ErgastScheduleProvider;
pub use standings::ErgastStandingsProvider;

use crate::error::ProviderError;
use crate::models::Event;
use async_trait::async_trait;
use std::collections::HashMap;

/// Season calendar lookup
#[async_trait]
pub trait ScheduleProvider: Send + Sync {
    /// Events of the season, in calendar order
    async fn schedule(&self, season: u16) -> Result<Vec<Event>, ProviderError>;
}

/// Championship standings lookup
#[async_trait]
pub trait StandingsProvider: Send + Sync {
    /// Points per driver code as of the snapshot after round `round - 1`.
    ///
    /// For round 1 (or anything below) there is no prior data and the
    /// result is an empty map, never an error.
    async fn points_before(
        &self,
        season: u16,
        round: u32,
    ) -> Result<HashMap<String, f64>, ProviderError>;
}

/// Per-event race results and lap records
#[async_trait]
pub trait SessionResultProvider: Send + Sync {
    /// Raw per-driver rows for one event. The event carries the round
    /// number needed to align the standings snapshot.
    ///
    /// Fails with [`ProviderError::EmptySession`] when no results were
    /// recorded (for example a cancelled event).
    async fn race_data(&self, season: u16, event: &Event)
        -> Result<Vec<RawDriverRow>, ProviderError>;
}
