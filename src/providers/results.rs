//! Race result and lap record provider backed by the Ergast results/laps tables

use super::{ErgastClient, SessionResultProvider};
use crate::error::ProviderError;
use crate::models::Event;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// One raw per-driver row as returned by the session source, before any
/// join or aggregation
#[derive(Debug, Clone)]
pub struct RawDriverRow {
    pub driver_code: String,
    pub team: String,
    /// `None` when the driver did not take a grid slot (pit-lane start,
    /// encoded as grid 0 by the source)
    pub grid_position: Option<u32>,
    pub final_position: Option<u32>,
    /// Completed lap durations in milliseconds
    pub lap_ms: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ResultsResponse {
    #[serde(rename = "MRData")]
    mr_data: ResultsData,
}

#[derive(Debug, Deserialize)]
struct ResultsData {
    #[serde(rename = "RaceTable")]
    race_table: ResultsRaceTable,
}

#[derive(Debug, Deserialize)]
struct ResultsRaceTable {
    #[serde(rename = "Races", default)]
    races: Vec<ResultsRace>,
}

#[derive(Debug, Deserialize)]
struct ResultsRace {
    #[serde(rename = "Results", default)]
    results: Vec<ResultEntry>,
}

#[derive(Debug, Deserialize)]
struct ResultEntry {
    #[serde(default)]
    position: Option<String>,
    grid: String,
    #[serde(rename = "Driver")]
    driver: ResultDriver,
    #[serde(rename = "Constructor")]
    constructor: ResultConstructor,
}

#[derive(Debug, Deserialize)]
struct ResultDriver {
    #[serde(rename = "driverId")]
    driver_id: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultConstructor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LapsResponse {
    #[serde(rename = "MRData")]
    mr_data: LapsData,
}

#[derive(Debug, Deserialize)]
struct LapsData {
    #[serde(rename = "RaceTable")]
    race_table: LapsRaceTable,
}

#[derive(Debug, Deserialize)]
struct LapsRaceTable {
    #[serde(rename = "Races", default)]
    races: Vec<LapsRace>,
}

#[derive(Debug, Deserialize)]
struct LapsRace {
    #[serde(rename = "Laps", default)]
    laps: Vec<LapEntry>,
}

#[derive(Debug, Deserialize)]
struct LapEntry {
    #[serde(rename = "Timings", default)]
    timings: Vec<LapTiming>,
}

#[derive(Debug, Deserialize)]
struct LapTiming {
    #[serde(rename = "driverId")]
    driver_id: String,
    time: String,
}

/// Parse a lap time like "1:32.456" (or "58.123", or "1:02:03.456") into
/// milliseconds. Returns `None` for anything that does not look like a time.
pub fn parse_lap_time_ms(value: &str) -> Option<f64> {
    let mut total_secs = 0.0;
    for part in value.split(':') {
        let seconds = part.trim().parse::<f64>().ok()?;
        total_secs = total_secs * 60.0 + seconds;
    }
    if total_secs <= 0.0 {
        return None;
    }
    Some(total_secs * 1000.0)
}

/// Driver key used to join result rows against standings. Falls back to the
/// uppercased driver id when the source has no three-letter code, so the
/// row itself is never dropped.
fn driver_key(driver: &ResultDriver) -> String {
    driver
        .code
        .clone()
        .unwrap_or_else(|| driver.driver_id.to_uppercase())
}

fn rows_from_responses(
    season: u16,
    event: &Event,
    results: ResultsResponse,
    laps: Option<LapsResponse>,
) -> Result<Vec<RawDriverRow>, ProviderError> {
    let Some(race) = results.mr_data.race_table.races.into_iter().next() else {
        return Err(ProviderError::EmptySession {
            season,
            round: event.round,
        });
    };
    if race.results.is_empty() {
        return Err(ProviderError::EmptySession {
            season,
            round: event.round,
        });
    }

    // Lap durations keyed by driver id
    let mut laps_by_driver: HashMap<String, Vec<f64>> = HashMap::new();
    if let Some(laps) = laps {
        for lap_race in laps.mr_data.race_table.races {
            for lap in lap_race.laps {
                for timing in lap.timings {
                    if let Some(ms) = parse_lap_time_ms(&timing.time) {
                        laps_by_driver.entry(timing.driver_id).or_default().push(ms);
                    }
                }
            }
        }
    }

    let rows = race
        .results
        .into_iter()
        .map(|entry| {
            let grid_position = match entry.grid.parse::<u32>() {
                Ok(0) | Err(_) => None,
                Ok(g) => Some(g),
            };
            let final_position = entry.position.as_deref().and_then(|p| p.parse().ok());
            let lap_ms = laps_by_driver
                .remove(&entry.driver.driver_id)
                .unwrap_or_default();
            RawDriverRow {
                driver_code: driver_key(&entry.driver),
                team: entry.constructor.name,
                grid_position,
                final_position,
                lap_ms,
            }
        })
        .collect();
    Ok(rows)
}

/// [`SessionResultProvider`] over an Ergast-compatible API
pub struct ErgastSessionResultProvider {
    client: Arc<ErgastClient>,
}

impl ErgastSessionResultProvider {
    pub fn new(client: Arc<ErgastClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionResultProvider for ErgastSessionResultProvider {
    async fn race_data(
        &self,
        season: u16,
        event: &Event,
    ) -> Result<Vec<RawDriverRow>, ProviderError> {
        let results: ResultsResponse = self
            .client
            .get_json(&format!("{}/{}/results.json?limit=100", season, event.round))
            .await?;

        // Lap records are optional: older seasons have none, and a session
        // with classified results but no lap table still yields usable rows.
        let laps = match self
            .client
            .get_json::<LapsResponse>(&format!("{}/{}/laps.json?limit=2000", season, event.round))
            .await
        {
            Ok(laps) => Some(laps),
            Err(e) => {
                warn!(
                    "lap data unavailable for {} round {}, lap features will be absent: {}",
                    season, event.round, e
                );
                None
            }
        };

        rows_from_responses(season, event, results, laps)
    }
}
