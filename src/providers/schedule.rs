//! Season schedule provider backed by the Ergast race table

use super::{ErgastClient, ScheduleProvider};
use crate::error::ProviderError;
use crate::models::Event;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(rename = "MRData")]
    mr_data: ScheduleData,
}

#[derive(Debug, Deserialize)]
struct ScheduleData {
    #[serde(rename = "RaceTable")]
    race_table: RaceTable,
}

#[derive(Debug, Deserialize)]
struct RaceTable {
    #[serde(rename = "Races", default)]
    races: Vec<RaceEntry>,
}

#[derive(Debug, Deserialize)]
struct RaceEntry {
    round: String,
    #[serde(rename = "raceName")]
    race_name: String,
}

/// Turn the decoded race table into calendar-ordered events
fn events_from_response(
    season: u16,
    response: ScheduleResponse,
) -> Result<Vec<Event>, ProviderError> {
    let races = response.mr_data.race_table.races;
    if races.is_empty() {
        return Err(ProviderError::UnsupportedSeason(season));
    }

    let mut events = Vec::with_capacity(races.len());
    for race in races {
        let round = race
            .round
            .parse::<u32>()
            .map_err(|_| ProviderError::Decode(format!("bad round number {:?}", race.round)))?;
        events.push(Event {
            season,
            round,
            name: race.race_name,
        });
    }
    events.sort_by_key(|e| e.round);
    Ok(events)
}

/// [`ScheduleProvider`] over an Ergast-compatible API
pub struct ErgastScheduleProvider {
    client: Arc<ErgastClient>,
}

impl ErgastScheduleProvider {
    pub fn new(client: Arc<ErgastClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScheduleProvider for ErgastScheduleProvider {
    async fn schedule(&self, season: u16) -> Result<Vec<Event>, ProviderError> {
        let response: ScheduleResponse = self
            .client
            .get_json(&format!("{}.json?limit=100", season))
            .await?;
        events_from_response(season, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "MRData": {
            "RaceTable": {
                "Races": [
                    {"round": "2", "raceName": "Saudi Arabian Grand Prix"},
                    {"round": "1", "raceName": "Bahrain Grand Prix"}
                ]
            }
        }
    }"#;

    #[test]
    fn test_parses_and_orders_by_round() {
        let response: ScheduleResponse = serde_json::from_str(FIXTURE).unwrap();
        let events = events_from_response(2023, response).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].round, 1);
        assert_eq!(events[0].name, "Bahrain Grand Prix");
        assert_eq!(events[1].round, 2);
    }

    #[test]
    fn test_empty_season_is_unsupported() {
        let response: ScheduleResponse =
            serde_json::from_str(r#"{"MRData": {"RaceTable": {"Races": []}}}"#).unwrap();
        let err = events_from_response(1893, response).unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedSeason(1893)));
    }
}
