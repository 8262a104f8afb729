//! Driver standings provider backed by the Ergast standings table

use super::{ErgastClient, StandingsProvider};
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct StandingsResponse {
    #[serde(rename = "MRData")]
    mr_data: StandingsData,
}

#[derive(Debug, Deserialize)]
struct StandingsData {
    #[serde(rename = "StandingsTable")]
    standings_table: StandingsTable,
}

#[derive(Debug, Deserialize)]
struct StandingsTable {
    #[serde(rename = "StandingsLists", default)]
    standings_lists: Vec<StandingsList>,
}

#[derive(Debug, Deserialize)]
struct StandingsList {
    #[serde(rename = "DriverStandings", default)]
    driver_standings: Vec<DriverStanding>,
}

#[derive(Debug, Deserialize)]
struct DriverStanding {
    points: String,
    #[serde(rename = "Driver")]
    driver: StandingDriver,
}

#[derive(Debug, Deserialize)]
struct StandingDriver {
    #[serde(default)]
    code: Option<String>,
}

/// Flatten the standings envelope into driver code -> points.
///
/// Drivers without a three-letter code (older seasons) cannot be joined
/// against result rows and are skipped. An empty standings list is a valid
/// empty snapshot, not a failure.
fn points_from_response(response: StandingsResponse) -> Result<HashMap<String, f64>, ProviderError> {
    let mut points = HashMap::new();
    let Some(list) = response.mr_data.standings_table.standings_lists.into_iter().next() else {
        return Ok(points);
    };

    for entry in list.driver_standings {
        let Some(code) = entry.driver.code else {
            continue;
        };
        let value = entry
            .points
            .parse::<f64>()
            .map_err(|_| ProviderError::Decode(format!("bad points value {:?}", entry.points)))?;
        points.insert(code, value);
    }
    Ok(points)
}

/// [`StandingsProvider`] over an Ergast-compatible API
pub struct ErgastStandingsProvider {
    client: Arc<ErgastClient>,
}

impl ErgastStandingsProvider {
    pub fn new(client: Arc<ErgastClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StandingsProvider for ErgastStandingsProvider {
    async fn points_before(
        &self,
        season: u16,
        round: u32,
    ) -> Result<HashMap<String, f64>, ProviderError> {
        // The snapshot "before round N" is the table after round N-1.
        // For the season opener there is nothing to fetch.
        if round <= 1 {
            return Ok(HashMap::new());
        }

        let response: StandingsResponse = self
            .client
            .get_json(&format!(
                "{}/{}/driverStandings.json?limit=100",
                season,
                round - 1
            ))
            .await?;
        points_from_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "MRData": {
            "StandingsTable": {
                "StandingsLists": [
                    {
                        "DriverStandings": [
                            {"points": "119", "Driver": {"code": "VER"}},
                            {"points": "87.5", "Driver": {"code": "PER"}},
                            {"points": "12", "Driver": {}}
                        ]
                    }
                ]
            }
        }
    }"#;

    #[test]
    fn test_parses_points_and_skips_codeless_drivers() {
        let response: StandingsResponse = serde_json::from_str(FIXTURE).unwrap();
        let points = points_from_response(response).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points["VER"], 119.0);
        assert_eq!(points["PER"], 87.5);
    }

    #[test]
    fn test_empty_standings_lists_is_empty_map() {
        let response: StandingsResponse =
            serde_json::from_str(r#"{"MRData": {"StandingsTable": {"StandingsLists": []}}}"#)
                .unwrap();
        assert!(points_from_response(response).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_round_one_returns_empty_without_fetching() {
        // Unroutable base URL: if round 1 tried to fetch, this would fail.
        let config = super::super::ClientConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            ..Default::default()
        };
        let provider = ErgastStandingsProvider::new(Arc::new(ErgastClient::new(config).unwrap()));
        assert!(provider.points_before(2023, 1).await.unwrap().is_empty());
        assert!(provider.points_before(2023, 0).await.unwrap().is_empty());
    }
}
