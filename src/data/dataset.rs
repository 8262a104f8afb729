//! Dataset Builder
//!
//! Joins session results with pre-race standings into one labeled row per
//! (event, driver). Batch mode walks whole seasons with partial-failure
//! tolerance; single-event mode builds the same rows for one requested
//! event and fails loudly instead of skipping.

use crate::error::{PipelineError, ProviderError};
use crate::models::{DriverRaceRecord, Event, HistoricalDataset};
use crate::providers::{RawDriverRow, ScheduleProvider, SessionResultProvider, StandingsProvider};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{info, warn};

/// How many events are fetched and joined concurrently in batch mode
const DEFAULT_CONCURRENCY: usize = 4;

/// Builds per-event driver tables from the three injected providers
pub struct DatasetBuilder {
    schedule: Arc<dyn ScheduleProvider>,
    standings: Arc<dyn StandingsProvider>,
    results: Arc<dyn SessionResultProvider>,
    concurrency: usize,
}

impl DatasetBuilder {
    pub fn new(
        schedule: Arc<dyn ScheduleProvider>,
        standings: Arc<dyn StandingsProvider>,
        results: Arc<dyn SessionResultProvider>,
    ) -> Self {
        Self {
            schedule,
            standings,
            results,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Build the rows for one event: fetch results, fetch the standings
    /// snapshot before the event's round, left-join on driver code, and
    /// derive lap summaries. Any provider failure propagates with context.
    pub async fn build_event(
        &self,
        event: &Event,
    ) -> Result<Vec<DriverRaceRecord>, PipelineError> {
        let season = event.season;
        let rows = self
            .results
            .race_data(season, event)
            .await
            .map_err(|e| {
                PipelineError::provider(format!("session results for {} {}", season, event.name), e)
            })?;
        let standings = self
            .standings
            .points_before(season, event.round)
            .await
            .map_err(|e| {
                PipelineError::provider(format!("standings before {} round {}", season, event.round), e)
            })?;

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            if !seen.insert(row.driver_code.clone()) {
                warn!(
                    "duplicate driver {} in {} {}, keeping first row",
                    row.driver_code, season, event.name
                );
                continue;
            }
            records.push(join_row(event, &standings, row));
        }
        Ok(records)
    }

    /// Build rows for one event looked up by name (case-insensitive; a
    /// unique substring also matches). This is the single-event path the
    /// prediction service uses, so errors propagate instead of being
    /// swallowed.
    pub async fn build_for_event(
        &self,
        season: u16,
        event_name: &str,
    ) -> Result<Vec<DriverRaceRecord>, PipelineError> {
        let events = self.schedule.schedule(season).await.map_err(|e| {
            PipelineError::provider(format!("schedule for season {}", season), e)
        })?;
        let event = find_event(&events, event_name).ok_or_else(|| {
            PipelineError::provider(
                format!("event lookup in season {}", season),
                ProviderError::UnknownEvent {
                    season,
                    name: event_name.to_string(),
                },
            )
        })?;
        self.build_event(&event).await
    }

    /// Build one season's rows, fanning out across events.
    ///
    /// A failing event is skipped with one logged notice; a failing
    /// schedule fetch propagates, since nothing can be built without it.
    pub async fn build_season(&self, season: u16) -> Result<Vec<DriverRaceRecord>, PipelineError> {
        let events = self.schedule.schedule(season).await.map_err(|e| {
            PipelineError::provider(format!("schedule for season {}", season), e)
        })?;
        info!("building season {}: {} events", season, events.len());

        let mut tables: Vec<(u32, Vec<DriverRaceRecord>)> = stream::iter(events)
            .map(|event| async move {
                let result = self.build_event(&event).await;
                (event, result)
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|(event, result)| async move {
                match result {
                    Ok(records) => Some((event.round, records)),
                    Err(e) => {
                        warn!("skipping {} {}: {}", event.season, event.name, e);
                        None
                    }
                }
            })
            .collect()
            .await;

        // Arrival order depends on the fan-out; restore calendar order.
        tables.sort_by_key(|(round, _)| *round);
        Ok(tables.into_iter().flat_map(|(_, records)| records).collect())
    }

    /// Build the full historical table across a season range.
    ///
    /// Per-event failures were already skipped inside [`build_season`];
    /// only those are tolerated. A schedule fetch that fails is a fatal
    /// error and propagates, rather than quietly yielding an empty
    /// dataset when the remote is unreachable.
    pub async fn build_historical(
        &self,
        seasons: RangeInclusive<u16>,
    ) -> Result<HistoricalDataset, PipelineError> {
        let mut dataset = HistoricalDataset::new();
        for season in seasons {
            dataset.extend(self.build_season(season).await?);
        }
        dataset.normalize_order();
        info!("historical dataset built: {} rows", dataset.len());
        Ok(dataset)
    }
}

/// Left join: a driver present in results but absent from standings keeps
/// the record with pre-race points marked absent.
fn join_row(
    event: &Event,
    standings: &std::collections::HashMap<String, f64>,
    row: RawDriverRow,
) -> DriverRaceRecord {
    let (avg_lap_ms, fastest_lap_ms, total_laps) = summarize_laps(&row.lap_ms);
    DriverRaceRecord {
        season: event.season,
        round: event.round,
        event: event.name.clone(),
        points_before: standings.get(&row.driver_code).copied(),
        driver_code: row.driver_code,
        team: row.team,
        grid_position: row.grid_position,
        avg_lap_ms,
        fastest_lap_ms,
        total_laps,
        final_position: row.final_position,
    }
}

/// Mean, minimum, and count of completed-lap durations; all absent when no
/// laps were recorded.
fn summarize_laps(lap_ms: &[f64]) -> (Option<f64>, Option<f64>, Option<u32>) {
    if lap_ms.is_empty() {
        return (None, None, None);
    }
    let total: f64 = lap_ms.iter().sum();
    let fastest = lap_ms.iter().copied().fold(f64::INFINITY, f64::min);
    (
        Some(total / lap_ms.len() as f64),
        Some(fastest),
        Some(lap_ms.len() as u32),
    )
}

/// Match an event by name: exact (case-insensitive) first, then a unique
/// substring match so "Monaco" finds the Monaco Grand Prix.
fn find_event(events: &[Event], name: &str) -> Option<Event> {
    if let Some(event) = events
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
    {
        return Some(event.clone());
    }
    let needle = name.to_lowercase();
    let mut matches = events
        .iter()
        .filter(|e| e.name.to_lowercase().contains(&needle));
    match (matches.next(), matches.next()) {
        (Some(event), None) => Some(event.clone()),
        _ => None,
    }
}
