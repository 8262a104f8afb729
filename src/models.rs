use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One race event within a season
///
/// The round number decides which standings snapshot counts as "before"
/// this event: the snapshot taken after round `round - 1` completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub season: u16,
    pub round: u32,
    pub name: String,
}

/// One driver's row for one event
///
/// Every field that can be missing in the source data is an `Option`, so
/// absence is visible in the type rather than smuggled through sentinel
/// values. A driver who never started has no grid position; the season
/// opener has no pre-race points; a cancelled session has no laps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRaceRecord {
    pub season: u16,
    pub round: u32,
    pub event: String,
    pub driver_code: String,
    pub team: String,
    pub grid_position: Option<u32>,
    pub points_before: Option<f64>,
    pub avg_lap_ms: Option<f64>,
    pub fastest_lap_ms: Option<f64>,
    pub total_laps: Option<u32>,
    pub final_position: Option<u32>,
}

impl DriverRaceRecord {
    /// Binary outcome label: finished 10th or better.
    ///
    /// `None` when the final position is unknown, which excludes the row
    /// from training but is the normal state for a not-yet-run event.
    pub fn top10(&self) -> Option<bool> {
        self.final_position.map(|p| p <= 10)
    }

    /// Key identifying this row within a multi-season dataset
    pub fn key(&self) -> (u16, u32, String) {
        (self.season, self.round, self.driver_code.clone())
    }

    /// The model-input subset of this record
    pub fn feature_row(&self) -> FeatureRow {
        FeatureRow {
            grid_position: self.grid_position.map(f64::from),
            points_before: self.points_before,
            team: Some(self.team.clone()),
            driver_code: Some(self.driver_code.clone()),
        }
    }
}

/// Model input fields for one driver at one event
///
/// Team and driver code are open vocabularies: values never seen during
/// training must still be accepted at prediction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub grid_position: Option<f64>,
    pub points_before: Option<f64>,
    pub team: Option<String>,
    pub driver_code: Option<String>,
}

/// Labeled training table spanning many events
///
/// Rows keep insertion order and the (season, round, driver) key is unique;
/// `push` refuses duplicates. Call [`HistoricalDataset::normalize_order`]
/// after any out-of-order collection so builds stay reproducible.
#[derive(Debug, Clone, Default)]
pub struct HistoricalDataset {
    records: Vec<DriverRaceRecord>,
    keys: HashSet<(u16, u32, String)>,
}

impl HistoricalDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, refusing duplicate (season, round, driver) keys.
    /// Returns whether the record was inserted.
    pub fn push(&mut self, record: DriverRaceRecord) -> bool {
        if !self.keys.insert(record.key()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = DriverRaceRecord>) {
        for record in records {
            self.push(record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DriverRaceRecord] {
        &self.records
    }

    /// Stable re-sort into (season, round) order, keeping per-event driver
    /// order as inserted.
    pub fn normalize_order(&mut self) {
        self.records
            .sort_by(|a, b| (a.season, a.round).cmp(&(b.season, b.round)));
    }

    /// Rows usable for supervised training: feature row plus label, for
    /// every record whose final position (and therefore label) is known.
    pub fn labeled_rows(&self) -> Vec<(FeatureRow, bool)> {
        self.records
            .iter()
            .filter_map(|r| r.top10().map(|label| (r.feature_row(), label)))
            .collect()
    }
}

/// One ranked entry of a prediction response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverPrediction {
    pub driver_code: String,
    pub team: String,
    pub grid_position: Option<u32>,
    /// Known only when predicting a historical event
    pub final_position: Option<u32>,
    pub top10_probability: f64,
}
