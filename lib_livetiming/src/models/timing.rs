//! # Timing Sections
//!
//! Typed views over `TimingData`, `TimingStats` and `TimingAppData`. Each
//! carries a `Lines` map keyed by racing number. Every field is optional
//! because a section read mid-session may hold only what the deltas filled in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::serde_helpers::{entity_map, indexed_vec, lenient_int};

/// # Timing Data
///
/// Live running order, gaps, lap and sector times.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TimingData {
    /// Per-driver timing lines keyed by racing number.
    #[serde(deserialize_with = "entity_map")]
    pub lines: BTreeMap<String, TimingDataLine>,
    pub withheld: Option<bool>,
}

impl TimingData {
    /// Lines sorted by running position. Lines without a position go last.
    pub fn by_position(&self) -> Vec<(&str, &TimingDataLine)> {
        let mut lines: Vec<_> = self
            .lines
            .iter()
            .map(|(number, line)| (number.as_str(), line))
            .collect();
        lines.sort_by_key(|(_, line)| line.position.unwrap_or(i64::MAX));
        lines
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TimingDataLine {
    pub racing_number: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub position: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    pub line: Option<i64>,
    pub show_position: Option<bool>,
    pub gap_to_leader: Option<String>,
    pub interval_to_position_ahead: Option<Interval>,
    pub time_diff_to_fastest: Option<String>,
    pub time_diff_to_position_ahead: Option<String>,
    pub best_lap_time: Option<LapTime>,
    pub last_lap_time: Option<LapTime>,
    #[serde(deserialize_with = "lenient_int")]
    pub number_of_laps: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    pub number_of_pit_stops: Option<i64>,
    /// Sector times in lap order.
    #[serde(deserialize_with = "indexed_vec")]
    pub sectors: Vec<Sector>,
    pub speeds: Option<Speeds>,
    pub in_pit: Option<bool>,
    pub pit_out: Option<bool>,
    pub retired: Option<bool>,
    pub stopped: Option<bool>,
    #[serde(deserialize_with = "lenient_int")]
    pub status: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Interval {
    pub value: Option<String>,
    pub catching: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LapTime {
    pub value: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub lap: Option<i64>,
    pub overall_fastest: Option<bool>,
    pub personal_fastest: Option<bool>,
    #[serde(deserialize_with = "lenient_int")]
    pub status: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Sector {
    pub value: Option<String>,
    pub previous_value: Option<String>,
    pub overall_fastest: Option<bool>,
    pub personal_fastest: Option<bool>,
    pub stopped: Option<bool>,
    #[serde(deserialize_with = "lenient_int")]
    pub status: Option<i64>,
    /// Mini-sector status flags.
    #[serde(deserialize_with = "indexed_vec")]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Segment {
    #[serde(deserialize_with = "lenient_int")]
    pub status: Option<i64>,
}

/// Speed trap readings: finish line, two intermediates, speed trap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Speeds {
    #[serde(rename = "FL")]
    pub fl: Option<SpeedReading>,
    #[serde(rename = "I1")]
    pub i1: Option<SpeedReading>,
    #[serde(rename = "I2")]
    pub i2: Option<SpeedReading>,
    #[serde(rename = "ST")]
    pub st: Option<SpeedReading>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SpeedReading {
    pub value: Option<String>,
    pub overall_fastest: Option<bool>,
    pub personal_fastest: Option<bool>,
    #[serde(deserialize_with = "lenient_int")]
    pub status: Option<i64>,
    /// Rank, present on best-speed entries.
    #[serde(deserialize_with = "lenient_int")]
    pub position: Option<i64>,
}

/// # Timing Stats
///
/// Personal bests per driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TimingStats {
    #[serde(deserialize_with = "entity_map")]
    pub lines: BTreeMap<String, TimingStatsLine>,
    pub session_type: Option<String>,
    pub withheld: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TimingStatsLine {
    pub racing_number: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub line: Option<i64>,
    pub personal_best_lap_time: Option<BestValue>,
    #[serde(deserialize_with = "indexed_vec")]
    pub best_sectors: Vec<BestValue>,
    pub best_speeds: Option<Speeds>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct BestValue {
    pub value: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub position: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    pub lap: Option<i64>,
}

/// # Timing App Data
///
/// Grid positions and tyre stints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TimingAppData {
    #[serde(deserialize_with = "entity_map")]
    pub lines: BTreeMap<String, TimingAppDataLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TimingAppDataLine {
    pub racing_number: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub line: Option<i64>,
    pub grid_pos: Option<String>,
    #[serde(deserialize_with = "indexed_vec")]
    pub stints: Vec<Stint>,
}

impl TimingAppDataLine {
    /// The stint currently running, i.e. the last one reported.
    pub fn current_stint(&self) -> Option<&Stint> {
        self.stints.last()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Stint {
    pub compound: Option<String>,
    /// `"true"` / `"false"` on the wire.
    pub new: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub lap_flags: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    pub lap_number: Option<i64>,
    pub lap_time: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub start_laps: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    pub total_laps: Option<i64>,
    /// `"0"` / `"1"` on the wire.
    pub tyres_not_changed: Option<String>,
}

impl Stint {
    pub fn is_new_tyre(&self) -> Option<bool> {
        self.new.as_deref().and_then(|v| v.parse().ok())
    }

    /// Laps on this set of tyres so far.
    pub fn tyre_age(&self) -> Option<i64> {
        self.total_laps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timing_data_from_mixed_shapes() {
        let data: TimingData = serde_json::from_value(json!({
            "Lines": {
                "1": {
                    "Position": "2",
                    "RacingNumber": "1",
                    "Sectors": {"1": {"Value": "28.1", "Segments": [{"Status": 2049}]}},
                    "Speeds": {"ST": {"Value": "310"}}
                },
                "44": {"Position": 1, "RacingNumber": "44"}
            },
            "Withheld": false,
            "_kf": true
        }))
        .unwrap();

        let line = &data.lines["1"];
        assert_eq!(line.position, Some(2));
        assert_eq!(line.sectors.len(), 2);
        assert_eq!(line.sectors[0], Sector::default());
        assert_eq!(line.sectors[1].value.as_deref(), Some("28.1"));
        assert_eq!(line.sectors[1].segments[0].status, Some(2049));
        assert_eq!(line.speeds.as_ref().and_then(|s| s.st.as_ref()).and_then(|s| s.value.as_deref()), Some("310"));

        let order: Vec<&str> = data.by_position().into_iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["44", "1"]);
    }

    #[test]
    fn test_stints() {
        let data: TimingAppData = serde_json::from_value(json!({
            "Lines": {"16": {"Stints": [
                {"Compound": "MEDIUM", "New": "true", "TotalLaps": 14},
                {"Compound": "HARD", "New": "false", "TotalLaps": "3"}
            ]}}
        }))
        .unwrap();
        let stint = data.lines["16"].current_stint().unwrap();
        assert_eq!(stint.compound.as_deref(), Some("HARD"));
        assert_eq!(stint.is_new_tyre(), Some(false));
        assert_eq!(stint.tyre_age(), Some(3));
    }
}
