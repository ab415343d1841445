use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{
    DriverList, LapCount, RaceControlMessages, SessionData, SessionInfo, TimingAppData,
    TimingData, TimingStats, WeatherData,
};

/// Top-level sections carried by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    DriverList,
    ExtrapolatedClock,
    HeartBeat,
    LapCount,
    PitLaneTimeCollection,
    RaceControlMessages,
    SessionData,
    SessionInfo,
    SessionStatus,
    TeamRadio,
    TimingAppData,
    TimingData,
    TimingStats,
    TrackStatus,
    WeatherData,
}

impl Section {
    pub const ALL: [Section; 15] = [
        Section::DriverList,
        Section::ExtrapolatedClock,
        Section::HeartBeat,
        Section::LapCount,
        Section::PitLaneTimeCollection,
        Section::RaceControlMessages,
        Section::SessionData,
        Section::SessionInfo,
        Section::SessionStatus,
        Section::TeamRadio,
        Section::TimingAppData,
        Section::TimingData,
        Section::TimingStats,
        Section::TrackStatus,
        Section::WeatherData,
    ];

    /// Key of the section in the state tree.
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::DriverList => "DriverList",
            Section::ExtrapolatedClock => "ExtrapolatedClock",
            Section::HeartBeat => "HeartBeat",
            Section::LapCount => "LapCount",
            Section::PitLaneTimeCollection => "PitLaneTimeCollection",
            Section::RaceControlMessages => "RaceControlMessages",
            Section::SessionData => "SessionData",
            Section::SessionInfo => "SessionInfo",
            Section::SessionStatus => "SessionStatus",
            Section::TeamRadio => "TeamRadio",
            Section::TimingAppData => "TimingAppData",
            Section::TimingData => "TimingData",
            Section::TimingStats => "TimingStats",
            Section::TrackStatus => "TrackStatus",
            Section::WeatherData => "WeatherData",
        }
    }

    /// Sections whose records live under a `Lines` map keyed by racing number.
    pub fn has_lines(&self) -> bool {
        matches!(
            self,
            Section::TimingData | Section::TimingAppData | Section::TimingStats
        )
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| format!("unknown section '{}'", s))
    }
}

/// # F1 State
///
/// The whole live timing state tree. A JSON object keyed by section name;
/// unknown sections are kept as-is. Typed views over the known sections are
/// deserialized on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct F1State(Map<String, Value>);

impl F1State {
    /// Wraps a JSON object. Any other value is handed back unchanged.
    pub fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub(crate) fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    /// Raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn section(&self, section: Section) -> Option<&Value> {
        self.0.get(section.as_str())
    }

    pub fn contains(&self, section: Section) -> bool {
        self.0.contains_key(section.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deserializes a section into `T`. `Ok(None)` when the section is absent
    /// or `null`.
    pub fn section_as<T: DeserializeOwned>(
        &self,
        section: Section,
    ) -> Result<Option<T>, serde_json::Error> {
        match self.section(section) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value).map(Some),
        }
    }

    pub fn timing_data(&self) -> Result<Option<TimingData>, serde_json::Error> {
        self.section_as(Section::TimingData)
    }

    pub fn timing_stats(&self) -> Result<Option<TimingStats>, serde_json::Error> {
        self.section_as(Section::TimingStats)
    }

    pub fn timing_app_data(&self) -> Result<Option<TimingAppData>, serde_json::Error> {
        self.section_as(Section::TimingAppData)
    }

    pub fn driver_list(&self) -> Result<Option<DriverList>, serde_json::Error> {
        self.section_as(Section::DriverList)
    }

    pub fn session_info(&self) -> Result<Option<SessionInfo>, serde_json::Error> {
        self.section_as(Section::SessionInfo)
    }

    pub fn session_data(&self) -> Result<Option<SessionData>, serde_json::Error> {
        self.section_as(Section::SessionData)
    }

    pub fn weather_data(&self) -> Result<Option<WeatherData>, serde_json::Error> {
        self.section_as(Section::WeatherData)
    }

    pub fn race_control_messages(
        &self,
    ) -> Result<Option<RaceControlMessages>, serde_json::Error> {
        self.section_as(Section::RaceControlMessages)
    }

    pub fn lap_count(&self) -> Result<Option<LapCount>, serde_json::Error> {
        self.section_as(Section::LapCount)
    }

    /// Serialized length in bytes, used as a rough size estimate.
    pub fn encoded_len(&self) -> usize {
        serde_json::to_string(&self.0).map(|s| s.len()).unwrap_or(0)
    }
}

impl From<Map<String, Value>> for F1State {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_names_round_trip() {
        for section in Section::ALL {
            assert_eq!(section.as_str().parse::<Section>(), Ok(section));
        }
        assert!("Telemetry".parse::<Section>().is_err());
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(F1State::from_value(json!({"LapCount": {"CurrentLap": 1}})).is_ok());
        assert_eq!(F1State::from_value(json!([1, 2])), Err(json!([1, 2])));
    }

    #[test]
    fn test_typed_section_access() {
        let state = F1State::from_value(json!({
            "LapCount": {"CurrentLap": 12, "TotalLaps": 57},
            "WeatherData": null
        }))
        .unwrap();

        let laps = state.lap_count().unwrap().unwrap();
        assert_eq!(laps.current_lap, Some(12));
        assert_eq!(laps.total_laps, Some(57));
        assert!(state.weather_data().unwrap().is_none());
        assert!(state.timing_data().unwrap().is_none());
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let state = F1State::from_value(json!({"TrackStatus": {"Status": "1"}})).unwrap();
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"TrackStatus": {"Status": "1"}})
        );
    }
}
