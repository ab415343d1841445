use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::serde_helpers::{indexed_vec, lenient_int};

/// # Session Info
///
/// The meeting and session being timed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SessionInfo {
    #[serde(deserialize_with = "lenient_int")]
    pub key: Option<i64>,
    pub name: Option<String>,
    /// `Race`, `Qualifying`, `Practice`, ...
    #[serde(rename = "Type")]
    pub session_type: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub number: Option<i64>,
    pub path: Option<String>,
    pub session_status: Option<String>,
    /// Local start time without offset, e.g. `2024-03-02T18:00:00`.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Offset of the local times, e.g. `03:00:00` or `-04:00:00`.
    pub gmt_offset: Option<String>,
    pub meeting: Option<Meeting>,
    pub archive_status: Option<ArchiveStatus>,
}

impl SessionInfo {
    /// Start time with its offset applied.
    pub fn start_time(&self) -> Option<DateTime<FixedOffset>> {
        local_with_offset(self.start_date.as_deref()?, self.gmt_offset.as_deref()?)
    }

    pub fn end_time(&self) -> Option<DateTime<FixedOffset>> {
        local_with_offset(self.end_date.as_deref()?, self.gmt_offset.as_deref()?)
    }
}

fn local_with_offset(local: &str, offset: &str) -> Option<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S").ok()?;
    let (sign, rest) = match offset.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, offset.strip_prefix('+').unwrap_or(offset)),
    };
    let mut parts = rest.split(':').map(|p| p.parse::<i32>());
    let hours = parts.next()?.ok()?;
    let minutes = parts.next().transpose().ok()?.unwrap_or(0);
    let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;
    naive.and_local_timezone(offset).single()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Meeting {
    #[serde(deserialize_with = "lenient_int")]
    pub key: Option<i64>,
    pub name: Option<String>,
    pub official_name: Option<String>,
    pub location: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub number: Option<i64>,
    pub country: Option<Country>,
    pub circuit: Option<Circuit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Country {
    #[serde(deserialize_with = "lenient_int")]
    pub key: Option<i64>,
    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Circuit {
    #[serde(deserialize_with = "lenient_int")]
    pub key: Option<i64>,
    pub short_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ArchiveStatus {
    pub status: Option<String>,
}

/// # Session Data
///
/// Lap and track-status history of the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SessionData {
    #[serde(deserialize_with = "indexed_vec")]
    pub series: Vec<LapSeries>,
    #[serde(deserialize_with = "indexed_vec")]
    pub status_series: Vec<StatusSeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LapSeries {
    pub utc: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub lap: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct StatusSeries {
    pub utc: Option<String>,
    pub track_status: Option<String>,
    pub session_status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LapCount {
    #[serde(deserialize_with = "lenient_int")]
    pub current_lap: Option<i64>,
    #[serde(deserialize_with = "lenient_int")]
    pub total_laps: Option<i64>,
}

impl LapCount {
    pub fn laps_remaining(&self) -> Option<i64> {
        Some((self.total_laps? - self.current_lap?).max(0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TrackStatus {
    /// Numeric code as a string: `1` green, `2` yellow, `4` safety car, ...
    pub status: Option<String>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_info_times() {
        let info: SessionInfo = serde_json::from_value(json!({
            "Key": 9472,
            "Type": "Race",
            "StartDate": "2024-03-02T18:00:00",
            "EndDate": "2024-03-02T20:00:00",
            "GmtOffset": "03:00:00",
            "Meeting": {"Name": "Bahrain Grand Prix", "Circuit": {"Key": 63, "ShortName": "Sakhir"}}
        }))
        .unwrap();

        assert_eq!(info.session_type.as_deref(), Some("Race"));
        let start = info.start_time().unwrap();
        assert_eq!(start.to_rfc3339(), "2024-03-02T18:00:00+03:00");
        assert_eq!(
            info.meeting.and_then(|m| m.circuit).and_then(|c| c.short_name).as_deref(),
            Some("Sakhir")
        );

        let negative = local_with_offset("2024-06-09T14:00:00", "-04:00:00").unwrap();
        assert_eq!(negative.to_rfc3339(), "2024-06-09T14:00:00-04:00");
    }

    #[test]
    fn test_session_data_sparse_series() {
        let data: SessionData = serde_json::from_value(json!({
            "Series": {"0": {"Lap": 1, "Utc": "2024-03-02T15:03:00Z"}, "1": {"Lap": "2"}},
            "StatusSeries": [{"TrackStatus": "AllClear"}]
        }))
        .unwrap();
        assert_eq!(data.series.len(), 2);
        assert_eq!(data.series[1].lap, Some(2));
        assert_eq!(data.status_series[0].track_status.as_deref(), Some("AllClear"));
    }

    #[test]
    fn test_laps_remaining() {
        let laps = LapCount { current_lap: Some(50), total_laps: Some(57) };
        assert_eq!(laps.laps_remaining(), Some(7));
        assert_eq!(LapCount::default().laps_remaining(), None);
    }
}
