use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::serde_helpers::{indexed_vec, lenient_int};

/// # Race Control Messages
///
/// Flags, penalties and track notices in the order they were issued.
/// Updates append by index, so the list may arrive as an index-keyed object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RaceControlMessages {
    #[serde(deserialize_with = "indexed_vec")]
    pub messages: Vec<RaceControlMessage>,
}

impl RaceControlMessages {
    pub fn latest(&self) -> Option<&RaceControlMessage> {
        self.messages.iter().rev().find(|m| m.message.is_some())
    }

    /// Messages carrying a flag, e.g. `YELLOW`, `CHEQUERED`.
    pub fn flags(&self) -> impl Iterator<Item = &RaceControlMessage> {
        self.messages.iter().filter(|m| m.flag.is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RaceControlMessage {
    /// Issue time in UTC, e.g. `2024-03-02T15:03:12`.
    pub utc: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub lap: Option<i64>,
    pub category: Option<String>,
    pub flag: Option<String>,
    pub scope: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub sector: Option<i64>,
    pub racing_number: Option<String>,
    pub message: Option<String>,
}

impl RaceControlMessage {
    /// Parses `utc`, with or without a trailing zone designator.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.utc.as_deref()?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}
