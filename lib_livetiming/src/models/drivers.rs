use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::serde_helpers::{entity_map, lenient_int};

/// # Driver List
///
/// Static driver metadata keyed by racing number.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DriverList(pub BTreeMap<String, DriverListEntry>);

impl<'de> Deserialize<'de> for DriverList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        entity_map(deserializer).map(DriverList)
    }
}

impl DriverList {
    pub fn get(&self, racing_number: &str) -> Option<&DriverListEntry> {
        self.0.get(racing_number)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DriverListEntry)> {
        self.0.iter()
    }

    /// Finds a driver by three-letter abbreviation.
    pub fn by_tla(&self, tla: &str) -> Option<&DriverListEntry> {
        self.0
            .values()
            .find(|entry| entry.tla.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(tla)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DriverListEntry {
    pub racing_number: Option<String>,
    pub broadcast_name: Option<String>,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Three-letter abbreviation.
    pub tla: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub line: Option<i64>,
    pub team_name: Option<String>,
    /// Hex colour without the leading `#`.
    pub team_colour: Option<String>,
    pub headshot_url: Option<String>,
    pub reference: Option<String>,
}
