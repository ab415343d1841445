use serde::{Deserialize, Serialize};

/// # Weather Data
///
/// Track-side weather station readings. The feed sends every value as a
/// decimal string; the accessors parse them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct WeatherData {
    /// Degrees Celsius.
    pub air_temp: Option<String>,
    /// Degrees Celsius.
    pub track_temp: Option<String>,
    /// Percent.
    pub humidity: Option<String>,
    /// Millibar.
    pub pressure: Option<String>,
    /// `"0"` or `"1"`.
    pub rainfall: Option<String>,
    /// Degrees.
    pub wind_direction: Option<String>,
    /// Metres per second.
    pub wind_speed: Option<String>,
}

fn parse(field: &Option<String>) -> Option<f64> {
    field.as_deref()?.trim().parse().ok()
}

impl WeatherData {
    pub fn air_temp_c(&self) -> Option<f64> {
        parse(&self.air_temp)
    }

    pub fn track_temp_c(&self) -> Option<f64> {
        parse(&self.track_temp)
    }

    pub fn humidity_pct(&self) -> Option<f64> {
        parse(&self.humidity)
    }

    pub fn pressure_mbar(&self) -> Option<f64> {
        parse(&self.pressure)
    }

    pub fn wind_speed_ms(&self) -> Option<f64> {
        parse(&self.wind_speed)
    }

    pub fn wind_direction_deg(&self) -> Option<f64> {
        parse(&self.wind_direction)
    }

    pub fn is_raining(&self) -> Option<bool> {
        parse(&self.rainfall).map(|v| v > 0.0)
    }
}
