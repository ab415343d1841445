//! # Models Module
//!
//! Typed read views over the sections of the state tree. The store keeps the
//! raw JSON; these structs are deserialized on demand through the
//! `F1State` accessors, so unknown fields never block a merge.
//!
//! Wire quirks handled here:
//! - integer fields sent as strings (`"Position": "1"`),
//! - ordered lists sent as index-keyed objects (`{"1": {...}}`),
//! - `_kf` flags mixed into entity maps.

pub mod drivers;
pub mod race_control;
pub mod serde_helpers;
pub mod session;
pub mod timing;
pub mod weather;

// --- Public API Re-exports ---
pub use drivers::{DriverList, DriverListEntry};
pub use race_control::{RaceControlMessage, RaceControlMessages};
pub use session::{
    ArchiveStatus, Circuit, Country, LapCount, LapSeries, Meeting, SessionData, SessionInfo,
    StatusSeries, TrackStatus,
};
pub use timing::{
    BestValue, Interval, LapTime, Sector, Segment, SpeedReading, Speeds, Stint, TimingAppData,
    TimingAppDataLine, TimingData, TimingDataLine, TimingStats, TimingStatsLine,
};
pub use weather::WeatherData;
