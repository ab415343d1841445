use lib_livetiming::models::DriverList;
use lib_livetiming::F1State;

/// Leaders shown per summary.
pub const TOP_N: usize = 5;

/// One-line view of the running order, e.g.
/// `Lap 12/57 | P1 VER +0.000 | P2 LEC +1.204`.
pub fn summarize(state: &F1State) -> String {
    let mut parts = Vec::new();

    if let Ok(Some(info)) = state.session_info() {
        let meeting = info.meeting.and_then(|m| m.name);
        match (meeting, info.name) {
            (Some(meeting), Some(session)) => parts.push(format!("{} {}", meeting, session)),
            (None, Some(session)) => parts.push(session),
            _ => {}
        }
    }

    if let Ok(Some(laps)) = state.lap_count() {
        match (laps.current_lap, laps.total_laps) {
            (Some(current), Some(total)) => parts.push(format!("Lap {}/{}", current, total)),
            (Some(current), None) => parts.push(format!("Lap {}", current)),
            _ => {}
        }
    }

    let drivers = state.driver_list().ok().flatten().unwrap_or_default();
    match state.timing_data() {
        Ok(Some(timing)) => {
            for (number, line) in timing.by_position().into_iter().take(TOP_N) {
                let Some(position) = line.position else {
                    continue;
                };
                let gap = line.gap_to_leader.as_deref().filter(|g| !g.is_empty()).unwrap_or("-");
                parts.push(format!("P{} {} {}", position, driver_label(&drivers, number), gap));
            }
        }
        Ok(None) => {}
        Err(e) => log::warn!("TimingData could not be read: {}", e),
    }

    if let Ok(Some(weather)) = state.weather_data() {
        if let Some(track) = weather.track_temp_c() {
            parts.push(format!("Track {:.1}C", track));
        }
    }

    if parts.is_empty() {
        format!("{} sections, no timing yet", state.len())
    } else {
        parts.join(" | ")
    }
}

fn driver_label(drivers: &DriverList, number: &str) -> String {
    drivers
        .get(number)
        .and_then(|entry| entry.tla.clone())
        .unwrap_or_else(|| format!("#{}", number))
}
