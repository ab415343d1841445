//! # End-to-end State Synchronization
//!
//! Drives `LiveTimingService` through the scripted transport: stream events
//! go through the connection layer, the handlers and into the store exactly
//! as they would from the network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lib_livetiming::{F1State, ServiceOptions};
use project_tests::{scripted_service, start_connected, Recorder};
use serde_json::json;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn position_is_coerced_and_merged_field_locally() {
    init();
    let (service, transport) = scripted_service(ServiceOptions::default());
    start_connected(&service, &transport);

    transport.send_initial(&json!({
        "TimingData": {"Lines": {"44": {"Position": "1", "GapToLeader": "", "NumberOfLaps": "3"}}}
    }));
    let state = service.get_state().unwrap();
    assert_eq!(state.get("TimingData").unwrap()["Lines"]["44"]["Position"], json!(1));

    transport.send_update(&json!({"TimingData": {"Lines": {"44": {"Position": "2"}}}}));

    let state = service.get_state().unwrap();
    let line = &state.get("TimingData").unwrap()["Lines"]["44"];
    assert_eq!(line["Position"], json!(2));
    assert_eq!(line["GapToLeader"], json!(""));
    assert_eq!(line["NumberOfLaps"], json!(3));

    let timing = state.timing_data().unwrap().unwrap();
    assert_eq!(timing.lines["44"].position, Some(2));
}

#[test]
fn sector_update_replaces_only_its_slot() {
    init();
    let (service, transport) = scripted_service(ServiceOptions::default());
    start_connected(&service, &transport);

    transport.send_initial(&json!({
        "TimingData": {"Lines": {"1": {
            "Sectors": [{"Value": "10.1"}, {"Value": "20.2"}, {"Value": "30.3"}]
        }}}
    }));
    transport.send_update(&json!({
        "TimingData": {"Lines": {"1": {"Sectors": {"1": {"Value": "21.0"}}}}}
    }));

    let sectors = service
        .store()
        .select(|state| state.get("TimingData").map(|t| t["Lines"]["1"]["Sectors"].clone()))
        .flatten()
        .unwrap();
    assert_eq!(
        sectors,
        json!([{"Value": "10.1"}, {"Value": "21.0"}, {"Value": "30.3"}])
    );
}

#[test]
fn segments_and_best_sectors_keep_their_shape() {
    init();
    let (service, transport) = scripted_service(ServiceOptions::default());
    start_connected(&service, &transport);

    transport.send_initial(&json!({
        "TimingData": {"Lines": {"16": {"Sectors": [
            {"Value": "", "Segments": [{"Status": 2048}, {"Status": 2048}]}
        ]}}},
        "TimingStats": {"Lines": {"16": {"BestSectors": {"0": {"Value": "29.1"}}}}}
    }));
    transport.send_update(&json!({
        "TimingData": {"Lines": {"16": {"Sectors": {"0": {"Segments": {"1": {"Status": 2049}}}}}}},
        "TimingStats": {"Lines": {"16": {"BestSectors": {"2": {"Value": "27.4"}}}}}
    }));

    let state = service.get_state().unwrap();
    let sector = &state.get("TimingData").unwrap()["Lines"]["16"]["Sectors"][0];
    assert_eq!(sector["Value"], json!(""));
    assert_eq!(sector["Segments"], json!([{"Status": 2048}, {"Status": 2049}]));

    let best = &state.get("TimingStats").unwrap()["Lines"]["16"]["BestSectors"];
    assert_eq!(best, &json!({"0": {"Value": "29.1"}, "2": {"Value": "27.4"}}));
}

#[test]
fn null_clears_and_absent_preserves() {
    init();
    let (service, transport) = scripted_service(ServiceOptions::default());
    start_connected(&service, &transport);

    transport.send_initial(&json!({
        "TrackStatus": {"Status": "1", "Message": "AllClear"},
        "LapCount": {"CurrentLap": 4, "TotalLaps": 57}
    }));
    transport.send_update(&json!({"TrackStatus": {"Message": null}}));

    let state = service.get_state().unwrap();
    assert_eq!(state.get("TrackStatus").unwrap()["Message"], json!(null));
    assert_eq!(state.get("TrackStatus").unwrap()["Status"], json!("1"));
    assert_eq!(state.lap_count().unwrap().unwrap().total_laps, Some(57));
}

#[test]
fn update_before_initial_is_dropped() {
    init();
    let (service, transport) = scripted_service(ServiceOptions::default());
    start_connected(&service, &transport);

    transport.send_update(&json!({"LapCount": {"CurrentLap": 2}}));
    assert!(!service.is_initialized());
    assert!(service.get_state().is_none());

    transport.send_initial(&json!({"LapCount": {"CurrentLap": 1}}));
    assert!(service.is_initialized());
    assert_eq!(service.get_stats().data_store.update_count, 0);
}

#[test]
fn second_initial_replaces_state() {
    init();
    let (service, transport) = scripted_service(ServiceOptions::default());
    start_connected(&service, &transport);

    transport.send_initial(&json!({"WeatherData": {"AirTemp": "24.1"}}));
    transport.send_initial(&json!({"LapCount": {"CurrentLap": 1}}));

    let state = service.get_state().unwrap();
    assert!(state.get("WeatherData").is_none());
    assert!(state.get("LapCount").is_some());
}

#[test]
fn panicking_subscriber_does_not_starve_others() {
    init();
    let (service, transport) = scripted_service(ServiceOptions::default());
    start_connected(&service, &transport);

    let before = Arc::new(AtomicUsize::new(0));
    let after = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&before);
    let _first = service.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let _faulty = service.subscribe(|state| {
        if state.is_some() {
            panic!("subscriber bug");
        }
    });
    let counter = Arc::clone(&after);
    let _last = service.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    transport.send_initial(&json!({"LapCount": {"CurrentLap": 1}}));
    transport.send_update(&json!({"LapCount": {"CurrentLap": 2}}));

    assert_eq!(before.load(Ordering::SeqCst), 2);
    assert_eq!(after.load(Ordering::SeqCst), 2);
    assert!(service.is_initialized());
}

#[test]
fn selector_fires_on_every_change_until_unsubscribed() {
    init();
    let (service, transport) = scripted_service(ServiceOptions::default());
    start_connected(&service, &transport);
    transport.send_initial(&json!({"LapCount": {"CurrentLap": 1}, "WeatherData": {"AirTemp": "20.0"}}));

    let laps = Recorder::new();
    let seen = laps.clone();
    let subscription = service.subscribe_selector(
        |state: &F1State| state.lap_count().ok().flatten().and_then(|l| l.current_lap),
        move |lap| seen.push(lap),
    );
    assert_eq!(laps.values(), vec![Some(1)]);

    // Unrelated section: the selected value is unchanged but still delivered.
    transport.send_update(&json!({"WeatherData": {"AirTemp": "20.5"}}));
    transport.send_update(&json!({"LapCount": {"CurrentLap": 2}}));
    assert_eq!(laps.values(), vec![Some(1), Some(1), Some(2)]);

    subscription.unsubscribe();
    transport.send_update(&json!({"LapCount": {"CurrentLap": 3}}));
    assert_eq!(laps.len(), 3);
}

#[test]
fn snapshots_record_and_restore() {
    init();
    let options = ServiceOptions::default().with_snapshots(true);
    let (service, transport) = scripted_service(options);
    start_connected(&service, &transport);

    transport.send_initial(&json!({"LapCount": {"CurrentLap": 1}}));
    transport.send_update(&json!({"LapCount": {"CurrentLap": 2}}));

    let snapshots = service.store().snapshots();
    assert_eq!(snapshots.len(), 2);
    let first = snapshots[0].id;

    assert!(service.store().restore_snapshot(first));
    let lap = service.get_state().unwrap().lap_count().unwrap().unwrap().current_lap;
    assert_eq!(lap, Some(1));

    assert!(!service.store().restore_snapshot(first + 100));
    service.store().clear_snapshots();
    assert!(service.store().snapshots().is_empty());
}

#[test]
fn returned_state_is_an_owned_copy() {
    init();
    let (service, transport) = scripted_service(ServiceOptions::default());
    start_connected(&service, &transport);
    transport.send_initial(&json!({"LapCount": {"CurrentLap": 1}}));

    let mut copy = service.get_state().unwrap().into_value();
    copy["LapCount"]["CurrentLap"] = json!(99);

    let lap = service.store().get_state_slice("LapCount").unwrap();
    assert_eq!(lap["CurrentLap"], json!(1));
}
