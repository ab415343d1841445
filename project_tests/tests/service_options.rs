use std::io::Write;

use lib_livetiming::{ConfigError, ServiceOptions};
use project_tests::{scripted_service, start_connected};
use serde_json::json;

#[test]
fn options_load_from_a_partial_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "{}",
        json!({
            "url": "http://timing.local/livetiming/api/realtime",
            "connection": {"maxRetries": 3, "initialRetryDelayMs": 250},
            "store": {"enableSnapshot": true, "maxSnapshots": 2, "extraIndexedFields": ["Stints"]},
            "updateHandler": {"allowEmpty": true}
        })
    )
    .unwrap();

    let options = ServiceOptions::from_file(file.path()).unwrap();
    assert_eq!(options.url, "http://timing.local/livetiming/api/realtime");
    assert_eq!(options.connection.max_retries, 3);
    assert_eq!(options.connection.max_retry_delay_ms, 30_000);
    assert_eq!(options.store.max_snapshots, 2);
    assert!(options.update_handler.allow_empty);
    assert!(options.initial_handler.add_timestamp);

    let (service, transport) = scripted_service(options);
    start_connected(&service, &transport);
    assert_eq!(transport.urls(), vec!["http://timing.local/livetiming/api/realtime".to_string()]);

    transport.send_initial(&json!({"LapCount": {"CurrentLap": 1}}));
    transport.send_update(&json!({"LapCount": {"CurrentLap": 2}}));
    transport.send_update(&json!({"LapCount": {"CurrentLap": 3}}));
    let ids: Vec<u64> = service.store().snapshots().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn extra_indexed_fields_use_the_slot_merge() {
    let mut options = ServiceOptions::default();
    options.store.extra_indexed_fields = vec!["Stints".to_string()];
    let (service, transport) = scripted_service(options);
    start_connected(&service, &transport);

    transport.send_initial(&json!({
        "TimingAppData": {"Lines": {"4": {"Stints": [{"Compound": "SOFT", "TotalLaps": 10}]}}}
    }));
    transport.send_update(&json!({
        "TimingAppData": {"Lines": {"4": {"Stints": {"0": {"TotalLaps": 11}, "1": {"Compound": "HARD", "New": "true"}}}}}
    }));

    let state = service.get_state().unwrap();
    let stints = &state.get("TimingAppData").unwrap()["Lines"]["4"]["Stints"];
    assert_eq!(
        stints,
        &json!([{"Compound": "SOFT", "TotalLaps": 11}, {"Compound": "HARD", "New": "true"}])
    );

    let app = state.timing_app_data().unwrap().unwrap();
    let stint = app.lines["4"].current_stint().unwrap();
    assert_eq!(stint.compound.as_deref(), Some("HARD"));
    assert_eq!(stint.is_new_tyre(), Some(true));
}

#[test]
fn invalid_options_file_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{\"connection\": {{\"maxRetries\": \"many\"}}}}").unwrap();

    match ServiceOptions::from_file(file.path()) {
        Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
        other => panic!("expected parse error, got {:?}", other.map(|o| o.url)),
    }
}
