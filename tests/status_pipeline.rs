use anker_bridge::telemetry::TelemetryRecord;
use anker_bridge::translator::EventTranslator;
use serde_json::json;

fn record(fields: serde_json::Value) -> TelemetryRecord {
    serde_json::from_value(fields).unwrap()
}

#[test]
fn test_batch_of_telemetry_diffs_once() {
    let mut translator = EventTranslator::new();

    // A realistic burst: bed heating, nozzle idle, one lifecycle event.
    for fields in [
        json!({"commandType": 1004, "currentTemp": "2150", "targetTemp": "6000"}),
        json!({"commandType": 1003, "currentTemp": "2080", "targetTemp": "0"}),
        json!({"commandType": 1000, "subType": 1, "value": 8}),
    ] {
        assert!(translator.dispatch(&record(fields)).is_none());
    }

    let update = translator.model.status_update();
    let mut changed: Vec<&str> = update.keys().map(String::as_str).collect();
    changed.sort();
    assert_eq!(
        changed,
        vec!["display_status", "extruder", "heater_bed", "print_stats"]
    );
    assert_eq!(update["heater_bed"]["target"], json!(60.0));
    assert_eq!(update["print_stats"]["state"], "heating");

    // Nothing moved since: the follow-up diff must be empty.
    assert!(translator.model.status_update().is_empty());
}

#[test]
fn test_fault_wins_within_one_batch() {
    let mut translator = EventTranslator::new();
    translator.dispatch(&record(json!({"commandType": 1000, "subType": 1, "value": 1})));
    translator.dispatch(&record(json!({"commandType": 1000, "subType": 2, "value": 11})));
    translator.dispatch(&record(json!({"commandType": 1013, "real_print_layer": 1, "total_layer": 10})));

    let update = translator.model.status_update();
    assert_eq!(update["print_stats"]["state"], "error");
    assert_eq!(update["display_status"]["message"], "Printing");
}

#[test]
fn test_full_resync_includes_unchanged_sections() {
    let mut translator = EventTranslator::new();
    translator.dispatch(&record(json!({"commandType": 1012, "value": 1})));
    translator.model.status_update();

    let full = translator.model.status_full();
    assert_eq!(full["toolhead"]["homed_axes"], "xyz");
    assert!(full.contains_key("webhooks"));
    assert!(full.contains_key("system_stats"));
}

#[test]
fn test_mesh_report_round_trips_into_full_status() {
    let text = "Bilinear Leveling Grid:\n 0 1 2\n 0 0.1 0.2\n1 0.3 0.4\n2 0.5 0.6\n3 0.7 0.8\n4 0.9 1.0\n5 1.1 1.2\n6 1.3 1.4";
    let mut translator = EventTranslator::new();
    translator.dispatch(&record(json!({"commandType": 1010, "resData": text})));

    let update = translator.model.status_update();
    let mesh = &update["bed_mesh"];
    assert_eq!(mesh["profile_name"], "anker-builtin");
    assert_eq!(mesh["probed_matrix"].as_array().unwrap().len(), 7);
    assert_eq!(mesh["profiles"]["anker-builtin"]["points"][0], json!([0.1, 0.2]));
}
