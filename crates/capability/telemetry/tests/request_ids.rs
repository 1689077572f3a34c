use smsgw_telemetry::{metrics, new_request_ids, record_registry_swept, record_submission};

#[test]
fn request_ids_non_empty() {
    let ids = new_request_ids();
    assert!(!ids.request_id.is_empty());
    assert!(!ids.trace_id.is_empty());
}

#[test]
fn counters_accumulate() {
    let before = metrics().snapshot();
    record_submission();
    record_registry_swept(3);
    let after = metrics().snapshot();
    assert!(after.submissions >= before.submissions + 1);
    assert!(after.registry_swept >= before.registry_swept + 3);
}
