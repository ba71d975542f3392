use iec61850_telemetry::{
    metrics, new_correlation_uid, record_command_retry, record_notifications_flushed,
};

#[test]
fn correlation_uids_are_unique() {
    let first = new_correlation_uid();
    let second = new_correlation_uid();
    assert!(!first.is_empty());
    assert_ne!(first, second);
}

#[test]
fn counters_accumulate() {
    let before = metrics().snapshot();
    record_command_retry();
    record_notifications_flushed(3);
    let after = metrics().snapshot();
    assert!(after.command_retries >= before.command_retries + 1);
    assert!(after.notifications_flushed >= before.notifications_flushed + 3);
}
