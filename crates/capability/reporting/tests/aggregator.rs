use async_trait::async_trait;
use domain::{
    DeviceFamily, DeviceIdentity, EventNotification, EventType, OutputSetting, RelayType,
};
use iec61850_protocol::{ConnectOptions, DeviceSession, Report, ReportListener};
use iec61850_reporting::{
    AggregatorState, ENTRY_TIME_OFFSET_MS, EventNotificationSink, ReportAggregator,
    ReportingError,
};
use iec61850_simulator::{EventMember, SimulatedIed, ssld_event_report};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<Vec<EventNotification>>>,
    fail: AtomicBool,
}

impl RecordingSink {
    fn batches(&self) -> Vec<Vec<EventNotification>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventNotificationSink for RecordingSink {
    async fn add_event_notifications(
        &self,
        _device_id: &str,
        notifications: Vec<EventNotification>,
    ) -> Result<(), ReportingError> {
        self.batches.lock().unwrap().push(notifications);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ReportingError::Sink("platform unavailable".into()));
        }
        Ok(())
    }
}

fn output_settings() -> Vec<OutputSetting> {
    vec![
        OutputSetting {
            internal_id: 1,
            external_id: 3,
            relay_type: RelayType::Light,
        },
        OutputSetting {
            internal_id: 2,
            external_id: 4,
            relay_type: RelayType::Light,
        },
    ]
}

fn light_on(sw_num: i64, trg_time: i64) -> EventMember {
    EventMember {
        evn_type: Some(11),
        sw_num: Some(sw_num),
        sw_val: Some(true),
        trg_type: Some(3),
        trg_time: Some(trg_time),
        remark: Some("remark".into()),
    }
}

async fn active_aggregator(sink: Arc<RecordingSink>) -> Arc<ReportAggregator> {
    let aggregator = Arc::new(ReportAggregator::new("SSLD-1", &output_settings(), sink));
    aggregator.activate().await;
    aggregator
}

#[tokio::test]
async fn flush_orders_notifications_by_time() {
    let sink = Arc::new(RecordingSink::default());
    let aggregator = active_aggregator(sink.clone()).await;

    aggregator
        .new_report(ssld_event_report(1, None, vec![light_on(1, 3_000), light_on(2, 1_000)]))
        .await;
    aggregator
        .new_report(ssld_event_report(2, None, vec![light_on(1, 2_000)]))
        .await;
    assert_eq!(aggregator.buffered().await, 3);

    aggregator.association_closed(None).await;

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    let times: Vec<i64> = batches[0].iter().map(|n| n.date_time_ms).collect();
    assert_eq!(times, vec![1_000, 2_000, 3_000]);
    let indexes: Vec<u8> = batches[0].iter().map(|n| n.index).collect();
    assert_eq!(indexes, vec![4, 3, 3]);
    assert_eq!(batches[0][0].event_type, EventType::LightEventsLightOn);
    assert_eq!(batches[0][0].description, "fixed time trigger");
    assert_eq!(aggregator.state().await, AggregatorState::Idle);
}

#[tokio::test]
async fn empty_buffer_is_not_flushed() {
    let sink = Arc::new(RecordingSink::default());
    let aggregator = active_aggregator(sink.clone()).await;
    aggregator.association_closed(None).await;
    assert!(sink.batches().is_empty());
}

#[tokio::test]
async fn double_close_flushes_once() {
    let sink = Arc::new(RecordingSink::default());
    let aggregator = active_aggregator(sink.clone()).await;
    aggregator
        .new_report(ssld_event_report(1, None, vec![light_on(1, 1_000)]))
        .await;

    aggregator.association_closed(None).await;
    aggregator.association_closed(Some("reset by peer".into())).await;
    assert_eq!(sink.batches().len(), 1);
}

#[tokio::test]
async fn stale_sequence_numbers_contribute_nothing() {
    let sink = Arc::new(RecordingSink::default());
    let aggregator = active_aggregator(sink.clone()).await;
    aggregator.set_first_new_sq_num(10).await;

    aggregator
        .new_report(ssld_event_report(9, None, vec![light_on(1, 1_000), light_on(2, 1_500)]))
        .await;
    assert_eq!(aggregator.buffered().await, 0);

    aggregator
        .new_report(ssld_event_report(10, None, vec![light_on(1, 2_000)]))
        .await;
    assert_eq!(aggregator.buffered().await, 1);
}

#[tokio::test]
async fn overflow_reports_below_boundary_are_still_stale() {
    let sink = Arc::new(RecordingSink::default());
    let aggregator = active_aggregator(sink.clone()).await;
    aggregator.set_first_new_sq_num(10).await;

    let mut report = ssld_event_report(3, None, vec![light_on(1, 1_000)]);
    report.buffer_overflow = true;
    aggregator.new_report(report).await;
    assert_eq!(aggregator.buffered().await, 0);

    let mut report = ssld_event_report(11, None, vec![light_on(1, 2_000)]);
    report.buffer_overflow = true;
    aggregator.new_report(report).await;
    assert_eq!(aggregator.buffered().await, 1);
}

fn remarked(sw_num: i64, trg_time: i64, remark: &str) -> EventMember {
    EventMember {
        remark: Some(remark.into()),
        ..light_on(sw_num, trg_time)
    }
}

#[tokio::test]
async fn equal_times_keep_arrival_order() {
    let sink = Arc::new(RecordingSink::default());
    let aggregator = active_aggregator(sink.clone()).await;

    aggregator
        .new_report(ssld_event_report(
            1,
            None,
            vec![remarked(2, 2_000, "a"), remarked(1, 2_000, "b")],
        ))
        .await;
    aggregator
        .new_report(ssld_event_report(
            2,
            None,
            vec![remarked(1, 1_000, "c"), remarked(2, 2_000, "d")],
        ))
        .await;
    aggregator.association_closed(None).await;

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    let order: Vec<(i64, u8, String)> = batches[0]
        .iter()
        .map(|n| (n.date_time_ms, n.index, n.description.clone()))
        .collect();
    assert_eq!(
        order,
        vec![
            (1_000, 3, "fixed time trigger (c)".to_string()),
            (2_000, 4, "fixed time trigger (a)".to_string()),
            (2_000, 3, "fixed time trigger (b)".to_string()),
            (2_000, 4, "fixed time trigger (d)".to_string()),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reports_racing_close_flush_at_most_once() {
    let sink = Arc::new(RecordingSink::default());
    let aggregator = active_aggregator(sink.clone()).await;

    for sq in 1..=5u32 {
        aggregator
            .new_report(ssld_event_report(
                sq,
                None,
                vec![light_on(1, i64::from(sq) * 1_000)],
            ))
            .await;
    }
    assert_eq!(aggregator.buffered().await, 5);

    let mut pushers = Vec::new();
    for sq in 6..=40u32 {
        let aggregator = aggregator.clone();
        pushers.push(tokio::spawn(async move {
            aggregator
                .new_report(ssld_event_report(
                    sq,
                    None,
                    vec![light_on(2, i64::from(sq) * 1_000)],
                ))
                .await;
        }));
    }
    let closer = {
        let aggregator = aggregator.clone();
        tokio::spawn(async move { aggregator.association_closed(None).await })
    };
    for pusher in pushers {
        pusher.await.expect("pusher");
    }
    closer.await.expect("closer");
    aggregator.association_closed(None).await;

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    let times: Vec<i64> = batches[0].iter().map(|n| n.date_time_ms).collect();
    for sq in 1..=5i64 {
        assert!(times.contains(&(sq * 1_000)), "missing record {}", sq);
    }
    assert!(times.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(times.len() <= 40);
    assert_eq!(aggregator.buffered().await, 0);
    assert_eq!(aggregator.state().await, AggregatorState::Idle);
}

#[tokio::test]
async fn entry_time_and_unmapped_index_fallbacks() {
    let sink = Arc::new(RecordingSink::default());
    let aggregator = active_aggregator(sink.clone()).await;

    let member = EventMember {
        evn_type: Some(31),
        sw_num: Some(7),
        trg_type: Some(2),
        remark: Some("upgrade".into()),
        ..EventMember::default()
    };
    aggregator
        .new_report(ssld_event_report(1, Some(1_000), vec![member]))
        .await;
    aggregator.association_closed(None).await;

    let batches = sink.batches();
    let notification = &batches[0][0];
    assert_eq!(notification.date_time_ms, 1_000 + ENTRY_TIME_OFFSET_MS);
    assert_eq!(notification.index, 0);
    assert_eq!(
        notification.description,
        "ad-hoc trigger; functional firmware (upgrade)"
    );
}

#[tokio::test]
async fn invalid_members_are_skipped_individually() {
    let sink = Arc::new(RecordingSink::default());
    let aggregator = active_aggregator(sink.clone()).await;

    let missing_type = EventMember {
        sw_num: Some(1),
        ..EventMember::default()
    };
    let unknown_type = EventMember {
        evn_type: Some(99),
        sw_num: Some(1),
        ..EventMember::default()
    };
    aggregator
        .new_report(ssld_event_report(
            1,
            None,
            vec![missing_type, light_on(2, 1_000), unknown_type],
        ))
        .await;
    assert_eq!(aggregator.buffered().await, 1);
}

#[tokio::test]
async fn reports_before_activation_are_ignored() {
    let sink = Arc::new(RecordingSink::default());
    let aggregator = ReportAggregator::new("SSLD-1", &output_settings(), sink.clone());
    aggregator
        .new_report(ssld_event_report(1, None, vec![light_on(1, 1_000)]))
        .await;
    assert_eq!(aggregator.buffered().await, 0);

    let mut report = Report::new("evn_rpn01", "SWDeviceGenericIO/LLN0.evn_rpn01");
    report.sq_num = Some(1);
    aggregator.activate().await;
    aggregator.new_report(report).await;
    assert_eq!(aggregator.buffered().await, 0);
}

#[tokio::test]
async fn failed_flush_is_dropped_without_retry() {
    let sink = Arc::new(RecordingSink::default());
    sink.fail.store(true, Ordering::SeqCst);
    let aggregator = active_aggregator(sink.clone()).await;
    aggregator
        .new_report(ssld_event_report(1, None, vec![light_on(1, 1_000)]))
        .await;

    aggregator.association_closed(None).await;
    aggregator.association_closed(None).await;
    assert_eq!(sink.batches().len(), 1);
    assert_eq!(aggregator.buffered().await, 0);
}

#[tokio::test]
async fn session_disconnect_flushes_pushed_reports() {
    let ied = SimulatedIed::ssld();
    let sink = Arc::new(RecordingSink::default());
    let aggregator = active_aggregator(sink.clone()).await;
    let session = DeviceSession::connect(
        &ied,
        DeviceIdentity::new("SSLD-1", "127.0.0.1", DeviceFamily::StreetlightController),
        &ConnectOptions::new(102, 1000),
        aggregator.clone(),
    )
    .await
    .expect("session");

    assert!(
        ied.push_report(ssld_event_report(1, None, vec![light_on(1, 5_000)]))
            .await
    );
    session.disconnect().await;
    session.disconnect().await;

    let batches = sink.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0][0].device_id, "SSLD-1");
}
