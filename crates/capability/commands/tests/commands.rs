use domain::{DeviceFamily, DeviceIdentity, DeviceRecord, LightValue, OutputSetting, RelayType};
use iec61850_commands::{CommandCatalog, GetStatusCommand, SetLightCommand};
use iec61850_protocol::{
    BasicValue, ConnectOptions, DataAttribute, DeviceSession, Fc, LogicalDevice, ModelNode,
    NoopReportListener, ProtocolError, RetryPolicy, RetryingCommandExecutor, TransportError,
};
use iec61850_simulator::SimulatedIed;
use std::sync::Arc;

fn executor() -> RetryingCommandExecutor {
    RetryingCommandExecutor::new(RetryPolicy::new(3, 0))
}

fn ssld_record() -> DeviceRecord {
    let mut record = DeviceRecord::new(DeviceIdentity::new(
        "SSLD-1",
        "127.0.0.1",
        DeviceFamily::StreetlightController,
    ));
    record.output_settings = vec![
        OutputSetting {
            internal_id: 1,
            external_id: 1,
            relay_type: RelayType::Light,
        },
        OutputSetting {
            internal_id: 2,
            external_id: 2,
            relay_type: RelayType::Light,
        },
        OutputSetting {
            internal_id: 3,
            external_id: 3,
            relay_type: RelayType::Tariff,
        },
    ];
    record
}

async fn connect(ied: &SimulatedIed, identity: DeviceIdentity) -> DeviceSession {
    DeviceSession::connect(
        ied,
        identity,
        &ConnectOptions::new(102, 1000),
        Arc::new(NoopReportListener),
    )
    .await
    .expect("session")
}

#[tokio::test]
async fn set_light_enables_operation_and_switches_all_light_relays() {
    let ied = SimulatedIed::ssld();
    let record = ssld_record();
    let session = connect(&ied, record.identity.clone()).await;

    SetLightCommand::new(executor())
        .execute(&session, &record, &[LightValue { index: 0, on: true }])
        .await
        .expect("set light");

    for relay in 1..=2 {
        let config = ied
            .node(&format!("SWDeviceGenericIO/XSWC{}.CfSt", relay), Fc::Cf)
            .unwrap();
        assert_eq!(config.get("enbOper"), Some(&BasicValue::Bool(true)));
        let status = ied
            .node(&format!("SWDeviceGenericIO/XSWC{}.Pos", relay), Fc::St)
            .unwrap();
        assert_eq!(status.get("stVal"), Some(&BasicValue::Bool(true)));
    }
    // 计费继电器不受影响
    let tariff = ied.node("SWDeviceGenericIO/XSWC3.Pos", Fc::St).unwrap();
    assert_eq!(tariff.get("stVal"), Some(&BasicValue::Bool(false)));
}

#[tokio::test]
async fn set_light_skips_enable_write_when_already_enabled() {
    let ied = SimulatedIed::ssld();
    ied.set_node(
        ModelNode::new("SWDeviceGenericIO/XSWC1.CfSt", Fc::Cf)
            .with("enbOper", BasicValue::Bool(true)),
    );
    let record = ssld_record();
    let session = connect(&ied, record.identity.clone()).await;

    SetLightCommand::new(executor())
        .execute(&session, &record, &[LightValue { index: 1, on: true }])
        .await
        .expect("set light");

    let writes = ied.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].fc, Fc::Co);
}

#[tokio::test]
async fn get_status_reports_external_indexes_and_defaults() {
    let ied = SimulatedIed::ssld();
    ied.set_node(
        ModelNode::new("SWDeviceGenericIO/XSWC2.Pos", Fc::St).with("stVal", BasicValue::Bool(true)),
    );
    let mut record = ssld_record();
    record.output_settings[1].external_id = 5;
    let session = connect(&ied, record.identity.clone()).await;

    let status = GetStatusCommand::new(executor())
        .execute(&session, &record)
        .await
        .expect("status");
    assert_eq!(
        status.light_values,
        vec![
            LightValue { index: 1, on: false },
            LightValue { index: 5, on: true },
            LightValue { index: 3, on: false },
        ]
    );
    assert_eq!(status.event_buffer_filter, "LIGHT_EVENTS");
    assert_eq!(status.light_type, "RELAY");
}

#[tokio::test]
async fn service_errors_are_retried_through_the_executor() {
    let ied = SimulatedIed::ssld();
    ied.fail_reads(2, TransportError::Service("temporarily unavailable".into()));
    let record = ssld_record();
    let session = connect(&ied, record.identity.clone()).await;

    let status = GetStatusCommand::new(executor())
        .execute(&session, &record)
        .await;
    assert!(status.is_ok());
}

#[tokio::test]
async fn io_errors_abort_without_retry() {
    let ied = SimulatedIed::ssld();
    ied.fail_reads(1, TransportError::Io("broken pipe".into()));
    let record = ssld_record();
    let session = connect(&ied, record.identity.clone()).await;

    let err = GetStatusCommand::new(executor())
        .execute(&session, &record)
        .await
        .unwrap_err();
    assert!(err.is_connection_failure());
    assert_eq!(ied.read_count(), 1);
}

#[tokio::test]
async fn catalog_commands_read_and_write_rtu_systems() {
    let ied = SimulatedIed::rtu("ZOWN_POC");
    ied.set_node(
        ModelNode::new("ZOWN_POCPV1/MMXU1.TotW", Fc::Mx)
            .with("mag.f", BasicValue::Float(42.0))
            .with("t", BasicValue::Timestamp(1_700_000_000_000)),
    );
    let session = connect(
        &ied,
        DeviceIdentity::new("RTU-1", "127.0.0.1", DeviceFamily::GenericRtu),
    )
    .await;
    let catalog = CommandCatalog::standard();

    let power = catalog
        .lookup(DeviceFamily::Pv, DataAttribute::ActualPower, None)
        .unwrap();
    let measurement = power
        .execute_read(&session, &LogicalDevice::PV, 1)
        .await
        .unwrap();
    assert_eq!(measurement.value, 42.0);
    assert_eq!(measurement.time_ms, 1_700_000_000_000);

    let schedule = catalog
        .lookup(DeviceFamily::Battery, DataAttribute::ScheduleId, Some(2))
        .unwrap();
    schedule
        .execute_write(&session, &LogicalDevice::BATTERY, 1, 7.0)
        .await
        .unwrap();
    let node = ied.node("ZOWN_POCBATTERY1/DSCH2.SchdId", Fc::Sp).unwrap();
    assert_eq!(node.get("setVal"), Some(&BasicValue::Int(7)));

    // 只读属性不可写
    let health = catalog
        .lookup(DeviceFamily::Pv, DataAttribute::Health, None)
        .unwrap();
    assert!(matches!(
        health
            .execute_write(&session, &LogicalDevice::PV, 1, 1.0)
            .await,
        Err(ProtocolError::Configuration(_))
    ));
}
