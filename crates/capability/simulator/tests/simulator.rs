use domain::{DeviceFamily, DeviceIdentity, DeviceRecord};
use iec61850_protocol::{
    BasicValue, Fc, Iec61850Transport, NoopReportListener, TransportError,
};
use iec61850_simulator::{SimulatedIed, SimulatedNetwork, ssld_event_rcb};
use std::sync::Arc;

#[tokio::test]
async fn control_write_updates_status() {
    let ied = SimulatedIed::ssld();
    let association = ied
        .associate("127.0.0.1", 102, Arc::new(NoopReportListener))
        .await
        .expect("associate");

    let mut control = association
        .read("SWDeviceGenericIO/XSWC2.Pos", Fc::Co)
        .await
        .expect("read");
    control.set("Oper.ctlVal", BasicValue::Bool(true));
    association.write(&control).await.expect("write");

    let status = ied.node("SWDeviceGenericIO/XSWC2.Pos", Fc::St).expect("status");
    assert_eq!(status.get("stVal"), Some(&BasicValue::Bool(true)));
    assert_eq!(ied.writes().len(), 1);
}

#[tokio::test]
async fn injected_failures_are_consumed_in_order() {
    let ied = SimulatedIed::rtu("ZOWN_POC");
    ied.fail_reads(1, TransportError::Service("busy".into()));
    let association = ied
        .associate("127.0.0.1", 102, Arc::new(NoopReportListener))
        .await
        .expect("associate");

    let first = association.read("ZOWN_POCPV1/LLN0.Health", Fc::St).await;
    assert_eq!(first.unwrap_err(), TransportError::Service("busy".into()));
    assert!(association.read("ZOWN_POCPV1/LLN0.Health", Fc::St).await.is_ok());
    assert_eq!(ied.read_count(), 2);
}

#[tokio::test]
async fn refused_connection_is_io_error() {
    let ied = SimulatedIed::ssld();
    ied.refuse_connections(true);
    let result = ied
        .associate("127.0.0.1", 102, Arc::new(NoopReportListener))
        .await;
    assert!(matches!(result, Err(TransportError::Io(_))));
    assert_eq!(ied.association_count(), 0);
}

#[tokio::test]
async fn closed_association_rejects_requests() {
    let ied = SimulatedIed::ssld();
    let association = ied
        .associate("127.0.0.1", 102, Arc::new(NoopReportListener))
        .await
        .expect("associate");
    let rcb = association
        .enable_reporting(&ssld_event_rcb())
        .await
        .expect("enable");
    assert!(rcb.enabled);

    association.close().await;
    association.close().await;
    assert_eq!(ied.close_count(), 1);
    assert!(matches!(
        association.read("SWDeviceGenericIO/XSWC1.Pos", Fc::St).await,
        Err(TransportError::Io(_))
    ));
}

#[tokio::test]
async fn network_routes_by_ip_address() {
    let devices = vec![
        DeviceRecord::new(DeviceIdentity::new(
            "SSLD-1",
            "10.0.0.1",
            DeviceFamily::StreetlightController,
        )),
        DeviceRecord::new(
            DeviceIdentity::new("RTU-1", "10.0.0.2", DeviceFamily::GenericRtu)
                .with_server_name("SITE_A"),
        ),
    ];
    let network = SimulatedNetwork::from_devices(&devices);
    assert_eq!(network.len(), 2);

    let association = network
        .associate("10.0.0.2", 102, Arc::new(NoopReportListener))
        .await
        .expect("associate");
    let model = association.retrieve_model().await.expect("model");
    assert!(model.brcb("SITE_APV1/LLN0.Status").is_some());
    assert_eq!(network.host("10.0.0.2").expect("host").association_count(), 1);

    let unknown = network
        .associate("10.0.0.9", 102, Arc::new(NoopReportListener))
        .await;
    assert!(matches!(unknown, Err(TransportError::Io(_))));
}
