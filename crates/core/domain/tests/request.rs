use domain::{
    DeviceFamily, DeviceIdentity, DeviceOperation, DeviceOutcome, DeviceRecord, DeviceRequest,
    DeviceResponse, OutputSetting, RelayType, ResponsePayload,
};

#[test]
fn server_name_falls_back_to_family_default() {
    let identity = DeviceIdentity::new("SSLD-1", "10.0.0.1", DeviceFamily::StreetlightController);
    assert_eq!(identity.server_name(), "SWDeviceGeneric");

    let identity = DeviceIdentity::new("RTU-1", "10.0.0.2", DeviceFamily::GenericRtu)
        .with_server_name("WAGO61850Server");
    assert_eq!(identity.server_name(), "WAGO61850Server");
}

#[test]
fn device_request_parses_tagged_operation() {
    let payload = r#"{
        "correlationUid": "corr-1",
        "organisationId": "org-1",
        "deviceId": "RTU-1",
        "operation": {
            "type": "GET_DATA",
            "systems": [
                {"id": 1, "family": "PV", "filters": [{"node": "TotW"}, {"node": "SchdId", "index": 2}]}
            ]
        }
    }"#;
    let request: DeviceRequest = serde_json::from_str(payload).expect("parse");
    match &request.operation {
        DeviceOperation::GetData { systems } => {
            assert_eq!(systems.len(), 1);
            assert_eq!(systems[0].family, DeviceFamily::Pv);
            assert_eq!(systems[0].filters[1].index, Some(2));
        }
        other => panic!("unexpected operation {:?}", other),
    }
    assert_eq!(request.operation.name(), "GetData");
}

#[test]
fn unit_operations_parse() {
    let op: DeviceOperation = serde_json::from_str(r#"{"type":"ENABLE_REPORTING"}"#).expect("parse");
    assert_eq!(op, DeviceOperation::EnableReporting);
}

#[test]
fn device_record_parses_flattened_identity() {
    let payload = r#"{
        "deviceId": "SSLD-1",
        "ipAddress": "127.0.0.1",
        "family": "STREETLIGHT_CONTROLLER",
        "outputSettings": [
            {"internalId": 1, "externalId": 3, "relayType": "LIGHT"},
            {"internalId": 2, "externalId": 4, "relayType": "TARIFF"}
        ]
    }"#;
    let record: DeviceRecord = serde_json::from_str(payload).expect("parse");
    assert_eq!(record.device_id(), "SSLD-1");
    assert!(!record.enable_all_reports_on_connect);
    assert!(!record.has_reporting());
    assert_eq!(
        record.output_by_external(3),
        Some(&OutputSetting {
            internal_id: 1,
            external_id: 3,
            relay_type: RelayType::Light
        })
    );
    assert_eq!(record.light_relays().count(), 1);
}

#[test]
fn response_carries_outcome_tag() {
    let request = DeviceRequest {
        correlation_uid: "corr-2".to_string(),
        organisation_id: "org-1".to_string(),
        device_id: "SSLD-1".to_string(),
        operation: DeviceOperation::GetStatus,
    };
    let response = DeviceResponse::for_request(
        &request,
        DeviceOutcome::Success {
            payload: ResponsePayload::Empty,
        },
    );
    let value = serde_json::to_value(&response).expect("serialize");
    assert_eq!(value["correlationUid"], "corr-2");
    assert_eq!(value["operation"], "GetStatus");
    assert_eq!(value["outcome"]["result"], "SUCCESS");
    assert_eq!(value["outcome"]["payload"]["kind"], "EMPTY");
}
