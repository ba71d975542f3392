//! 路灯控制器命令：开关灯、状态查询

use domain::{DeviceRecord, DeviceStatus, LightValue, RelayType};
use iec61850_protocol::{
    BasicValue, DataAttribute, DeviceSession, Fc, LogicalDevice, ModelAddress, ProtocolError,
    RetryingCommandExecutor, logical_node,
};
use tracing::{debug, info};

const ENABLE_OPERATION: &str = "enbOper";
const CONTROL_VALUE: &str = "Oper.ctlVal";
const STATUS_VALUE: &str = "stVal";
const EVENT_TYPE_FILTER: &str = "enbEvnType";
const LIGHT_TYPE: &str = "LT";
const DEFAULT_LIGHT_TYPE: &str = "RELAY";

fn switch_address(internal_id: u8, attribute: DataAttribute, fc: Fc) -> ModelAddress {
    ModelAddress::new(
        LogicalDevice::LIGHTING,
        None,
        logical_node::switch_component(internal_id),
        attribute,
        fc,
    )
}

fn configuration_address(attribute: DataAttribute) -> ModelAddress {
    ModelAddress::new(
        LogicalDevice::LIGHTING,
        None,
        logical_node::STREET_LIGHT_CONFIGURATION,
        attribute,
        Fc::Cf,
    )
}

/// 把对外编号展开为内部继电器编号（0 表示全部灯光继电器）
pub fn resolve_light_relays(
    device: &DeviceRecord,
    value: &LightValue,
) -> Result<Vec<u8>, ProtocolError> {
    if value.index == 0 {
        return Ok(device
            .light_relays()
            .map(|setting| setting.internal_id)
            .collect());
    }
    let setting = device.output_by_external(value.index).ok_or_else(|| {
        ProtocolError::Configuration(format!(
            "no output setting for external index {}",
            value.index
        ))
    })?;
    if setting.relay_type != RelayType::Light {
        return Err(ProtocolError::Configuration(format!(
            "relay {} is not a light relay ({:?})",
            value.index, setting.relay_type
        )));
    }
    Ok(vec![setting.internal_id])
}

/// 开关灯
#[derive(Debug, Clone)]
pub struct SetLightCommand {
    executor: RetryingCommandExecutor,
}

impl SetLightCommand {
    pub fn new(executor: RetryingCommandExecutor) -> Self {
        Self { executor }
    }

    pub async fn execute(
        &self,
        session: &DeviceSession,
        device: &DeviceRecord,
        values: &[LightValue],
    ) -> Result<(), ProtocolError> {
        for value in values {
            for internal_id in resolve_light_relays(device, value)? {
                self.executor
                    .execute(device.device_id(), "set_light", || {
                        switch_relay(session, internal_id, value.on)
                    })
                    .await?;
                info!(
                    target: "iec61850.commands",
                    device_id = %device.device_id(),
                    external_index = value.index,
                    internal_index = internal_id,
                    on = value.on,
                    "light_switched"
                );
            }
        }
        Ok(())
    }
}

async fn switch_relay(session: &DeviceSession, internal_id: u8, on: bool) -> Result<(), ProtocolError> {
    let master_control = switch_address(internal_id, DataAttribute::MasterControl, Fc::Cf);
    let config = session.read_node(&master_control).await?;
    let enabled = config
        .get(ENABLE_OPERATION)
        .and_then(BasicValue::as_bool)
        .unwrap_or(false);
    if !enabled {
        debug!(
            target: "iec61850.commands",
            device_id = %session.device_id(),
            internal_index = internal_id,
            "relay_operation_enabled"
        );
        session
            .write_node(&master_control, ENABLE_OPERATION, BasicValue::Bool(true))
            .await?;
    }

    let position = switch_address(internal_id, DataAttribute::Position, Fc::Co);
    session.read_node(&position).await?;
    session
        .write_node(&position, CONTROL_VALUE, BasicValue::Bool(on))
        .await
}

/// 查询灯光状态、事件过滤与灯具类型
#[derive(Debug, Clone)]
pub struct GetStatusCommand {
    executor: RetryingCommandExecutor,
}

impl GetStatusCommand {
    pub fn new(executor: RetryingCommandExecutor) -> Self {
        Self { executor }
    }

    pub async fn execute(
        &self,
        session: &DeviceSession,
        device: &DeviceRecord,
    ) -> Result<DeviceStatus, ProtocolError> {
        self.executor
            .execute(device.device_id(), "get_status", || read_status(session, device))
            .await
    }
}

async fn read_status(
    session: &DeviceSession,
    device: &DeviceRecord,
) -> Result<DeviceStatus, ProtocolError> {
    let mut light_values = Vec::with_capacity(device.output_settings.len());
    for setting in &device.output_settings {
        let node = session
            .read_node(&switch_address(
                setting.internal_id,
                DataAttribute::Position,
                Fc::St,
            ))
            .await?;
        let on = node
            .get(STATUS_VALUE)
            .and_then(BasicValue::as_bool)
            .ok_or_else(|| {
                ProtocolError::Unexpected(format!("{} has no {}", node.reference, STATUS_VALUE))
            })?;
        light_values.push(LightValue {
            index: setting.external_id,
            on,
        });
    }

    let event_buffer = session
        .read_node(&configuration_address(DataAttribute::EventBuffer))
        .await?;
    let event_buffer_filter = match event_buffer.get(EVENT_TYPE_FILTER) {
        Some(BasicValue::Text(text)) => text.clone(),
        Some(other) => other
            .as_i64()
            .map(|value| value.to_string())
            .unwrap_or_default(),
        None => String::new(),
    };

    let software = session
        .read_node(&configuration_address(DataAttribute::SoftwareConfiguration))
        .await?;
    let light_type = software
        .get(LIGHT_TYPE)
        .and_then(BasicValue::as_text)
        .filter(|text| !text.is_empty())
        .unwrap_or(DEFAULT_LIGHT_TYPE)
        .to_string();

    Ok(DeviceStatus {
        light_values,
        event_buffer_filter,
        light_type,
    })
}
