//! RTU 测量报告处理
//!
//! 数据集成员按对象引用反查 (设备族, 数据属性, 子索引)，由命令目录中的命令转换为测量值，
//! 每个报告按系统分组后上送一次。

use crate::sink::MeasurementSink;
use async_trait::async_trait;
use domain::{DeviceFamily, Measurement, SystemMeasurements};
use iec61850_commands::CommandCatalog;
use iec61850_protocol::{
    AddressResolver, DataAttribute, LogicalDevice, ModelNode, ProtocolError, Report,
    ReportListener,
};
use iec61850_telemetry::record_report_received;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// RTU 报告处理器
pub struct RtuReportHandler {
    device_id: String,
    resolver: AddressResolver,
    catalog: Arc<CommandCatalog>,
    sink: Arc<dyn MeasurementSink>,
}

impl RtuReportHandler {
    pub fn new(
        device_id: impl Into<String>,
        server_name: impl Into<String>,
        catalog: Arc<CommandCatalog>,
        sink: Arc<dyn MeasurementSink>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            resolver: AddressResolver::new(server_name),
            catalog,
            sink,
        }
    }

    /// 成员 → (设备族, 系统编号, 测量值)
    pub fn translate_member(
        &self,
        member: &ModelNode,
    ) -> Result<(DeviceFamily, u8, Measurement), ProtocolError> {
        let parts = self.resolver.split_reference(&member.reference).ok_or_else(|| {
            ProtocolError::Configuration(format!(
                "unexpected member reference {}",
                member.reference
            ))
        })?;
        let logical_device = LogicalDevice::parse(&parts.logical_device)?;
        let family = logical_device.family().ok_or_else(|| {
            ProtocolError::Configuration(format!(
                "logical device {} has no device family",
                parts.logical_device
            ))
        })?;
        let attribute = DataAttribute::parse(&parts.data_attribute)?;
        let index = if attribute.uses_index() {
            trailing_index(&parts.logical_node)
        } else {
            None
        };
        let command = self
            .catalog
            .lookup(family, attribute, index)
            .map_err(|err| ProtocolError::Configuration(err.to_string()))?;
        let measurement = command.translate(member)?;
        Ok((family, parts.instance.unwrap_or(1), measurement))
    }
}

fn trailing_index(logical_node: &str) -> Option<u8> {
    let digits = logical_node
        .chars()
        .rev()
        .take_while(|ch| ch.is_ascii_digit())
        .count();
    logical_node[logical_node.len() - digits..].parse().ok()
}

#[async_trait]
impl ReportListener for RtuReportHandler {
    async fn new_report(&self, report: Report) {
        record_report_received();
        info!(
            target: "iec61850.reporting",
            device_id = %self.device_id,
            rpt_id = %report.rpt_id,
            sq_num = ?report.sq_num,
            "new_report"
        );
        let Some(data_set) = report.data_set else {
            warn!(target: "iec61850.reporting", device_id = %self.device_id, rpt_id = %report.rpt_id, "report_without_data_set");
            return;
        };

        let mut systems: BTreeMap<(DeviceFamily, u8), Vec<Measurement>> = BTreeMap::new();
        for member in &data_set.members {
            match self.translate_member(member) {
                Ok((family, id, measurement)) => {
                    systems.entry((family, id)).or_default().push(measurement);
                }
                Err(err) => warn!(
                    target: "iec61850.reporting",
                    device_id = %self.device_id,
                    member = %member.reference,
                    error = %err,
                    "report_member_skipped"
                ),
            }
        }
        if systems.is_empty() {
            debug!(target: "iec61850.reporting", device_id = %self.device_id, "report_without_measurements");
            return;
        }

        let systems: Vec<SystemMeasurements> = systems
            .into_iter()
            .map(|((family, id), measurements)| SystemMeasurements {
                id,
                family,
                measurements,
            })
            .collect();
        if let Err(err) = self.sink.send_measurements(&self.device_id, systems).await {
            error!(
                target: "iec61850.reporting",
                device_id = %self.device_id,
                error = %err,
                "measurements_send_failed"
            );
        }
    }

    async fn association_closed(&self, reason: Option<String>) {
        info!(
            target: "iec61850.reporting",
            device_id = %self.device_id,
            reason = reason.as_deref().unwrap_or("no IO error"),
            "association_closed"
        );
    }
}
