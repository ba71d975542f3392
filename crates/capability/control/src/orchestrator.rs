//! 会话编排
//!
//! 单个请求的完整生命周期：查注册表 → 建立会话 → 经重试执行器执行命令 →
//! 使能报告 → 断开（立即或延迟），所有错误最终归并为唯一的 `DeviceOutcome`。

use crate::sink::{ControlError, ResponseSink};
use domain::{
    DeviceFamily, DeviceOperation, DeviceOutcome, DeviceRecord, DeviceRequest, DeviceResponse,
    LightValue, ResponsePayload, SetDataSystem, SystemFilter, SystemMeasurements,
};
use iec61850_commands::{Command, CommandCatalog, GetStatusCommand, SetLightCommand};
use iec61850_protocol::{
    ConnectOptions, DataAttribute, DeviceSession, Iec61850Transport, LogicalDevice,
    NoopReportListener, ProtocolError, ReportListener, RetryPolicy, RetryingCommandExecutor,
    ServerModel,
};
use iec61850_reporting::{
    EventNotificationSink, MeasurementSink, ReportAggregator, ReportingEnabler, RtuReportHandler,
};
use iec61850_storage::DeviceRegistry;
use iec61850_telemetry::{new_correlation_uid, record_filter_skipped, record_response_sent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 路灯事件报告控制块（逻辑设备内的相对引用）。
const SSLD_EVENT_REPORT: &str = "LLN0.evn_rpn01";

/// 注册触发的请求使用的组织标识。
const REGISTRATION_ORGANISATION: &str = "registration";

/// 编排配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub ssld_port: u16,
    pub rtu_port: u16,
    pub connect_timeout_ms: u64,
    pub retry_policy: RetryPolicy,
    pub disconnect_delay_ms: u64,
    pub registration_reporting_delay_ms: u64,
    pub reporting_after_registration: bool,
    /// 模型模板（存在时不再在线读取模型）
    pub model_template: Option<Arc<ServerModel>>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            ssld_port: 102,
            rtu_port: 102,
            connect_timeout_ms: 10_000,
            retry_policy: RetryPolicy::default(),
            disconnect_delay_ms: 5_000,
            registration_reporting_delay_ms: 5_000,
            reporting_after_registration: false,
            model_template: None,
        }
    }
}

/// 命令成功后的会话收尾方式
enum Teardown {
    /// 由编排器决定（RTU 报告使能 / 立即断开）
    Default,
    /// 已调度延迟断开
    Scheduled,
}

/// 会话编排器
#[derive(Clone)]
pub struct SessionOrchestrator {
    registry: Arc<dyn DeviceRegistry>,
    transport: Arc<dyn Iec61850Transport>,
    catalog: Arc<CommandCatalog>,
    event_sink: Arc<dyn EventNotificationSink>,
    measurement_sink: Arc<dyn MeasurementSink>,
    response_sink: Arc<dyn ResponseSink>,
    executor: RetryingCommandExecutor,
    config: OrchestratorConfig,
}

impl SessionOrchestrator {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        transport: Arc<dyn Iec61850Transport>,
        catalog: Arc<CommandCatalog>,
        event_sink: Arc<dyn EventNotificationSink>,
        measurement_sink: Arc<dyn MeasurementSink>,
        response_sink: Arc<dyn ResponseSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            catalog,
            event_sink,
            measurement_sink,
            response_sink,
            executor: RetryingCommandExecutor::new(config.retry_policy),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// 处理一个请求：返回唯一结果，并投递到响应 sink。
    pub async fn handle(&self, request: DeviceRequest) -> DeviceResponse {
        info!(
            target: "iec61850.control",
            correlation_uid = %request.correlation_uid,
            device_id = %request.device_id,
            operation = request.operation.name(),
            "request_received"
        );
        let outcome = match self.run(&request).await {
            Ok(payload) => DeviceOutcome::Success { payload },
            Err(err) if err.is_connection_failure() => DeviceOutcome::ConnectionFailure {
                reason: err.to_string(),
            },
            Err(err) => DeviceOutcome::OperationFailure {
                reason: err.to_string(),
            },
        };
        info!(
            target: "iec61850.control",
            correlation_uid = %request.correlation_uid,
            device_id = %request.device_id,
            operation = request.operation.name(),
            result = outcome.label(),
            "request_completed"
        );

        let response = DeviceResponse::for_request(&request, outcome);
        match self.response_sink.send_response(&response).await {
            Ok(()) => record_response_sent(),
            Err(err) => error!(
                target: "iec61850.control",
                correlation_uid = %response.correlation_uid,
                device_id = %response.device_id,
                error = %err,
                "response_send_failed"
            ),
        }
        response
    }

    /// 设备注册回调：开启时延迟执行一次 EnableReporting。
    ///
    /// 返回调度的任务句柄；未开启时返回 `None`。
    pub async fn on_device_registered(
        &self,
        device_id: &str,
    ) -> Result<Option<tokio::task::JoinHandle<DeviceResponse>>, ControlError> {
        let device = self
            .registry
            .find_device(device_id)
            .await
            .map_err(|err| ControlError::Registry(err.to_string()))?
            .ok_or_else(|| ControlError::Registry(format!("unknown device: {}", device_id)))?;
        if !self.config.reporting_after_registration {
            info!(
                target: "iec61850.control",
                device_id = %device.device_id(),
                "registration_reporting_disabled"
            );
            return Ok(None);
        }

        let request = DeviceRequest {
            correlation_uid: new_correlation_uid(),
            organisation_id: REGISTRATION_ORGANISATION.to_string(),
            device_id: device.device_id().to_string(),
            operation: DeviceOperation::EnableReporting,
        };
        let delay = Duration::from_millis(self.config.registration_reporting_delay_ms);
        info!(
            target: "iec61850.control",
            device_id = %request.device_id,
            correlation_uid = %request.correlation_uid,
            delay_ms = self.config.registration_reporting_delay_ms,
            "registration_reporting_scheduled"
        );
        let orchestrator = self.clone();
        Ok(Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            orchestrator.handle(request).await
        })))
    }

    async fn run(&self, request: &DeviceRequest) -> Result<ResponsePayload, ProtocolError> {
        let device = self
            .registry
            .find_device(&request.device_id)
            .await
            .map_err(|err| ProtocolError::Unexpected(err.to_string()))?
            .ok_or_else(|| {
                ProtocolError::Configuration(format!("unknown device: {}", request.device_id))
            })?;
        let family = device.identity.family;

        let aggregator = (family == DeviceFamily::StreetlightController).then(|| {
            Arc::new(ReportAggregator::new(
                device.device_id(),
                &device.output_settings,
                self.event_sink.clone(),
            ))
        });
        let listener: Arc<dyn ReportListener> = match &aggregator {
            Some(aggregator) => aggregator.clone(),
            None if device.has_reporting() => Arc::new(RtuReportHandler::new(
                device.device_id(),
                device.identity.server_name(),
                self.catalog.clone(),
                self.measurement_sink.clone(),
            )),
            None => Arc::new(NoopReportListener),
        };

        let session = DeviceSession::connect(
            self.transport.as_ref(),
            device.identity.clone(),
            &self.connect_options(family),
            listener,
        )
        .await?;

        let result = self
            .execute_operation(&session, &device, &request.operation, aggregator.as_deref())
            .await;
        match result {
            Ok((payload, Teardown::Scheduled)) => Ok(payload),
            Ok((payload, Teardown::Default)) => {
                if family.is_rtu() && device.has_reporting() {
                    let summary = ReportingEnabler.enable(&session, &device).await;
                    info!(
                        target: "iec61850.control",
                        device_id = %device.device_id(),
                        enabled = summary.enabled.len(),
                        failed = summary.failed.len(),
                        "reporting_enabled"
                    );
                    session.disconnect_after_delay(self.disconnect_delay(), None);
                } else {
                    session.disconnect().await;
                }
                Ok(payload)
            }
            Err(err) => {
                warn!(
                    target: "iec61850.control",
                    device_id = %device.device_id(),
                    operation = request.operation.name(),
                    error = %err,
                    "operation_failed"
                );
                session.disconnect().await;
                Err(err)
            }
        }
    }

    async fn execute_operation(
        &self,
        session: &DeviceSession,
        device: &DeviceRecord,
        operation: &DeviceOperation,
        aggregator: Option<&ReportAggregator>,
    ) -> Result<(ResponsePayload, Teardown), ProtocolError> {
        let payload = match operation {
            DeviceOperation::GetData { systems } => self.get_data(session, device, systems).await?,
            DeviceOperation::SetData { systems } => self.set_data(session, device, systems).await?,
            DeviceOperation::SetLight { values } => {
                self.set_light(session, device, values).await?;
                ResponsePayload::Empty
            }
            DeviceOperation::GetStatus => {
                require_streetlight(device, operation.name())?;
                let status = GetStatusCommand::new(self.executor.clone())
                    .execute(session, device)
                    .await?;
                let payload = ResponsePayload::Status(status);
                if let Some(aggregator) = aggregator {
                    // 查询成功后使能事件上报，失败不影响查询结果
                    match self.enable_event_reporting(session, aggregator).await {
                        Ok(()) => return Ok((payload, Teardown::Scheduled)),
                        Err(err) => warn!(
                            target: "iec61850.control",
                            device_id = %device.device_id(),
                            error = %err,
                            "event_reporting_enable_failed"
                        ),
                    }
                }
                payload
            }
            DeviceOperation::EnableReporting => {
                return match aggregator {
                    Some(aggregator) => {
                        self.enable_event_reporting(session, aggregator).await?;
                        Ok((ResponsePayload::Empty, Teardown::Scheduled))
                    }
                    None => Ok((ResponsePayload::Empty, Teardown::Default)),
                };
            }
        };
        Ok((payload, Teardown::Default))
    }

    async fn get_data(
        &self,
        session: &DeviceSession,
        device: &DeviceRecord,
        systems: &[SystemFilter],
    ) -> Result<ResponsePayload, ProtocolError> {
        let mut results = Vec::with_capacity(systems.len());
        let mut skipped = Vec::new();
        for system in systems {
            let logical_device = LogicalDevice::for_family(system.family);
            let mut measurements = Vec::with_capacity(system.filters.len());
            for filter in &system.filters {
                let entry = describe_entry(system.family, system.id, &filter.node, filter.index);
                let command = match self.lookup(system.family, &filter.node, filter.index) {
                    Ok(command) => command,
                    Err(err) => {
                        skip_entry(device, &entry, &err, &mut skipped);
                        continue;
                    }
                };
                let read = self
                    .executor
                    .execute(device.device_id(), "get_data", || {
                        command.execute_read(session, &logical_device, system.id)
                    })
                    .await;
                match read {
                    Ok(measurement) => measurements.push(measurement),
                    Err(err @ ProtocolError::Configuration(_)) => {
                        skip_entry(device, &entry, &err, &mut skipped)
                    }
                    Err(err) => return Err(err),
                }
            }
            results.push(SystemMeasurements {
                id: system.id,
                family: system.family,
                measurements,
            });
        }
        Ok(ResponsePayload::Data {
            systems: results,
            skipped,
        })
    }

    async fn set_data(
        &self,
        session: &DeviceSession,
        device: &DeviceRecord,
        systems: &[SetDataSystem],
    ) -> Result<ResponsePayload, ProtocolError> {
        let mut skipped = Vec::new();
        for system in systems {
            let logical_device = LogicalDevice::for_family(system.family);
            for set_point in &system.set_points {
                let entry =
                    describe_entry(system.family, system.id, &set_point.node, set_point.index);
                let command = match self.lookup(system.family, &set_point.node, set_point.index) {
                    Ok(command) => command,
                    Err(err) => {
                        skip_entry(device, &entry, &err, &mut skipped);
                        continue;
                    }
                };
                let written = self
                    .executor
                    .execute(device.device_id(), "set_data", || {
                        command.execute_write(session, &logical_device, system.id, set_point.value)
                    })
                    .await;
                match written {
                    Ok(()) => info!(
                        target: "iec61850.control",
                        device_id = %device.device_id(),
                        entry = %entry,
                        value = set_point.value,
                        "set_point_written"
                    ),
                    Err(err @ ProtocolError::Configuration(_)) => {
                        skip_entry(device, &entry, &err, &mut skipped)
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(ResponsePayload::Data {
            systems: Vec::new(),
            skipped,
        })
    }

    async fn set_light(
        &self,
        session: &DeviceSession,
        device: &DeviceRecord,
        values: &[LightValue],
    ) -> Result<(), ProtocolError> {
        require_streetlight(device, "SetLight")?;
        SetLightCommand::new(self.executor.clone())
            .execute(session, device, values)
            .await
    }

    /// 路灯事件上报：先激活聚合器，再使能控制块并以当前序号作为新报告边界，
    /// 延迟到期后关闭控制块并断开（断开时聚合器上送）。
    async fn enable_event_reporting(
        &self,
        session: &DeviceSession,
        aggregator: &ReportAggregator,
    ) -> Result<(), ProtocolError> {
        let logical_device = session
            .resolver()
            .logical_device_name(&LogicalDevice::LIGHTING, None)?;
        let rcb_reference = format!("{}/{}", logical_device, SSLD_EVENT_REPORT);

        aggregator.activate().await;
        let rcb = self
            .executor
            .execute(session.device_id(), "enable_reporting", || {
                session.enable_reporting(&rcb_reference)
            })
            .await?;
        aggregator.set_first_new_sq_num(rcb.sq_num).await;
        info!(
            target: "iec61850.control",
            device_id = %session.device_id(),
            rcb = %rcb_reference,
            first_new_sq_num = rcb.sq_num,
            "event_reporting_enabled"
        );
        session.disconnect_after_delay(self.disconnect_delay(), Some(rcb_reference));
        Ok(())
    }

    fn lookup(
        &self,
        family: DeviceFamily,
        node: &str,
        index: Option<u8>,
    ) -> Result<Arc<dyn Command>, ProtocolError> {
        let attribute = DataAttribute::parse(node)?;
        self.catalog
            .lookup(family, attribute, index)
            .map_err(|err| ProtocolError::Configuration(err.to_string()))
    }

    fn connect_options(&self, family: DeviceFamily) -> ConnectOptions {
        let port = if family == DeviceFamily::StreetlightController {
            self.config.ssld_port
        } else {
            self.config.rtu_port
        };
        ConnectOptions {
            port,
            timeout_ms: self.config.connect_timeout_ms,
            model_template: self.config.model_template.clone(),
        }
    }

    fn disconnect_delay(&self) -> Duration {
        Duration::from_millis(self.config.disconnect_delay_ms)
    }
}

fn require_streetlight(device: &DeviceRecord, operation: &str) -> Result<(), ProtocolError> {
    if device.identity.family == DeviceFamily::StreetlightController {
        return Ok(());
    }
    Err(ProtocolError::Configuration(format!(
        "{} is not supported for {} device {}",
        operation,
        device.identity.family.as_str(),
        device.device_id()
    )))
}

fn describe_entry(family: DeviceFamily, id: u8, node: &str, index: Option<u8>) -> String {
    match index {
        Some(index) => format!("{}{}.{}[{}]", family.as_str(), id, node, index),
        None => format!("{}{}.{}", family.as_str(), id, node),
    }
}

fn skip_entry(device: &DeviceRecord, entry: &str, err: &ProtocolError, skipped: &mut Vec<String>) {
    record_filter_skipped();
    warn!(
        target: "iec61850.control",
        device_id = %device.device_id(),
        entry = %entry,
        error = %err,
        "unsupported_data_attribute_skipped"
    );
    skipped.push(entry.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_described_with_optional_index() {
        assert_eq!(
            describe_entry(DeviceFamily::Battery, 1, "SchdId", Some(2)),
            format!("{}1.SchdId[2]", DeviceFamily::Battery.as_str())
        );
        assert_eq!(
            describe_entry(DeviceFamily::Pv, 3, "TotW", None),
            format!("{}3.TotW", DeviceFamily::Pv.as_str())
        );
    }
}
