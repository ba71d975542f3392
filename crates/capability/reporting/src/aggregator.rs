//! 路灯事件报告聚合
//!
//! 状态：`Idle`（无会话）→ `Active`（报告已使能）→ `Draining`（会话关闭，等待上送）→ `Idle`。
//! 只有 `Active` 状态接收报告；关联关闭时按事件时间稳定排序后一次性上送，失败只记录不重试。

use crate::sink::{EventNotificationSink, ReportingError};
use crate::time::entry_time_to_epoch_ms;
use async_trait::async_trait;
use domain::{EventNotification, EventType, FirmwareKind, OutputSetting, now_epoch_ms};
use iec61850_protocol::{BasicValue, ModelNode, Report, ReportListener};
use iec61850_telemetry::{
    record_notification_flush_failure, record_notifications_flushed, record_report_received,
    record_report_skipped_stale,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

const EVENT_TYPE: &str = "evnType";
const SWITCH_NUMBER: &str = "swNum";
const TRIGGER_TIME: &str = "trgTime";
const TRIGGER_TYPE: &str = "trgType";
const REMARK: &str = "remark";

/// 聚合器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Idle,
    Active,
    Draining,
}

#[derive(Debug)]
struct AggregatorInner {
    state: AggregatorState,
    buffer: Vec<EventNotification>,
    first_new_sq_num: Option<u32>,
}

/// 单个会话的事件报告聚合器
pub struct ReportAggregator {
    device_id: String,
    /// 内部继电器编号 → 对外编号（0 → 0 保留）
    external_by_internal: BTreeMap<u8, u8>,
    sink: Arc<dyn EventNotificationSink>,
    inner: Mutex<AggregatorInner>,
}

impl ReportAggregator {
    pub fn new(
        device_id: impl Into<String>,
        output_settings: &[OutputSetting],
        sink: Arc<dyn EventNotificationSink>,
    ) -> Self {
        let device_id = device_id.into();
        let mut external_by_internal = BTreeMap::new();
        external_by_internal.insert(0, 0);
        for setting in output_settings {
            external_by_internal.insert(setting.internal_id, setting.external_id);
        }
        info!(
            target: "iec61850.reporting",
            device_id = %device_id,
            index_map = ?external_by_internal,
            "index_map_built"
        );
        Self {
            device_id,
            external_by_internal,
            sink,
            inner: Mutex::new(AggregatorInner {
                state: AggregatorState::Idle,
                buffer: Vec::new(),
                first_new_sq_num: None,
            }),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// 报告使能后进入 `Active`
    pub async fn activate(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state == AggregatorState::Idle {
            inner.state = AggregatorState::Active;
        }
    }

    /// 设置首个新序号：序号更小的报告视为设备缓冲中的旧数据
    pub async fn set_first_new_sq_num(&self, sq_num: u32) {
        self.inner.lock().await.first_new_sq_num = Some(sq_num);
    }

    pub async fn state(&self) -> AggregatorState {
        self.inner.lock().await.state
    }

    /// 已缓冲的事件数
    pub async fn buffered(&self) -> usize {
        self.inner.lock().await.buffer.len()
    }

    fn describe(&self, report: &Report, time_of_entry: Option<i64>) -> String {
        format!(
            "device: {}, reportId: {}, timeOfEntry: {}, sqNum: {}{}{}",
            self.device_id,
            report.rpt_id,
            time_of_entry
                .map(|ms| ms.to_string())
                .unwrap_or_else(|| "-".to_string()),
            report
                .sq_num
                .map(|sq| sq.to_string())
                .unwrap_or_else(|| "-".to_string()),
            report
                .sub_sq_num
                .map(|sub| format!(" subSqNum: {}", sub))
                .unwrap_or_default(),
            if report.more_segments_follow {
                " (more segments follow for this sqNum)"
            } else {
                ""
            }
        )
    }

    /// 把一个数据集成员转换为事件通知
    pub fn translate_member(
        &self,
        member: &ModelNode,
        time_of_entry: Option<i64>,
    ) -> Result<EventNotification, ReportingError> {
        let event_code = member
            .get(EVENT_TYPE)
            .and_then(BasicValue::as_i64)
            .ok_or_else(|| missing_child(member, EVENT_TYPE))?;
        let event_type = u8::try_from(event_code)
            .ok()
            .and_then(EventType::from_code)
            .ok_or(ReportingError::UnknownEventType(event_code))?;

        let switch_number = member
            .get(SWITCH_NUMBER)
            .and_then(BasicValue::as_i64)
            .ok_or_else(|| missing_child(member, SWITCH_NUMBER))?;
        let index = self.external_index(switch_number);

        Ok(EventNotification {
            device_id: self.device_id.clone(),
            date_time_ms: event_time(member, time_of_entry),
            event_type,
            description: event_description(member, event_type),
            index,
        })
    }

    fn external_index(&self, switch_number: i64) -> u8 {
        let external = u8::try_from(switch_number)
            .ok()
            .and_then(|internal| self.external_by_internal.get(&internal).copied());
        match external {
            Some(index) => index,
            None => {
                error!(
                    target: "iec61850.reporting",
                    device_id = %self.device_id,
                    internal_index = switch_number,
                    "external_index_missing"
                );
                0
            }
        }
    }

    /// 关联关闭：上送缓冲（最多一次）
    async fn flush(&self) {
        let batch = {
            let mut inner = self.inner.lock().await;
            if inner.state == AggregatorState::Draining {
                return;
            }
            inner.state = AggregatorState::Draining;
            std::mem::take(&mut inner.buffer)
        };

        if batch.is_empty() {
            info!(
                target: "iec61850.reporting",
                device_id = %self.device_id,
                "no_event_notifications"
            );
        } else {
            let mut batch = batch;
            // sort_by_key 为稳定排序，同一时间按到达顺序
            batch.sort_by_key(|notification| notification.date_time_ms);
            let count = batch.len() as u64;
            match self
                .sink
                .add_event_notifications(&self.device_id, batch)
                .await
            {
                Ok(()) => {
                    record_notifications_flushed(count);
                    info!(
                        target: "iec61850.reporting",
                        device_id = %self.device_id,
                        count = count,
                        "event_notifications_flushed"
                    );
                }
                Err(err) => {
                    record_notification_flush_failure();
                    error!(
                        target: "iec61850.reporting",
                        device_id = %self.device_id,
                        count = count,
                        error = %err,
                        "event_notifications_dropped"
                    );
                }
            }
        }

        self.inner.lock().await.state = AggregatorState::Idle;
    }
}

fn missing_child(member: &ModelNode, child: &'static str) -> ReportingError {
    ReportingError::MissingChild {
        member: member.reference.clone(),
        child,
    }
}

fn trigger_description(trigger_type: i64) -> String {
    match trigger_type {
        1 => "light trigger (sensor trigger)".to_string(),
        2 => "ad-hoc trigger".to_string(),
        3 => "fixed time trigger".to_string(),
        4 => "autonomous trigger".to_string(),
        other => format!("trgType={}", other),
    }
}

/// 事件描述：触发类型、固件类别、备注
pub fn event_description(member: &ModelNode, event_type: EventType) -> String {
    let mut description = String::new();

    if let Some(trigger_type) = member
        .get(TRIGGER_TYPE)
        .and_then(BasicValue::as_i64)
        .filter(|value| *value > 0)
    {
        description.push_str(&trigger_description(trigger_type));
    }

    if let Some(kind) = event_type.firmware_kind() {
        if !description.is_empty() {
            description.push_str("; ");
        }
        description.push_str(match kind {
            FirmwareKind::Functional => "functional firmware",
            FirmwareKind::Security => "security firmware",
        });
    }

    if let Some(remark) = member
        .get(REMARK)
        .and_then(BasicValue::as_text)
        .filter(|remark| !remark.eq_ignore_ascii_case(REMARK))
    {
        if !description.is_empty() {
            description.push(' ');
        }
        description.push('(');
        description.push_str(remark);
        description.push(')');
    }

    description
}

/// 事件时间：触发时间，其次报告条目时间，最后当前时间
fn event_time(member: &ModelNode, time_of_entry: Option<i64>) -> i64 {
    member
        .get(TRIGGER_TIME)
        .and_then(BasicValue::as_timestamp)
        .or(time_of_entry)
        .unwrap_or_else(now_epoch_ms)
}

#[async_trait]
impl ReportListener for ReportAggregator {
    async fn new_report(&self, report: Report) {
        record_report_received();
        let time_of_entry = report.time_of_entry.map(entry_time_to_epoch_ms);
        let description = self.describe(&report, time_of_entry);
        info!(target: "iec61850.reporting", report = %description, "new_report");

        let mut inner = self.inner.lock().await;
        if inner.state != AggregatorState::Active {
            warn!(
                target: "iec61850.reporting",
                report = %description,
                state = ?inner.state,
                "report_ignored_inactive"
            );
            return;
        }

        if report.buffer_overflow {
            warn!(
                target: "iec61850.reporting",
                report = %description,
                "report_buffer_overflow"
            );
        }
        let skip_stale = match (inner.first_new_sq_num, report.sq_num) {
            (Some(boundary), Some(sq_num)) => sq_num < boundary,
            _ => false,
        };

        let Some(data_set) = report.data_set.as_ref() else {
            warn!(target: "iec61850.reporting", report = %description, "report_without_data_set");
            return;
        };
        if data_set.members.is_empty() {
            warn!(target: "iec61850.reporting", report = %description, "report_without_members");
            return;
        }

        if skip_stale {
            record_report_skipped_stale();
            warn!(
                target: "iec61850.reporting",
                report = %description,
                sq_num = ?report.sq_num,
                first_new_sq_num = ?inner.first_new_sq_num,
                members = data_set.members.len(),
                "report_skipped_stale"
            );
            return;
        }

        debug!(
            target: "iec61850.reporting",
            report = %description,
            members = data_set.members.len(),
            "handling_data_set_members"
        );
        for member in &data_set.members {
            match self.translate_member(member, time_of_entry) {
                Ok(notification) => inner.buffer.push(notification),
                Err(err) => error!(
                    target: "iec61850.reporting",
                    report = %description,
                    member = %member.reference,
                    error = %err,
                    "member_translation_failed"
                ),
            }
        }
    }

    async fn association_closed(&self, reason: Option<String>) {
        info!(
            target: "iec61850.reporting",
            device_id = %self.device_id,
            reason = reason.as_deref().unwrap_or("no IO error"),
            "association_closed"
        );
        self.flush().await;
    }
}
