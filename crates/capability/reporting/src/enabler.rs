//! 会话建立后使能报告控制块
//!
//! 两种模式：使能模型中全部报告（先缓存后非缓存），或只使能配置的子集。
//! 子集按 `<serverName><LD><i>/<LN>` 从 i = 1 开始扫描，直到找不到匹配的控制块。
//! 单个控制块失败只记录，不影响其余控制块。路灯控制器走专用的事件报告流程，不经过这里。

use domain::{DeviceFamily, DeviceRecord};
use iec61850_protocol::DeviceSession;
use tracing::{info, warn};

/// 使能结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnableSummary {
    pub enabled: Vec<String>,
    pub failed: Vec<String>,
}

/// 报告使能器
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportingEnabler;

impl ReportingEnabler {
    pub async fn enable(&self, session: &DeviceSession, device: &DeviceRecord) -> EnableSummary {
        let mut summary = EnableSummary::default();
        if device.identity.family == DeviceFamily::StreetlightController {
            return summary;
        }

        let references = if device.enable_all_reports_on_connect {
            let model = session.model();
            model
                .brcbs()
                .iter()
                .chain(model.urcbs().iter())
                .map(|rcb| rcb.reference.clone())
                .collect()
        } else {
            configured_references(session, device)
        };

        for reference in references {
            match session.enable_reporting(&reference).await {
                Ok(_) => {
                    info!(
                        target: "iec61850.reporting",
                        device_id = %device.device_id(),
                        rcb = %reference,
                        "report_enabled"
                    );
                    summary.enabled.push(reference);
                }
                Err(err) => {
                    warn!(
                        target: "iec61850.reporting",
                        device_id = %device.device_id(),
                        rcb = %reference,
                        error = %err,
                        "report_enable_failed"
                    );
                    summary.failed.push(reference);
                }
            }
        }
        summary
    }
}

fn configured_references(session: &DeviceSession, device: &DeviceRecord) -> Vec<String> {
    let model = session.model();
    let mut references = Vec::new();
    for selection in &device.report_selections {
        let mut index = 1u32;
        loop {
            let reference = session.resolver().report_reference(
                &selection.logical_device,
                index,
                &selection.logical_node,
            );
            let Some(rcb) = model.brcb(&reference).or_else(|| model.urcb(&reference)) else {
                break;
            };
            references.push(rcb.reference.clone());
            index += 1;
        }
        if index == 1 {
            warn!(
                target: "iec61850.reporting",
                device_id = %device.device_id(),
                logical_device = %selection.logical_device,
                logical_node = %selection.logical_node,
                "report_selection_unmatched"
            );
        }
    }
    references
}
