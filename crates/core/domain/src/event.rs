//! 设备事件通知。

use serde::{Deserialize, Serialize};

/// 路灯控制器事件类型（`evnType` 编码）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    DiagEventsGeneral,
    LightEventsLightOn,
    LightEventsLightOff,
    TariffEventsTariffOn,
    TariffEventsTariffOff,
    FunctionFirmwareEventsActivating,
    FunctionFirmwareEventsDownloadNotfound,
    FunctionFirmwareEventsDownloadFailed,
    SecurityFirmwareEventsActivating,
    SecurityFirmwareEventsDownloadNotfound,
    SecurityFirmwareEventsDownloadFailed,
    AlarmEventsLightFailure,
    AlarmEventsTariffFailure,
}

/// 固件事件的分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareKind {
    Functional,
    Security,
}

impl EventType {
    pub fn from_code(code: u8) -> Option<Self> {
        let event = match code {
            1 => Self::DiagEventsGeneral,
            11 => Self::LightEventsLightOn,
            12 => Self::LightEventsLightOff,
            21 => Self::TariffEventsTariffOn,
            22 => Self::TariffEventsTariffOff,
            31 => Self::FunctionFirmwareEventsActivating,
            32 => Self::FunctionFirmwareEventsDownloadNotfound,
            33 => Self::FunctionFirmwareEventsDownloadFailed,
            41 => Self::SecurityFirmwareEventsActivating,
            42 => Self::SecurityFirmwareEventsDownloadNotfound,
            43 => Self::SecurityFirmwareEventsDownloadFailed,
            51 => Self::AlarmEventsLightFailure,
            52 => Self::AlarmEventsTariffFailure,
            _ => return None,
        };
        Some(event)
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::DiagEventsGeneral => 1,
            Self::LightEventsLightOn => 11,
            Self::LightEventsLightOff => 12,
            Self::TariffEventsTariffOn => 21,
            Self::TariffEventsTariffOff => 22,
            Self::FunctionFirmwareEventsActivating => 31,
            Self::FunctionFirmwareEventsDownloadNotfound => 32,
            Self::FunctionFirmwareEventsDownloadFailed => 33,
            Self::SecurityFirmwareEventsActivating => 41,
            Self::SecurityFirmwareEventsDownloadNotfound => 42,
            Self::SecurityFirmwareEventsDownloadFailed => 43,
            Self::AlarmEventsLightFailure => 51,
            Self::AlarmEventsTariffFailure => 52,
        }
    }

    pub fn firmware_kind(&self) -> Option<FirmwareKind> {
        match self {
            Self::FunctionFirmwareEventsActivating
            | Self::FunctionFirmwareEventsDownloadNotfound
            | Self::FunctionFirmwareEventsDownloadFailed => Some(FirmwareKind::Functional),
            Self::SecurityFirmwareEventsActivating
            | Self::SecurityFirmwareEventsDownloadNotfound
            | Self::SecurityFirmwareEventsDownloadFailed => Some(FirmwareKind::Security),
            _ => None,
        }
    }
}

/// 上送平台的事件通知。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNotification {
    pub device_id: String,
    /// 事件时间（Unix 毫秒）。
    pub date_time_ms: i64,
    pub event_type: EventType,
    pub description: String,
    /// 对外继电器编号，0 表示不适用。
    pub index: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_codes_round_trip() {
        for code in [1u8, 11, 12, 21, 22, 31, 32, 33, 41, 42, 43, 51, 52] {
            let event = EventType::from_code(code).expect("known code");
            assert_eq!(event.code(), code);
        }
        assert!(EventType::from_code(99).is_none());
    }

    #[test]
    fn firmware_events_are_classified() {
        assert_eq!(
            EventType::FunctionFirmwareEventsDownloadFailed.firmware_kind(),
            Some(FirmwareKind::Functional)
        );
        assert_eq!(
            EventType::SecurityFirmwareEventsActivating.firmware_kind(),
            Some(FirmwareKind::Security)
        );
        assert_eq!(EventType::LightEventsLightOn.firmware_kind(), None);
    }
}
