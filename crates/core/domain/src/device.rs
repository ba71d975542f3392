//! 设备身份与设备配置。

use serde::{Deserialize, Serialize};

/// 设备族。
///
/// 同时用于描述被连接的设备（路灯控制器 / RTU）以及 RTU 下挂的系统（PV、电池等）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceFamily {
    StreetlightController,
    GenericRtu,
    Battery,
    Pv,
    Chp,
    Boiler,
    DaRtu,
}

impl DeviceFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreetlightController => "STREETLIGHT_CONTROLLER",
            Self::GenericRtu => "GENERIC_RTU",
            Self::Battery => "BATTERY",
            Self::Pv => "PV",
            Self::Chp => "CHP",
            Self::Boiler => "BOILER",
            Self::DaRtu => "DA_RTU",
        }
    }

    /// 设备未配置 server name 时使用的 IED 名称。
    pub fn default_server_name(&self) -> &'static str {
        match self {
            Self::StreetlightController => "SWDeviceGeneric",
            Self::DaRtu => "DA_RTU",
            _ => "ZOWN_POC",
        }
    }

    /// 是否为 RTU 类设备（可承载多个系统）。
    pub fn is_rtu(&self) -> bool {
        !matches!(self, Self::StreetlightController)
    }
}

impl std::fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 设备身份（单次请求内不可变）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub device_id: String,
    pub ip_address: String,
    pub family: DeviceFamily,
    #[serde(default)]
    pub server_name: Option<String>,
}

impl DeviceIdentity {
    pub fn new(
        device_id: impl Into<String>,
        ip_address: impl Into<String>,
        family: DeviceFamily,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            ip_address: ip_address.into(),
            family,
            server_name: None,
        }
    }

    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    /// 逻辑设备前缀：配置值优先，否则回落到设备族默认 IED 名称。
    pub fn server_name(&self) -> &str {
        self.server_name
            .as_deref()
            .unwrap_or_else(|| self.family.default_server_name())
    }
}

/// 继电器类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayType {
    Light,
    Tariff,
    TariffReversed,
}

/// 输出设置：内部继电器编号与对外编号的映射。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSetting {
    pub internal_id: u8,
    pub external_id: u8,
    pub relay_type: RelayType,
}

/// 指定使能的报告（逻辑设备 + 逻辑节点，实例号由扫描决定）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSelection {
    pub logical_device: String,
    pub logical_node: String,
}

/// 设备注册表中的完整设备配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(flatten)]
    pub identity: DeviceIdentity,
    #[serde(default)]
    pub output_settings: Vec<OutputSetting>,
    #[serde(default)]
    pub enable_all_reports_on_connect: bool,
    #[serde(default)]
    pub report_selections: Vec<ReportSelection>,
}

impl DeviceRecord {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            output_settings: Vec::new(),
            enable_all_reports_on_connect: false,
            report_selections: Vec::new(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.identity.device_id
    }

    /// 是否配置了任何报告（全部或指定子集）。
    pub fn has_reporting(&self) -> bool {
        self.enable_all_reports_on_connect || !self.report_selections.is_empty()
    }

    /// 按对外编号查找输出设置。
    pub fn output_by_external(&self, external_id: u8) -> Option<&OutputSetting> {
        self.output_settings
            .iter()
            .find(|setting| setting.external_id == external_id)
    }

    /// 所有灯光继电器。
    pub fn light_relays(&self) -> impl Iterator<Item = &OutputSetting> {
        self.output_settings
            .iter()
            .filter(|setting| setting.relay_type == RelayType::Light)
    }
}
