//! 模型寻址
//!
//! 对象引用格式：`<serverName><LogicalDevice>[index]/<LogicalNode>.<DataAttribute>`，
//! 例如 `WAGO61850ServerPV1/MMXU1.TotW`。协议栈按字符串精确匹配节点，分隔符不可变。

use crate::error::ProtocolError;
use domain::DeviceFamily;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// 功能约束（Functional Constraint）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Fc {
    /// 状态
    St,
    /// 测量值
    Mx,
    /// 配置
    Cf,
    /// 控制
    Co,
    /// 设定值
    Sp,
    /// 替代值
    Sv,
    /// 描述
    Dc,
    /// 缓存报告控制块
    Br,
    /// 非缓存报告控制块
    Rp,
}

impl Fc {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::St => "ST",
            Self::Mx => "MX",
            Self::Cf => "CF",
            Self::Co => "CO",
            Self::Sp => "SP",
            Self::Sv => "SV",
            Self::Dc => "DC",
            Self::Br => "BR",
            Self::Rp => "RP",
        }
    }
}

impl std::fmt::Display for Fc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 逻辑设备（设备族标识 + 是否单实例）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalDevice {
    token: Cow<'static, str>,
    single_instance: bool,
}

impl LogicalDevice {
    pub const LIGHTING: Self = Self::known("IO", true);
    pub const RTU: Self = Self::known("RTU", false);
    pub const PV: Self = Self::known("PV", false);
    pub const BATTERY: Self = Self::known("BATTERY", false);
    pub const ENGINE: Self = Self::known("ENGINE", false);
    pub const BOILER: Self = Self::known("BOILER", false);
    pub const LOAD: Self = Self::known("LOAD", false);

    const KNOWN: [Self; 7] = [
        Self::LIGHTING,
        Self::RTU,
        Self::PV,
        Self::BATTERY,
        Self::ENGINE,
        Self::BOILER,
        Self::LOAD,
    ];

    const fn known(token: &'static str, single_instance: bool) -> Self {
        Self {
            token: Cow::Borrowed(token),
            single_instance,
        }
    }

    /// 自定义逻辑设备（模型模板中出现的非标准设备族）。
    pub fn new(token: impl Into<String>, single_instance: bool) -> Self {
        Self {
            token: Cow::Owned(token.into()),
            single_instance,
        }
    }

    /// 解析已知逻辑设备标识（不区分大小写）。
    pub fn parse(token: &str) -> Result<Self, ProtocolError> {
        Self::KNOWN
            .iter()
            .find(|known| known.token.eq_ignore_ascii_case(token))
            .cloned()
            .ok_or_else(|| {
                ProtocolError::Configuration(format!("unknown logical device: {}", token))
            })
    }

    /// 设备族对应的逻辑设备。
    pub fn for_family(family: DeviceFamily) -> Self {
        match family {
            DeviceFamily::StreetlightController => Self::LIGHTING,
            DeviceFamily::GenericRtu | DeviceFamily::DaRtu => Self::RTU,
            DeviceFamily::Battery => Self::BATTERY,
            DeviceFamily::Pv => Self::PV,
            DeviceFamily::Chp => Self::ENGINE,
            DeviceFamily::Boiler => Self::BOILER,
        }
    }

    /// 逻辑设备标识反查设备族（用于报告成员归属）。
    pub fn family(&self) -> Option<DeviceFamily> {
        let family = match self.token.as_ref() {
            "IO" => DeviceFamily::StreetlightController,
            "RTU" => DeviceFamily::GenericRtu,
            "PV" => DeviceFamily::Pv,
            "BATTERY" => DeviceFamily::Battery,
            "ENGINE" => DeviceFamily::Chp,
            "BOILER" => DeviceFamily::Boiler,
            _ => return None,
        };
        Some(family)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_single_instance(&self) -> bool {
        self.single_instance
    }
}

/// 常用逻辑节点名称
pub mod logical_node {
    pub const LOGICAL_NODE_ZERO: &str = "LLN0";
    pub const GENERIC_IO: &str = "GGIO1";
    pub const MEASUREMENT: &str = "MMXU1";
    pub const GENERATOR: &str = "DGEN1";
    pub const RATING: &str = "DRCC1";
    pub const STREET_LIGHT_CONFIGURATION: &str = "CSLC";

    /// 开关组件 `XSWC<index>`。
    pub fn switch_component(index: u8) -> String {
        format!("XSWC{}", index)
    }

    /// 调度 `DSCH<index>`。
    pub fn schedule(index: u8) -> String {
        format!("DSCH{}", index)
    }
}

/// 数据属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataAttribute {
    Position,
    MasterControl,
    EventBuffer,
    SoftwareConfiguration,
    Reporting,
    Behaviour,
    Health,
    Mode,
    AlarmOne,
    AlarmTwo,
    AlarmThree,
    AlarmFour,
    AlarmOther,
    WarningOne,
    WarningTwo,
    WarningThree,
    WarningFour,
    WarningOther,
    TotalEnergy,
    ActualPower,
    GeneratorOperationalState,
    OperationalHours,
    OutputWSetting,
    MaximumPowerLimit,
    ScheduleId,
    ScheduleType,
    ScheduleCategory,
}

impl DataAttribute {
    const ALL: [Self; 27] = [
        Self::Position,
        Self::MasterControl,
        Self::EventBuffer,
        Self::SoftwareConfiguration,
        Self::Reporting,
        Self::Behaviour,
        Self::Health,
        Self::Mode,
        Self::AlarmOne,
        Self::AlarmTwo,
        Self::AlarmThree,
        Self::AlarmFour,
        Self::AlarmOther,
        Self::WarningOne,
        Self::WarningTwo,
        Self::WarningThree,
        Self::WarningFour,
        Self::WarningOther,
        Self::TotalEnergy,
        Self::ActualPower,
        Self::GeneratorOperationalState,
        Self::OperationalHours,
        Self::OutputWSetting,
        Self::MaximumPowerLimit,
        Self::ScheduleId,
        Self::ScheduleType,
        Self::ScheduleCategory,
    ];

    /// 模型中的节点名。
    pub fn token(&self) -> &'static str {
        match self {
            Self::Position => "Pos",
            Self::MasterControl => "CfSt",
            Self::EventBuffer => "EvnBuf",
            Self::SoftwareConfiguration => "SWCf",
            Self::Reporting => "evn_rpn01",
            Self::Behaviour => "Beh",
            Self::Health => "Health",
            Self::Mode => "Mod",
            Self::AlarmOne => "Alm1",
            Self::AlarmTwo => "Alm2",
            Self::AlarmThree => "Alm3",
            Self::AlarmFour => "Alm4",
            Self::AlarmOther => "IntIn1",
            Self::WarningOne => "Wrn1",
            Self::WarningTwo => "Wrn2",
            Self::WarningThree => "Wrn3",
            Self::WarningFour => "Wrn4",
            Self::WarningOther => "IntIn2",
            Self::TotalEnergy => "TotWh",
            Self::ActualPower => "TotW",
            Self::GeneratorOperationalState => "GnOpSt",
            Self::OperationalHours => "OpTmsRs",
            Self::OutputWSetting => "OutWSet",
            Self::MaximumPowerLimit => "MaxWLim",
            Self::ScheduleId => "SchdId",
            Self::ScheduleType => "SchdTyp",
            Self::ScheduleCategory => "SchCat",
        }
    }

    /// 平台侧使用的测量名（告警/警告使用可读别名）。
    pub fn measurement_name(&self) -> &'static str {
        match self {
            Self::AlarmOne => "Alarm1",
            Self::AlarmTwo => "Alarm2",
            Self::AlarmThree => "Alarm3",
            Self::AlarmFour => "Alarm4",
            Self::AlarmOther => "AlarmOther",
            Self::WarningOne => "Warning1",
            Self::WarningTwo => "Warning2",
            Self::WarningThree => "Warning3",
            Self::WarningFour => "Warning4",
            Self::WarningOther => "WarningOther",
            other => other.token(),
        }
    }

    /// 解析数据属性（节点名或测量名，不区分大小写）。
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        let value = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|attribute| {
                attribute.token().eq_ignore_ascii_case(value)
                    || attribute.measurement_name().eq_ignore_ascii_case(value)
            })
            .ok_or_else(|| {
                ProtocolError::Configuration(format!("unknown data attribute: {}", value))
            })
    }

    /// 目录键是否包含子索引（调度编号、继电器编号）。
    pub fn uses_index(&self) -> bool {
        matches!(
            self,
            Self::Position | Self::ScheduleId | Self::ScheduleType | Self::ScheduleCategory
        )
    }
}

impl std::fmt::Display for DataAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// 模型地址（构造后不可变）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAddress {
    pub logical_device: LogicalDevice,
    /// 逻辑设备实例号（从 1 开始），单实例设备族忽略
    pub instance: Option<u8>,
    pub logical_node: String,
    pub data_attribute: DataAttribute,
    pub fc: Fc,
}

impl ModelAddress {
    pub fn new(
        logical_device: LogicalDevice,
        instance: Option<u8>,
        logical_node: impl Into<String>,
        data_attribute: DataAttribute,
        fc: Fc,
    ) -> Self {
        Self {
            logical_device,
            instance,
            logical_node: logical_node.into(),
            data_attribute,
            fc,
        }
    }
}

/// 从对象引用拆出的各级名称
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceParts {
    pub logical_device: String,
    pub instance: Option<u8>,
    pub logical_node: String,
    pub data_attribute: String,
}

/// 地址解析器（纯函数，无 IO）
#[derive(Debug, Clone, Default)]
pub struct AddressResolver {
    server_name: String,
}

impl AddressResolver {
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// 逻辑设备名：`<serverName><token>[index]`。
    pub fn logical_device_name(
        &self,
        logical_device: &LogicalDevice,
        instance: Option<u8>,
    ) -> Result<String, ProtocolError> {
        if logical_device.token().is_empty() {
            return Err(ProtocolError::Configuration(
                "empty logical device token".to_string(),
            ));
        }
        if logical_device.is_single_instance() {
            return Ok(format!("{}{}", self.server_name, logical_device.token()));
        }
        match instance {
            Some(index) if index > 0 => Ok(format!(
                "{}{}{}",
                self.server_name,
                logical_device.token(),
                index
            )),
            Some(_) => Err(ProtocolError::Configuration(format!(
                "instance index of {} must start at 1",
                logical_device.token()
            ))),
            None => Err(ProtocolError::Configuration(format!(
                "logical device {} requires an instance index",
                logical_device.token()
            ))),
        }
    }

    /// 节点引用：`<logicalDevice>/<logicalNode>.<dataAttribute>`。
    pub fn resolve(&self, address: &ModelAddress) -> Result<String, ProtocolError> {
        let node = address.logical_node.as_str();
        if node.is_empty() || node.contains('/') || node.contains('.') {
            return Err(ProtocolError::Configuration(format!(
                "invalid logical node: {:?}",
                node
            )));
        }
        let device = self.logical_device_name(&address.logical_device, address.instance)?;
        Ok(format!(
            "{}/{}.{}",
            device,
            node,
            address.data_attribute.token()
        ))
    }

    /// 报告控制块引用：`<serverName><logicalDevice><index>/<logicalNode>`。
    pub fn report_reference(&self, logical_device: &str, index: u32, logical_node: &str) -> String {
        format!(
            "{}{}{}/{}",
            self.server_name, logical_device, index, logical_node
        )
    }

    /// 拆分对象引用（报告成员反查）。
    pub fn split_reference(&self, reference: &str) -> Option<ReferenceParts> {
        let rest = reference.strip_prefix(self.server_name.as_str())?;
        let (device, path) = rest.split_once('/')?;
        let digits = device
            .chars()
            .rev()
            .take_while(|ch| ch.is_ascii_digit())
            .count();
        let (token, index) = device.split_at(device.len() - digits);
        let instance = if index.is_empty() {
            None
        } else {
            Some(index.parse::<u8>().ok()?)
        };
        let mut segments = path.split('.');
        let logical_node = segments.next().filter(|s| !s.is_empty())?;
        let data_attribute = segments.next().filter(|s| !s.is_empty())?;
        Some(ReferenceParts {
            logical_device: token.to_string(),
            instance,
            logical_node: logical_node.to_string(),
            data_attribute: data_attribute.to_string(),
        })
    }
}
