//! 命令目录
//!
//! 键为 (设备族, 数据属性, 子索引)；只有 `uses_index()` 的数据属性才把子索引纳入键。

use crate::command::{Command, NodeValueCommand, ValueKind};
use domain::DeviceFamily;
use iec61850_protocol::{DataAttribute, Fc, logical_node};
use std::collections::HashMap;
use std::sync::Arc;

/// 调度编号范围
pub const SCHEDULE_INDEXES: std::ops::RangeInclusive<u8> = 1..=4;

/// 路灯继电器编号范围
pub const RELAY_INDEXES: std::ops::RangeInclusive<u8> = 1..=4;

/// 目录查找失败
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no command registered for {family} {attribute}{}", index_suffix(.index))]
pub struct CommandNotFound {
    pub family: DeviceFamily,
    pub attribute: DataAttribute,
    pub index: Option<u8>,
}

fn index_suffix(index: &Option<u8>) -> String {
    index.map(|i| format!("[{}]", i)).unwrap_or_default()
}

type CatalogKey = (DeviceFamily, DataAttribute, Option<u8>);

/// 命令目录（启动时构建，之后只读）
#[derive(Clone, Default)]
pub struct CommandCatalog {
    commands: HashMap<CatalogKey, Arc<dyn Command>>,
}

impl CommandCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(family: DeviceFamily, attribute: DataAttribute, index: Option<u8>) -> CatalogKey {
        let index = if attribute.uses_index() { index } else { None };
        (family, attribute, index)
    }

    pub fn register(
        &mut self,
        family: DeviceFamily,
        attribute: DataAttribute,
        index: Option<u8>,
        command: Arc<dyn Command>,
    ) {
        self.commands
            .insert(Self::key(family, attribute, index), command);
    }

    /// 按命令自身的数据属性与子索引注册
    pub fn register_command(&mut self, family: DeviceFamily, command: Arc<dyn Command>) {
        let attribute = command.data_attribute();
        let index = command.index();
        self.register(family, attribute, index, command);
    }

    pub fn lookup(
        &self,
        family: DeviceFamily,
        attribute: DataAttribute,
        index: Option<u8>,
    ) -> Result<Arc<dyn Command>, CommandNotFound> {
        let key = Self::key(family, attribute, index);
        self.commands
            .get(&key)
            .cloned()
            .ok_or(CommandNotFound {
                family,
                attribute,
                index: key.2,
            })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// 标准目录：RTU、PV / 电池 / CHP / 锅炉、路灯
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for family in [DeviceFamily::GenericRtu, DeviceFamily::DaRtu] {
            catalog.register_rtu(family);
        }
        for family in [
            DeviceFamily::Pv,
            DeviceFamily::Battery,
            DeviceFamily::Chp,
            DeviceFamily::Boiler,
        ] {
            catalog.register_generation(family);
        }
        for index in RELAY_INDEXES {
            catalog.register_command(
                DeviceFamily::StreetlightController,
                Arc::new(NodeValueCommand::switch_position(index)),
            );
        }
        catalog
    }

    fn register_logical_node_zero(&mut self, family: DeviceFamily) {
        for attribute in [
            DataAttribute::Behaviour,
            DataAttribute::Health,
            DataAttribute::Mode,
        ] {
            self.register_command(family, Arc::new(NodeValueCommand::status(attribute)));
        }
    }

    fn register_rtu(&mut self, family: DeviceFamily) {
        self.register_logical_node_zero(family);
        for attribute in [
            DataAttribute::AlarmOne,
            DataAttribute::AlarmTwo,
            DataAttribute::AlarmThree,
            DataAttribute::AlarmFour,
            DataAttribute::AlarmOther,
            DataAttribute::WarningOne,
            DataAttribute::WarningTwo,
            DataAttribute::WarningThree,
            DataAttribute::WarningFour,
            DataAttribute::WarningOther,
        ] {
            self.register_command(family, Arc::new(NodeValueCommand::generic_io(attribute)));
        }
    }

    fn register_generation(&mut self, family: DeviceFamily) {
        self.register_logical_node_zero(family);
        let commands = [
            NodeValueCommand::new(
                DataAttribute::ActualPower,
                logical_node::MEASUREMENT,
                Fc::Mx,
                "mag.f",
                ValueKind::Float,
            ),
            NodeValueCommand::new(
                DataAttribute::TotalEnergy,
                logical_node::GENERATOR,
                Fc::Mx,
                "actVal",
                ValueKind::Int,
            ),
            NodeValueCommand::new(
                DataAttribute::GeneratorOperationalState,
                logical_node::GENERATOR,
                Fc::St,
                "stVal",
                ValueKind::Int,
            ),
            NodeValueCommand::new(
                DataAttribute::OperationalHours,
                logical_node::GENERATOR,
                Fc::St,
                "stVal",
                ValueKind::Int,
            ),
            NodeValueCommand::new(
                DataAttribute::OutputWSetting,
                logical_node::RATING,
                Fc::Sp,
                "setMag.f",
                ValueKind::Float,
            ),
            NodeValueCommand::new(
                DataAttribute::MaximumPowerLimit,
                logical_node::GENERATOR,
                Fc::Sp,
                "setMag.f",
                ValueKind::Float,
            ),
        ];
        for command in commands {
            self.register_command(family, Arc::new(command));
        }
        for index in SCHEDULE_INDEXES {
            for attribute in [
                DataAttribute::ScheduleId,
                DataAttribute::ScheduleType,
                DataAttribute::ScheduleCategory,
            ] {
                self.register_command(
                    family,
                    Arc::new(NodeValueCommand::schedule(attribute, index)),
                );
            }
        }
    }
}

impl std::fmt::Debug for CommandCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandCatalog")
            .field("commands", &self.commands.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_lookup_is_not_found() {
        let catalog = CommandCatalog::standard();
        let err = catalog
            .lookup(DeviceFamily::GenericRtu, DataAttribute::ActualPower, None)
            .err()
            .expect("not found");
        assert_eq!(err.family, DeviceFamily::GenericRtu);
        assert_eq!(
            err.to_string(),
            "no command registered for GENERIC_RTU TotW"
        );
    }

    #[test]
    fn index_only_counts_for_indexed_attributes() {
        let catalog = CommandCatalog::standard();
        // 非索引属性忽略子索引
        let health = catalog
            .lookup(DeviceFamily::Pv, DataAttribute::Health, Some(7))
            .unwrap();
        assert_eq!(health.index(), None);

        let schedule = catalog
            .lookup(DeviceFamily::Battery, DataAttribute::ScheduleId, Some(2))
            .unwrap();
        assert_eq!(schedule.index(), Some(2));

        assert!(catalog
            .lookup(DeviceFamily::Battery, DataAttribute::ScheduleId, Some(5))
            .is_err());
        assert!(catalog
            .lookup(DeviceFamily::Battery, DataAttribute::ScheduleId, None)
            .is_err());
    }

    #[test]
    fn standard_catalog_covers_families() {
        let catalog = CommandCatalog::standard();
        assert!(catalog
            .lookup(DeviceFamily::DaRtu, DataAttribute::WarningOther, None)
            .is_ok());
        assert!(catalog
            .lookup(DeviceFamily::Boiler, DataAttribute::MaximumPowerLimit, None)
            .is_ok());
        assert!(catalog
            .lookup(DeviceFamily::StreetlightController, DataAttribute::Position, Some(1))
            .is_ok());
        // 2 RTU 族 × 13 + 4 发电族 × (9 + 12) + 4 继电器
        assert_eq!(catalog.len(), 2 * 13 + 4 * 21 + 4);
    }

    #[test]
    fn register_replaces_existing_command() {
        let mut catalog = CommandCatalog::new();
        catalog.register_command(
            DeviceFamily::Pv,
            Arc::new(NodeValueCommand::status(DataAttribute::Mode)),
        );
        catalog.register(
            DeviceFamily::Pv,
            DataAttribute::Mode,
            None,
            Arc::new(NodeValueCommand::generic_io(DataAttribute::Mode)),
        );
        assert_eq!(catalog.len(), 1);
    }
}
