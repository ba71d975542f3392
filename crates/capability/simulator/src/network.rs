//! 模拟网络：按 IP 地址路由到各自的模拟 IED

use crate::ied::SimulatedIed;
use crate::models::{rtu_model, ssld_model};
use async_trait::async_trait;
use domain::{DeviceFamily, DeviceRecord};
use iec61850_protocol::{Association, Iec61850Transport, ReportListener, TransportError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// 模拟网络（克隆共享同一路由表）
#[derive(Clone, Default)]
pub struct SimulatedNetwork {
    hosts: Arc<RwLock<HashMap<String, SimulatedIed>>>,
}

impl SimulatedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为每个设备按设备族挂载一台模拟 IED
    pub fn from_devices<'a>(devices: impl IntoIterator<Item = &'a DeviceRecord>) -> Self {
        let network = Self::new();
        for device in devices {
            let ied = match device.identity.family {
                DeviceFamily::StreetlightController => SimulatedIed::new(ssld_model()),
                _ => SimulatedIed::new(rtu_model(device.identity.server_name())),
            };
            network.add_host(device.identity.ip_address.clone(), ied);
        }
        network
    }

    pub fn add_host(&self, ip_address: impl Into<String>, ied: SimulatedIed) {
        let ip_address = ip_address.into();
        info!(target: "iec61850.simulator", ip_address = %ip_address, "simulator_host_added");
        if let Ok(mut hosts) = self.hosts.write() {
            hosts.insert(ip_address, ied);
        }
    }

    pub fn host(&self, ip_address: &str) -> Option<SimulatedIed> {
        self.hosts
            .read()
            .ok()
            .and_then(|hosts| hosts.get(ip_address).cloned())
    }

    pub fn len(&self) -> usize {
        self.hosts.read().map(|hosts| hosts.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Iec61850Transport for SimulatedNetwork {
    async fn associate(
        &self,
        ip_address: &str,
        port: u16,
        listener: Arc<dyn ReportListener>,
    ) -> Result<Box<dyn Association>, TransportError> {
        let ied = self
            .host(ip_address)
            .ok_or_else(|| TransportError::Io(format!("no route to host {}:{}", ip_address, port)))?;
        ied.associate(ip_address, port, listener).await
    }
}
