//! 设备会话
//!
//! 一个会话持有到一台 IED 的唯一关联和模型快照。断开是幂等的，
//! 断开时通知报告监听器（由监听器决定是否上送缓冲的事件）。

use crate::address::{AddressResolver, ModelAddress};
use crate::error::ProtocolError;
use crate::model::{BasicValue, ModelNode, ReportControlBlock, ServerModel};
use crate::transport::{Association, Iec61850Transport, ReportListener};
use domain::DeviceIdentity;
use iec61850_telemetry::{record_connection_failure, record_session_opened};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 连接参数
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub port: u16,
    pub timeout_ms: u64,
    /// 预置模型（存在时不再从设备读取模型）
    pub model_template: Option<Arc<ServerModel>>,
}

impl ConnectOptions {
    pub fn new(port: u16, timeout_ms: u64) -> Self {
        Self {
            port,
            timeout_ms,
            model_template: None,
        }
    }
}

/// 设备会话（克隆共享同一关联）
#[derive(Clone)]
pub struct DeviceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    identity: DeviceIdentity,
    resolver: AddressResolver,
    association: Box<dyn Association>,
    model: ServerModel,
    listener: Arc<dyn ReportListener>,
    closed: AtomicBool,
}

impl DeviceSession {
    /// 建立关联并加载模型。失败时关联被丢弃，不在此层重试。
    pub async fn connect(
        transport: &dyn Iec61850Transport,
        identity: DeviceIdentity,
        options: &ConnectOptions,
        listener: Arc<dyn ReportListener>,
    ) -> Result<Self, ProtocolError> {
        let timeout = Duration::from_millis(options.timeout_ms);
        info!(
            target: "iec61850.protocol",
            device_id = %identity.device_id,
            ip_address = %identity.ip_address,
            port = options.port,
            timeout_ms = options.timeout_ms,
            "session_connecting"
        );
        let associate = transport.associate(&identity.ip_address, options.port, listener.clone());
        let association = match tokio::time::timeout(timeout, associate).await {
            Ok(Ok(association)) => association,
            Ok(Err(err)) => {
                record_connection_failure();
                warn!(
                    target: "iec61850.protocol",
                    device_id = %identity.device_id,
                    error = %err,
                    "session_connect_failed"
                );
                return Err(ProtocolError::Connection(format!(
                    "could not connect to {}:{}: {}",
                    identity.ip_address, options.port, err
                )));
            }
            Err(_) => {
                record_connection_failure();
                warn!(
                    target: "iec61850.protocol",
                    device_id = %identity.device_id,
                    "session_connect_timeout"
                );
                return Err(ProtocolError::Timeout(format!(
                    "connect to {}:{} exceeded {} ms",
                    identity.ip_address, options.port, options.timeout_ms
                )));
            }
        };

        let model = match &options.model_template {
            Some(template) => template.as_ref().clone(),
            None => match tokio::time::timeout(timeout, association.retrieve_model()).await {
                Ok(Ok(model)) => model,
                Ok(Err(err)) => {
                    association.close().await;
                    record_connection_failure();
                    return Err(ProtocolError::Connection(format!(
                        "model retrieval failed: {}",
                        err
                    )));
                }
                Err(_) => {
                    association.close().await;
                    record_connection_failure();
                    return Err(ProtocolError::Timeout(format!(
                        "model retrieval exceeded {} ms",
                        options.timeout_ms
                    )));
                }
            },
        };

        record_session_opened();
        info!(
            target: "iec61850.protocol",
            device_id = %identity.device_id,
            nodes = model.nodes().len(),
            brcbs = model.brcbs().len(),
            urcbs = model.urcbs().len(),
            "session_connected"
        );
        let resolver = AddressResolver::new(identity.server_name());
        Ok(Self {
            inner: Arc::new(SessionInner {
                identity,
                resolver,
                association,
                model,
                listener,
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.inner.identity
    }

    pub fn device_id(&self) -> &str {
        &self.inner.identity.device_id
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.inner.resolver
    }

    pub fn model(&self) -> &ServerModel {
        &self.inner.model
    }

    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), ProtocolError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ProtocolError::Connection(format!(
                "session for {} is closed",
                self.device_id()
            )))
        }
    }

    fn locate(&self, address: &ModelAddress) -> Result<&ModelNode, ProtocolError> {
        let reference = self.inner.resolver.resolve(address)?;
        self.inner
            .model
            .find_node(&reference, address.fc)
            .ok_or_else(|| {
                ProtocolError::Configuration(format!(
                    "node {} [{}] not found in model of {}",
                    reference,
                    address.fc,
                    self.device_id()
                ))
            })
    }

    /// 读取节点下全部数据属性
    pub async fn read_node(&self, address: &ModelAddress) -> Result<ModelNode, ProtocolError> {
        self.ensure_open()?;
        let node = self.locate(address)?;
        self.inner
            .association
            .read(&node.reference, node.fc)
            .await
            .map_err(|err| self.transport_failure("read", &node.reference, err))
    }

    /// 写入节点下的单个数据属性
    pub async fn write_node(
        &self,
        address: &ModelAddress,
        attribute: &str,
        value: BasicValue,
    ) -> Result<(), ProtocolError> {
        self.ensure_open()?;
        let mut node = self.locate(address)?.clone();
        node.set(attribute, value);
        self.inner
            .association
            .write(&node)
            .await
            .map_err(|err| self.transport_failure("write", &node.reference, err))
    }

    pub async fn enable_reporting(
        &self,
        rcb_reference: &str,
    ) -> Result<ReportControlBlock, ProtocolError> {
        self.ensure_open()?;
        if self.inner.model.rcb(rcb_reference).is_none() {
            return Err(ProtocolError::Configuration(format!(
                "report control block {} not found in model of {}",
                rcb_reference,
                self.device_id()
            )));
        }
        self.inner
            .association
            .enable_reporting(rcb_reference)
            .await
            .map_err(|err| self.transport_failure("enable_reporting", rcb_reference, err))
    }

    pub async fn disable_reporting(&self, rcb_reference: &str) -> Result<(), ProtocolError> {
        self.ensure_open()?;
        self.inner
            .association
            .disable_reporting(rcb_reference)
            .await
            .map_err(|err| self.transport_failure("disable_reporting", rcb_reference, err))
    }

    fn transport_failure(
        &self,
        action: &str,
        reference: &str,
        err: crate::error::TransportError,
    ) -> ProtocolError {
        let err = ProtocolError::from(err);
        warn!(
            target: "iec61850.protocol",
            device_id = %self.device_id(),
            action = action,
            reference = %reference,
            connection_broken = err.is_connection_failure(),
            error = %err,
            "session_transport_error"
        );
        err
    }

    /// 断开关联（幂等，可在已断开的会话上调用）
    pub async fn disconnect(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.association.close().await;
        self.inner.listener.association_closed(None).await;
        info!(
            target: "iec61850.protocol",
            device_id = %self.device_id(),
            "session_disconnected"
        );
    }

    /// 延迟断开：到期后先尝试关闭指定报告（失败只记录），再断开。
    ///
    /// 任务持有会话句柄，调度后不可取消。
    pub fn disconnect_after_delay(
        &self,
        delay: Duration,
        clear_report: Option<String>,
    ) -> DelayedDisconnect {
        let session = self.clone();
        info!(
            target: "iec61850.protocol",
            device_id = %self.device_id(),
            delay_ms = delay.as_millis() as u64,
            "session_disconnect_scheduled"
        );
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(rcb_reference) = clear_report {
                if session.is_open() {
                    if let Err(err) = session.disable_reporting(&rcb_reference).await {
                        warn!(
                            target: "iec61850.protocol",
                            device_id = %session.device_id(),
                            rcb = %rcb_reference,
                            error = %err,
                            "report_clear_failed"
                        );
                    }
                }
            }
            session.disconnect().await;
        });
        DelayedDisconnect { handle }
    }
}

/// 已调度的延迟断开任务
pub struct DelayedDisconnect {
    handle: tokio::task::JoinHandle<()>,
}

impl DelayedDisconnect {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 等待断开完成
    pub async fn wait(self) {
        if let Err(err) = self.handle.await {
            warn!(target: "iec61850.protocol", "delayed disconnect task failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{DataAttribute, Fc, LogicalDevice};
    use crate::error::TransportError;
    use crate::transport::Report;
    use async_trait::async_trait;
    use domain::DeviceFamily;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counters {
        closes: AtomicUsize,
        writes: Mutex<Vec<ModelNode>>,
        disabled: Mutex<Vec<String>>,
    }

    struct FakeAssociation {
        model: ServerModel,
        counters: Arc<Counters>,
        read_error: Option<TransportError>,
    }

    #[async_trait]
    impl Association for FakeAssociation {
        async fn retrieve_model(&self) -> Result<ServerModel, TransportError> {
            Ok(self.model.clone())
        }

        async fn read(&self, reference: &str, fc: Fc) -> Result<ModelNode, TransportError> {
            if let Some(err) = &self.read_error {
                return Err(err.clone());
            }
            self.model
                .find_node(reference, fc)
                .cloned()
                .ok_or_else(|| TransportError::Service("object not found".into()))
        }

        async fn write(&self, node: &ModelNode) -> Result<(), TransportError> {
            self.counters.writes.lock().unwrap().push(node.clone());
            Ok(())
        }

        async fn enable_reporting(
            &self,
            rcb_reference: &str,
        ) -> Result<ReportControlBlock, TransportError> {
            Ok(ReportControlBlock::new(rcb_reference, true))
        }

        async fn disable_reporting(&self, rcb_reference: &str) -> Result<(), TransportError> {
            self.counters
                .disabled
                .lock()
                .unwrap()
                .push(rcb_reference.to_string());
            Ok(())
        }

        async fn close(&self) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeTransport {
        model: ServerModel,
        counters: Arc<Counters>,
        refuse: bool,
        read_error: Option<TransportError>,
    }

    #[async_trait]
    impl Iec61850Transport for FakeTransport {
        async fn associate(
            &self,
            _ip_address: &str,
            _port: u16,
            _listener: Arc<dyn ReportListener>,
        ) -> Result<Box<dyn Association>, TransportError> {
            if self.refuse {
                return Err(TransportError::Io("connection refused".into()));
            }
            Ok(Box::new(FakeAssociation {
                model: self.model.clone(),
                counters: self.counters.clone(),
                read_error: self.read_error.clone(),
            }))
        }
    }

    #[derive(Default)]
    struct ClosedListener {
        closed: AtomicUsize,
    }

    #[async_trait]
    impl ReportListener for ClosedListener {
        async fn new_report(&self, _report: Report) {}

        async fn association_closed(&self, _reason: Option<String>) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn lighting_model() -> ServerModel {
        let mut model = ServerModel::new();
        model.insert_node(
            ModelNode::new("SWDeviceGenericIO/XSWC1.Pos", Fc::St)
                .with("stVal", BasicValue::Bool(true)),
        );
        model.insert_node(
            ModelNode::new("SWDeviceGenericIO/XSWC1.Pos", Fc::Co)
                .with("Oper.ctlVal", BasicValue::Bool(false)),
        );
        model.add_rcb(ReportControlBlock::new(
            "SWDeviceGenericIO/LLN0.evn_rpn01",
            true,
        ));
        model
    }

    fn transport(refuse: bool, read_error: Option<TransportError>) -> (FakeTransport, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (
            FakeTransport {
                model: lighting_model(),
                counters: counters.clone(),
                refuse,
                read_error,
            },
            counters,
        )
    }

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new("SSLD-1", "127.0.0.1", DeviceFamily::StreetlightController)
    }

    fn position(fc: Fc) -> ModelAddress {
        ModelAddress::new(LogicalDevice::LIGHTING, None, "XSWC1", DataAttribute::Position, fc)
    }

    #[tokio::test]
    async fn connect_refused_is_connection_error() {
        let (transport, _) = transport(true, None);
        let result = DeviceSession::connect(
            &transport,
            identity(),
            &ConnectOptions::new(102, 1000),
            Arc::new(ClosedListener::default()),
        )
        .await;
        match result {
            Err(err) => assert!(err.is_connection_failure()),
            Ok(_) => panic!("expected connection failure"),
        }
    }

    #[tokio::test]
    async fn reads_and_writes_resolved_nodes() {
        let (transport, counters) = transport(false, None);
        let session = DeviceSession::connect(
            &transport,
            identity(),
            &ConnectOptions::new(102, 1000),
            Arc::new(ClosedListener::default()),
        )
        .await
        .expect("session");

        let node = session.read_node(&position(Fc::St)).await.expect("read");
        assert_eq!(node.get("stVal"), Some(&BasicValue::Bool(true)));

        session
            .write_node(&position(Fc::Co), "Oper.ctlVal", BasicValue::Bool(true))
            .await
            .expect("write");
        let writes = counters.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].get("Oper.ctlVal"), Some(&BasicValue::Bool(true)));
    }

    #[tokio::test]
    async fn missing_node_is_configuration_error() {
        let (transport, _) = transport(false, None);
        let session = DeviceSession::connect(
            &transport,
            identity(),
            &ConnectOptions::new(102, 1000),
            Arc::new(ClosedListener::default()),
        )
        .await
        .expect("session");
        let result = session.read_node(&position(Fc::Cf)).await;
        assert!(matches!(result, Err(ProtocolError::Configuration(_))));
    }

    #[tokio::test]
    async fn read_errors_keep_their_class() {
        let (transport, _) = transport(false, Some(TransportError::Io("broken pipe".into())));
        let session = DeviceSession::connect(
            &transport,
            identity(),
            &ConnectOptions::new(102, 1000),
            Arc::new(ClosedListener::default()),
        )
        .await
        .expect("session");
        let err = session.read_node(&position(Fc::St)).await.unwrap_err();
        assert!(err.is_connection_failure());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (transport, counters) = transport(false, None);
        let listener = Arc::new(ClosedListener::default());
        let session = DeviceSession::connect(
            &transport,
            identity(),
            &ConnectOptions::new(102, 1000),
            listener.clone(),
        )
        .await
        .expect("session");

        session.disconnect().await;
        session.disconnect().await;
        assert!(!session.is_open());
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(listener.closed.load(Ordering::SeqCst), 1);

        let err = session.read_node(&position(Fc::St)).await.unwrap_err();
        assert!(err.is_connection_failure());
    }

    #[tokio::test]
    async fn delayed_disconnect_clears_report_then_closes() {
        let (transport, counters) = transport(false, None);
        let session = DeviceSession::connect(
            &transport,
            identity(),
            &ConnectOptions::new(102, 1000),
            Arc::new(ClosedListener::default()),
        )
        .await
        .expect("session");

        let task = session.disconnect_after_delay(
            Duration::from_millis(10),
            Some("SWDeviceGenericIO/LLN0.evn_rpn01".to_string()),
        );
        assert!(session.is_open());
        task.wait().await;
        assert!(!session.is_open());
        assert_eq!(
            counters.disabled.lock().unwrap().as_slice(),
            ["SWDeviceGenericIO/LLN0.evn_rpn01".to_string()]
        );
        // 已断开后再次断开不会重复关闭
        session.disconnect().await;
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }
}
