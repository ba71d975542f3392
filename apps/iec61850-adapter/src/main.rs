//! IEC 61850 协议适配器进程。
//!
//! - HTTP：健康检查、计数器快照、设备注册回调
//! - MQTT（可选）：请求监听与响应 / 事件通知 / 测量值发布
//! - 传输：按设备注册表构建的模拟 IED 网络

mod handlers;
mod routes;

use iec61850_commands::CommandCatalog;
use iec61850_config::AppConfig;
use iec61850_control::{
    LogSink, MqttConfig, MqttPublisher, OrchestratorConfig, SessionOrchestrator,
    spawn_request_listener,
};
use iec61850_protocol::{RetryPolicy, ServerModel};
use iec61850_simulator::SimulatedNetwork;
use iec61850_storage::{DeviceRegistry, InMemoryDeviceRegistry};
use iec61850_telemetry::init_tracing;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SessionOrchestrator,
    pub registry: Arc<dyn DeviceRegistry>,
    pub mqtt_enabled: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 设备注册表（可由 JSON 文件预置）
    let registry = match &config.device_registry_path {
        Some(path) => InMemoryDeviceRegistry::from_json_file(path)?,
        None => InMemoryDeviceRegistry::new(),
    };
    let devices = registry.list_devices().await?;
    let registry: Arc<dyn DeviceRegistry> = Arc::new(registry);
    let transport = Arc::new(SimulatedNetwork::from_devices(&devices));

    let model_template = match &config.model_template_path {
        Some(path) => Some(Arc::new(ServerModel::load_template(path)?)),
        None => None,
    };
    let orchestrator_config = orchestrator_config(&config, model_template);
    let catalog = Arc::new(CommandCatalog::standard());

    let orchestrator = if config.mqtt_enabled {
        let mqtt = mqtt_config(&config);
        let (publisher, _publish_loop) = MqttPublisher::connect(&mqtt)?;
        let publisher = Arc::new(publisher);
        let orchestrator = SessionOrchestrator::new(
            registry.clone(),
            transport,
            catalog,
            publisher.clone(),
            publisher.clone(),
            publisher,
            orchestrator_config,
        );
        spawn_request_listener(mqtt, orchestrator.clone());
        orchestrator
    } else {
        let sink = Arc::new(LogSink);
        SessionOrchestrator::new(
            registry.clone(),
            transport,
            catalog,
            sink.clone(),
            sink.clone(),
            sink,
            orchestrator_config,
        )
    };

    let state = AppState {
        orchestrator,
        registry,
        mqtt_enabled: config.mqtt_enabled,
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(
        target: "iec61850.adapter",
        http_addr = %config.http_addr,
        mqtt_enabled = config.mqtt_enabled,
        devices = devices.len(),
        "adapter_started"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

fn orchestrator_config(
    config: &AppConfig,
    model_template: Option<Arc<ServerModel>>,
) -> OrchestratorConfig {
    OrchestratorConfig {
        ssld_port: config.ssld_port,
        rtu_port: config.rtu_port,
        connect_timeout_ms: config.connect_timeout_ms,
        retry_policy: RetryPolicy::from_retry_count(config.max_retry_count, config.retry_backoff_ms),
        disconnect_delay_ms: config.disconnect_delay_ms,
        registration_reporting_delay_ms: config.registration_reporting_delay_ms,
        reporting_after_registration: config.reporting_after_registration,
        model_template,
    }
}

fn mqtt_config(config: &AppConfig) -> MqttConfig {
    MqttConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        topic_prefix: config.mqtt_topic_prefix.clone(),
        qos: config.mqtt_qos,
    }
}
