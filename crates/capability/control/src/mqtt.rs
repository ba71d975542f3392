//! MQTT 接入
//!
//! - `MqttPublisher`：响应 / 事件通知 / 测量值发布
//! - `spawn_request_listener`：订阅 `<prefix>/requests/#`，每条请求独立任务处理
//!
//! Topic 布局：
//! - 请求：`<prefix>/requests/<device>`
//! - 响应：`<prefix>/responses/<device>/<correlation>`
//! - 事件通知：`<prefix>/events/<device>`
//! - 测量值：`<prefix>/measurements/<device>`

use crate::orchestrator::SessionOrchestrator;
use crate::sink::{ControlError, ResponseSink};
use api_contract::{
    EventNotificationEnvelope, MeasurementEnvelope, RequestEnvelope, ResponseEnvelope,
};
use async_trait::async_trait;
use domain::{DeviceResponse, EventNotification, SystemMeasurements, now_epoch_ms};
use iec61850_reporting::{EventNotificationSink, MeasurementSink, ReportingError};
use iec61850_telemetry::new_correlation_uid;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// MQTT 连接配置。
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
    pub qos: u8,
}

impl MqttConfig {
    fn options(&self, role: &str) -> MqttOptions {
        let client_id = format!("iec61850-adapter-{}-{}", role, uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (self.username.clone(), self.password.clone()) {
            options.set_credentials(username, password);
        }
        options
    }
}

/// MQTT 发布器（响应、事件通知、测量值共用一个连接）。
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    topic_prefix: String,
    qos: QoS,
}

impl MqttPublisher {
    pub fn connect(
        config: &MqttConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), ControlError> {
        let (client, mut eventloop) = AsyncClient::new(config.options("publish"), 10);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(err) = eventloop.poll().await {
                    warn!(target: "iec61850.control", error = %err, "mqtt_publish_eventloop_error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });
        Ok((
            Self {
                client,
                topic_prefix: config.topic_prefix.clone(),
                qos: qos_from_u8(config.qos),
            },
            handle,
        ))
    }

    async fn publish_json<T: Serialize + Sync>(&self, topic: String, value: &T) -> Result<(), ControlError> {
        let payload =
            serde_json::to_vec(value).map_err(|err| ControlError::Payload(err.to_string()))?;
        info!(
            target: "iec61850.control",
            topic = %topic,
            payload_size = payload.len(),
            "mqtt_publish"
        );
        self.client
            .publish(topic, self.qos, false, payload)
            .await
            .map_err(|err| ControlError::Publish(err.to_string()))
    }
}

#[async_trait]
impl ResponseSink for MqttPublisher {
    async fn send_response(&self, response: &DeviceResponse) -> Result<(), ControlError> {
        let topic = response_topic(
            &self.topic_prefix,
            &response.device_id,
            &response.correlation_uid,
        );
        self.publish_json(topic, &ResponseEnvelope::new(response, now_epoch_ms()))
            .await
    }
}

#[async_trait]
impl EventNotificationSink for MqttPublisher {
    async fn add_event_notifications(
        &self,
        device_id: &str,
        notifications: Vec<EventNotification>,
    ) -> Result<(), ReportingError> {
        let envelope = EventNotificationEnvelope {
            device_id: device_id.to_string(),
            notifications,
        };
        self.publish_json(events_topic(&self.topic_prefix, device_id), &envelope)
            .await
            .map_err(|err| ReportingError::Sink(err.to_string()))
    }
}

#[async_trait]
impl MeasurementSink for MqttPublisher {
    async fn send_measurements(
        &self,
        device_id: &str,
        systems: Vec<SystemMeasurements>,
    ) -> Result<(), ReportingError> {
        let envelope = MeasurementEnvelope {
            device_id: device_id.to_string(),
            systems,
            ts_ms: now_epoch_ms(),
        };
        self.publish_json(measurements_topic(&self.topic_prefix, device_id), &envelope)
            .await
            .map_err(|err| ReportingError::Sink(err.to_string()))
    }
}

/// 订阅请求 topic；每条请求在独立任务中经编排器处理，响应由编排器的响应 sink 发出。
pub fn spawn_request_listener(
    config: MqttConfig,
    orchestrator: SessionOrchestrator,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let (client, mut eventloop) = AsyncClient::new(config.options("requests"), 10);
        let topic = format!("{}/requests/#", config.topic_prefix.trim_end_matches('/'));
        if let Err(err) = client.subscribe(topic.clone(), qos_from_u8(config.qos)).await {
            warn!(target: "iec61850.control", topic = %topic, error = %err, "mqtt_subscribe_failed");
            return;
        }
        info!(target: "iec61850.control", topic = %topic, "mqtt_request_listener_started");

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let topic_device_id = extract_request_device(&config.topic_prefix, &publish.topic);
                    let envelope: RequestEnvelope = match serde_json::from_slice(&publish.payload) {
                        Ok(envelope) => envelope,
                        Err(err) => {
                            warn!(
                                target: "iec61850.control",
                                topic = %publish.topic,
                                error = %err,
                                "request_payload_invalid"
                            );
                            continue;
                        }
                    };
                    let request = match envelope
                        .into_request(topic_device_id.as_deref(), new_correlation_uid)
                    {
                        Ok(request) => request,
                        Err(err) => {
                            warn!(
                                target: "iec61850.control",
                                topic = %publish.topic,
                                error = %err,
                                "request_rejected"
                            );
                            continue;
                        }
                    };
                    let orchestrator = orchestrator.clone();
                    tokio::spawn(async move {
                        orchestrator.handle(request).await;
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(target: "iec61850.control", error = %err, "mqtt_request_eventloop_error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    })
}

/// 请求 topic 中的设备标识（`<prefix>/requests/<device>`），缺失时返回 `None`。
fn extract_request_device(prefix: &str, topic: &str) -> Option<String> {
    let prefix = prefix.trim_matches('/');
    let topic = topic.trim_matches('/');
    let rest = if prefix.is_empty() {
        topic
    } else {
        topic.strip_prefix(prefix)?
    };
    let rest = rest.trim_start_matches('/').strip_prefix("requests")?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }
    let device_id = rest.trim_matches('/');
    if device_id.is_empty() || device_id.contains('/') {
        return None;
    }
    Some(device_id.to_string())
}

fn response_topic(prefix: &str, device_id: &str, correlation_uid: &str) -> String {
    format!(
        "{}/responses/{}/{}",
        prefix.trim_end_matches('/'),
        device_id,
        correlation_uid
    )
}

fn events_topic(prefix: &str, device_id: &str) -> String {
    format!("{}/events/{}", prefix.trim_end_matches('/'), device_id)
}

fn measurements_topic(prefix: &str, device_id: &str) -> String {
    format!("{}/measurements/{}", prefix.trim_end_matches('/'), device_id)
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}
