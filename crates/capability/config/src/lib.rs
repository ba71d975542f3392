//! 适配器运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 适配器运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// 建立关联的超时（毫秒）。
    pub connect_timeout_ms: u64,
    pub ssld_port: u16,
    pub rtu_port: u16,
    /// 首次尝试之后的最大重试次数。
    pub max_retry_count: u32,
    pub retry_backoff_ms: u64,
    /// 使能上报后延迟断开的时间（毫秒）。
    pub disconnect_delay_ms: u64,
    /// 设备注册后延迟使能上报的时间（毫秒）。
    pub registration_reporting_delay_ms: u64,
    pub reporting_after_registration: bool,
    /// JSON 模型模板路径（存在时替代在线模型读取）。
    pub model_template_path: Option<String>,
    pub device_registry_path: Option<String>,
    pub mqtt_enabled: bool,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_topic_prefix: String,
    pub mqtt_qos: u8,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let connect_timeout_ms = read_u64("IEC61850_CONNECT_TIMEOUT_MS")?;
        let http_addr =
            env::var("IEC61850_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let ssld_port = read_u16_with_default("IEC61850_SSLD_PORT", 102)?;
        let rtu_port = read_u16_with_default("IEC61850_RTU_PORT", 102)?;
        let max_retry_count = read_u32_with_default("IEC61850_MAX_RETRY_COUNT", 2)?;
        let retry_backoff_ms = read_u64_with_default("IEC61850_RETRY_BACKOFF_MS", 200)?;
        let disconnect_delay_ms = read_u64_with_default("IEC61850_DISCONNECT_DELAY_MS", 5000)?;
        let registration_reporting_delay_ms =
            read_u64_with_default("IEC61850_REGISTRATION_REPORTING_DELAY_MS", 5000)?;
        let reporting_after_registration =
            read_bool_with_default("IEC61850_REPORTING_AFTER_REGISTRATION", false);
        let model_template_path = read_optional("IEC61850_MODEL_TEMPLATE_PATH");
        let device_registry_path = read_optional("IEC61850_DEVICE_REGISTRY_PATH");
        let mqtt_enabled = read_bool_with_default("IEC61850_MQTT", false);
        let mqtt_host = env::var("IEC61850_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("IEC61850_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("IEC61850_MQTT_USERNAME");
        let mqtt_password = read_optional("IEC61850_MQTT_PASSWORD");
        let mqtt_topic_prefix =
            env::var("IEC61850_MQTT_TOPIC_PREFIX").unwrap_or_else(|_| "osgp/iec61850".to_string());
        let mqtt_qos = read_u8_with_default("IEC61850_MQTT_QOS", 1)?;

        Ok(Self {
            http_addr,
            connect_timeout_ms,
            ssld_port,
            rtu_port,
            max_retry_count,
            retry_backoff_ms,
            disconnect_delay_ms,
            registration_reporting_delay_ms,
            reporting_after_registration,
            model_template_path,
            device_registry_path,
            mqtt_enabled,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_topic_prefix,
            mqtt_qos,
        })
    }
}

/// 读取 u64 类型环境变量。
fn read_u64(key: &str) -> Result<u64, ConfigError> {
    let value = env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))?;
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
