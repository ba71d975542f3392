//! 协议错误类型定义

/// 传输层错误
///
/// 区分两种失败：设备以协议错误应答（关联仍可用），以及 IO 失败（关联已断开）。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// 设备返回服务错误，关联仍可用
    #[error("service error: {0}")]
    Service(String),

    /// IO 错误，关联已断开
    #[error("io error: {0}")]
    Io(String),
}

/// 错误分类（决定是否重试）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 连接完好，设备返回协议错误，可重试
    Retryable,
    /// 连接已断开，重试无意义
    Fatal,
    /// 其他错误，不重试
    NotRetried,
}

/// 协议适配错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 地址/数据属性无法解析，或模型中不存在
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 设备返回协议错误（连接完好）
    #[error("device error: {0}")]
    Device(String),

    /// 连接失败或已断开
    #[error("connection error: {0}")]
    Connection(String),

    /// 连接超时
    #[error("timeout: {0}")]
    Timeout(String),

    /// 重试次数耗尽
    #[error("operation failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ProtocolError>,
    },

    /// 其他未预期错误
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ProtocolError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Device(_) => ErrorClass::Retryable,
            Self::Connection(_) | Self::Timeout(_) => ErrorClass::Fatal,
            _ => ErrorClass::NotRetried,
        }
    }

    /// 是否应作为"无法连接"上报。
    pub fn is_connection_failure(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

impl From<TransportError> for ProtocolError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Service(message) => Self::Device(message),
            TransportError::Io(message) => Self::Connection(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_map_to_classes() {
        let service: ProtocolError = TransportError::Service("access denied".into()).into();
        assert_eq!(service.class(), ErrorClass::Retryable);

        let io: ProtocolError = TransportError::Io("reset by peer".into()).into();
        assert_eq!(io.class(), ErrorClass::Fatal);
        assert!(io.is_connection_failure());
    }

    #[test]
    fn exhausted_retries_are_not_fatal() {
        let err = ProtocolError::RetriesExhausted {
            attempts: 3,
            source: Box::new(ProtocolError::Device("busy".into())),
        };
        assert_eq!(err.class(), ErrorClass::NotRetried);
        assert!(!err.is_connection_failure());
        assert_eq!(
            err.to_string(),
            "operation failed after 3 attempts: device error: busy"
        );
    }
}
