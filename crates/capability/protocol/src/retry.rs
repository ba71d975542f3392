//! 有界重试
//!
//! 只有设备返回协议错误（连接完好）时才重试；连接断开立即失败，其他错误不重试。

use crate::error::{ErrorClass, ProtocolError};
use iec61850_telemetry::{record_command_executed, record_command_failure, record_command_retry};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（至少 1）
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_ms,
        }
    }

    /// 由"首次之后的重试次数"构造
    pub fn from_retry_count(retries: u32, backoff_ms: u64) -> Self {
        Self::new(retries.saturating_add(1), backoff_ms)
    }

    pub fn classify(&self, err: &ProtocolError) -> ErrorClass {
        err.class()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_retry_count(2, 200)
    }
}

/// 带重试的命令执行器
#[derive(Debug, Clone, Default)]
pub struct RetryingCommandExecutor {
    policy: RetryPolicy,
}

impl RetryingCommandExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// 执行命令，成功时返回最后一次尝试的结果。
    pub async fn execute<T, F, Fut>(
        &self,
        device_id: &str,
        operation: &str,
        mut command: F,
    ) -> Result<T, ProtocolError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProtocolError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match command().await {
                Ok(value) => {
                    record_command_executed();
                    if attempt > 1 {
                        info!(
                            target: "iec61850.protocol",
                            device_id = %device_id,
                            operation = %operation,
                            attempt = attempt,
                            "command_succeeded_after_retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            match self.policy.classify(&err) {
                ErrorClass::Retryable if attempt < self.policy.max_attempts => {
                    record_command_retry();
                    warn!(
                        target: "iec61850.protocol",
                        device_id = %device_id,
                        operation = %operation,
                        attempt = attempt,
                        max_attempts = self.policy.max_attempts,
                        error = %err,
                        "command_retry"
                    );
                    if self.policy.backoff_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.policy.backoff_ms)).await;
                    }
                }
                ErrorClass::Retryable => {
                    record_command_failure();
                    warn!(
                        target: "iec61850.protocol",
                        device_id = %device_id,
                        operation = %operation,
                        attempts = attempt,
                        error = %err,
                        "command_retries_exhausted"
                    );
                    return Err(ProtocolError::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                ErrorClass::Fatal => {
                    record_command_failure();
                    warn!(
                        target: "iec61850.protocol",
                        device_id = %device_id,
                        operation = %operation,
                        attempt = attempt,
                        error = %err,
                        "command_connection_lost"
                    );
                    return Err(err);
                }
                ErrorClass::NotRetried => {
                    record_command_failure();
                    warn!(
                        target: "iec61850.protocol",
                        device_id = %device_id,
                        operation = %operation,
                        error = %err,
                        "command_failed"
                    );
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn executor(max_attempts: u32) -> RetryingCommandExecutor {
        RetryingCommandExecutor::new(RetryPolicy::new(max_attempts, 0))
    }

    #[tokio::test]
    async fn retries_device_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = executor(4)
            .execute("RTU-1", "read", || {
                let calls = &calls;
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n <= 2 {
                        Err(ProtocolError::Device("temporarily unavailable".into()))
                    } else {
                        Ok(n * 10)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 30);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn connection_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = executor(5)
            .execute("RTU-1", "read", || {
                let calls = &calls;
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProtocolError::Connection("reset by peer".into()))
                }
            })
            .await;
        assert!(result.unwrap_err().is_connection_failure());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_is_operation_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = executor(3)
            .execute("RTU-1", "write", || {
                let calls = &calls;
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProtocolError::Device("busy".into()))
                }
            })
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, ProtocolError::RetriesExhausted { attempts: 3, .. }));
        assert!(!err.is_connection_failure());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn configuration_errors_fail_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = executor(3)
            .execute("RTU-1", "read", || {
                let calls = &calls;
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ProtocolError::Configuration("unknown node".into()))
                }
            })
            .await;
        assert!(matches!(result, Err(ProtocolError::Configuration(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn policy_counts_first_attempt() {
        assert_eq!(RetryPolicy::from_retry_count(2, 0).max_attempts, 3);
        assert_eq!(RetryPolicy::new(0, 0).max_attempts, 1);
    }
}
