//! 追踪初始化、关联 ID 生成与适配器计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub sessions_opened: u64,
    pub connection_failures: u64,
    pub commands_executed: u64,
    pub command_failures: u64,
    pub command_retries: u64,
    pub filters_skipped: u64,
    pub reports_received: u64,
    pub reports_skipped_stale: u64,
    pub notifications_flushed: u64,
    pub notification_flush_failures: u64,
    pub responses_sent: u64,
}

/// 适配器计数器。
pub struct TelemetryMetrics {
    sessions_opened: AtomicU64,
    connection_failures: AtomicU64,
    commands_executed: AtomicU64,
    command_failures: AtomicU64,
    command_retries: AtomicU64,
    filters_skipped: AtomicU64,
    reports_received: AtomicU64,
    reports_skipped_stale: AtomicU64,
    notifications_flushed: AtomicU64,
    notification_flush_failures: AtomicU64,
    responses_sent: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            sessions_opened: AtomicU64::new(0),
            connection_failures: AtomicU64::new(0),
            commands_executed: AtomicU64::new(0),
            command_failures: AtomicU64::new(0),
            command_retries: AtomicU64::new(0),
            filters_skipped: AtomicU64::new(0),
            reports_received: AtomicU64::new(0),
            reports_skipped_stale: AtomicU64::new(0),
            notifications_flushed: AtomicU64::new(0),
            notification_flush_failures: AtomicU64::new(0),
            responses_sent: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            command_failures: self.command_failures.load(Ordering::Relaxed),
            command_retries: self.command_retries.load(Ordering::Relaxed),
            filters_skipped: self.filters_skipped.load(Ordering::Relaxed),
            reports_received: self.reports_received.load(Ordering::Relaxed),
            reports_skipped_stale: self.reports_skipped_stale.load(Ordering::Relaxed),
            notifications_flushed: self.notifications_flushed.load(Ordering::Relaxed),
            notification_flush_failures: self
                .notification_flush_failures
                .load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的关联 ID（请求未携带时使用）。
pub fn new_correlation_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录会话建立次数。
pub fn record_session_opened() {
    metrics().sessions_opened.fetch_add(1, Ordering::Relaxed);
}

/// 记录连接失败次数（含连接超时）。
pub fn record_connection_failure() {
    metrics().connection_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录命令执行成功次数。
pub fn record_command_executed() {
    metrics().commands_executed.fetch_add(1, Ordering::Relaxed);
}

/// 记录命令最终失败次数。
pub fn record_command_failure() {
    metrics().command_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录重试次数。
pub fn record_command_retry() {
    metrics().command_retries.fetch_add(1, Ordering::Relaxed);
}

/// 记录跳过的不支持过滤条件。
pub fn record_filter_skipped() {
    metrics().filters_skipped.fetch_add(1, Ordering::Relaxed);
}

/// 记录收到的报告数。
pub fn record_report_received() {
    metrics().reports_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录因序号过旧而丢弃的报告数。
pub fn record_report_skipped_stale() {
    metrics()
        .reports_skipped_stale
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录上送的事件通知条数。
pub fn record_notifications_flushed(count: u64) {
    metrics()
        .notifications_flushed
        .fetch_add(count, Ordering::Relaxed);
}

/// 记录事件通知上送失败次数。
pub fn record_notification_flush_failure() {
    metrics()
        .notification_flush_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录响应发送次数。
pub fn record_response_sent() {
    metrics().responses_sent.fetch_add(1, Ordering::Relaxed);
}
