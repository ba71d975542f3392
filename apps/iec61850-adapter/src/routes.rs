//! 路由定义
//!
//! - 健康检查：/health
//! - 计数器快照：/metrics
//! - 设备注册回调：/devices/:device_id/registered

use crate::AppState;
use crate::handlers::{device_registered, get_metrics, health};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/devices/:device_id/registered", post(device_registered))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
