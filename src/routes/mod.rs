//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/health` - 헬스 체크
//! - `/depositories/:id/micro-deposits` - 마이크로 디파짓 시작 / 확인
//! - `/admin/*` - 운영자 조회 / merge 실행

pub mod health;
pub mod micro_deposits;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// 라우터 생성
///
/// # Route Structure
///
/// ```text
/// GET  /health                                    - 서버 상태 확인
///
/// POST /depositories/:id/micro-deposits           - 마이크로 디파짓 전송 (201)
/// POST /depositories/:id/micro-deposits/confirm   - 금액 확인
///
/// GET  /admin/depositories/:id/micro-deposits     - 마이크로 디파짓 목록
/// POST /admin/merge                               - merge cycle 즉시 실행
/// ```
pub fn create_router(state: AppState) -> Router {
    // 프로덕션: ALLOWED_ORIGINS 에 있는 도메인만 허용
    let cors = if state.config.is_production() {
        let allowed_origins = std::env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let origins: Vec<_> = allowed_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    } else {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    };

    Router::new()
        // Health check
        .route("/health", get(health::health_check))

        // Micro-deposits
        .route("/depositories/:id/micro-deposits", post(micro_deposits::initiate_micro_deposits))
        .route(
            "/depositories/:id/micro-deposits/confirm",
            post(micro_deposits::confirm_micro_deposits),
        )

        // Admin
        .route(
            "/admin/depositories/:id/micro-deposits",
            get(micro_deposits::list_micro_deposits),
        )
        .route("/admin/merge", post(micro_deposits::run_merge_cycle))

        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)

        // 상태 주입
        .with_state(state)
}
