//! ACH Depository Verification Server
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Client / API Gateway                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  x-user-id
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum Web Server                         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                      Routes Layer                        ││
//! │  │  /health  /depositories/:id/micro-deposits  /admin/*    ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Services Layer                        ││
//! │  │  MicroDepositService   Merger   NOC / Return handlers    ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Data Layer                            ││
//! │  │  SQLite Repository    StringKeeper                      ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         ACH Service                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ach_verify::{
    db::{DepositoryRepository, SqlDepositoryRepo},
    routes,
    services::{HttpAchClient, Merger, MicroDepositService, Sha3Keeper, StringKeeper},
    AppState, Config, Database,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    // RUST_LOG=debug,sqlx=warn 형태로 레벨 제어 가능
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ach_verify=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting ACH verification server");

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!("📋 Configuration loaded");

    // 데이터베이스 연결
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("🗄️  Database connected");

    // 마이그레이션 실행
    db.run_migrations().await?;
    tracing::info!("📦 Migrations completed");

    // 서비스 초기화
    let keeper: Arc<dyn StringKeeper> = match &config.secrets_key {
        Some(key) => Arc::new(Sha3Keeper::from_hex(key)?),
        None => {
            tracing::warn!("SECRETS_KEY not set, using a random key for this process");
            Arc::new(Sha3Keeper::random())
        }
    };
    let repo: Arc<dyn DepositoryRepository> = Arc::new(SqlDepositoryRepo::new(db.pool().clone(), keeper));

    let ach_client = Arc::new(HttpAchClient::new(&config.ach_endpoint, config.ach_timeout)?);
    tracing::info!("🏦 ACH service at {}", config.ach_endpoint);

    let micro_deposits = MicroDepositService::new(
        repo.clone(),
        ach_client.clone(),
        config.odfi.clone(),
        config.ach_timeout,
    );
    let merger = Arc::new(Merger::new(
        repo.clone(),
        ach_client,
        config.merge_dir.clone(),
        config.ach_timeout,
    ));

    // merge cycle 주기 실행
    spawn_merge_loop(merger.clone(), config.merge_page_size, config.merge_interval);

    // 앱 상태 구성
    let state = AppState {
        db: Arc::new(db),
        repo,
        micro_deposits: Arc::new(micro_deposits),
        merger,
        config: Arc::new(config.clone()),
    };

    // 라우터 구성
    let app = routes::create_router(state);

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🌐 Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_merge_loop(merger: Arc<Merger>, page_size: usize, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(err) = merger.handle_merge_cycle(page_size).await {
                tracing::error!(error = %err, "merge cycle failed");
            }
        }
    });
}
