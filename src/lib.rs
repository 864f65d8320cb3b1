//! ACH Depository Verification Library
//!
//! # Overview
//!
//! 사용자가 등록한 외부 은행 계좌 (Depository) 를 마이크로 디파짓으로 검증하고,
//! 은행이 보내오는 NOC / Return 파일로 계좌 정보를 교정한다.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       ach-verify                         │
//! │                                                          │
//! │  ┌─────────┐  ┌──────────┐  ┌─────────┐  ┌─────────┐    │
//! │  │ Routes  │  │ Services │  │   DB    │  │   ACH   │    │
//! │  └────┬────┘  └────┬─────┘  └────┬────┘  └────┬────┘    │
//! │       │            │             │            │          │
//! │       └────────────┴─────────────┴────────────┘          │
//! │                         │                                │
//! └─────────────────────────┼────────────────────────────────┘
//!                           │
//!                           ▼
//!                  ┌────────────────┐
//!                  │  ACH Service   │
//!                  └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 HTTP 매핑
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 마이크로 디파짓, NOC, Return, Merge, ACH 클라이언트, 암호화
//! - `db`: Depository / MicroDeposit 저장소와 merge cursor
//! - `ach`: ACH 파일 모델과 change / return code 카탈로그
//! - `types`: 공통 타입 (Amount, ID)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ach_verify::{config::Config, db::Database, services::handle_noc_file};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Database::connect(&config.database_url).await?;
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod ach;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod services;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use db::Database;
pub use error::ApiError;

use db::DepositoryRepository;
use services::{Merger, MicroDepositService};

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub repo: Arc<dyn DepositoryRepository>,
    pub micro_deposits: Arc<MicroDepositService>,
    pub merger: Arc<Merger>,
    pub config: Arc<Config>,
}
