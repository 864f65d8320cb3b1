//! Database Module
//!
//! # Interview Q&A
//!
//! Q: 왜 SQLite 인가?
//! A: 이 서비스가 쓰는 테이블은 두 개 (depositories, micro_deposits) 뿐
//!
//!    1. 트랜잭션: 상태 전이를 read-then-write 한 단위로 묶을 수 있음
//!    2. 배포: 단일 파일, 별도 DB 서버 불필요
//!    3. 테스트: `sqlite::memory:` 로 실제 쿼리를 그대로 검증
//!
//! Q: 동시성은 어떻게 보장하는가?
//! A: 상태 변경은 전부 compare-and-set
//!
//!    ```sql
//!    UPDATE depositories SET status = 'verified'
//!    WHERE depository_id = $1 AND status = 'unverified'  -- 읽었던 값
//!    ```
//!
//!    - 영향 받은 row 가 0 이면 다른 요청이 먼저 바꾼 것 → 에러
//!    - 확인(confirm) 과 NOC 교정이 경합해도 둘 다 성공하는 일은 없음

mod cursor;
mod models;
mod repository;

use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

use crate::services::KeeperError;
use crate::types::{DepositoryId, UserId};

pub use cursor::MicroDepositCursor;
pub use models::*;
pub use repository::{DepositoryRepository, SqlDepositoryRepo, VerificationOutcome};

/// Store 에러
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Keeper(#[from] KeeperError),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("depository {0} not found")]
    DepositoryNotFound(DepositoryId),

    #[error("depository {id}: invalid status transition {from} -> {to}")]
    InvalidStatusTransition {
        id: DepositoryId,
        from: DepositoryStatus,
        to: DepositoryStatus,
    },

    #[error("micro deposit not found for depository {depository_id} amount {amount}")]
    MicroDepositNotFound { depository_id: DepositoryId, amount: String },

    #[error("micro deposit for depository {depository_id} amount {amount} already has return code {existing}")]
    ReturnCodeAlreadySet {
        depository_id: DepositoryId,
        amount: String,
        existing: String,
    },

    #[error("user {user_id} does not own depository {id}")]
    NotOwner { id: DepositoryId, user_id: UserId },
}

/// 데이터베이스 연결 담당
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10
    /// - min_connections: 1
    /// - acquire_timeout: 3초
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options: SqliteConnectOptions = database_url.parse()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options.create_if_missing(true))
            .await?;

        Ok(Self { pool })
    }

    /// in-memory DB (테스트 / 로컬 실행용)
    ///
    /// `sqlite::memory:` 는 커넥션마다 별도 DB 이므로 커넥션 1개를 계속 유지한다
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
