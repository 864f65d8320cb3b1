//! Configuration Module
//!
//! # Interview Q&A
//!
//! Q: 환경변수 vs 설정 파일, 어떤 방식을 선택했고 왜인가?
//! A: 환경변수를 선택
//!    - 12-Factor App 원칙 준수
//!    - Docker/K8s 배포 시 환경별 설정 분리 용이
//!    - 민감 정보 (SECRETS_KEY, ODFI 계좌번호) 를 코드에 포함하지 않음
//!
//! Q: 설정 검증은 어떻게 하는가?
//! A: from_env()에서 값 검증 → 잘못된 값이면 즉시 실패 (fail-fast)
//!    - 프로덕션에서 SECRETS_KEY 가 없으면 시작하지 않음
//!    - 개발 환경에서는 프로세스마다 랜덤 키 (재시작하면 기존 암호문 복호화 불가)

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::db::AccountType;
use crate::services::OdfiAccount;

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 서버 포트 (기본값: 8082)
    pub port: u16,

    /// SQLite 연결 문자열
    /// 형식: sqlite://path/to/file.db?mode=rwc
    pub database_url: String,

    /// ACH 서비스 주소
    pub ach_endpoint: String,

    /// ACH 서비스 호출 timeout
    pub ach_timeout: Duration,

    /// mergeable 파일 디렉토리
    pub merge_dir: PathBuf,

    pub merge_page_size: usize,

    /// merge cycle 주기
    pub merge_interval: Duration,

    /// 마이크로 디파짓을 보내는 계좌
    pub odfi: OdfiAccount,

    /// 계좌번호 암호화 키 (hex, 32 bytes)
    pub secrets_key: Option<String>,

    /// 환경 (development, staging, production)
    pub environment: Environment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Config {
    /// 환경변수에서 설정 로드
    ///
    /// # Optional Environment Variables
    ///
    /// - `PORT`: 서버 포트 (기본값: 8082)
    /// - `DATABASE_URL`: SQLite 연결 문자열
    /// - `ACH_ENDPOINT`: ACH 서비스 주소 (기본값: http://localhost:8080)
    /// - `ACH_TIMEOUT_SECS`: ACH 호출 timeout (기본값: 30)
    /// - `MERGE_DIR`, `MERGE_PAGE_SIZE`, `MERGE_INTERVAL_SECS`
    /// - `ODFI_ROUTING_NUMBER`, `ODFI_ACCOUNT_NUMBER`, `ODFI_ACCOUNT_TYPE`, `ODFI_NAME`
    /// - `SECRETS_KEY`: 프로덕션에서는 필수
    /// - `ENVIRONMENT`: development | staging | production
    pub fn from_env() -> Result<Self> {
        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        };

        let secrets_key = env::var("SECRETS_KEY").ok().filter(|k| !k.trim().is_empty());
        if environment == Environment::Production && secrets_key.is_none() {
            bail!("SECRETS_KEY is required in production");
        }

        let odfi = OdfiAccount {
            routing_number: env::var("ODFI_ROUTING_NUMBER").unwrap_or_else(|_| "121042882".to_string()),
            account_number: env::var("ODFI_ACCOUNT_NUMBER").unwrap_or_else(|_| "123".to_string()),
            account_type: env::var("ODFI_ACCOUNT_TYPE")
                .unwrap_or_else(|_| "checking".to_string())
                .parse::<AccountType>()
                .context("ODFI_ACCOUNT_TYPE must be checking or savings")?,
            name: env::var("ODFI_NAME").unwrap_or_else(|_| "Test ODFI Account".to_string()),
        };
        if odfi.routing_number.len() != 9 || !odfi.routing_number.chars().all(|c| c.is_ascii_digit()) {
            bail!("ODFI_ROUTING_NUMBER must be 9 digits");
        }

        Ok(Config {
            port: parse_var("PORT", 8082).context("PORT must be a valid number")?,

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://ach-verify.db?mode=rwc".to_string()),

            ach_endpoint: env::var("ACH_ENDPOINT").unwrap_or_else(|_| "http://localhost:8080".to_string()),

            ach_timeout: Duration::from_secs(
                parse_var("ACH_TIMEOUT_SECS", 30).context("ACH_TIMEOUT_SECS must be a valid number")?,
            ),

            merge_dir: env::var("MERGE_DIR")
                .unwrap_or_else(|_| "./storage/merged".to_string())
                .into(),

            merge_page_size: parse_var("MERGE_PAGE_SIZE", 100).context("MERGE_PAGE_SIZE must be a valid number")?,

            merge_interval: Duration::from_secs(
                parse_var("MERGE_INTERVAL_SECS", 600).context("MERGE_INTERVAL_SECS must be a valid number")?,
            ),

            odfi,
            secrets_key,
            environment,
        })
    }

    /// 프로덕션 환경인지 확인
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => Ok(value.trim().parse()?),
        Err(_) => Ok(default),
    }
}
