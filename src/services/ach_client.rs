//! ACH Service Client
//!
//! NACHA 파일 생성/검증/보관은 별도 ACH 서비스가 담당한다.
//! 이 서비스는 JSON 으로 파일을 넘기고 file id 를 돌려받는다.
//!
//! ```text
//! POST {endpoint}/files/create   body: File (JSON)  → {"id": "...", "error": null}
//! GET  {endpoint}/files/{id}                        → {"file": File, "err": null}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::ach::File;

#[derive(Debug, Error)]
pub enum AchClientError {
    #[error("ACH service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ACH service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("ACH service rejected file: {0}")]
    Rejected(String),

    #[error("ACH service call timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait AchClient: Send + Sync {
    /// 파일 생성. ACH 서비스가 부여한 file id 반환
    async fn create_file(&self, file: &File) -> Result<String, AchClientError>;

    async fn get_file(&self, file_id: &str) -> Result<File, AchClientError>;
}

/// reqwest 기반 구현
pub struct HttpAchClient {
    endpoint: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CreateFileResponse {
    id: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetFileResponse {
    file: Option<File>,
    #[serde(default)]
    err: Option<String>,
}

impl HttpAchClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, AchClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl AchClient for HttpAchClient {
    async fn create_file(&self, file: &File) -> Result<String, AchClientError> {
        let resp = self
            .http
            .post(format!("{}/files/create", self.endpoint))
            .json(file)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AchClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: CreateFileResponse = resp.json().await?;
        match body.error {
            Some(err) if !err.is_empty() => Err(AchClientError::Rejected(err)),
            _ => {
                tracing::debug!(file_id = %body.id, "ACH file created");
                Ok(body.id)
            }
        }
    }

    async fn get_file(&self, file_id: &str) -> Result<File, AchClientError> {
        let resp = self
            .http
            .get(format!("{}/files/{}", self.endpoint, file_id))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AchClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GetFileResponse = resp.json().await?;
        match (body.file, body.err) {
            (_, Some(err)) if !err.is_empty() => Err(AchClientError::Rejected(err)),
            (Some(file), _) => Ok(file),
            (None, _) => Err(AchClientError::Rejected(format!("file {file_id} not found"))),
        }
    }
}

// 테스트용 Mock 구현:
