//! Micro-Deposit Endpoints
//!
//! 사용자 식별은 앞단 gateway 가 넣어주는 `x-user-id` 헤더로 한다.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::{Depository, DepositoryRepository, MicroDeposit},
    error::ApiError,
    services::MergeSummary,
    types::{Amount, DepositoryId, UserId},
    AppState,
};

// ============ Request/Response Types ============

/// 확인 요청
///
/// ```json
/// { "amounts": ["USD 0.11", "USD 0.04"] }
/// ```
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub amounts: Vec<Amount>,
}

#[derive(Debug, Serialize)]
pub struct MicroDepositsResponse {
    pub depository_id: DepositoryId,
    pub micro_deposits: Vec<MicroDepositView>,
}

/// 사용자에게 돌려주는 마이크로 디파짓 (금액은 숨김)
#[derive(Debug, Serialize)]
pub struct MicroDepositView {
    pub file_id: String,
    pub created_at: String,
}

impl From<&MicroDeposit> for MicroDepositView {
    fn from(md: &MicroDeposit) -> Self {
        Self {
            file_id: md.file_id.clone(),
            created_at: md.created_at.to_rfc3339(),
        }
    }
}

// ============ Handlers ============

/// POST /depositories/:id/micro-deposits
///
/// 마이크로 디파짓 두 건 전송 시작. 성공 시 201
pub async fn initiate_micro_deposits(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<MicroDepositsResponse>), ApiError> {
    let user_id = user_id(&headers)?;
    let request_id = header(&headers, "x-request-id").unwrap_or_default();
    let id = DepositoryId::new(id);

    let dep = state
        .repo
        .get_user_depository(&id, &user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("depository {}", id)))?;

    let deposits = state
        .micro_deposits
        .initiate_verification(&dep, &user_id, &request_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MicroDepositsResponse {
            depository_id: id,
            micro_deposits: deposits.iter().map(MicroDepositView::from).collect(),
        }),
    ))
}

/// POST /depositories/:id/micro-deposits/confirm
pub async fn confirm_micro_deposits(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<Depository>, ApiError> {
    let user_id = user_id(&headers)?;
    let id = DepositoryId::new(id);

    state
        .micro_deposits
        .confirm_verification(&id, &user_id, &req.amounts)
        .await?;

    let dep = state
        .repo
        .get_user_depository(&id, &user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("depository {}", id)))?;
    Ok(Json(dep))
}

/// GET /admin/depositories/:id/micro-deposits
///
/// 운영자용. 금액 / return code / merge 상태까지 전부 노출
pub async fn list_micro_deposits(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MicroDeposit>>, ApiError> {
    let id = DepositoryId::new(id);
    let dep = state
        .repo
        .get_depository(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("depository {}", id)))?;

    let deposits = state.repo.get_micro_deposits_for_user(&id, &dep.user_id).await?;
    Ok(Json(deposits))
}

/// POST /admin/merge
///
/// 주기 실행을 기다리지 않고 merge cycle 한 번 실행
pub async fn run_merge_cycle(State(state): State<AppState>) -> Result<Json<MergeSummary>, ApiError> {
    let summary = state.merger.handle_merge_cycle(state.config.merge_page_size).await?;
    Ok(Json(summary))
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn user_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    header(headers, "x-user-id")
        .map(UserId::new)
        .ok_or_else(|| ApiError::BadRequest("missing x-user-id header".to_string()))
}
