//! Notification of Change (NOC) Processor
//!
//! # Interview Q&A
//!
//! Q: NOC 란?
//! A: RDFI 가 "이 entry 는 처리했지만 다음부터는 이 정보로 보내라" 고 알려주는 COR batch
//!    - Addenda98 에 change code (C01 ~ C14) 와 교정된 값 (corrected data) 이 들어있음
//!    - 돈은 이미 움직였으므로 우리 쪽 Depository 를 고치기만 하면 됨
//!
//! Q: 같은 NOC 파일이 두 번 들어오면?
//! A: 교정 값이 이미 저장된 값과 같으면 쓰기 자체를 하지 않음
//!    - C01/C02/C03: `update_account_details` 가 비교 후 `false` 반환
//!    - C05/C06/C07: Rejected → Rejected 는 no-op 전이
//!
//! Q: 왜 upsert 가 아니라 컬럼 단위 update 인가?
//! A: NOC 처리 도중 사용자가 확인(confirm) 을 끝낼 수 있음
//!    Depository 전체를 다시 쓰면 그 사이 바뀐 status 를 덮어쓰게 된다

use thiserror::Error;

use crate::ach::{parse_corrected_data, EntryDetail, File};
use crate::db::{Depository, DepositoryRepository, DepositoryStatus, StoreError};

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error("depository not found")]
    DepositoryNotFound,

    #[error("missing Addenda98 record")]
    MissingAddenda98,

    #[error("rejecting originalTrace={original_trace} (addenda changeCode={addenda_code}, dispatched={dispatched})")]
    ChangeCodeMismatch {
        original_trace: String,
        addenda_code: String,
        dispatched: String,
    },

    #[error("unimplemented change code {0}")]
    UnimplementedChangeCode(String),

    #[error("skipping receiver individual name change")]
    SkippingNameChange,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// change code 별 처리 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correction {
    AccountNumber,
    RoutingNumber,
    RoutingAndAccountNumber,
    IndividualName,
    Reject,
}

static CHANGE_CODE_HANDLERS: &[(&str, Correction)] = &[
    ("C01", Correction::AccountNumber),
    ("C02", Correction::RoutingNumber),
    ("C03", Correction::RoutingAndAccountNumber),
    ("C04", Correction::IndividualName),
    ("C05", Correction::Reject),
    ("C06", Correction::Reject),
    ("C07", Correction::Reject),
];

fn handler_for(code: &str) -> Option<Correction> {
    CHANGE_CODE_HANDLERS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, handler)| *handler)
}

/// 단일 NOC entry 를 Depository 에 반영
pub async fn apply_change_code(
    change_code: &str,
    entry: &EntryDetail,
    dep: Option<&Depository>,
    repo: &dyn DepositoryRepository,
) -> Result<(), CorrectionError> {
    let dep = dep.ok_or(CorrectionError::DepositoryNotFound)?;
    let addenda = entry
        .addenda98
        .as_ref()
        .filter(|a| !a.corrected_data.trim().is_empty())
        .ok_or(CorrectionError::MissingAddenda98)?;

    let code = change_code.trim();
    let addenda_code = addenda.change_code.trim();
    if !addenda_code.is_empty() && addenda_code != code {
        return Err(CorrectionError::ChangeCodeMismatch {
            original_trace: addenda.original_trace.clone(),
            addenda_code: addenda_code.to_string(),
            dispatched: code.to_string(),
        });
    }

    let handler = handler_for(code).ok_or_else(|| CorrectionError::UnimplementedChangeCode(code.to_string()))?;
    let data = parse_corrected_data(code, &addenda.corrected_data).ok_or(CorrectionError::MissingAddenda98)?;

    let changed = match handler {
        Correction::AccountNumber => {
            repo.update_account_details(&dep.id, None, Some(&data.account_number))
                .await?
        }
        Correction::RoutingNumber => {
            repo.update_account_details(&dep.id, Some(&data.routing_number), None)
                .await?
        }
        Correction::RoutingAndAccountNumber => {
            repo.update_account_details(&dep.id, Some(&data.routing_number), Some(&data.account_number))
                .await?
        }
        Correction::IndividualName => return Err(CorrectionError::SkippingNameChange),
        Correction::Reject => {
            let changed = dep.status != DepositoryStatus::Rejected;
            repo.transition_status(&dep.id, DepositoryStatus::Rejected).await?;
            changed
        }
    };

    tracing::info!(
        depository_id = %dep.id,
        change_code = code,
        original_trace = %addenda.original_trace,
        changed,
        "applied change code"
    );
    Ok(())
}

/// NOC 파일 처리. 반영된 entry 수 반환
///
/// entry 단위 실패 (Addenda98 없음, 알 수 없는 계좌, 처리하지 않는 코드) 는 로그만 남기고 건너뛴다.
/// store 에러만 파일 처리를 중단시킨다.
pub async fn handle_noc_file(
    file: &File,
    filename: &str,
    repo: &dyn DepositoryRepository,
) -> Result<usize, CorrectionError> {
    if file.notification_of_change.is_empty() {
        tracing::debug!(filename, "no NOC batches");
        return Ok(0);
    }

    let mut applied = 0;
    for batch in &file.notification_of_change {
        for entry in batch.entries() {
            let Some(addenda) = entry.addenda98.as_ref() else {
                tracing::debug!(filename, trace_number = %entry.trace_number, "NOC entry without Addenda98");
                continue;
            };

            let dep = repo
                .lookup_depository(&entry.routing_number(), entry.dfi_account_number.trim())
                .await?;
            if dep.is_none() {
                tracing::warn!(
                    filename,
                    original_trace = %addenda.original_trace,
                    "NOC for unknown depository"
                );
                continue;
            }

            match apply_change_code(&addenda.change_code, entry, dep.as_ref(), repo).await {
                Ok(()) => applied += 1,
                Err(CorrectionError::Store(err)) => return Err(err.into()),
                Err(err) => {
                    tracing::warn!(
                        filename,
                        change_code = %addenda.change_code,
                        error = %err,
                        "skipping NOC entry"
                    );
                }
            }
        }
    }

    tracing::info!(filename, applied, "processed NOC file");
    Ok(applied)
}
