//! Return Handling (Addenda99)
//!
//! 반환된 마이크로 디파짓은 그 시도(attempt) 전체를 무효로 만든다.
//! 계좌 자체가 문제인 코드 (R02 계좌 해지, R03 계좌 없음 ...) 면 Depository 도 Rejected.

use thiserror::Error;

use crate::ach::{return_code, File};
use crate::db::{DepositoryRepository, DepositoryStatus, StoreError};
use crate::types::{Amount, DepositoryId};

#[derive(Debug, Error)]
pub enum ReturnError {
    #[error("unknown return code {0:?}")]
    UnknownReturnCode(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `(depository_id, amount)` 마이크로 디파짓에 return code 기록
pub async fn record_return_code(
    repo: &dyn DepositoryRepository,
    depository_id: &DepositoryId,
    amount: &Amount,
    code: &str,
) -> Result<(), ReturnError> {
    let rc = return_code::lookup(code).ok_or_else(|| ReturnError::UnknownReturnCode(code.to_string()))?;
    repo.set_return_code(depository_id, amount, rc.code).await?;

    tracing::info!(
        depository_id = %depository_id,
        amount = %amount,
        return_code = rc.code,
        reason = rc.reason,
        "micro deposit returned"
    );
    Ok(())
}

/// Return 파일 처리. 기록된 return code 수 반환
pub async fn handle_return_file(
    file: &File,
    filename: &str,
    repo: &dyn DepositoryRepository,
) -> Result<usize, ReturnError> {
    let mut recorded = 0;

    for batch in &file.return_entries {
        for entry in batch.entries() {
            let Some(addenda) = entry.addenda99.as_ref() else {
                continue;
            };
            let code = addenda.return_code.trim();
            if return_code::lookup(code).is_none() {
                tracing::warn!(filename, return_code = code, original_trace = %addenda.original_trace, "unknown return code");
                continue;
            }

            let Some(dep) = repo
                .lookup_depository(&entry.routing_number(), entry.dfi_account_number.trim())
                .await?
            else {
                tracing::warn!(filename, original_trace = %addenda.original_trace, "return for unknown depository");
                continue;
            };

            let amount = match Amount::from_minor("USD", entry.amount) {
                Ok(amount) => amount,
                Err(err) => {
                    tracing::warn!(filename, error = %err, "invalid return amount");
                    continue;
                }
            };

            if repo.lookup_micro_deposit_from_return(&dep.id, &amount).await?.is_some() {
                match record_return_code(repo, &dep.id, &amount, code).await {
                    Ok(()) => recorded += 1,
                    Err(ReturnError::Store(StoreError::ReturnCodeAlreadySet { existing, .. })) => {
                        tracing::warn!(depository_id = %dep.id, existing = %existing, return_code = code, "micro deposit already returned");
                    }
                    Err(err) => return Err(err),
                }
            }

            if return_code::rejects_depository(code) {
                repo.transition_status(&dep.id, DepositoryStatus::Rejected).await?;
            }
        }
    }

    tracing::info!(filename, recorded, "processed return file");
    Ok(recorded)
}
