//! Micro-Deposit Verification Service
//!
//! # Interview Q&A
//!
//! Q: 마이크로 디파짓 검증이란?
//! A: 사용자가 등록한 계좌가 실제로 존재하고 본인 소유인지 확인하는 방법
//!
//!    1. $0.01 ~ $0.50 사이 서로 다른 금액 두 건을 입금 (credit)
//!    2. 같은 파일에 두 금액의 합만큼 출금 (debit) → 순이동 0
//!    3. 사용자가 통장에 찍힌 두 금액을 입력
//!    4. 순서와 무관하게 두 금액이 모두 맞으면 Verified, 틀리면 Rejected
//!
//! Q: 추측(guess) 을 여러 번 허용하지 않는 이유는?
//! A: 가능한 조합이 50 × 49 개뿐이라 재시도를 허용하면 brute force 가 가능함
//!    - 개수가 틀린 요청은 아직 평가 전이므로 상태를 바꾸지 않음
//!    - 금액을 평가한 순간 그 시도는 끝 (성공 또는 Rejected)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::{rngs::OsRng, Rng};
use thiserror::Error;

use crate::ach::{
    debit_code_for, next_trace_number, AchError, Batch, BatchHeader, EntryDetail, File, FileHeader,
};
use crate::db::{
    live_micro_deposits, AccountType, Depository, DepositoryRepository, DepositoryStatus,
    MicroDeposit, StoreError, VerificationOutcome,
};
use crate::services::{AchClient, AchClientError};
use crate::types::{Amount, DepositoryId, UserId};

/// 마이크로 디파짓 금액 범위 (cents, 양 끝 포함)
const MIN_AMOUNT: i64 = 1;
const MAX_AMOUNT: i64 = 50;
const MAX_RESAMPLES: usize = 100;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("depository {id} is not eligible for micro deposits: {reason}")]
    DepositoryNotEligible { id: DepositoryId, reason: String },

    #[error("depository {0} not found")]
    DepositoryNotFound(DepositoryId),

    #[error("micro deposit submission failed: {0}")]
    SubmissionFailed(#[source] AchClientError),

    #[error("unable to generate micro deposit amounts: {0}")]
    AmountGenerationFailed(String),

    #[error("unable to confirm micro deposits, got 0 micro deposits")]
    NoMicroDeposits,

    #[error("incorrect amount of guesses, got {0}")]
    IncorrectGuessCount(usize),

    #[error("incorrect micro deposit guesses")]
    IncorrectGuesses,

    #[error(transparent)]
    Ach(#[from] AchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 마이크로 디파짓을 보내는 쪽 (ODFI) 계좌
#[derive(Debug, Clone)]
pub struct OdfiAccount {
    pub routing_number: String,
    pub account_number: String,
    pub account_type: AccountType,
    pub name: String,
}

pub struct MicroDepositService {
    repo: Arc<dyn DepositoryRepository>,
    ach_client: Arc<dyn AchClient>,
    odfi: OdfiAccount,
    ach_timeout: Duration,
}

impl MicroDepositService {
    pub fn new(
        repo: Arc<dyn DepositoryRepository>,
        ach_client: Arc<dyn AchClient>,
        odfi: OdfiAccount,
        ach_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            ach_client,
            odfi,
            ach_timeout,
        }
    }

    /// 마이크로 디파짓 두 건 생성 + ACH 파일 제출 + 저장
    ///
    /// ACH 제출이 실패하거나 timeout 이면 아무것도 저장하지 않는다.
    pub async fn initiate_verification(
        &self,
        dep: &Depository,
        user_id: &UserId,
        request_id: &str,
    ) -> Result<Vec<MicroDeposit>, VerificationError> {
        if dep.user_id != *user_id {
            return Err(VerificationError::DepositoryNotFound(dep.id.clone()));
        }
        if dep.status != DepositoryStatus::Unverified {
            return Err(VerificationError::DepositoryNotEligible {
                id: dep.id.clone(),
                reason: format!("status is {}", dep.status),
            });
        }

        let existing = self.repo.get_micro_deposits_for_user(&dep.id, user_id).await?;
        if !live_micro_deposits(existing).is_empty() {
            return Err(VerificationError::DepositoryNotEligible {
                id: dep.id.clone(),
                reason: "micro deposits already initiated".to_string(),
            });
        }

        let amounts = micro_deposit_amounts("USD")?;
        let account_number = self.repo.decrypt_account_number(dep)?;
        let file = self.build_file(dep, &account_number, &amounts, request_id)?;

        let file_id = match tokio::time::timeout(self.ach_timeout, self.ach_client.create_file(&file)).await {
            Ok(Ok(file_id)) => file_id,
            Ok(Err(err)) => {
                tracing::warn!(depository_id = %dep.id, request_id, error = %err, "micro deposit file rejected");
                return Err(VerificationError::SubmissionFailed(err));
            }
            Err(_) => {
                tracing::warn!(depository_id = %dep.id, request_id, "micro deposit file submission timed out");
                return Err(VerificationError::SubmissionFailed(AchClientError::Timeout(
                    self.ach_timeout,
                )));
            }
        };

        let deposits: Vec<MicroDeposit> = amounts
            .into_iter()
            .map(|amount| MicroDeposit::new(dep.id.clone(), user_id.clone(), amount, &file_id))
            .collect();
        self.repo
            .initiate_micro_deposits(&dep.id, user_id, &deposits)
            .await?;

        tracing::info!(
            depository_id = %dep.id,
            user_id = %user_id,
            request_id,
            file_id = %file_id,
            "micro deposits initiated"
        );
        Ok(deposits)
    }

    /// 사용자 추측 확인
    pub async fn confirm_verification(
        &self,
        depository_id: &DepositoryId,
        user_id: &UserId,
        guesses: &[Amount],
    ) -> Result<(), VerificationError> {
        let dep = self
            .repo
            .get_user_depository(depository_id, user_id)
            .await?
            .ok_or_else(|| VerificationError::DepositoryNotFound(depository_id.clone()))?;
        if dep.status != DepositoryStatus::Unverified {
            return Err(VerificationError::DepositoryNotEligible {
                id: dep.id,
                reason: format!("status is {}", dep.status),
            });
        }

        let deposits = live_micro_deposits(
            self.repo
                .get_micro_deposits_for_user(depository_id, user_id)
                .await?,
        );

        match confirm_guesses(&deposits, guesses) {
            Ok(()) => {
                self.repo
                    .finish_verification(depository_id, user_id, VerificationOutcome::Confirmed)
                    .await?;
                Ok(())
            }
            Err(VerificationError::IncorrectGuesses) => {
                self.repo
                    .finish_verification(depository_id, user_id, VerificationOutcome::Failed)
                    .await?;
                tracing::info!(depository_id = %depository_id, user_id = %user_id, "micro deposit guesses rejected");
                Err(VerificationError::IncorrectGuesses)
            }
            Err(err) => Err(err),
        }
    }

    /// credit 2건 + 합계 debit 1건으로 구성된 PPD 파일
    fn build_file(
        &self,
        dep: &Depository,
        account_number: &str,
        amounts: &[Amount],
        request_id: &str,
    ) -> Result<File, VerificationError> {
        let (first, rest) = amounts
            .split_first()
            .ok_or_else(|| VerificationError::AmountGenerationFailed("no amounts".to_string()))?;

        let now = Utc::now();
        let mut file = File::new(FileHeader {
            immediate_destination: dep.routing_number.clone(),
            immediate_origin: self.odfi.routing_number.clone(),
            immediate_destination_name: dep.bank_name.clone(),
            immediate_origin_name: self.odfi.name.clone(),
            file_creation_date: now.format("%y%m%d").to_string(),
            file_creation_time: now.format("%H%M").to_string(),
            file_id_modifier: "A".to_string(),
        });

        let mut bh = BatchHeader::new();
        bh.standard_entry_class_code = "PPD".to_string();
        bh.company_name = self.odfi.name.clone();
        bh.company_identification = self.odfi.routing_number.clone();
        bh.company_entry_description = "ACCTVERIFY".to_string();
        bh.effective_entry_date = (now + chrono::Duration::days(1)).format("%y%m%d").to_string();
        bh.odfi_identification = self.odfi.routing_number.chars().take(8).collect();

        let mut ed = EntryDetail::new();
        ed.transaction_code = dep.account_type.credit_code();
        ed.set_rdfi(&dep.routing_number)?;
        ed.dfi_account_number = account_number.to_string();
        ed.amount = first.int();
        ed.identification_number = request_id.chars().take(15).collect();
        ed.individual_name = dep.holder.chars().take(22).collect();
        ed.set_trace_number(&bh.odfi_identification, 1);

        let mut batch = Batch::new(bh)?;
        batch.add_entry(ed);
        file.add_batch(batch);

        let mut total = first.clone();
        for amount in rest {
            add_micro_deposit(&mut file, amount)?;
            total = total
                .plus(amount)
                .map_err(|e| VerificationError::AmountGenerationFailed(e.to_string()))?;
        }
        add_micro_deposit_withdraw(&mut file, &total)?;

        file.create()?;
        Ok(file)
    }
}

/// $0.01 ~ $0.50 사이 서로 다른 금액 두 개
pub fn micro_deposit_amounts(symbol: &str) -> Result<Vec<Amount>, VerificationError> {
    let draw = || -> Result<Amount, VerificationError> {
        Amount::from_minor(symbol, OsRng.gen_range(MIN_AMOUNT..=MAX_AMOUNT))
            .map_err(|e| VerificationError::AmountGenerationFailed(e.to_string()))
    };

    let first = draw()?;
    for _ in 0..MAX_RESAMPLES {
        let second = draw()?;
        if second != first {
            return Ok(vec![first, second]);
        }
    }
    Err(VerificationError::AmountGenerationFailed(
        "unable to draw distinct amounts".to_string(),
    ))
}

/// 저장된 금액과 추측을 multiset 으로 비교 (순서 무관)
pub fn confirm_guesses(deposits: &[MicroDeposit], guesses: &[Amount]) -> Result<(), VerificationError> {
    if deposits.is_empty() {
        return Err(VerificationError::NoMicroDeposits);
    }
    if deposits.len() != guesses.len() {
        return Err(VerificationError::IncorrectGuessCount(guesses.len()));
    }

    let mut remaining: HashMap<&Amount, usize> = HashMap::new();
    for md in deposits {
        *remaining.entry(&md.amount).or_default() += 1;
    }
    for guess in guesses {
        match remaining.get_mut(guess) {
            Some(n) if *n > 0 => *n -= 1,
            _ => return Err(VerificationError::IncorrectGuesses),
        }
    }
    Ok(())
}

/// 첫 batch 의 마지막 entry 를 복제해 `amount` 만큼의 credit 을 추가 (trace + 1)
pub fn add_micro_deposit(file: &mut File, amount: &Amount) -> Result<(), AchError> {
    let batch = file.batches.first_mut().ok_or(AchError::NoBatches)?;
    let last = batch
        .entries()
        .last()
        .ok_or_else(|| AchError::NoEntries(batch.id.clone()))?;

    let mut ed = last.clone();
    ed.id = uuid::Uuid::new_v4().simple().to_string();
    ed.amount = amount.int();
    ed.trace_number = next_trace_number(&last.trace_number)?;

    batch.add_entry(ed);
    Ok(())
}

/// 마지막 credit 과 짝이 되는 debit 추가
///
/// - 금액은 넘겨받은 `amount` 그대로
/// - transaction code = credit + 5 (22 → 27, 32 → 37)
/// - trace number = 직전 entry + 1
pub fn add_micro_deposit_withdraw(file: &mut File, amount: &Amount) -> Result<(), AchError> {
    let batch = file.batches.first_mut().ok_or(AchError::NoBatches)?;
    let last = batch
        .entries()
        .last()
        .ok_or_else(|| AchError::NoEntries(batch.id.clone()))?;

    let mut ed = last.clone();
    ed.id = uuid::Uuid::new_v4().simple().to_string();
    ed.transaction_code = debit_code_for(last.transaction_code)?;
    ed.amount = amount.int();
    ed.trace_number = next_trace_number(&last.trace_number)?;

    batch.add_entry(ed);
    Ok(())
}
