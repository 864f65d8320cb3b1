//! Database Models
//!
//! Depository (외부 은행 계좌) 와 MicroDeposit (검증용 소액 입금) 레코드.
//! 계좌번호는 암호문 + keyed hash 만 저장한다.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::StoreError;
use crate::services::{KeeperError, StringKeeper};
use crate::types::{Amount, DepositoryId, UserId};

// ============ Enums ============

/// Depository 검증 상태
///
/// ```text
/// Unverified ──(마이크로 디파짓 확인)──▶ Verified
///     │                                   │
///     └──(추측 실패 / 교정 불가 NOC)──▶ Rejected ◀──(계좌 폐쇄 NOC / Return)
/// ```
///
/// Rejected 에서 나가는 전이는 없다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositoryStatus {
    Unverified,
    Verified,
    Rejected,
}

impl DepositoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositoryStatus::Unverified => "unverified",
            DepositoryStatus::Verified => "verified",
            DepositoryStatus::Rejected => "rejected",
        }
    }

    pub fn can_transition_to(&self, to: DepositoryStatus) -> bool {
        use DepositoryStatus::*;
        matches!(
            (self, to),
            (Unverified, Verified) | (Unverified, Rejected) | (Verified, Rejected)
        )
    }
}

impl fmt::Display for DepositoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepositoryStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unverified" => Ok(DepositoryStatus::Unverified),
            "verified" => Ok(DepositoryStatus::Verified),
            "rejected" => Ok(DepositoryStatus::Rejected),
            other => Err(StoreError::Corrupt(format!("unknown depository status {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HolderType {
    Individual,
    Business,
}

impl HolderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HolderType::Individual => "individual",
            HolderType::Business => "business",
        }
    }
}

impl FromStr for HolderType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "individual" => Ok(HolderType::Individual),
            "business" => Ok(HolderType::Business),
            other => Err(StoreError::Corrupt(format!("unknown holder type {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
        }
    }

    /// 이 계좌 종류로 입금할 때 쓰는 transaction code
    pub fn credit_code(&self) -> u8 {
        match self {
            AccountType::Checking => crate::ach::CHECKING_CREDIT,
            AccountType::Savings => crate::ach::SAVINGS_CREDIT,
        }
    }
}

impl FromStr for AccountType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "checking" => Ok(AccountType::Checking),
            "savings" => Ok(AccountType::Savings),
            other => Err(StoreError::Corrupt(format!("unknown account type {other:?}"))),
        }
    }
}

// ============ Depository ============

/// 사용자 외부 은행 계좌
#[derive(Debug, Clone, Serialize)]
pub struct Depository {
    pub id: DepositoryId,
    pub user_id: UserId,
    pub bank_name: String,
    pub holder: String,
    pub holder_type: HolderType,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub routing_number: String,
    #[serde(skip)]
    pub encrypted_account_number: String,
    #[serde(skip)]
    pub hashed_account_number: String,
    pub status: DepositoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Depository {
    pub fn new(id: DepositoryId, user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            bank_name: String::new(),
            holder: String::new(),
            holder_type: HolderType::Individual,
            account_type: AccountType::Checking,
            routing_number: String::new(),
            encrypted_account_number: String::new(),
            hashed_account_number: String::new(),
            status: DepositoryStatus::Unverified,
            created_at: now,
            updated_at: now,
        }
    }

    /// 평문 계좌번호를 암호화해서 교체 (hash 도 같이 갱신)
    pub fn replace_account_number(
        &mut self,
        keeper: &dyn StringKeeper,
        account_number: &str,
    ) -> Result<(), KeeperError> {
        let account_number = account_number.trim();
        self.encrypted_account_number = keeper.encrypt(account_number)?;
        self.hashed_account_number = keeper.hash(account_number);
        Ok(())
    }

    pub fn decrypt_account_number(&self, keeper: &dyn StringKeeper) -> Result<String, KeeperError> {
        keeper.decrypt(&self.encrypted_account_number)
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct DepositoryRow {
    pub depository_id: String,
    pub user_id: String,
    pub bank_name: String,
    pub holder: String,
    pub holder_type: String,
    pub account_type: String,
    pub routing_number: String,
    pub encrypted_account_number: String,
    pub hashed_account_number: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DepositoryRow> for Depository {
    type Error = StoreError;

    fn try_from(row: DepositoryRow) -> Result<Self, Self::Error> {
        Ok(Depository {
            id: DepositoryId::new(row.depository_id),
            user_id: UserId::new(row.user_id),
            bank_name: row.bank_name,
            holder: row.holder,
            holder_type: row.holder_type.parse()?,
            account_type: row.account_type.parse()?,
            routing_number: row.routing_number,
            encrypted_account_number: row.encrypted_account_number,
            hashed_account_number: row.hashed_account_number,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============ MicroDeposit ============

/// 검증용 소액 입금 한 건
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MicroDeposit {
    /// row id (cursor watermark). 아직 저장 전이면 0
    #[serde(skip)]
    pub id: i64,
    pub depository_id: DepositoryId,
    pub user_id: UserId,
    pub amount: Amount,
    pub file_id: String,
    pub transaction_id: String,
    pub return_code: String,
    pub merged_filename: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MicroDeposit {
    pub fn new(depository_id: DepositoryId, user_id: UserId, amount: Amount, file_id: &str) -> Self {
        Self {
            id: 0,
            depository_id,
            user_id,
            amount,
            file_id: file_id.to_string(),
            transaction_id: String::new(),
            return_code: String::new(),
            merged_filename: String::new(),
            confirmed_at: None,
            created_at: Utc::now(),
        }
    }

    /// return code 가 붙었거나 이미 확인된 건
    pub fn is_terminal(&self) -> bool {
        !self.return_code.is_empty() || self.confirmed_at.is_some()
    }

    pub fn is_mergeable(&self) -> bool {
        self.merged_filename.is_empty()
    }
}

/// 같은 file_id 를 공유하는 시도(attempt) 중 terminal 건이 하나도 없는 것만 남긴다
///
/// merged 건도 확인 대상에 남는다 (merged_filename 은 보지 않음)
pub fn live_micro_deposits(deposits: Vec<MicroDeposit>) -> Vec<MicroDeposit> {
    let dead: HashSet<String> = deposits
        .iter()
        .filter(|m| m.is_terminal())
        .map(|m| m.file_id.clone())
        .collect();
    deposits
        .into_iter()
        .filter(|m| !dead.contains(&m.file_id))
        .collect()
}

#[derive(Debug, FromRow)]
pub(crate) struct MicroDepositRow {
    pub id: i64,
    pub depository_id: String,
    pub user_id: String,
    pub amount: String,
    pub file_id: String,
    pub transaction_id: String,
    pub return_code: String,
    pub merged_filename: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MicroDepositRow> for MicroDeposit {
    type Error = StoreError;

    fn try_from(row: MicroDepositRow) -> Result<Self, Self::Error> {
        let amount = row
            .amount
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("micro_deposits.amount {:?}: {e}", row.amount)))?;
        Ok(MicroDeposit {
            id: row.id,
            depository_id: DepositoryId::new(row.depository_id),
            user_id: UserId::new(row.user_id),
            amount,
            file_id: row.file_id,
            transaction_id: row.transaction_id,
            return_code: row.return_code,
            merged_filename: row.merged_filename,
            confirmed_at: row.confirmed_at,
            created_at: row.created_at,
        })
    }
}
