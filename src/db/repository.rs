//! Depository Repository
//!
//! Depository / MicroDeposit 테이블에 대한 유일한 접근 경로.
//! 서비스 레이어는 `Arc<dyn DepositoryRepository>` 만 들고 있고 SQL 은 여기에만 있다.
//!
//! - 계좌번호는 주입받은 `StringKeeper` 로 암호화한 뒤 저장
//! - 모든 조회는 `deleted_at IS NULL` 조건을 포함
//! - 상태 전이는 트랜잭션 안에서 read → 검증 → compare-and-set

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::models::{DepositoryRow, MicroDepositRow};
use super::{Depository, DepositoryStatus, MicroDeposit, StoreError};
use crate::services::StringKeeper;
use crate::types::{Amount, DepositoryId, UserId};

const DEPOSITORY_COLUMNS: &str = "depository_id, user_id, bank_name, holder, holder_type, account_type, \
     routing_number, encrypted_account_number, hashed_account_number, status, created_at, updated_at";

const MICRO_DEPOSIT_COLUMNS: &str = "id, depository_id, user_id, amount, file_id, transaction_id, \
     return_code, merged_filename, confirmed_at, created_at";

/// 마이크로 디파짓 추측 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// 금액 일치 → Verified, 남은 입금 건에 confirmed_at 기록
    Confirmed,
    /// 금액 불일치 → Rejected
    Failed,
}

impl VerificationOutcome {
    fn status(&self) -> DepositoryStatus {
        match self {
            VerificationOutcome::Confirmed => DepositoryStatus::Verified,
            VerificationOutcome::Failed => DepositoryStatus::Rejected,
        }
    }
}

#[async_trait]
pub trait DepositoryRepository: Send + Sync {
    // ============ Depository ============

    async fn get_depository(&self, id: &DepositoryId) -> Result<Option<Depository>, StoreError>;

    async fn get_user_depository(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
    ) -> Result<Option<Depository>, StoreError>;

    async fn upsert_user_depository(&self, user_id: &UserId, dep: &Depository) -> Result<(), StoreError>;

    /// soft delete (해당 계좌의 micro_deposits 포함)
    async fn delete_user_depository(&self, id: &DepositoryId, user_id: &UserId) -> Result<(), StoreError>;

    /// 인바운드 entry 의 routing + 평문 계좌번호로 조회
    async fn lookup_depository(
        &self,
        routing_number: &str,
        account_number: &str,
    ) -> Result<Option<Depository>, StoreError>;

    /// routing / 계좌번호 교체. 값이 이미 같으면 쓰지 않고 `false`
    async fn update_account_details(
        &self,
        id: &DepositoryId,
        routing_number: Option<&str>,
        account_number: Option<&str>,
    ) -> Result<bool, StoreError>;

    fn decrypt_account_number(&self, dep: &Depository) -> Result<String, StoreError>;

    /// 상태 전이 (같은 상태면 no-op)
    async fn transition_status(&self, id: &DepositoryId, to: DepositoryStatus) -> Result<(), StoreError>;

    // ============ MicroDeposit ============

    async fn initiate_micro_deposits(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
        deposits: &[MicroDeposit],
    ) -> Result<(), StoreError>;

    async fn get_micro_deposits_for_user(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
    ) -> Result<Vec<MicroDeposit>, StoreError>;

    /// 상태 전이 + confirmed_at 기록을 하나의 트랜잭션으로
    async fn finish_verification(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
        outcome: VerificationOutcome,
    ) -> Result<(), StoreError>;

    async fn mark_micro_deposit_as_merged(&self, filename: &str, md: &MicroDeposit) -> Result<(), StoreError>;

    async fn set_return_code(&self, id: &DepositoryId, amount: &Amount, code: &str) -> Result<(), StoreError>;

    async fn lookup_micro_deposit_from_return(
        &self,
        id: &DepositoryId,
        amount: &Amount,
    ) -> Result<Option<MicroDeposit>, StoreError>;

    /// `merged_filename` 이 비어있고 row id 가 `after_id` 보다 큰 건, id 순
    async fn mergeable_micro_deposits(&self, after_id: i64, limit: usize) -> Result<Vec<MicroDeposit>, StoreError>;
}

/// SQLite 구현
pub struct SqlDepositoryRepo {
    pool: SqlitePool,
    keeper: Arc<dyn StringKeeper>,
}

impl SqlDepositoryRepo {
    pub fn new(pool: SqlitePool, keeper: Arc<dyn StringKeeper>) -> Self {
        Self { pool, keeper }
    }

    pub fn keeper(&self) -> &dyn StringKeeper {
        self.keeper.as_ref()
    }
}

#[async_trait]
impl DepositoryRepository for SqlDepositoryRepo {
    async fn get_depository(&self, id: &DepositoryId) -> Result<Option<Depository>, StoreError> {
        let sql = format!(
            "SELECT {DEPOSITORY_COLUMNS} FROM depositories WHERE depository_id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, DepositoryRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Depository::try_from).transpose()
    }

    async fn get_user_depository(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
    ) -> Result<Option<Depository>, StoreError> {
        let sql = format!(
            "SELECT {DEPOSITORY_COLUMNS} FROM depositories \
             WHERE depository_id = $1 AND user_id = $2 AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, DepositoryRow>(&sql)
            .bind(id.as_str())
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Depository::try_from).transpose()
    }

    async fn upsert_user_depository(&self, user_id: &UserId, dep: &Depository) -> Result<(), StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO depositories (
                depository_id, user_id, bank_name, holder, holder_type, account_type,
                routing_number, encrypted_account_number, hashed_account_number, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (depository_id)
            DO UPDATE SET
                bank_name = excluded.bank_name,
                holder = excluded.holder,
                holder_type = excluded.holder_type,
                account_type = excluded.account_type,
                routing_number = excluded.routing_number,
                encrypted_account_number = excluded.encrypted_account_number,
                hashed_account_number = excluded.hashed_account_number,
                status = excluded.status,
                updated_at = excluded.updated_at
            WHERE depositories.user_id = excluded.user_id
              AND depositories.deleted_at IS NULL
            "#,
        )
        .bind(dep.id.as_str())
        .bind(user_id.as_str())
        .bind(&dep.bank_name)
        .bind(&dep.holder)
        .bind(dep.holder_type.as_str())
        .bind(dep.account_type.as_str())
        .bind(dep.routing_number.trim())
        .bind(&dep.encrypted_account_number)
        .bind(&dep.hashed_account_number)
        .bind(dep.status.as_str())
        .bind(dep.created_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotOwner {
                id: dep.id.clone(),
                user_id: user_id.clone(),
            });
        }
        Ok(())
    }

    async fn delete_user_depository(&self, id: &DepositoryId, user_id: &UserId) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE depositories SET deleted_at = $1 \
             WHERE depository_id = $2 AND user_id = $3 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id.as_str())
        .bind(user_id.as_str())
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::DepositoryNotFound(id.clone()));
        }

        sqlx::query(
            "UPDATE micro_deposits SET deleted_at = $1 \
             WHERE depository_id = $2 AND user_id = $3 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id.as_str())
        .bind(user_id.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn lookup_depository(
        &self,
        routing_number: &str,
        account_number: &str,
    ) -> Result<Option<Depository>, StoreError> {
        let hashed = self.keeper.hash(account_number);
        let sql = format!(
            "SELECT {DEPOSITORY_COLUMNS} FROM depositories \
             WHERE routing_number = $1 AND hashed_account_number = $2 AND deleted_at IS NULL \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, DepositoryRow>(&sql)
            .bind(routing_number.trim())
            .bind(hashed)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Depository::try_from).transpose()
    }

    async fn update_account_details(
        &self,
        id: &DepositoryId,
        routing_number: Option<&str>,
        account_number: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {DEPOSITORY_COLUMNS} FROM depositories WHERE depository_id = $1 AND deleted_at IS NULL"
        );
        let mut dep: Depository = sqlx::query_as::<_, DepositoryRow>(&sql)
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::DepositoryNotFound(id.clone()))?
            .try_into()?;

        let mut changed = false;
        if let Some(routing) = routing_number.map(str::trim) {
            if dep.routing_number != routing {
                dep.routing_number = routing.to_string();
                changed = true;
            }
        }
        if let Some(account) = account_number.map(str::trim) {
            if dep.hashed_account_number != self.keeper.hash(account) {
                dep.replace_account_number(self.keeper.as_ref(), account)?;
                changed = true;
            }
        }
        if !changed {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE depositories \
             SET routing_number = $1, encrypted_account_number = $2, hashed_account_number = $3, updated_at = $4 \
             WHERE depository_id = $5 AND deleted_at IS NULL",
        )
        .bind(&dep.routing_number)
        .bind(&dep.encrypted_account_number)
        .bind(&dep.hashed_account_number)
        .bind(Utc::now())
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    fn decrypt_account_number(&self, dep: &Depository) -> Result<String, StoreError> {
        Ok(dep.decrypt_account_number(self.keeper.as_ref())?)
    }

    async fn transition_status(&self, id: &DepositoryId, to: DepositoryStatus) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let from = read_status(&mut tx, id, None).await?;
        if from == to {
            return Ok(());
        }
        compare_and_set_status(&mut tx, id, from, to).await?;

        tx.commit().await?;
        tracing::info!(depository_id = %id, %from, %to, "depository status changed");
        Ok(())
    }

    async fn initiate_micro_deposits(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
        deposits: &[MicroDeposit],
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for md in deposits {
            sqlx::query(
                "INSERT INTO micro_deposits (depository_id, user_id, amount, file_id, transaction_id, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(id.as_str())
            .bind(user_id.as_str())
            .bind(md.amount.to_string())
            .bind(&md.file_id)
            .bind(&md.transaction_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_micro_deposits_for_user(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
    ) -> Result<Vec<MicroDeposit>, StoreError> {
        let sql = format!(
            "SELECT {MICRO_DEPOSIT_COLUMNS} FROM micro_deposits \
             WHERE depository_id = $1 AND user_id = $2 AND deleted_at IS NULL ORDER BY id"
        );
        sqlx::query_as::<_, MicroDepositRow>(&sql)
            .bind(id.as_str())
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(MicroDeposit::try_from)
            .collect()
    }

    async fn finish_verification(
        &self,
        id: &DepositoryId,
        user_id: &UserId,
        outcome: VerificationOutcome,
    ) -> Result<(), StoreError> {
        let to = outcome.status();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let from = read_status(&mut tx, id, Some(user_id)).await?;
        compare_and_set_status(&mut tx, id, from, to).await?;

        if outcome == VerificationOutcome::Confirmed {
            sqlx::query(
                "UPDATE micro_deposits SET confirmed_at = $1 \
                 WHERE depository_id = $2 AND user_id = $3 AND deleted_at IS NULL \
                   AND return_code = '' AND confirmed_at IS NULL",
            )
            .bind(now)
            .bind(id.as_str())
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(depository_id = %id, user_id = %user_id, %from, %to, "micro deposit verification finished");
        Ok(())
    }

    async fn mark_micro_deposit_as_merged(&self, filename: &str, md: &MicroDeposit) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE micro_deposits SET merged_filename = $1 \
             WHERE depository_id = $2 AND amount = $3 AND file_id = $4 AND deleted_at IS NULL",
        )
        .bind(filename)
        .bind(md.depository_id.as_str())
        .bind(md.amount.to_string())
        .bind(&md.file_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MicroDepositNotFound {
                depository_id: md.depository_id.clone(),
                amount: md.amount.to_string(),
            });
        }
        Ok(())
    }

    async fn set_return_code(&self, id: &DepositoryId, amount: &Amount, code: &str) -> Result<(), StoreError> {
        let code = code.trim();
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {MICRO_DEPOSIT_COLUMNS} FROM micro_deposits \
             WHERE depository_id = $1 AND amount = $2 AND deleted_at IS NULL ORDER BY id DESC"
        );
        let rows: Vec<MicroDeposit> = sqlx::query_as::<_, MicroDepositRow>(&sql)
            .bind(id.as_str())
            .bind(amount.to_string())
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(MicroDeposit::try_from)
            .collect::<Result<_, _>>()?;

        if rows.is_empty() {
            return Err(StoreError::MicroDepositNotFound {
                depository_id: id.clone(),
                amount: amount.to_string(),
            });
        }
        // return code 가 비어 있는 가장 최근 row 가 대상
        // 빈 row 가 없을 때: 최근 row 와 같은 코드면 재수신 (no-op), 다르면 거부
        let Some(target) = rows.iter().find(|md| md.return_code.is_empty()) else {
            if rows[0].return_code == code {
                return Ok(());
            }
            return Err(StoreError::ReturnCodeAlreadySet {
                depository_id: id.clone(),
                amount: amount.to_string(),
                existing: rows[0].return_code.clone(),
            });
        };

        sqlx::query("UPDATE micro_deposits SET return_code = $1 WHERE id = $2 AND return_code = ''")
            .bind(code)
            .bind(target.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn lookup_micro_deposit_from_return(
        &self,
        id: &DepositoryId,
        amount: &Amount,
    ) -> Result<Option<MicroDeposit>, StoreError> {
        let sql = format!(
            "SELECT {MICRO_DEPOSIT_COLUMNS} FROM micro_deposits \
             WHERE depository_id = $1 AND amount = $2 AND deleted_at IS NULL ORDER BY id DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, MicroDepositRow>(&sql)
            .bind(id.as_str())
            .bind(amount.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(MicroDeposit::try_from).transpose()
    }

    async fn mergeable_micro_deposits(&self, after_id: i64, limit: usize) -> Result<Vec<MicroDeposit>, StoreError> {
        let sql = format!(
            "SELECT {MICRO_DEPOSIT_COLUMNS} FROM micro_deposits \
             WHERE merged_filename = '' AND deleted_at IS NULL AND id > $1 \
             ORDER BY id ASC LIMIT $2"
        );
        sqlx::query_as::<_, MicroDepositRow>(&sql)
            .bind(after_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(MicroDeposit::try_from)
            .collect()
    }
}

// ============ Helpers ============

async fn read_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: &DepositoryId,
    user_id: Option<&UserId>,
) -> Result<DepositoryStatus, StoreError> {
    let row: Option<(String, String)> = sqlx::query_as(
        "SELECT status, user_id FROM depositories WHERE depository_id = $1 AND deleted_at IS NULL",
    )
    .bind(id.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some((status, owner)) if user_id.map_or(true, |u| u.as_str() == owner) => status.parse(),
        _ => Err(StoreError::DepositoryNotFound(id.clone())),
    }
}

async fn compare_and_set_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: &DepositoryId,
    from: DepositoryStatus,
    to: DepositoryStatus,
) -> Result<(), StoreError> {
    let invalid = || StoreError::InvalidStatusTransition {
        id: id.clone(),
        from,
        to,
    };
    if !from.can_transition_to(to) {
        return Err(invalid());
    }

    let result = sqlx::query(
        "UPDATE depositories SET status = $1, updated_at = $2 \
         WHERE depository_id = $3 AND status = $4 AND deleted_at IS NULL",
    )
    .bind(to.as_str())
    .bind(Utc::now())
    .bind(id.as_str())
    .bind(from.as_str())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{live_micro_deposits, Database};
    use crate::services::Sha3Keeper;

    async fn repo() -> SqlDepositoryRepo {
        let db = Database::in_memory().await.unwrap();
        SqlDepositoryRepo::new(db.pool().clone(), Arc::new(Sha3Keeper::new([9u8; 32])))
    }

    fn usd(number: &str) -> Amount {
        Amount::new("USD", number).unwrap()
    }

    async fn write_depository(repo: &SqlDepositoryRepo, status: DepositoryStatus) -> Depository {
        let user_id = UserId::random();
        let mut dep = Depository::new(DepositoryId::random(), user_id.clone());
        dep.bank_name = "bank name".into();
        dep.holder = "holder".into();
        dep.routing_number = "121042882".into();
        dep.status = status;
        dep.replace_account_number(repo.keeper(), "151").unwrap();
        repo.upsert_user_depository(&user_id, &dep).await.unwrap();
        dep
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let repo = repo().await;
        let dep = write_depository(&repo, DepositoryStatus::Unverified).await;

        let found = repo.get_user_depository(&dep.id, &dep.user_id).await.unwrap().unwrap();
        assert_eq!(found.bank_name, "bank name");
        assert_eq!(found.status, DepositoryStatus::Unverified);
        assert_eq!(repo.decrypt_account_number(&found).unwrap(), "151");

        // 다른 사용자로는 조회 / 덮어쓰기 불가
        let other = UserId::random();
        assert!(repo.get_user_depository(&dep.id, &other).await.unwrap().is_none());
        assert!(matches!(
            repo.upsert_user_depository(&other, &dep).await,
            Err(StoreError::NotOwner { .. })
        ));
    }

    #[tokio::test]
    async fn test_lookup_depository_by_account() {
        let repo = repo().await;
        let dep = write_depository(&repo, DepositoryStatus::Verified).await;

        let found = repo.lookup_depository("121042882", "151").await.unwrap().unwrap();
        assert_eq!(found.id, dep.id);
        assert!(repo.lookup_depository("121042882", "152").await.unwrap().is_none());
        assert!(repo.lookup_depository("987654320", "151").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_depository_hides_rows() {
        let repo = repo().await;
        let dep = write_depository(&repo, DepositoryStatus::Unverified).await;
        let md = MicroDeposit::new(dep.id.clone(), dep.user_id.clone(), usd("0.11"), "fileID");
        repo.initiate_micro_deposits(&dep.id, &dep.user_id, &[md]).await.unwrap();

        repo.delete_user_depository(&dep.id, &dep.user_id).await.unwrap();
        assert!(repo.get_depository(&dep.id).await.unwrap().is_none());
        assert!(repo.get_micro_deposits_for_user(&dep.id, &dep.user_id).await.unwrap().is_empty());
        assert!(repo.mergeable_micro_deposits(0, 10).await.unwrap().is_empty());
        assert!(matches!(
            repo.delete_user_depository(&dep.id, &dep.user_id).await,
            Err(StoreError::DepositoryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_transition_status() {
        let repo = repo().await;
        let dep = write_depository(&repo, DepositoryStatus::Unverified).await;

        repo.transition_status(&dep.id, DepositoryStatus::Verified).await.unwrap();
        // 같은 상태 → no-op
        repo.transition_status(&dep.id, DepositoryStatus::Verified).await.unwrap();
        repo.transition_status(&dep.id, DepositoryStatus::Rejected).await.unwrap();

        let err = repo.transition_status(&dep.id, DepositoryStatus::Verified).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidStatusTransition { .. }));

        let dep = repo.get_depository(&dep.id).await.unwrap().unwrap();
        assert_eq!(dep.status, DepositoryStatus::Rejected);
    }

    #[tokio::test]
    async fn test_update_account_details() {
        let repo = repo().await;
        let dep = write_depository(&repo, DepositoryStatus::Verified).await;

        assert!(repo.update_account_details(&dep.id, None, Some("1918171614")).await.unwrap());
        // 같은 값 재적용 → 쓰기 없음
        assert!(!repo.update_account_details(&dep.id, None, Some("1918171614")).await.unwrap());
        assert!(!repo.update_account_details(&dep.id, Some("121042882"), None).await.unwrap());
        assert!(repo.update_account_details(&dep.id, Some("987654320"), None).await.unwrap());

        let dep = repo.get_depository(&dep.id).await.unwrap().unwrap();
        assert_eq!(dep.routing_number, "987654320");
        assert_eq!(repo.decrypt_account_number(&dep).unwrap(), "1918171614");
        assert_eq!(dep.status, DepositoryStatus::Verified);
    }

    #[tokio::test]
    async fn test_insert_micro_deposit_verify() {
        let repo = repo().await;
        let (id, user_id) = (DepositoryId::random(), UserId::random());
        let file_id = format!("{}-micro-deposit-verify", uuid::Uuid::new_v4());
        let mc = MicroDeposit::new(id.clone(), user_id.clone(), usd("0.11"), &file_id);

        repo.initiate_micro_deposits(&id, &user_id, &[mc]).await.unwrap();

        let deposits = repo.get_micro_deposits_for_user(&id, &user_id).await.unwrap();
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].file_id, file_id);
        assert_eq!(deposits[0].amount.to_string(), "USD 0.11");
        assert!(deposits[0].transaction_id.is_empty());
    }

    #[tokio::test]
    async fn test_finish_verification() {
        let repo = repo().await;
        let dep = write_depository(&repo, DepositoryStatus::Unverified).await;
        let deposits = vec![
            MicroDeposit::new(dep.id.clone(), dep.user_id.clone(), usd("0.10"), "f1"),
            MicroDeposit::new(dep.id.clone(), dep.user_id.clone(), usd("0.04"), "f1"),
        ];
        repo.initiate_micro_deposits(&dep.id, &dep.user_id, &deposits).await.unwrap();

        repo.finish_verification(&dep.id, &dep.user_id, VerificationOutcome::Confirmed)
            .await
            .unwrap();

        let stored = repo.get_micro_deposits_for_user(&dep.id, &dep.user_id).await.unwrap();
        assert!(stored.iter().all(|m| m.confirmed_at.is_some()));
        assert!(live_micro_deposits(stored).is_empty());

        // 이미 Verified → 두 번째 확인은 전이 불가
        let err = repo
            .finish_verification(&dep.id, &dep.user_id, VerificationOutcome::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidStatusTransition { .. }));
    }

    #[tokio::test]
    async fn test_mark_micro_deposit_as_merged() {
        let repo = repo().await;
        let (id, user_id) = (DepositoryId::new("id"), UserId::new("userID"));
        let mc = MicroDeposit::new(id.clone(), user_id.clone(), usd("0.11"), "fileID");
        repo.initiate_micro_deposits(&id, &user_id, &[mc.clone()]).await.unwrap();

        repo.mark_micro_deposit_as_merged("filename", &mc).await.unwrap();

        let stored = repo.get_micro_deposits_for_user(&id, &user_id).await.unwrap();
        assert_eq!(stored[0].merged_filename, "filename");

        let missing = MicroDeposit::new(id, user_id, usd("0.12"), "fileID");
        assert!(matches!(
            repo.mark_micro_deposit_as_merged("filename", &missing).await,
            Err(StoreError::MicroDepositNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_lookup_micro_deposit_from_return() {
        let repo = repo().await;
        let (amt1, amt2) = (usd("0.11"), usd("0.12"));
        let user_id = UserId::random();
        let (dep1, dep2) = (DepositoryId::random(), DepositoryId::random());

        for (dep, amt) in [(&dep1, &amt1), (&dep1, &amt2), (&dep2, &amt1), (&dep2, &amt2)] {
            assert!(repo.lookup_micro_deposit_from_return(dep, amt).await.unwrap().is_none());
        }

        let mut md1 = MicroDeposit::new(dep1.clone(), user_id.clone(), amt1.clone(), "fileID");
        md1.transaction_id = "transactionID".into();
        let mut md2 = MicroDeposit::new(dep1.clone(), user_id.clone(), amt2.clone(), "fileID2");
        md2.transaction_id = "transactionID2".into();
        repo.initiate_micro_deposits(&dep1, &user_id, &[md1, md2]).await.unwrap();

        let found = repo.lookup_micro_deposit_from_return(&dep1, &amt1).await.unwrap().unwrap();
        assert_eq!(found.transaction_id, "transactionID");
        assert!(repo.lookup_micro_deposit_from_return(&dep1, &amt2).await.unwrap().is_some());
        assert!(repo.lookup_micro_deposit_from_return(&dep2, &amt1).await.unwrap().is_none());
        assert!(repo.lookup_micro_deposit_from_return(&dep2, &amt2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_return_code() {
        let repo = repo().await;
        let amt = usd("0.11");
        let (dep_id, user_id) = (DepositoryId::random(), UserId::random());

        assert!(matches!(
            repo.set_return_code(&dep_id, &amt, "R14").await,
            Err(StoreError::MicroDepositNotFound { .. })
        ));

        let md = MicroDeposit::new(dep_id.clone(), user_id.clone(), amt.clone(), "fileID");
        repo.initiate_micro_deposits(&dep_id, &user_id, &[md]).await.unwrap();
        repo.set_return_code(&dep_id, &amt, "R14").await.unwrap();

        let md = repo.lookup_micro_deposit_from_return(&dep_id, &amt).await.unwrap().unwrap();
        assert_eq!(md.return_code, "R14");
        assert!(md.is_terminal());

        // 같은 코드 재수신은 허용, 다른 코드는 거부
        repo.set_return_code(&dep_id, &amt, "R14").await.unwrap();
        assert!(matches!(
            repo.set_return_code(&dep_id, &amt, "R01").await,
            Err(StoreError::ReturnCodeAlreadySet { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_return_code_second_attempt_same_amount() {
        let repo = repo().await;
        let dep = write_depository(&repo, DepositoryStatus::Unverified).await;

        let first = vec![
            MicroDeposit::new(dep.id.clone(), dep.user_id.clone(), usd("0.10"), "f1"),
            MicroDeposit::new(dep.id.clone(), dep.user_id.clone(), usd("0.20"), "f1"),
        ];
        repo.initiate_micro_deposits(&dep.id, &dep.user_id, &first).await.unwrap();
        repo.set_return_code(&dep.id, &usd("0.10"), "R01").await.unwrap();

        // 두 번째 시도가 같은 금액을 다시 뽑은 경우
        let second = vec![
            MicroDeposit::new(dep.id.clone(), dep.user_id.clone(), usd("0.10"), "f2"),
            MicroDeposit::new(dep.id.clone(), dep.user_id.clone(), usd("0.30"), "f2"),
        ];
        repo.initiate_micro_deposits(&dep.id, &dep.user_id, &second).await.unwrap();
        let live = live_micro_deposits(repo.get_micro_deposits_for_user(&dep.id, &dep.user_id).await.unwrap());
        assert_eq!(live.len(), 2);

        repo.set_return_code(&dep.id, &usd("0.10"), "R01").await.unwrap();

        let stored = repo.get_micro_deposits_for_user(&dep.id, &dep.user_id).await.unwrap();
        let returned: Vec<&str> = stored
            .iter()
            .filter(|m| m.amount == usd("0.10"))
            .map(|m| m.return_code.as_str())
            .collect();
        assert_eq!(returned, vec!["R01", "R01"]);
        assert!(live_micro_deposits(stored).is_empty());

        // 재수신은 no-op
        repo.set_return_code(&dep.id, &usd("0.10"), "R01").await.unwrap();
    }
}
