//! Micro-Deposit Merge Cursor
//!
//! 아직 outbound 파일로 merge 되지 않은 마이크로 디파짓을 페이지 단위로 읽는다.
//!
//! DB-side cursor 가 아니라 `{page_size, watermark}` 만 들고 있는 구조체.
//! 중복 반환 방지는 쿼리 조건이 담당한다:
//!
//! ```sql
//! WHERE merged_filename = '' AND deleted_at IS NULL AND id > :watermark
//! ORDER BY id ASC
//! ```
//!
//! merge cycle 마다 새로 만들어서 쓰고, 두 caller 가 공유하지 않는다 (`next` 가 `&mut self`).

use std::sync::Arc;

use super::{DepositoryRepository, MicroDeposit, StoreError};

pub struct MicroDepositCursor {
    repo: Arc<dyn DepositoryRepository>,
    page_size: usize,
    watermark: i64,
}

impl MicroDepositCursor {
    pub fn new(repo: Arc<dyn DepositoryRepository>, page_size: usize) -> Self {
        Self {
            repo,
            page_size: page_size.max(1),
            watermark: 0,
        }
    }

    /// 다음 페이지. 다 읽었으면 빈 Vec
    pub async fn next(&mut self) -> Result<Vec<MicroDeposit>, StoreError> {
        let page = self
            .repo
            .mergeable_micro_deposits(self.watermark, self.page_size)
            .await?;
        if let Some(last) = page.last() {
            self.watermark = last.id;
        }
        Ok(page)
    }

    /// merge 완료 기록
    pub async fn mark_merged(&self, filename: &str, md: &MicroDeposit) -> Result<(), StoreError> {
        self.repo.mark_micro_deposit_as_merged(filename, md).await
    }
}
