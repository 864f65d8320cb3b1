//! Merge Cycle
//!
//! # Interview Q&A
//!
//! Q: merge 란?
//! A: 개별로 생성된 마이크로 디파짓 파일들을 목적지 (immediate destination) 별
//!    하루 하나의 outbound 파일로 모으는 작업
//!
//!    ```text
//!    micro_deposits (merged_filename = '')
//!        │  MicroDepositCursor::next()
//!        ▼
//!    file_id 별 그룹 ──▶ AchClient::get_file ──▶ <merge_dir>/<YYYYMMDD>-<destination>.ach.json
//!                                                   │
//!                                                   ▼
//!                                  mark_micro_deposit_as_merged(filename)
//!    ```
//!
//! Q: 파일 쓰기와 merged 표시 사이에 죽으면?
//! A: 다음 cycle 에 같은 deposit 이 다시 나온다
//!    - 파일 이름의 날짜는 원본 파일의 생성일이라 재시도해도 같은 파일로 간다
//!    - batch id 가 이미 파일에 있으면 건너뛰므로 중복 병합되지 않음
//!    - 표시만 다시 하면 끝
//!
//! Q: 타이머 cycle 과 `POST /admin/merge` 가 겹치면?
//! A: `Merger` 안의 mutex 로 cycle 을 직렬화한다
//!    - mergeable 파일은 read-modify-write 라 동시에 쓰면 batch 를 잃는다

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::ach::{File, FileHeader};
use crate::db::{DepositoryRepository, MicroDeposit, MicroDepositCursor, StoreError};
use crate::services::{AchClient, AchClientError};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unable to write mergeable file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt mergeable file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 한 cycle 의 결과
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// 이번 cycle 에 쓴 mergeable 파일 이름
    pub files: Vec<String>,
    pub micro_deposits: usize,
}

pub struct Merger {
    repo: Arc<dyn DepositoryRepository>,
    ach_client: Arc<dyn AchClient>,
    merge_dir: PathBuf,
    ach_timeout: Duration,
    cycle: Mutex<()>,
}

impl Merger {
    pub fn new(
        repo: Arc<dyn DepositoryRepository>,
        ach_client: Arc<dyn AchClient>,
        merge_dir: impl Into<PathBuf>,
        ach_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            ach_client,
            merge_dir: merge_dir.into(),
            ach_timeout,
            cycle: Mutex::new(()),
        }
    }

    pub fn merge_dir(&self) -> &Path {
        &self.merge_dir
    }

    /// 미병합 마이크로 디파짓 전부를 병합
    ///
    /// ACH 서비스에서 파일을 못 가져온 그룹은 건너뛰고 다음 cycle 에 다시 시도한다.
    /// 다른 cycle 이 돌고 있으면 끝날 때까지 기다린다.
    pub async fn handle_merge_cycle(&self, page_size: usize) -> Result<MergeSummary, MergeError> {
        let _running = self.cycle.lock().await;
        let mut cursor = MicroDepositCursor::new(self.repo.clone(), page_size);
        let mut summary = MergeSummary::default();

        loop {
            let page = cursor.next().await?;
            if page.is_empty() {
                break;
            }

            let mut groups: BTreeMap<String, Vec<MicroDeposit>> = BTreeMap::new();
            for md in page {
                groups.entry(md.file_id.clone()).or_default().push(md);
            }

            for (file_id, deposits) in groups {
                let file = match self.fetch_file(&file_id).await {
                    Ok(file) => file,
                    Err(err) => {
                        tracing::warn!(file_id = %file_id, error = %err, "unable to fetch micro deposit file");
                        continue;
                    }
                };

                let filename = self.merge_into(&file).await?;
                for md in &deposits {
                    cursor.mark_merged(&filename, md).await?;
                }

                summary.micro_deposits += deposits.len();
                if !summary.files.contains(&filename) {
                    summary.files.push(filename);
                }
            }
        }

        if summary.micro_deposits > 0 {
            tracing::info!(
                files = summary.files.len(),
                micro_deposits = summary.micro_deposits,
                "merge cycle finished"
            );
        }
        Ok(summary)
    }

    async fn fetch_file(&self, file_id: &str) -> Result<File, AchClientError> {
        tokio::time::timeout(self.ach_timeout, self.ach_client.get_file(file_id))
            .await
            .map_err(|_| AchClientError::Timeout(self.ach_timeout))?
    }

    /// 목적지별 mergeable 파일에 batch 추가. 파일 이름 반환
    async fn merge_into(&self, file: &File) -> Result<String, MergeError> {
        let destination = match file.header.immediate_destination.trim() {
            "" => "unknown",
            d => d,
        };
        let filename = format!("{}-{}.ach.json", merge_date(file), destination);
        let path = self.merge_dir.join(&filename);

        tokio::fs::create_dir_all(&self.merge_dir)
            .await
            .map_err(|source| MergeError::Io {
                path: self.merge_dir.clone(),
                source,
            })?;

        let mut mergeable = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<File>(&bytes).map_err(|source| MergeError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let now = Utc::now();
                File::new(FileHeader {
                    immediate_destination: file.header.immediate_destination.clone(),
                    immediate_origin: file.header.immediate_origin.clone(),
                    immediate_destination_name: file.header.immediate_destination_name.clone(),
                    immediate_origin_name: file.header.immediate_origin_name.clone(),
                    file_creation_date: now.format("%y%m%d").to_string(),
                    file_creation_time: now.format("%H%M").to_string(),
                    file_id_modifier: "A".to_string(),
                })
            }
            Err(source) => return Err(MergeError::Io { path, source }),
        };

        let mut added = 0;
        for batch in &file.batches {
            if mergeable.contains_batch(&batch.id) {
                continue;
            }
            mergeable.add_batch(batch.clone());
            added += 1;
        }
        if added == 0 {
            tracing::debug!(filename = %filename, file_id = %file.id, "batches already merged");
            return Ok(filename);
        }

        let bytes = serde_json::to_vec_pretty(&mergeable).map_err(|source| MergeError::Corrupt {
            path: path.clone(),
            source,
        })?;
        let tmp = self
            .merge_dir
            .join(format!("{}.{}.tmp", filename, uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|source| MergeError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| MergeError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(filename = %filename, file_id = %file.id, batches = added, "merged ACH file");
        Ok(filename)
    }
}

/// 원본 파일 생성일 (YYYYMMDD). 헤더 날짜를 읽을 수 없으면 오늘
fn merge_date(file: &File) -> String {
    match NaiveDate::parse_from_str(file.header.file_creation_date.trim(), "%y%m%d") {
        Ok(date) => date.format("%Y%m%d").to_string(),
        Err(_) => {
            tracing::warn!(
                file_id = %file.id,
                file_creation_date = %file.header.file_creation_date,
                "invalid file creation date, merging under today"
            );
            Utc::now().format("%Y%m%d").to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{AccountType, Database, Depository, DepositoryStatus, SqlDepositoryRepo};
    use crate::services::ach_client::mock::MockAchClient;
    use crate::services::{MicroDepositService, OdfiAccount, Sha3Keeper};
    use crate::types::{Amount, DepositoryId, UserId};

    struct Fixture {
        repo: Arc<SqlDepositoryRepo>,
        ach: Arc<MockAchClient>,
        service: MicroDepositService,
        merger: Merger,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let db = Database::in_memory().await.unwrap();
        let repo = Arc::new(SqlDepositoryRepo::new(
            db.pool().clone(),
            Arc::new(Sha3Keeper::new([8u8; 32])),
        ));
        let ach = Arc::new(MockAchClient::new());
        let dir = tempfile::tempdir().unwrap();

        let odfi = OdfiAccount {
            routing_number: "121042882".to_string(),
            account_number: "odfi-account".to_string(),
            account_type: AccountType::Checking,
            name: "My Bank".to_string(),
        };
        let timeout = Duration::from_secs(5);
        let service = MicroDepositService::new(repo.clone(), ach.clone(), odfi, timeout);
        let merger = Merger::new(repo.clone(), ach.clone(), dir.path(), timeout);

        Fixture {
            repo,
            ach,
            service,
            merger,
            _dir: dir,
        }
    }

    async fn write_depository(repo: &SqlDepositoryRepo, routing_number: &str) -> Depository {
        let user_id = UserId::random();
        let mut dep = Depository::new(DepositoryId::random(), user_id.clone());
        dep.bank_name = "bank name".into();
        dep.holder = "holder".into();
        dep.routing_number = routing_number.into();
        dep.replace_account_number(repo.keeper(), "151").unwrap();
        repo.upsert_user_depository(&user_id, &dep).await.unwrap();
        dep
    }

    async fn read_mergeable(merger: &Merger, filename: &str) -> File {
        let bytes = tokio::fs::read(merger.merge_dir().join(filename)).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_merge_cycle_empty() {
        let fx = fixture().await;

        let summary = fx.merger.handle_merge_cycle(10).await.unwrap();
        assert_eq!(summary, MergeSummary::default());

        let mut entries = tokio::fs::read_dir(fx.merger.merge_dir()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_to_end_verification() {
        let fx = fixture().await;
        let dep = write_depository(&fx.repo, "121042882").await;
        assert_eq!(dep.status, DepositoryStatus::Unverified);

        let deposits = fx
            .service
            .initiate_verification(&dep, &dep.user_id, "request-id")
            .await
            .unwrap();
        assert_eq!(deposits.len(), 2);
        assert_ne!(deposits[0].amount, deposits[1].amount);
        assert_eq!(deposits[0].file_id, deposits[1].file_id);

        let guesses: Vec<Amount> = deposits.iter().rev().map(|m| m.amount.clone()).collect();
        fx.service
            .confirm_verification(&dep.id, &dep.user_id, &guesses)
            .await
            .unwrap();
        let stored = fx.repo.get_depository(&dep.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DepositoryStatus::Verified);

        let summary = fx.merger.handle_merge_cycle(10).await.unwrap();
        assert_eq!(summary.micro_deposits, 2);
        assert_eq!(summary.files.len(), 1);
        let filename = &summary.files[0];
        assert!(filename.ends_with("-121042882.ach.json"), "{filename}");

        let stored = fx.repo.get_micro_deposits_for_user(&dep.id, &dep.user_id).await.unwrap();
        assert!(stored.iter().all(|m| &m.merged_filename == filename));

        let mergeable = read_mergeable(&fx.merger, filename).await;
        assert_eq!(mergeable.batches.len(), 1);
        assert_eq!(mergeable.entry_count(), 3);

        // 이미 병합된 건은 다시 나오지 않음
        let summary = fx.merger.handle_merge_cycle(10).await.unwrap();
        assert_eq!(summary, MergeSummary::default());
        let mut cursor = MicroDepositCursor::new(fx.repo.clone(), 10);
        assert!(cursor.next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merge_cycle_groups_by_destination() {
        let fx = fixture().await;
        for routing in ["121042882", "121042882", "987654320"] {
            let dep = write_depository(&fx.repo, routing).await;
            fx.service
                .initiate_verification(&dep, &dep.user_id, "request-id")
                .await
                .unwrap();
        }

        // page 크기보다 많은 row
        let summary = fx.merger.handle_merge_cycle(4).await.unwrap();
        assert_eq!(summary.micro_deposits, 6);
        assert_eq!(summary.files.len(), 2);

        let first = summary.files.iter().find(|f| f.contains("121042882")).unwrap();
        let mergeable = read_mergeable(&fx.merger, first).await;
        assert_eq!(mergeable.batches.len(), 2);
        assert_eq!(mergeable.entry_count(), 6);
    }

    #[tokio::test]
    async fn test_merge_into_skips_existing_batches() {
        let fx = fixture().await;
        let dep = write_depository(&fx.repo, "121042882").await;
        let deposits = fx
            .service
            .initiate_verification(&dep, &dep.user_id, "request-id")
            .await
            .unwrap();
        let file = fx.ach.get_file(&deposits[0].file_id).await.unwrap();

        // 파일은 썼지만 표시 전에 멈춘 상황
        let filename = fx.merger.merge_into(&file).await.unwrap();
        let summary = fx.merger.handle_merge_cycle(10).await.unwrap();
        assert_eq!(summary.files, vec![filename.clone()]);

        let mergeable = read_mergeable(&fx.merger, &filename).await;
        assert_eq!(mergeable.batches.len(), 1);
    }

    async fn merge_dir_entries(merger: &Merger) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(merger.merge_dir()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_merge_cycles() {
        let fx = fixture().await;
        for _ in 0..20 {
            let dep = write_depository(&fx.repo, "121042882").await;
            fx.service
                .initiate_verification(&dep, &dep.user_id, "request-id")
                .await
                .unwrap();
        }

        // 타이머 cycle 과 admin 요청이 같은 Merger 를 공유하는 상황
        let merger = Arc::new(Merger::new(
            fx.repo.clone(),
            fx.ach.clone(),
            fx.merger.merge_dir(),
            Duration::from_secs(5),
        ));
        let (a, b) = (merger.clone(), merger.clone());
        let first = tokio::spawn(async move { a.handle_merge_cycle(1).await });
        let second = tokio::spawn(async move { b.handle_merge_cycle(1).await });
        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(first.micro_deposits + second.micro_deposits, 40);
        let filename = first.files.iter().chain(&second.files).next().unwrap();
        let mergeable = read_mergeable(&merger, filename).await;
        assert_eq!(mergeable.batches.len(), 20);
        assert_eq!(mergeable.entry_count(), 60);

        // 임시 파일이 남지 않음
        assert_eq!(merge_dir_entries(&merger).await, vec![filename.clone()]);
    }

    #[tokio::test]
    async fn test_merge_retry_uses_source_file_date() {
        let fx = fixture().await;
        let dep = write_depository(&fx.repo, "121042882").await;
        let deposits = fx
            .service
            .initiate_verification(&dep, &dep.user_id, "request-id")
            .await
            .unwrap();

        // 어제 만든 파일을 병합한 직후, 표시 전에 멈춘 상황
        let yesterday = Utc::now() - chrono::Duration::days(1);
        let mut file = fx.ach.get_file(&deposits[0].file_id).await.unwrap();
        file.header.file_creation_date = yesterday.format("%y%m%d").to_string();
        fx.ach.insert(file.clone());
        let filename = fx.merger.merge_into(&file).await.unwrap();
        assert_eq!(filename, format!("{}-121042882.ach.json", yesterday.format("%Y%m%d")));

        // 날짜가 바뀐 뒤의 cycle 도 같은 파일로 간다
        let summary = fx.merger.handle_merge_cycle(10).await.unwrap();
        assert_eq!(summary.files, vec![filename.clone()]);
        assert_eq!(summary.micro_deposits, 2);

        let mergeable = read_mergeable(&fx.merger, &filename).await;
        assert_eq!(mergeable.batches.len(), 1);
        assert_eq!(merge_dir_entries(&fx.merger).await, vec![filename]);
    }

    #[tokio::test]
    async fn test_merge_cycle_skips_missing_files() {
        let fx = fixture().await;
        let dep = write_depository(&fx.repo, "121042882").await;
        let md = MicroDeposit::new(
            dep.id.clone(),
            dep.user_id.clone(),
            Amount::from_minor("USD", 12).unwrap(),
            "missing-file",
        );
        fx.repo
            .initiate_micro_deposits(&dep.id, &dep.user_id, &[md])
            .await
            .unwrap();

        let summary = fx.merger.handle_merge_cycle(10).await.unwrap();
        assert_eq!(summary, MergeSummary::default());

        // 다음 cycle 에 다시 시도할 수 있도록 남아 있음
        let stored = fx.repo.get_micro_deposits_for_user(&dep.id, &dep.user_id).await.unwrap();
        assert!(stored[0].merged_filename.is_empty());
    }
}
