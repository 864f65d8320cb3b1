//! Services Module
//!
//! 비즈니스 로직을 담당하는 서비스 레이어
//!
//! # Services
//! - `MicroDepositService`: 마이크로 디파짓 생성 / 확인
//! - `corrections`: 인바운드 NOC (Notification of Change) 처리
//! - `returns`: 인바운드 Return 처리
//! - `Merger`: 미병합 마이크로 디파짓을 outbound 파일로 병합
//! - `AchClient`: ACH 서비스 HTTP 클라이언트
//! - `StringKeeper`: 계좌번호 암호화

pub mod ach_client;
pub mod corrections;
pub mod merge;
pub mod micro_deposits;
pub mod returns;
mod secrets;

pub use ach_client::{AchClient, AchClientError, HttpAchClient};
pub use corrections::{apply_change_code, handle_noc_file, CorrectionError};
pub use merge::{MergeError, MergeSummary, Merger};
pub use micro_deposits::{MicroDepositService, OdfiAccount, VerificationError};
pub use returns::{handle_return_file, record_return_code, ReturnError};
pub use secrets::{KeeperError, Sha3Keeper, StringKeeper};
