//! ACH (NACHA) 레코드 모델
//!
//! 마이크로 디파짓 / NOC / Return 처리에 필요한 부분만 다룬다.
//! 파일 송수신(SFTP 업로드 등)과 fixed-width 파일 reader/writer 는 ACH 서비스 담당이며,
//! 이 서비스와는 JSON 으로 주고받는다 (`services::AchClient`).
//!
//! ```text
//! File
//!  ├─ FileHeader (immediate destination / origin)
//!  └─ Batch*
//!      ├─ BatchHeader (SEC code, ODFI)
//!      ├─ EntryDetail* ─ Addenda98 (NOC) | Addenda99 (Return)
//!      └─ BatchControl
//! ```

mod batch;
pub mod change_code;
mod entry;
mod file;
pub mod return_code;

use thiserror::Error;

pub use batch::{Batch, BatchControl, BatchHeader, CREDITS_ONLY, DEBITS_ONLY, MIXED_DEBITS_AND_CREDITS};
pub use change_code::{parse_corrected_data, write_correction_data, ChangeCode, CorrectedData};
pub use entry::{
    debit_code_for, next_trace_number, Addenda98, Addenda99, EntryDetail,
    CHECKING_CREDIT, CHECKING_DEBIT, CHECKING_RETURN_NOC_CREDIT, CHECKING_RETURN_NOC_DEBIT,
    SAVINGS_CREDIT, SAVINGS_DEBIT, SAVINGS_RETURN_NOC_CREDIT, SAVINGS_RETURN_NOC_DEBIT,
};
pub use file::{File, FileHeader};
pub use return_code::ReturnCode;

#[derive(Debug, Error)]
pub enum AchError {
    #[error("nil ACH file")]
    NilFile,

    #[error("ACH file has no batches")]
    NoBatches,

    #[error("batch {0} has no entries")]
    NoEntries(String),

    #[error("invalid routing number {0:?}")]
    InvalidRoutingNumber(String),

    #[error("invalid trace number {0:?}")]
    InvalidTraceNumber(String),

    #[error("invalid transaction code {0}")]
    InvalidTransactionCode(u8),

    #[error("unsupported standard entry class code {0:?}")]
    UnsupportedSecCode(String),

    #[error("batch {batch_id} entries do not match service class code {service_class_code}")]
    ServiceClassMismatch {
        batch_id: String,
        service_class_code: u16,
    },
}
