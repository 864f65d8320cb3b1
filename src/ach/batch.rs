//! Batch (NACHA record type 5 header + entries + type 8 control)

use serde::{Deserialize, Serialize};

use super::{AchError, EntryDetail};

// ============ Service Class Codes ============
pub const MIXED_DEBITS_AND_CREDITS: u16 = 200;
pub const CREDITS_ONLY: u16 = 220;
pub const DEBITS_ONLY: u16 = 225;

/// 지원하는 Standard Entry Class 코드
const SUPPORTED_SEC_CODES: &[&str] = &["PPD", "CCD", "WEB", "TEL", "COR"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchHeader {
    pub service_class_code: u16,
    pub company_name: String,
    pub company_identification: String,
    pub standard_entry_class_code: String,
    pub company_entry_description: String,
    /// YYMMDD
    pub effective_entry_date: String,
    pub odfi_identification: String,
    pub batch_number: u32,
}

impl BatchHeader {
    pub fn new() -> Self {
        Self {
            service_class_code: MIXED_DEBITS_AND_CREDITS,
            batch_number: 1,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchControl {
    pub entry_addenda_count: usize,
    /// RDFI identification 합계의 하위 10자리
    pub entry_hash: u64,
    pub total_debit_entry_dollar_amount: i64,
    pub total_credit_entry_dollar_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub header: BatchHeader,
    entries: Vec<EntryDetail>,
    #[serde(default)]
    pub control: BatchControl,
}

impl Batch {
    pub fn new(header: BatchHeader) -> Result<Self, AchError> {
        let sec = header.standard_entry_class_code.trim();
        if !SUPPORTED_SEC_CODES.contains(&sec) {
            return Err(AchError::UnsupportedSecCode(sec.to_string()));
        }
        Ok(Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            header,
            entries: Vec::new(),
            control: BatchControl::default(),
        })
    }

    pub fn add_entry(&mut self, entry: EntryDetail) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[EntryDetail] {
        &self.entries
    }

    pub fn is_noc(&self) -> bool {
        self.header.standard_entry_class_code.trim() == "COR"
    }

    pub fn has_returns(&self) -> bool {
        self.entries.iter().any(|e| e.addenda99.is_some())
    }

    /// control 레코드 계산 + 검증
    pub fn create(&mut self) -> Result<(), AchError> {
        if self.entries.is_empty() {
            return Err(AchError::NoEntries(self.id.clone()));
        }

        let mut control = BatchControl::default();
        for entry in &self.entries {
            control.entry_addenda_count += 1 + entry.addenda_count();

            let rdfi: u64 = entry
                .rdfi_identification
                .trim()
                .parse()
                .map_err(|_| AchError::InvalidRoutingNumber(entry.rdfi_identification.clone()))?;
            control.entry_hash = (control.entry_hash + rdfi) % 10_000_000_000;

            if entry.is_debit() {
                control.total_debit_entry_dollar_amount += entry.amount;
            } else if entry.is_credit() {
                control.total_credit_entry_dollar_amount += entry.amount;
            } else {
                return Err(AchError::InvalidTransactionCode(entry.transaction_code));
            }
        }

        let scc = self.header.service_class_code;
        let mismatch = (scc == CREDITS_ONLY && control.total_debit_entry_dollar_amount > 0)
            || (scc == DEBITS_ONLY && control.total_credit_entry_dollar_amount > 0);
        if mismatch {
            return Err(AchError::ServiceClassMismatch {
                batch_id: self.id.clone(),
                service_class_code: scc,
            });
        }

        self.control = control;
        Ok(())
    }
}
