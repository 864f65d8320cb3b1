//! ACH File (record type 1 header + batches)
//!
//! 인바운드 파일은 batch 를 종류별로 다시 분류해둔다:
//! - `notification_of_change`: SEC = COR 인 batch (NOC)
//! - `return_entries`: Addenda99 가 붙은 entry 를 가진 batch (Return)

use serde::{Deserialize, Serialize};

use super::{AchError, Batch};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    /// 수신 측 routing number (보통 ODFI 가 파일을 보내는 Fed / 상대 은행)
    pub immediate_destination: String,
    pub immediate_origin: String,
    pub immediate_destination_name: String,
    pub immediate_origin_name: String,
    /// YYMMDD
    pub file_creation_date: String,
    /// HHMM
    pub file_creation_time: String,
    pub file_id_modifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    pub header: FileHeader,
    #[serde(default)]
    pub batches: Vec<Batch>,
    #[serde(default)]
    pub notification_of_change: Vec<Batch>,
    #[serde(default)]
    pub return_entries: Vec<Batch>,
}

impl File {
    pub fn new(header: FileHeader) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            header,
            ..Default::default()
        }
    }

    /// batch 추가 + NOC / Return 분류
    pub fn add_batch(&mut self, batch: Batch) {
        if batch.is_noc() {
            self.notification_of_change.push(batch.clone());
        }
        if batch.has_returns() {
            self.return_entries.push(batch.clone());
        }
        self.batches.push(batch);
    }

    pub fn contains_batch(&self, batch_id: &str) -> bool {
        self.batches.iter().any(|b| b.id == batch_id)
    }

    /// 모든 batch 의 control 재계산
    pub fn create(&mut self) -> Result<(), AchError> {
        if self.batches.is_empty() {
            return Err(AchError::NoBatches);
        }
        for batch in &mut self.batches {
            batch.create()?;
        }
        Ok(())
    }

    /// 총 entry 수 (addenda 제외)
    pub fn entry_count(&self) -> usize {
        self.batches.iter().map(|b| b.entries().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ach::{Addenda99, BatchHeader, EntryDetail, CHECKING_RETURN_NOC_CREDIT};

    fn batch(sec: &str) -> Batch {
        let mut bh = BatchHeader::new();
        bh.standard_entry_class_code = sec.into();
        Batch::new(bh).unwrap()
    }

    #[test]
    fn test_add_batch_classifies() {
        let mut file = File::new(FileHeader::default());
        file.add_batch(batch("PPD"));
        assert_eq!(file.batches.len(), 1);
        assert!(file.notification_of_change.is_empty());
        assert!(file.return_entries.is_empty());

        file.add_batch(batch("COR"));
        assert_eq!(file.notification_of_change.len(), 1);

        let mut returned = batch("PPD");
        let mut ed = EntryDetail::new();
        ed.transaction_code = CHECKING_RETURN_NOC_CREDIT;
        ed.addenda99 = Some(Addenda99 {
            return_code: "R01".into(),
            ..Default::default()
        });
        returned.add_entry(ed);
        file.add_batch(returned);
        assert_eq!(file.return_entries.len(), 1);
        assert_eq!(file.batches.len(), 3);
    }

    #[test]
    fn test_create_without_batches() {
        let mut file = File::new(FileHeader::default());
        assert!(matches!(file.create(), Err(AchError::NoBatches)));
    }

    #[test]
    fn test_json_roundtrip_keeps_classification() {
        let mut file = File::new(FileHeader::default());
        file.add_batch(batch("COR"));
        let json = serde_json::to_string(&file).unwrap();
        let back: File = serde_json::from_str(&json).unwrap();
        assert_eq!(back.notification_of_change.len(), 1);
        assert!(back.contains_batch(&file.batches[0].id));
    }
}
