//! Entry Detail 레코드 (NACHA record type 6) + Addenda 98/99

use serde::{Deserialize, Serialize};

use super::AchError;

// ============ Transaction Codes ============
//
// 2x = checking, 3x = savings
// x2 = credit, x7 = debit (credit + 5)
// x1 / x6 = return 또는 NOC 로 돌아온 credit / debit

pub const CHECKING_RETURN_NOC_CREDIT: u8 = 21;
pub const CHECKING_CREDIT: u8 = 22;
pub const CHECKING_RETURN_NOC_DEBIT: u8 = 26;
pub const CHECKING_DEBIT: u8 = 27;
pub const SAVINGS_RETURN_NOC_CREDIT: u8 = 31;
pub const SAVINGS_CREDIT: u8 = 32;
pub const SAVINGS_RETURN_NOC_DEBIT: u8 = 36;
pub const SAVINGS_DEBIT: u8 = 37;

/// credit 에 대응하는 debit 코드 (22 → 27, 32 → 37)
pub fn debit_code_for(credit: u8) -> Result<u8, AchError> {
    match credit {
        CHECKING_CREDIT | SAVINGS_CREDIT => Ok(credit + 5),
        other => Err(AchError::InvalidTransactionCode(other)),
    }
}

/// Notification of Change (Addenda type 98)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addenda98 {
    pub change_code: String,
    /// 원래 보냈던 entry 의 trace number
    pub original_trace: String,
    pub original_dfi: String,
    /// 코드별 fixed-width 교정 데이터 (`change_code::parse_corrected_data`)
    pub corrected_data: String,
    pub trace_number: String,
}

/// Return (Addenda type 99)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addenda99 {
    pub return_code: String,
    pub original_trace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_death: Option<String>,
    pub original_dfi: String,
    pub addenda_information: String,
    pub trace_number: String,
}

/// Entry Detail
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetail {
    pub id: String,
    pub transaction_code: u8,
    /// 수신 은행 routing number 앞 8자리
    pub rdfi_identification: String,
    /// routing number 9번째 자리
    pub check_digit: String,
    pub dfi_account_number: String,
    /// minor unit (cents)
    pub amount: i64,
    pub identification_number: String,
    pub individual_name: String,
    pub discretionary_data: String,
    pub trace_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addenda98: Option<Addenda98>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addenda99: Option<Addenda99>,
}

impl EntryDetail {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            ..Default::default()
        }
    }

    /// 9자리 routing number 를 RDFI(8) + check digit(1) 로 나눠서 설정
    pub fn set_rdfi(&mut self, routing_number: &str) -> Result<(), AchError> {
        let routing_number = routing_number.trim();
        if routing_number.len() != 9 || !routing_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(AchError::InvalidRoutingNumber(routing_number.to_string()));
        }
        self.rdfi_identification = routing_number[..8].to_string();
        self.check_digit = routing_number[8..].to_string();
        Ok(())
    }

    /// RDFI + check digit
    pub fn routing_number(&self) -> String {
        format!("{}{}", self.rdfi_identification.trim(), self.check_digit.trim())
    }

    /// ODFI 앞 8자리 + 7자리 sequence → 15자리 trace number
    pub fn set_trace_number(&mut self, odfi_identification: &str, sequence: u32) {
        let odfi: String = odfi_identification.chars().take(8).collect();
        self.trace_number = format!("{:0>8}{:07}", odfi, sequence);
    }

    pub fn is_credit(&self) -> bool {
        matches!(
            self.transaction_code,
            CHECKING_CREDIT | SAVINGS_CREDIT | CHECKING_RETURN_NOC_CREDIT | SAVINGS_RETURN_NOC_CREDIT
        )
    }

    pub fn is_debit(&self) -> bool {
        matches!(
            self.transaction_code,
            CHECKING_DEBIT | SAVINGS_DEBIT | CHECKING_RETURN_NOC_DEBIT | SAVINGS_RETURN_NOC_DEBIT
        )
    }

    pub fn addenda_count(&self) -> usize {
        usize::from(self.addenda98.is_some()) + usize::from(self.addenda99.is_some())
    }
}

/// trace number + 1, 원래 자릿수 유지 ("123" → "124", "0000001" → "0000002")
pub fn next_trace_number(trace: &str) -> Result<String, AchError> {
    let trace = trace.trim();
    let n: u64 = trace
        .parse()
        .map_err(|_| AchError::InvalidTraceNumber(trace.to_string()))?;
    let next = n
        .checked_add(1)
        .ok_or_else(|| AchError::InvalidTraceNumber(trace.to_string()))?;
    Ok(format!("{:0width$}", next, width = trace.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_rdfi() {
        let mut ed = EntryDetail::new();
        ed.set_rdfi("121042882").unwrap();
        assert_eq!(ed.rdfi_identification, "12104288");
        assert_eq!(ed.check_digit, "2");
        assert_eq!(ed.routing_number(), "121042882");

        assert!(ed.set_rdfi("1234").is_err());
        assert!(ed.set_rdfi("12104288x").is_err());
    }

    #[test]
    fn test_trace_numbers() {
        let mut ed = EntryDetail::new();
        ed.set_trace_number("121042882", 1);
        assert_eq!(ed.trace_number, "121042880000001");

        assert_eq!(next_trace_number("123").unwrap(), "124");
        assert_eq!(next_trace_number("121042880000009").unwrap(), "121042880000010");
        assert!(next_trace_number("abc").is_err());
    }

    #[test]
    fn test_debit_code_for() {
        assert_eq!(debit_code_for(CHECKING_CREDIT).unwrap(), CHECKING_DEBIT);
        assert_eq!(debit_code_for(SAVINGS_CREDIT).unwrap(), SAVINGS_DEBIT);
        assert!(debit_code_for(CHECKING_DEBIT).is_err());
    }
}
