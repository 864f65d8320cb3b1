//! NACHA Change Code 카탈로그 + Corrected Data codec
//!
//! # Interview Q&A
//!
//! Q: NOC (Notification of Change) 란?
//! A: 수신 은행(RDFI)이 "돈은 넣었지만 다음부터는 이 정보로 보내라" 고 알려주는 레코드
//!    - 결제 자체는 성공 (return 과 다름)
//!    - Addenda98 에 change code + 교정된 값(corrected data)이 담겨 옴
//!    - originator 는 다음 entry 전에 반영해야 함 (NACHA 규정: 6 영업일)
//!
//! Q: corrected data 형식은?
//! A: 코드별 fixed-width (29자)
//!
//!    ```text
//!    C01  account(17)
//!    C02  routing(9)
//!    C03  routing(9) + 3 spaces + account(17)
//!    C04  name(22)
//!    C05  transaction code(2)
//!    C06  account(17) + 3 spaces + transaction code(2)
//!    C07  routing(9) + account(17) + transaction code(2)
//!    C09  identification number(22)
//!    ```

use serde::Serialize;

const CORRECTED_DATA_LEN: usize = 29;

/// Change code 정의
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeCode {
    pub code: &'static str,
    pub reason: &'static str,
    pub description: &'static str,
}

static CHANGE_CODES: &[ChangeCode] = &[
    ChangeCode {
        code: "C01",
        reason: "Incorrect bank account number",
        description: "Bank account number incorrect or formatted incorrectly",
    },
    ChangeCode {
        code: "C02",
        reason: "Incorrect transit/routing number",
        description: "Once valid transit/routing number must be changed",
    },
    ChangeCode {
        code: "C03",
        reason: "Incorrect transit/routing number and bank account number",
        description: "Once valid transit/routing number must be changed and causes a change to bank account number structure",
    },
    ChangeCode {
        code: "C04",
        reason: "Bank account name change",
        description: "Customer has changed name or ODFI submitted name incorrectly",
    },
    ChangeCode {
        code: "C05",
        reason: "Incorrect payment code",
        description: "Entry posted to demand account should contain savings payment codes or vice versa",
    },
    ChangeCode {
        code: "C06",
        reason: "Incorrect bank account number and transit code",
        description: "Bank account number must be changed and payment code should indicate posting to another account type (demand/savings)",
    },
    ChangeCode {
        code: "C07",
        reason: "Incorrect transit/routing number, bank account number and payment code",
        description: "Changes required in three fields indicated",
    },
    ChangeCode {
        code: "C08",
        reason: "Incorrect foreign receiving DFI identification",
        description: "Foreign receiving DFI identification is incorrect (IAT only)",
    },
    ChangeCode {
        code: "C09",
        reason: "Incorrect individual ID number",
        description: "Individual's ID number is incorrect",
    },
    ChangeCode {
        code: "C10",
        reason: "Incorrect company name",
        description: "Company name is no longer valid and should be changed",
    },
    ChangeCode {
        code: "C11",
        reason: "Incorrect company identification",
        description: "Company ID is no longer valid and should be changed",
    },
    ChangeCode {
        code: "C12",
        reason: "Incorrect company name and company ID",
        description: "Both the company name and company id are no longer valid and must be changed",
    },
    ChangeCode {
        code: "C13",
        reason: "Addenda format error",
        description: "Entry detail contained an addenda record with formatting errors",
    },
    ChangeCode {
        code: "C14",
        reason: "Incorrect SEC code for outbound international payment",
        description: "Outbound international payment SEC code should be IAT",
    },
];

/// 코드로 카탈로그 조회 ("C01" → Some)
pub fn lookup(code: &str) -> Option<&'static ChangeCode> {
    let code = code.trim();
    CHANGE_CODES.iter().find(|c| c.code == code)
}

/// Addenda98 corrected data 를 해석한 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectedData {
    pub account_number: String,
    pub routing_number: String,
    pub name: String,
    pub transaction_code: u8,
    pub identification: String,
}

/// 코드별 fixed-width 데이터 파싱
///
/// 필요한 필드가 비어 있거나 지원하지 않는 코드면 `None`
pub fn parse_corrected_data(code: &str, data: &str) -> Option<CorrectedData> {
    let mut out = CorrectedData::default();
    match code.trim() {
        "C01" => out.account_number = field(data, 0, 17)?,
        "C02" => out.routing_number = field(data, 0, 9)?,
        "C03" => {
            out.routing_number = field(data, 0, 9)?;
            out.account_number = field(data, 12, 17)?;
        }
        "C04" => out.name = field(data, 0, 22)?,
        "C05" => out.transaction_code = transaction_code(data, 0)?,
        "C06" => {
            out.account_number = field(data, 0, 17)?;
            out.transaction_code = transaction_code(data, 20)?;
        }
        "C07" => {
            out.routing_number = field(data, 0, 9)?;
            out.account_number = field(data, 9, 17)?;
            out.transaction_code = transaction_code(data, 26)?;
        }
        "C09" => out.identification = field(data, 0, 22)?,
        _ => return None,
    }
    Some(out)
}

/// `parse_corrected_data` 의 역방향. 29자로 padding 된 문자열
pub fn write_correction_data(code: &str, data: &CorrectedData) -> String {
    let tx = format!("{:02}", data.transaction_code);
    let out = match code.trim() {
        "C01" => format!("{:<17}", data.account_number),
        "C02" => format!("{:<9}", data.routing_number),
        "C03" => format!("{:<9}   {:<17}", data.routing_number, data.account_number),
        "C04" => format!("{:<22}", data.name),
        "C05" => tx,
        "C06" => format!("{:<17}   {}", data.account_number, tx),
        "C07" => format!("{:<9}{:<17}{}", data.routing_number, data.account_number, tx),
        "C09" => format!("{:<22}", data.identification),
        _ => String::new(),
    };
    format!("{:<width$}", out, width = CORRECTED_DATA_LEN)
}

/// data[start..start+len] trim, 비어있으면 None
fn field(data: &str, start: usize, len: usize) -> Option<String> {
    let value: String = data.chars().skip(start).take(len).collect();
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn transaction_code(data: &str, start: usize) -> Option<u8> {
    field(data, start, 2)?.parse().ok()
}
