//! NACHA Return Code 카탈로그 (Addenda99)

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReturnCode {
    pub code: &'static str,
    pub reason: &'static str,
    pub description: &'static str,
}

static RETURN_CODES: &[ReturnCode] = &[
    ReturnCode { code: "R01", reason: "Insufficient funds", description: "Available balance is not sufficient to cover the amount of the debit entry" },
    ReturnCode { code: "R02", reason: "Account closed", description: "Previously active amount has been closed by the customer of RDFI" },
    ReturnCode { code: "R03", reason: "No account/unable to locate account", description: "Account number does not correspond to the individual identified in the entry, or the account number designated is not an open account" },
    ReturnCode { code: "R04", reason: "Invalid account number", description: "Account number structure is not valid" },
    ReturnCode { code: "R05", reason: "Improper debit to consumer account", description: "A CCD, CTX, or CBR debit entry was transmitted to a consumer account and was not authorized" },
    ReturnCode { code: "R06", reason: "Returned per ODFI request", description: "ODFI requested RDFI to return the entry" },
    ReturnCode { code: "R07", reason: "Authorization revoked by customer", description: "Receiver has revoked authorization" },
    ReturnCode { code: "R08", reason: "Payment stopped", description: "Receiver of a recurring debit has stopped payment of an entry" },
    ReturnCode { code: "R09", reason: "Uncollected funds", description: "Collected funds are not sufficient for payment of the debit entry" },
    ReturnCode { code: "R10", reason: "Customer advises unauthorized", description: "Receiver has advised RDFI that originator is not authorized to debit his bank account" },
    ReturnCode { code: "R11", reason: "Check truncation entry return", description: "To be used when returning a check truncation entry" },
    ReturnCode { code: "R12", reason: "Branch sold to another RDFI", description: "RDFI unable to post entry destined for a bank account maintained at a branch sold to another financial institution" },
    ReturnCode { code: "R13", reason: "RDFI not qualified to participate", description: "Financial institution does not receive commercial ACH entries" },
    ReturnCode { code: "R14", reason: "Representative payee deceased or unable to continue in that capacity", description: "The representative payee authorized to accept entries on behalf of a beneficiary is either deceased or unable to continue in that capacity" },
    ReturnCode { code: "R15", reason: "Beneficiary or bank account holder deceased", description: "(Other than representative payee) deceased* - (1) the beneficiary entitled to payments is deceased or (2) the bank account holder other than a representative payee is deceased" },
    ReturnCode { code: "R16", reason: "Bank account frozen", description: "Funds in bank account are unavailable due to action by RDFI or legal order" },
    ReturnCode { code: "R17", reason: "File record edit criteria", description: "Fields rejected by RDFI processing (identified in return addenda)" },
    ReturnCode { code: "R18", reason: "Improper effective entry date", description: "Entries have been presented prior to the first available processing window for the effective date" },
    ReturnCode { code: "R19", reason: "Amount field error", description: "Improper formatting of the amount field" },
    ReturnCode { code: "R20", reason: "Non-payment bank account", description: "Entry destined for non-payment bank account defined by reg" },
    ReturnCode { code: "R21", reason: "Invalid company ID number", description: "The company ID information not valid (normally CIE entries)" },
    ReturnCode { code: "R22", reason: "Invalid individual ID number", description: "Individual id used by receiver is incorrect (CIE entries)" },
    ReturnCode { code: "R23", reason: "Credit entry refused by receiver", description: "Receiver returned entry because minimum or exact amount not remitted, bank account is subject to litigation, or payment represents an overpayment, originator is not known to receiver or receiver has not authorized this credit entry to this bank account" },
    ReturnCode { code: "R24", reason: "Duplicate entry", description: "RDFI has received a duplicate entry" },
    ReturnCode { code: "R29", reason: "Corporate customer advises not authorized", description: "RDFI has been notified by corporate receiver that debit entry of originator is not authorized" },
];

/// 계좌 자체를 더 이상 쓸 수 없다는 의미의 코드들 → Depository 를 Rejected 로
const DEPOSITORY_REJECTING_CODES: &[&str] = &[
    "R02", "R03", "R04", "R07", "R10", "R14", "R15", "R16", "R20",
];

pub fn lookup(code: &str) -> Option<&'static ReturnCode> {
    let code = code.trim();
    RETURN_CODES.iter().find(|c| c.code == code)
}

pub fn rejects_depository(code: &str) -> bool {
    DEPOSITORY_REJECTING_CODES.contains(&code.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("R14").unwrap().code, "R14");
        assert_eq!(lookup("R01").unwrap().reason, "Insufficient funds");
        assert!(lookup("R99").is_none());
    }

    #[test]
    fn test_rejects_depository() {
        assert!(rejects_depository("R02"));
        assert!(rejects_depository("R14"));
        assert!(!rejects_depository("R01"));
        assert!(!rejects_depository("R09"));
    }
}
