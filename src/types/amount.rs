//! Amount 값 타입
//!
//! 통화 코드 + 정수 minor unit (센트) 조합.
//! 부동소수점은 쓰지 않는다: `0.1 + 0.2 != 0.3` 문제는 송금에서 치명적.
//!
//! 직렬화 형식은 `"USD 1.24"` 하나뿐이며 DB 컬럼, JSON 응답, 요청 본문 모두 같은 문자열을 사용한다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("invalid currency symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("invalid amount {0:?}")]
    InvalidNumber(String),

    #[error("currency mismatch: {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("amount overflow")]
    Overflow,
}

/// 금액 (ISO 4217 통화 코드 + minor unit)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount {
    symbol: String,
    number: i64,
}

impl Amount {
    /// `Amount::new("USD", "0.11")` → 11 cents
    pub fn new(symbol: &str, number: &str) -> Result<Self, AmountError> {
        let symbol = parse_symbol(symbol)?;
        let number = parse_minor_units(number)?;
        Ok(Self { symbol, number })
    }

    /// minor unit 에서 바로 생성 (`from_minor("USD", 12)` == `USD 0.12`)
    pub fn from_minor(symbol: &str, number: i64) -> Result<Self, AmountError> {
        if number < 0 {
            return Err(AmountError::InvalidNumber(number.to_string()));
        }
        Ok(Self {
            symbol: parse_symbol(symbol)?,
            number,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// minor unit 값
    pub fn int(&self) -> i64 {
        self.number
    }

    /// 같은 통화끼리만 더할 수 있음
    pub fn plus(&self, other: &Amount) -> Result<Amount, AmountError> {
        if self.symbol != other.symbol {
            return Err(AmountError::CurrencyMismatch(
                self.symbol.clone(),
                other.symbol.clone(),
            ));
        }
        let number = self
            .number
            .checked_add(other.number)
            .ok_or(AmountError::Overflow)?;
        Ok(Amount {
            symbol: self.symbol.clone(),
            number,
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{:02}", self.symbol, self.number / 100, self.number % 100)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// `"USD 1.24"` 형식 파싱
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (symbol, number) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| AmountError::InvalidNumber(s.to_string()))?;
        Amount::new(symbol, number.trim())
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn parse_symbol(symbol: &str) -> Result<String, AmountError> {
    let symbol = symbol.trim();
    if symbol.len() != 3 || !symbol.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AmountError::InvalidSymbol(symbol.to_string()));
    }
    Ok(symbol.to_ascii_uppercase())
}

/// "1.24" → 124, "3" → 300, "0.5" → 50
fn parse_minor_units(number: &str) -> Result<i64, AmountError> {
    let invalid = || AmountError::InvalidNumber(number.to_string());

    let (major, minor) = match number.split_once('.') {
        Some((major, minor)) => (major, minor),
        None => (number, ""),
    };
    if major.is_empty() && minor.is_empty() {
        return Err(invalid());
    }
    if minor.len() > 2
        || !major.chars().all(|c| c.is_ascii_digit())
        || !minor.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let major: i64 = if major.is_empty() {
        0
    } else {
        major.parse().map_err(|_| invalid())?
    };
    let minor: i64 = match minor.len() {
        0 => 0,
        1 => minor.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => minor.parse().map_err(|_| invalid())?,
    };

    major
        .checked_mul(100)
        .and_then(|m| m.checked_add(minor))
        .ok_or(AmountError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format() {
        let amt = Amount::new("USD", "1.24").unwrap();
        assert_eq!(amt.int(), 124);
        assert_eq!(amt.to_string(), "USD 1.24");

        assert_eq!(Amount::new("USD", "0.5").unwrap().int(), 50);
        assert_eq!(Amount::new("USD", "3").unwrap().to_string(), "USD 3.00");
        assert_eq!(Amount::new("usd", "0.07").unwrap().to_string(), "USD 0.07");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Amount::new("USD", "1.234").is_err());
        assert!(Amount::new("USD", "-1.00").is_err());
        assert!(Amount::new("USD", "abc").is_err());
        assert!(Amount::new("USD", ".").is_err());
        assert!(Amount::new("DOLLARS", "1.00").is_err());
        assert!("USD".parse::<Amount>().is_err());
    }

    #[test]
    fn test_from_str() {
        let amt: Amount = "USD 0.11".parse().unwrap();
        assert_eq!(amt, Amount::from_minor("USD", 11).unwrap());
    }

    #[test]
    fn test_plus() {
        let a = Amount::from_minor("USD", 12).unwrap();
        let b = Amount::from_minor("USD", 14).unwrap();
        let sum = a.plus(&b).unwrap();
        assert_eq!(sum.int(), a.int() + b.int());
        assert_eq!(sum.to_string(), "USD 0.26");

        let eur = Amount::from_minor("EUR", 1).unwrap();
        assert_eq!(
            a.plus(&eur),
            Err(AmountError::CurrencyMismatch("USD".into(), "EUR".into()))
        );
    }

    #[test]
    fn test_json() {
        #[derive(Serialize, Deserialize)]
        struct Row {
            amount: Amount,
        }

        let amt = Amount::new("USD", "1.24").unwrap();
        let json = serde_json::to_string(&[Row { amount: amt.clone() }]).unwrap();
        assert_eq!(json, r#"[{"amount":"USD 1.24"}]"#);

        let rows: Vec<Row> = serde_json::from_str(&json).unwrap();
        assert_eq!(rows[0].amount, amt);
    }

    #[test]
    fn test_ordering_is_structural() {
        let a = Amount::from_minor("USD", 4).unwrap();
        let b = Amount::from_minor("USD", 10).unwrap();
        assert!(a < b);
        assert_ne!(a, Amount::from_minor("EUR", 4).unwrap());
    }
}
