//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의

mod amount;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use amount::{Amount, AmountError};

/// Depository (사용자 외부 은행 계좌) 식별자
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepositoryId(String);

impl DepositoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// 랜덤 ID 생성 (uuid v4, 하이픈 없는 hex)
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 사용자 식별자 (`x-user-id` 헤더 값)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ids_are_unique() {
        assert_ne!(DepositoryId::random(), DepositoryId::random());
        assert_eq!(UserId::random().as_str().len(), 32);
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = DepositoryId::new("dep-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""dep-1""#);
    }
}
