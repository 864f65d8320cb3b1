//! Secret Keeper
//!
//! 계좌번호 평문은 DB 에 절대 저장하지 않는다.
//! Depository store 는 `StringKeeper` 를 주입받아 저장 전에 암호화한다.
//!
//! # Sealing Format
//!
//! ```text
//! hex( nonce(16) || ciphertext(n) || tag(32) )
//!
//! keystream  = SHAKE256(key || "ach-verify/enc" || nonce)
//! ciphertext = plaintext XOR keystream
//! tag        = SHA3-256(key || "ach-verify/mac" || nonce || ciphertext)
//! ```
//!
//! `hash()` 는 같은 키로 만든 결정적 digest. 암호문은 nonce 때문에 매번 달라지므로
//! 인바운드 NOC/Return 파일의 계좌번호로 Depository 를 찾을 때는 이 값을 쓴다.

use rand::{rngs::OsRng, RngCore};
use sha3::{Digest, Sha3_256, Shake256};
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("invalid secrets key: {0}")]
    InvalidKey(String),

    #[error("malformed ciphertext")]
    Malformed,

    #[error("ciphertext authentication failed")]
    Authentication,
}

/// 문자열 암호화 capability
pub trait StringKeeper: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, KeeperError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, KeeperError>;
    /// 검색용 keyed digest (hex)
    fn hash(&self, plaintext: &str) -> String;
}

/// SHA3 계열 기반 keeper
pub struct Sha3Keeper {
    key: [u8; KEY_LEN],
}

impl Sha3Keeper {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// 64자리 hex 키
    pub fn from_hex(key: &str) -> Result<Self, KeeperError> {
        let bytes = hex::decode(key.trim()).map_err(|e| KeeperError::InvalidKey(e.to_string()))?;
        let key: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| KeeperError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", b.len())))?;
        Ok(Self::new(key))
    }

    /// 개발 환경용 랜덤 키 (재시작하면 기존 암호문은 복호화 불가)
    pub fn random() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self::new(key)
    }

    fn keystream(&self, nonce: &[u8], len: usize) -> Vec<u8> {
        use sha3::digest::{ExtendableOutput, Update, XofReader};

        let mut shake = Shake256::default();
        shake.update(&self.key);
        shake.update(b"ach-verify/enc");
        shake.update(nonce);
        let mut out = vec![0u8; len];
        shake.finalize_xof().read(&mut out);
        out
    }

    fn tag(&self, nonce: &[u8], ciphertext: &[u8]) -> [u8; TAG_LEN] {
        let mut mac = Sha3_256::new();
        Digest::update(&mut mac, self.key);
        Digest::update(&mut mac, b"ach-verify/mac");
        Digest::update(&mut mac, nonce);
        Digest::update(&mut mac, ciphertext);
        mac.finalize().into()
    }
}

impl StringKeeper for Sha3Keeper {
    fn encrypt(&self, plaintext: &str) -> Result<String, KeeperError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext: Vec<u8> = plaintext
            .as_bytes()
            .iter()
            .zip(self.keystream(&nonce, plaintext.len()))
            .map(|(p, k)| p ^ k)
            .collect();
        let tag = self.tag(&nonce, &ciphertext);

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        sealed.extend_from_slice(&tag);
        Ok(hex::encode(sealed))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, KeeperError> {
        let sealed = hex::decode(ciphertext.trim()).map_err(|_| KeeperError::Malformed)?;
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(KeeperError::Malformed);
        }
        let (nonce, rest) = sealed.split_at(NONCE_LEN);
        let (body, tag) = rest.split_at(rest.len() - TAG_LEN);

        // 길이가 같은 비교라 early return 없이 전부 xor
        let expected = self.tag(nonce, body);
        let diff = expected.iter().zip(tag).fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff != 0 {
            return Err(KeeperError::Authentication);
        }

        let plaintext: Vec<u8> = body
            .iter()
            .zip(self.keystream(nonce, body.len()))
            .map(|(c, k)| c ^ k)
            .collect();
        String::from_utf8(plaintext).map_err(|_| KeeperError::Malformed)
    }

    fn hash(&self, plaintext: &str) -> String {
        let mut h = Sha3_256::new();
        Digest::update(&mut h, self.key);
        Digest::update(&mut h, b"ach-verify/hash");
        Digest::update(&mut h, plaintext.trim().as_bytes());
        hex::encode(h.finalize())
    }
}
