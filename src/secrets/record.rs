//! 저장 레코드 포맷
//!
//! 네임스페이스 아래 각 항목은 JSON으로 저장되며 `type` 태그로 구분합니다.
//!
//! ```json
//! {"type":"encrypted","ciphertext":"…","nonce":"…","createdAt":1700000000000,"keyId":"9f2c01ab"}
//! {"type":"plain","value":"dark","timestamp":1700000000000}
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::secrets::crypto::{CryptoError, NONCE_LEN};

/// 민감 항목의 저장 형태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedRecord {
    /// base64(암호문 + 태그)
    pub ciphertext: String,
    /// base64(24 bytes nonce)
    pub nonce: String,
    /// 생성 시각 (epoch ms, 만료 판정용)
    pub created_at: i64,
    /// 암호화에 사용된 키 지문. 구버전 레코드에는 없을 수 있음
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

impl EncryptedRecord {
    pub fn new(ciphertext: &[u8], nonce: &[u8; NONCE_LEN], key_id: &str, created_at: i64) -> Self {
        Self {
            ciphertext: BASE64.encode(ciphertext),
            nonce: BASE64.encode(nonce),
            created_at,
            key_id: Some(key_id.to_string()),
        }
    }

    pub fn ciphertext_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(BASE64.decode(&self.ciphertext)?)
    }

    pub fn nonce_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(BASE64.decode(&self.nonce)?)
    }
}

/// 비민감 항목의 저장 형태 (값은 그대로 보관)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainRecord {
    pub value: String,
    pub timestamp: i64,
}

/// 네임스페이스 항목의 저장 형태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoredRecord {
    Encrypted(EncryptedRecord),
    Plain(PlainRecord),
}

impl StoredRecord {
    pub fn plain(value: &str, timestamp: i64) -> Self {
        StoredRecord::Plain(PlainRecord {
            value: value.to_string(),
            timestamp,
        })
    }

    /// 만료 판정 기준 시각
    pub fn timestamp(&self) -> i64 {
        match self {
            StoredRecord::Encrypted(record) => record.created_at,
            StoredRecord::Plain(record) => record.timestamp,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
