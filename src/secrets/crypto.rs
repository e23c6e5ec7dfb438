//! AEAD 암호화/복호화 및 키 재료 인코딩
//!
//! - 알고리즘: XChaCha20-Poly1305 (24 bytes nonce, 태그 포함 암호문)
//! - AAD: 설치별 salt (레코드를 해당 설치에 바인딩)
//! - 키/salt/nonce/암호문은 base64(STANDARD)로 인코딩하여 저장

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// 대칭키 길이 (256-bit)
pub const KEY_LEN: usize = 32;

/// 설치별 salt 길이
pub const SALT_LEN: usize = 16;

/// Nonce 길이 (XChaCha20-Poly1305용 24 bytes)
pub const NONCE_LEN: usize = 24;

/// 설치별 salt
pub type Salt = [u8; SALT_LEN];

/// 암호화 오류
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid encoding: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("Invalid length for {what}: expected {expected}, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Decrypted value is not valid UTF-8")]
    InvalidUtf8,
}

/// Zeroize가 적용된 대칭키 래퍼
///
/// `id`는 SHA-256 지문의 앞 8자리 hex로, 레코드가 어떤 키로 암호화됐는지 식별합니다.
pub struct SecretKey {
    bytes: [u8; KEY_LEN],
    id: String,
}

impl SecretKey {
    /// CSPRNG로 새 키 생성
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill(&mut bytes);
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        let id = key_id(&bytes);
        Self { bytes, id }
    }

    /// base64 인코딩된 키 디코딩
    pub fn from_encoded(encoded: &str) -> Result<Self, CryptoError> {
        let mut decoded = BASE64.decode(encoded.trim())?;
        let result = to_array::<KEY_LEN>("key", &decoded).map(Self::from_bytes);
        decoded.zeroize();
        result
    }

    pub fn encode(&self) -> String {
        BASE64.encode(self.bytes)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey").field("id", &self.id).finish_non_exhaustive()
    }
}

/// 키 지문 (SHA-256 앞 4 bytes, hex)
pub fn key_id(bytes: &[u8; KEY_LEN]) -> String {
    Sha256::digest(bytes)
        .iter()
        .take(4)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// 새 salt 생성
pub fn generate_salt() -> Salt {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill(&mut salt);
    salt
}

pub fn encode_salt(salt: &Salt) -> String {
    BASE64.encode(salt)
}

pub fn decode_salt(encoded: &str) -> Result<Salt, CryptoError> {
    let decoded = BASE64.decode(encoded.trim())?;
    to_array::<SALT_LEN>("salt", &decoded)
}

/// 평문을 암호화하고 (암호문, nonce)를 반환. 호출마다 새 랜덤 nonce 사용
pub fn encrypt(
    key: &SecretKey,
    salt: &Salt,
    plaintext: &str,
) -> Result<(Vec<u8>, [u8; NONCE_LEN]), CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill(&mut nonce);

    let cipher = XChaCha20Poly1305::new(key.bytes().into());
    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext.as_bytes(),
                aad: salt,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok((ciphertext, nonce))
}

/// 암호문 복호화 (키/nonce/salt 중 하나라도 다르거나 변조되면 실패)
pub fn decrypt(
    key: &SecretKey,
    salt: &Salt,
    ciphertext: &[u8],
    nonce: &[u8],
) -> Result<String, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::InvalidLength {
            what: "nonce",
            expected: NONCE_LEN,
            actual: nonce.len(),
        });
    }

    let cipher = XChaCha20Poly1305::new(key.bytes().into());
    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: salt,
            },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    String::from_utf8(plaintext).map_err(|e| {
        let mut bytes = e.into_bytes();
        bytes.zeroize();
        CryptoError::InvalidUtf8
    })
}

fn to_array<const N: usize>(what: &'static str, bytes: &[u8]) -> Result<[u8; N], CryptoError> {
    if bytes.len() != N {
        return Err(CryptoError::InvalidLength {
            what,
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}
