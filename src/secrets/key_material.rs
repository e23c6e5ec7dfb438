//! Key Material Manager - 대칭키/salt 관리 및 암복호화
//!
//! - 키와 salt는 네임스페이스 아래 예약 이름(`key_material`, `salt`)으로 저장
//! - 키 자체는 암호화하지 않음 (부트스트랩 문제)
//! - 로테이션 중에는 이전 키를 함께 보관하고 레코드의 `keyId`로 키를 선택

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::host::HostPersistentStore;
use crate::secrets::crypto::{
    self, decode_salt, encode_salt, generate_salt, CryptoError, Salt, SecretKey,
};
use crate::secrets::namespace::{Namespace, KEY_MATERIAL_NAME, SALT_NAME};
use crate::secrets::record::EncryptedRecord;

/// 레거시 고정 salt.
///
/// salt를 저장하지 않던 이전 버전이 남긴 키 재료와의 호환을 위한 값으로,
/// 모든 설치가 같은 값을 공유하므로 보안상 약합니다. 키 재료는 있는데 salt가
/// 없을 때만 사용합니다.
pub const LEGACY_STATIC_SALT: Salt = *b"legacy-auth-salt";

/// Key Material Manager 오류
#[derive(Debug, thiserror::Error)]
pub enum KeyMaterialError {
    #[error("Key material not initialized")]
    NotInitialized,

    #[error("Host store error: {0}")]
    Host(#[from] StoreError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("Invalid salt: {0}")]
    InvalidSalt(String),

    #[error("No rotation in progress")]
    NoRotationInProgress,
}

/// salt 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaltOrigin {
    /// 이전에 저장된 salt
    Persisted,
    /// 이번 초기화에서 새로 생성
    Generated,
    /// 레거시 키 재료 호환용 고정 salt
    LegacyStatic,
}

/// 키 로테이션 결과 (이전/새 키 지문)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRotation {
    pub previous_key_id: String,
    pub current_key_id: String,
}

struct KeyRing {
    current: SecretKey,
    previous: Option<SecretKey>,
    salt: Salt,
    salt_origin: SaltOrigin,
}

impl KeyRing {
    /// 레코드의 keyId에 맞는 키 선택. 모르는 id는 현재 키로 시도
    fn key_for(&self, key_id: Option<&str>) -> &SecretKey {
        match (key_id, &self.previous) {
            (Some(id), Some(previous)) if id == previous.id() => previous,
            _ => &self.current,
        }
    }
}

pub struct KeyMaterialManager {
    host: Arc<dyn HostPersistentStore>,
    namespace: Namespace,
    ring: RwLock<Option<KeyRing>>,
}

impl KeyMaterialManager {
    pub fn new(host: Arc<dyn HostPersistentStore>, namespace: Namespace) -> Self {
        Self {
            host,
            namespace,
            ring: RwLock::new(None),
        }
    }

    /// 초기화
    ///
    /// 1. salt 로드 (없으면 레거시 고정 salt 또는 새로 생성)
    /// 2. 키 로드 (없으면 생성하고 저장)
    pub async fn initialize(&self) -> Result<SaltOrigin, KeyMaterialError> {
        let salt_key = self.namespace.storage_key(SALT_NAME);
        let key_material_key = self.namespace.storage_key(KEY_MATERIAL_NAME);

        let stored_salt = self.host.get(&salt_key)?;
        let stored_key = self.host.get(&key_material_key)?;

        let (salt, salt_origin) = match stored_salt {
            Some(encoded) => {
                let salt = decode_salt(&encoded)
                    .map_err(|e| KeyMaterialError::InvalidSalt(e.to_string()))?;
                (salt, SaltOrigin::Persisted)
            }
            None if stored_key.is_some() => {
                tracing::warn!(
                    namespace = self.namespace.prefix(),
                    "key material without salt; using legacy static salt"
                );
                (LEGACY_STATIC_SALT, SaltOrigin::LegacyStatic)
            }
            None => {
                let salt = generate_salt();
                self.host.set(&salt_key, &encode_salt(&salt))?;
                tracing::info!(namespace = self.namespace.prefix(), "generated new salt");
                (salt, SaltOrigin::Generated)
            }
        };

        let current = match stored_key {
            Some(encoded) => SecretKey::from_encoded(&encoded)
                .map_err(|e| KeyMaterialError::InvalidKeyMaterial(e.to_string()))?,
            None => {
                let key = SecretKey::generate();
                self.host.set(&key_material_key, &key.encode())?;
                tracing::info!(key_id = key.id(), "generated new key material");
                key
            }
        };

        tracing::info!(key_id = current.id(), ?salt_origin, "key material ready");

        *self.ring.write().await = Some(KeyRing {
            current,
            previous: None,
            salt,
            salt_origin,
        });

        Ok(salt_origin)
    }

    pub async fn is_initialized(&self) -> bool {
        self.ring.read().await.is_some()
    }

    pub async fn current_key_id(&self) -> Option<String> {
        self.ring
            .read()
            .await
            .as_ref()
            .map(|ring| ring.current.id().to_string())
    }

    pub async fn salt_origin(&self) -> Option<SaltOrigin> {
        self.ring.read().await.as_ref().map(|ring| ring.salt_origin)
    }

    /// 현재 키로 암호화
    pub async fn encrypt(
        &self,
        plaintext: &str,
        created_at: i64,
    ) -> Result<EncryptedRecord, KeyMaterialError> {
        let ring = self.ring.read().await;
        let ring = ring.as_ref().ok_or(KeyMaterialError::NotInitialized)?;
        let (ciphertext, nonce) = crypto::encrypt(&ring.current, &ring.salt, plaintext)?;
        Ok(EncryptedRecord::new(
            &ciphertext,
            &nonce,
            ring.current.id(),
            created_at,
        ))
    }

    /// 레코드 복호화 (keyId로 현재/이전 키 선택)
    pub async fn decrypt(&self, record: &EncryptedRecord) -> Result<String, KeyMaterialError> {
        let ring = self.ring.read().await;
        let ring = ring.as_ref().ok_or(KeyMaterialError::NotInitialized)?;
        let key = ring.key_for(record.key_id.as_deref());
        decrypt_with(key, &ring.salt, record)
    }

    /// 새 키 생성 및 저장. 기존 키는 이전 키로 보관
    pub async fn rotate_key(&self) -> Result<KeyRotation, KeyMaterialError> {
        let mut ring = self.ring.write().await;
        let ring = ring.as_mut().ok_or(KeyMaterialError::NotInitialized)?;

        let new_key = SecretKey::generate();
        self.host.set(
            &self.namespace.storage_key(KEY_MATERIAL_NAME),
            &new_key.encode(),
        )?;

        let previous = std::mem::replace(&mut ring.current, new_key);
        let rotation = KeyRotation {
            previous_key_id: previous.id().to_string(),
            current_key_id: ring.current.id().to_string(),
        };
        ring.previous = Some(previous);
        Ok(rotation)
    }

    /// 이전 키로 복호화 후 현재 키로 재암호화 (로테이션 전용 경로)
    ///
    /// 일반 읽기와 달리 레코드의 keyId와 무관하게 항상 이전 키를 사용합니다.
    pub async fn reencrypt(
        &self,
        record: &EncryptedRecord,
    ) -> Result<EncryptedRecord, KeyMaterialError> {
        let ring = self.ring.read().await;
        let ring = ring.as_ref().ok_or(KeyMaterialError::NotInitialized)?;
        let previous = ring
            .previous
            .as_ref()
            .ok_or(KeyMaterialError::NoRotationInProgress)?;

        let mut plaintext = decrypt_with(previous, &ring.salt, record)?;
        let result = crypto::encrypt(&ring.current, &ring.salt, &plaintext);
        zeroize::Zeroize::zeroize(&mut plaintext);
        let (ciphertext, nonce) = result?;

        Ok(EncryptedRecord::new(
            &ciphertext,
            &nonce,
            ring.current.id(),
            record.created_at,
        ))
    }

    /// 로테이션 종료: 이전 키 폐기
    pub async fn finish_rotation(&self) {
        if let Some(ring) = self.ring.write().await.as_mut() {
            ring.previous = None;
        }
    }

    /// 메모리상의 키 재료 폐기 (전체 초기화 후 재생성용)
    pub async fn reset(&self) {
        *self.ring.write().await = None;
    }
}

fn decrypt_with(
    key: &SecretKey,
    salt: &Salt,
    record: &EncryptedRecord,
) -> Result<String, KeyMaterialError> {
    let ciphertext = record.ciphertext_bytes()?;
    let nonce = record.nonce_bytes()?;
    Ok(crypto::decrypt(key, salt, &ciphertext, &nonce)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHostStore;

    fn manager(host: &Arc<MemoryHostStore>) -> KeyMaterialManager {
        KeyMaterialManager::new(host.clone(), Namespace::new("ns:"))
    }

    #[tokio::test]
    async fn test_initialize_generates_and_persists_material() {
        let host = Arc::new(MemoryHostStore::new());
        let keys = manager(&host);

        assert_eq!(keys.initialize().await.unwrap(), SaltOrigin::Generated);
        assert!(host.get("ns:key_material").unwrap().is_some());
        assert!(host.get("ns:salt").unwrap().is_some());

        let record = keys.encrypt("secret", 1).await.unwrap();

        // 같은 저장소로 다시 초기화하면 같은 키/salt를 사용해야 함
        let reloaded = manager(&host);
        assert_eq!(reloaded.initialize().await.unwrap(), SaltOrigin::Persisted);
        assert_eq!(reloaded.current_key_id().await, keys.current_key_id().await);
        assert_eq!(reloaded.decrypt(&record).await.unwrap(), "secret");
    }

    #[tokio::test]
    async fn test_legacy_key_without_salt_uses_static_salt() {
        let host = Arc::new(MemoryHostStore::new());
        let legacy_key = SecretKey::generate();
        host.set("ns:key_material", &legacy_key.encode()).unwrap();

        let keys = manager(&host);
        assert_eq!(keys.initialize().await.unwrap(), SaltOrigin::LegacyStatic);
        assert_eq!(keys.salt_origin().await, Some(SaltOrigin::LegacyStatic));
        assert_eq!(keys.current_key_id().await.as_deref(), Some(legacy_key.id()));

        // 레거시 데이터는 고정 salt로 암호화되어 있음
        let (ciphertext, nonce) =
            crypto::encrypt(&legacy_key, &LEGACY_STATIC_SALT, "old-token").unwrap();
        let record = EncryptedRecord::new(&ciphertext, &nonce, legacy_key.id(), 0);
        assert_eq!(keys.decrypt(&record).await.unwrap(), "old-token");
        assert!(host.get("ns:salt").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_key_material_fails_initialization() {
        let host = Arc::new(MemoryHostStore::new());
        host.set("ns:salt", &encode_salt(&generate_salt())).unwrap();
        host.set("ns:key_material", "c2hvcnQ=").unwrap();

        let keys = manager(&host);
        assert!(matches!(
            keys.initialize().await,
            Err(KeyMaterialError::InvalidKeyMaterial(_))
        ));
        assert!(!keys.is_initialized().await);
    }

    #[tokio::test]
    async fn test_encrypt_before_initialize_fails() {
        let host = Arc::new(MemoryHostStore::new());
        let keys = manager(&host);
        assert!(matches!(
            keys.encrypt("x", 0).await,
            Err(KeyMaterialError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_rotation_reads_old_records_until_finished() {
        let host = Arc::new(MemoryHostStore::new());
        let keys = manager(&host);
        keys.initialize().await.unwrap();

        let old_record = keys.encrypt("refresh", 5).await.unwrap();
        let rotation = keys.rotate_key().await.unwrap();
        assert_ne!(rotation.previous_key_id, rotation.current_key_id);
        let persisted = SecretKey::from_encoded(&host.get("ns:key_material").unwrap().unwrap()).unwrap();
        assert_eq!(persisted.id(), rotation.current_key_id);

        // 로테이션 중에는 keyId로 이전 키가 선택됨
        assert_eq!(keys.decrypt(&old_record).await.unwrap(), "refresh");

        let rotated = keys.reencrypt(&old_record).await.unwrap();
        assert_eq!(rotated.created_at, 5);
        assert_eq!(rotated.key_id.as_deref(), Some(rotation.current_key_id.as_str()));
        assert_ne!(rotated.nonce, old_record.nonce);

        keys.finish_rotation().await;
        assert_eq!(keys.decrypt(&rotated).await.unwrap(), "refresh");
        assert!(keys.decrypt(&old_record).await.is_err());
        assert!(matches!(
            keys.reencrypt(&rotated).await,
            Err(KeyMaterialError::NoRotationInProgress)
        ));
    }
}
