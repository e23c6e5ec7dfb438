//! Secure Storage 모듈
//!
//! 대칭키 + 레코드 단위 AEAD 암호화로 인증 정보를 호스트 저장소에 보관합니다.
//!
//! - 키/salt는 같은 네임스페이스의 예약 이름으로 저장 (`key_material`, `salt`)
//! - 민감 항목은 레코드마다 새 nonce로 암호화
//! - 키는 주기적으로 교체되며 기존 레코드는 새 키로 재암호화

pub mod crypto;
pub mod key_material;
pub mod namespace;
pub mod record;
pub mod store;

pub use crypto::CryptoError;
pub use key_material::{KeyMaterialError, KeyMaterialManager, SaltOrigin};
pub use namespace::Namespace;
pub use record::{EncryptedRecord, PlainRecord, StoredRecord};
pub use store::{is_sensitive_key, InitState, RotationReport, SecureStore, StoreEvent};
