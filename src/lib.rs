//! Secure Credential Store
//!
//! 호스트 앱의 키-값 저장소 위에서 동작하는 로컬 인증 정보 저장 엔진입니다.
//!
//! - `secrets`: 키 재료 관리, 레코드 암호화, 네임스페이스 저장소 (키 로테이션/만료 정리 포함)
//! - `migration`: 레거시 인증 항목을 암호화 저장소로 옮기고 되돌리는 오케스트레이터
//! - `host`: 호스트 저장소 추상화 (메모리, SQLite)

pub mod config;
pub mod error;
pub mod host;
pub mod migration;
pub mod secrets;

#[cfg(test)]
mod testing;

pub use config::{MigrationConfig, SecureStoreConfig};
pub use error::{StoreError, StoreResult};
pub use host::{HostPersistentStore, MemoryHostStore, SqliteHostStore};
pub use migration::{
    MigrationError, MigrationOrchestrator, MigrationRecord, MigrationState, MigrationStatus,
    RollbackReport,
};
pub use secrets::{InitState, KeyMaterialManager, SecureStore, StoreEvent};
