//! Credential Store Error Types
//!
//! 호스트 저장소 계층 에러 타입 정의

use thiserror::Error;

/// 호스트 저장소(HostPersistentStore) 에러
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Host store error: {0}")]
    Backend(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Reserved key: {0}")]
    ReservedKey(String),
}

impl StoreError {
    /// 에러 분류 코드 (로그/마이그레이션 기록용)
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Database(_) => "DB_ERROR",
            StoreError::Io(_) => "IO_ERROR",
            StoreError::Serialization(_) => "SERIALIZATION_ERROR",
            StoreError::Backend(_) => "HOST_STORE_ERROR",
            StoreError::LockPoisoned(_) => "LOCK_ERROR",
            StoreError::ReservedKey(_) => "RESERVED_KEY",
        }
    }
}

/// 호스트 저장소 결과 타입
pub type StoreResult<T> = Result<T, StoreError>;
