//! 레거시 인증 정보 마이그레이션
//!
//! 이전 (비암호화) 인증 플로우가 남긴 `legacy_auth_*` 항목을 SecureStore로 옮기고,
//! 결과를 네임스페이스 밖의 단일 기록(`auth_migration_state`)으로 남깁니다.
//! 롤백 시 역순으로 되돌립니다.

pub mod feature_gate;
pub mod orchestrator;

pub use feature_gate::{FeatureGateSnapshot, FeatureGateStore};
pub use orchestrator::MigrationOrchestrator;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// 마이그레이션 오류
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Host store error: {0}")]
    Host(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Legacy entry disappeared: {0}")]
    LegacyEntryMissing(String),

    #[error("Secure store value unreadable: {0}")]
    Unreadable(String),
}

impl MigrationError {
    /// 에러 분류 코드 (마이그레이션 기록/로그용)
    pub fn code(&self) -> &'static str {
        match self {
            MigrationError::Host(e) => e.code(),
            MigrationError::Serialization(_) => "SERIALIZATION_ERROR",
            MigrationError::LegacyEntryMissing(_) => "LEGACY_ENTRY_MISSING",
            MigrationError::Unreadable(_) => "UNREADABLE",
        }
    }
}

/// 마이그레이션 단일 기록
///
/// `completed`는 `errors`가 비어 있을 때만 true.
/// `migrated_items`에는 이동 후 레거시 항목까지 삭제된 이름만 기록합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub completed: bool,
    pub timestamp: i64,
    pub from_flow: String,
    pub to_flow: String,
    #[serde(default)]
    pub migrated_items: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// 마이그레이션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationState {
    NotNeeded,
    Needed,
    InProgress,
    Completed,
    /// 일부 항목 실패 (재실행으로 복구)
    Failed,
    RolledBack,
}

/// 관측용 상태 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    pub state: MigrationState,
    pub needed: bool,
    pub record: Option<MigrationRecord>,
    pub legacy_count: usize,
    pub migrated_count: usize,
}

/// 롤백 결과
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    pub restored: Vec<String>,
    pub errors: Vec<String>,
}
