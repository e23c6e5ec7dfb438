//! Store Configuration
//!
//! 생성 시점 설정값. 기본값은 호스트 앱이 별도 설정 없이 쓸 수 있는 값으로 맞춤.
//! 환경 변수(.env 포함)로 개별 항목을 덮어쓸 수 있습니다.

use serde::Deserialize;

/// 기본 네임스페이스 prefix
pub const DEFAULT_NAMESPACE: &str = "secure_store:";
/// 키 로테이션 기본 주기 (24시간)
pub const DEFAULT_KEY_ROTATION_INTERVAL_MS: u64 = 86_400_000;
/// 만료 정리 기본 주기 (1시간)
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 3_600_000;
/// 항목 보존 기간 (7일)
pub const DEFAULT_RETENTION_MS: u64 = 7 * 24 * 60 * 60 * 1000;

const ENV_ENCRYPTION_ENABLED: &str = "CREDSTORE_ENCRYPTION_ENABLED";
const ENV_KEY_ROTATION_INTERVAL_MS: &str = "CREDSTORE_KEY_ROTATION_INTERVAL_MS";
const ENV_CLEANUP_INTERVAL_MS: &str = "CREDSTORE_CLEANUP_INTERVAL_MS";
const ENV_NAMESPACE: &str = "CREDSTORE_NAMESPACE";

/// SecureStore 설정
///
/// 주기 값이 0이면 해당 백그라운드 작업을 시작하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecureStoreConfig {
    pub encryption_enabled: bool,
    pub key_rotation_interval_ms: u64,
    pub cleanup_interval_ms: u64,
    pub retention_ms: u64,
    pub namespace: String,
}

impl Default for SecureStoreConfig {
    fn default() -> Self {
        Self {
            encryption_enabled: true,
            key_rotation_interval_ms: DEFAULT_KEY_ROTATION_INTERVAL_MS,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
            retention_ms: DEFAULT_RETENTION_MS,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl SecureStoreConfig {
    /// 기본값 + 환경 변수 오버라이드
    ///
    /// `.env` 파일이 있으면 먼저 로드합니다 (없어도 무시).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    /// 조회 함수로부터 설정 덮어쓰기. 잘못된 값은 경고 후 무시
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_ENCRYPTION_ENABLED) {
            match parse_bool(&raw) {
                Some(value) => self.encryption_enabled = value,
                None => tracing::warn!(var = ENV_ENCRYPTION_ENABLED, value = %raw, "ignoring invalid boolean"),
            }
        }

        if let Some(raw) = lookup(ENV_KEY_ROTATION_INTERVAL_MS) {
            match raw.trim().parse::<u64>() {
                Ok(value) => self.key_rotation_interval_ms = value,
                Err(e) => tracing::warn!(var = ENV_KEY_ROTATION_INTERVAL_MS, error = %e, "ignoring invalid interval"),
            }
        }

        if let Some(raw) = lookup(ENV_CLEANUP_INTERVAL_MS) {
            match raw.trim().parse::<u64>() {
                Ok(value) => self.cleanup_interval_ms = value,
                Err(e) => tracing::warn!(var = ENV_CLEANUP_INTERVAL_MS, error = %e, "ignoring invalid interval"),
            }
        }

        if let Some(raw) = lookup(ENV_NAMESPACE) {
            let raw = raw.trim();
            if raw.is_empty() {
                tracing::warn!(var = ENV_NAMESPACE, "ignoring empty namespace");
            } else {
                self.namespace = raw.to_string();
            }
        }
    }
}

/// 레거시 인증 항목 prefix
pub const DEFAULT_LEGACY_PREFIX: &str = "legacy_auth_";
/// 마이그레이션 기록 키 (SecureStore 네임스페이스 밖)
pub const DEFAULT_MIGRATION_RECORD_KEY: &str = "auth_migration_state";
/// 기능 플래그 스냅샷 키
pub const DEFAULT_FEATURE_GATE_KEY: &str = "feature_flags";

/// 마이그레이션 대상 인증 정보 이름 패턴
pub const DEFAULT_CREDENTIAL_PATTERNS: &[&str] = &[
    "access_token",
    "refresh_token",
    "id_token",
    "token_expiry",
    "expires_at",
    "user_profile",
    "provider_credential",
];

/// MigrationOrchestrator 설정
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MigrationConfig {
    pub legacy_prefix: String,
    pub record_key: String,
    pub feature_gate_key: String,
    pub from_flow: String,
    pub to_flow: String,
    pub credential_patterns: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            legacy_prefix: DEFAULT_LEGACY_PREFIX.to_string(),
            record_key: DEFAULT_MIGRATION_RECORD_KEY.to_string(),
            feature_gate_key: DEFAULT_FEATURE_GATE_KEY.to_string(),
            from_flow: "implicit".to_string(),
            to_flow: "pkce".to_string(),
            credential_patterns: DEFAULT_CREDENTIAL_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl MigrationConfig {
    /// 인증 정보 이름 여부 (패턴 부분 일치)
    pub fn is_credential_name(&self, name: &str) -> bool {
        self.credential_patterns
            .iter()
            .any(|pattern| name.contains(pattern.as_str()))
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
