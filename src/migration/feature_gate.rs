//! 기능 플래그 스냅샷
//!
//! 별도 컴포넌트가 저장한 플래그 스냅샷을 호스트 저장소에서 직접 읽습니다.
//! 메모리상의 플래그가 아니라 저장된 값을 기준으로 판단합니다.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::host::HostPersistentStore;
use crate::migration::MigrationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureGateSnapshot {
    pub new_auth_flow: bool,
    pub secure_storage: bool,
}

impl FeatureGateSnapshot {
    /// 마이그레이션 허용 여부 (두 플래그 모두 켜져 있어야 함)
    pub fn allows_migration(&self) -> bool {
        self.new_auth_flow && self.secure_storage
    }
}

pub struct FeatureGateStore {
    host: Arc<dyn HostPersistentStore>,
    key: String,
}

impl FeatureGateStore {
    pub fn new(host: Arc<dyn HostPersistentStore>, key: impl Into<String>) -> Self {
        Self {
            host,
            key: key.into(),
        }
    }

    /// 스냅샷 로드. 저장된 값이 없으면 모두 꺼진 상태
    pub fn load(&self) -> Result<FeatureGateSnapshot, MigrationError> {
        match self.host.get(&self.key)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(FeatureGateSnapshot::default()),
        }
    }

    pub fn save(&self, snapshot: &FeatureGateSnapshot) -> Result<(), MigrationError> {
        self.host.set(&self.key, &serde_json::to_string(snapshot)?)?;
        Ok(())
    }

    /// 마이그레이션을 허용한 두 플래그를 끔
    pub fn disable_migration_gates(&self) -> Result<(), MigrationError> {
        let mut snapshot = self.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unreadable feature gate snapshot; overwriting");
            FeatureGateSnapshot::default()
        });
        snapshot.new_auth_flow = false;
        snapshot.secure_storage = false;
        self.save(&snapshot)
    }
}
