//! Migration Orchestrator
//!
//! 상태: not-needed → needed → in-progress → completed | failed (부분 실패),
//! completed → rolled-back.
//!
//! 항목 단위로 처리하며 전체 과정은 원자적이지 않습니다. 중간에 끊긴 마이그레이션은
//! `migrate_to_pkce()`를 다시 호출하면 남은 레거시 항목만 이어서 처리합니다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::MigrationConfig;
use crate::host::HostPersistentStore;
use crate::migration::{
    FeatureGateStore, MigrationError, MigrationRecord, MigrationState, MigrationStatus,
    RollbackReport,
};
use crate::secrets::SecureStore;

pub struct MigrationOrchestrator {
    host: Arc<dyn HostPersistentStore>,
    config: MigrationConfig,
    gates: FeatureGateStore,
    /// migrate/rollback 직렬화
    run_lock: tokio::sync::Mutex<()>,
    rolled_back: AtomicBool,
}

impl MigrationOrchestrator {
    pub fn new(host: Arc<dyn HostPersistentStore>, config: MigrationConfig) -> Self {
        let gates = FeatureGateStore::new(host.clone(), config.feature_gate_key.clone());
        Self {
            host,
            config,
            gates,
            run_lock: tokio::sync::Mutex::new(()),
            rolled_back: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn feature_gates(&self) -> &FeatureGateStore {
        &self.gates
    }

    /// 저장된 마이그레이션 기록
    pub fn load_record(&self) -> Result<Option<MigrationRecord>, MigrationError> {
        match self.host.get(&self.config.record_key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save_record(&self, record: &MigrationRecord) -> Result<(), MigrationError> {
        self.host
            .set(&self.config.record_key, &serde_json::to_string(record)?)?;
        Ok(())
    }

    /// 레거시 인증 항목의 저장 키 목록 (호스트 열거 순서)
    fn legacy_entries(&self) -> Result<Vec<String>, MigrationError> {
        let prefix = self.config.legacy_prefix.as_str();
        Ok(self
            .host
            .keys()?
            .into_iter()
            .filter(|key| {
                key.strip_prefix(prefix)
                    .is_some_and(|name| self.config.is_credential_name(name))
            })
            .collect())
    }

    /// SecureStore 안의 인증 항목 이름 목록
    async fn migrated_entries(&self, store: &SecureStore) -> Result<Vec<String>, MigrationError> {
        Ok(store
            .keys()
            .await?
            .into_iter()
            .filter(|name| self.config.is_credential_name(name))
            .collect())
    }

    /// 마이그레이션 필요 여부
    ///
    /// 1. 저장된 플래그 스냅샷에서 두 플래그 모두 켜짐
    /// 2. 완료된 마이그레이션 기록 없음
    /// 3. 레거시 인증 항목이 1개 이상 존재
    ///
    /// 스냅샷/기록을 읽지 못하면 보수적으로 false.
    pub fn is_migration_needed(&self) -> bool {
        match self.gates.load() {
            Ok(snapshot) if snapshot.allows_migration() => {}
            Ok(_) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable feature gate snapshot; migration not needed");
                return false;
            }
        }

        match self.load_record() {
            Ok(Some(record)) if record.completed => return false,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "unreadable migration record; migration not needed");
                return false;
            }
        }

        match self.legacy_entries() {
            Ok(entries) => !entries.is_empty(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to enumerate legacy entries");
                false
            }
        }
    }

    /// 레거시 항목을 SecureStore로 이동
    ///
    /// 항목별 실패는 `errors`에 기록하고 계속 진행하며, 실패한 레거시 항목은 삭제하지 않습니다.
    /// 기록은 성공/실패와 관계없이 저장합니다.
    pub async fn migrate_to_pkce(
        &self,
        store: &SecureStore,
    ) -> Result<MigrationRecord, MigrationError> {
        let _run = self.run_lock.lock().await;
        self.rolled_back.store(false, Ordering::SeqCst);

        let legacy = self.legacy_entries()?;
        let mut record = MigrationRecord {
            completed: false,
            timestamp: now_ms(),
            from_flow: self.config.from_flow.clone(),
            to_flow: self.config.to_flow.clone(),
            migrated_items: Vec::new(),
            errors: Vec::new(),
        };

        if legacy.is_empty() {
            record.completed = true;
            self.save_record(&record)?;
            tracing::info!("no legacy credentials; migration marked complete");
            return Ok(record);
        }

        // 시도 시작 기록
        self.save_record(&record)?;
        tracing::info!(count = legacy.len(), "migrating legacy credentials");

        for legacy_key in legacy {
            let name = match legacy_key.strip_prefix(self.config.legacy_prefix.as_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            match self.migrate_item(store, &legacy_key, &name).await {
                Ok(()) => {
                    tracing::debug!(item = %name, "legacy credential migrated");
                    record.migrated_items.push(name);
                }
                Err(e) => {
                    tracing::warn!(item = %name, code = e.code(), error = %e, "legacy credential migration failed");
                    record.errors.push(format!("{}: [{}] {}", name, e.code(), e));
                }
            }
        }

        record.completed = record.errors.is_empty();
        record.timestamp = now_ms();
        self.save_record(&record)?;

        tracing::info!(
            completed = record.completed,
            migrated = record.migrated_items.len(),
            failed = record.errors.len(),
            "legacy credential migration finished"
        );
        Ok(record)
    }

    async fn migrate_item(
        &self,
        store: &SecureStore,
        legacy_key: &str,
        name: &str,
    ) -> Result<(), MigrationError> {
        let value = self
            .host
            .get(legacy_key)?
            .ok_or_else(|| MigrationError::LegacyEntryMissing(legacy_key.to_string()))?;
        store.set_item(name, &value).await?;
        self.host.delete(legacy_key)?;
        Ok(())
    }

    /// 마이그레이션 되돌리기
    ///
    /// SecureStore의 인증 항목을 복호화하여 레거시 prefix로 복원하고 SecureStore에서 제거합니다.
    /// 이후 기록을 삭제하고 마이그레이션 플래그를 끕니다. 항목별 실패는 기록 후 계속 진행합니다.
    pub async fn rollback_migration(
        &self,
        store: &SecureStore,
    ) -> Result<RollbackReport, MigrationError> {
        let _run = self.run_lock.lock().await;
        let mut report = RollbackReport::default();

        for name in self.migrated_entries(store).await? {
            match self.rollback_item(store, &name).await {
                Ok(()) => {
                    tracing::debug!(item = %name, "credential restored to legacy storage");
                    report.restored.push(name);
                }
                Err(e) => {
                    tracing::warn!(item = %name, code = e.code(), error = %e, "credential rollback failed");
                    report.errors.push(format!("{}: [{}] {}", name, e.code(), e));
                }
            }
        }

        self.host.delete(&self.config.record_key)?;
        self.gates.disable_migration_gates()?;
        self.rolled_back.store(true, Ordering::SeqCst);

        tracing::info!(
            restored = report.restored.len(),
            failed = report.errors.len(),
            "migration rolled back"
        );
        Ok(report)
    }

    async fn rollback_item(&self, store: &SecureStore, name: &str) -> Result<(), MigrationError> {
        let value = store
            .get_item(name)
            .await
            .ok_or_else(|| MigrationError::Unreadable(name.to_string()))?;
        self.host
            .set(&format!("{}{}", self.config.legacy_prefix, name), &value)?;
        store.remove_item(name).await?;
        Ok(())
    }

    /// 현재 상태
    pub fn state(&self) -> MigrationState {
        if self.run_lock.try_lock().is_err() {
            return MigrationState::InProgress;
        }
        match self.load_record() {
            Ok(Some(record)) if record.completed => return MigrationState::Completed,
            Ok(Some(_)) => return MigrationState::Failed,
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "unreadable migration record"),
        }
        if self.rolled_back.load(Ordering::SeqCst) {
            return MigrationState::RolledBack;
        }
        if self.is_migration_needed() {
            MigrationState::Needed
        } else {
            MigrationState::NotNeeded
        }
    }

    /// 관측용 상태 요약 (읽기 전용)
    pub async fn migration_status(
        &self,
        store: &SecureStore,
    ) -> Result<MigrationStatus, MigrationError> {
        Ok(MigrationStatus {
            state: self.state(),
            needed: self.is_migration_needed(),
            record: self.load_record()?,
            legacy_count: self.legacy_entries()?.len(),
            migrated_count: self.migrated_entries(store).await?.len(),
        })
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
