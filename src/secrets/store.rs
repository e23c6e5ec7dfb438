//! Secure Store - 네임스페이스 기반 인증 정보 저장소
//!
//! - 민감 키(token, expiry, user_profile …)는 암호화 레코드로 저장
//! - 그 외 키는 평문 레코드로 저장
//! - 모든 연산은 초기화 완료를 기다린 뒤 실행
//! - 키 로테이션/만료 정리 백그라운드 작업 보유 (`shutdown()`으로 중지)

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SecureStoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::host::HostPersistentStore;
use crate::secrets::key_material::{KeyMaterialError, KeyMaterialManager};
use crate::secrets::namespace::Namespace;
use crate::secrets::record::{EncryptedRecord, StoredRecord};

/// 민감 키 판별용 부분 문자열
pub const SENSITIVE_KEY_MARKERS: &[&str] = &[
    "token",
    "expiry",
    "expires_at",
    "user_profile",
    "provider_credential",
];

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// 민감 키 여부 (대소문자 무시)
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEY_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// 초기화 상태
#[derive(Debug, Clone, PartialEq)]
pub enum InitState {
    NotInitialized,
    Ready,
    /// 암호화 비활성 (설정 또는 초기화 실패). 이후 쓰기는 평문 저장
    Disabled(String),
}

/// 저장소 상태 변경 알림
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    ItemSet { key: String, encrypted: bool },
    ItemRemoved { key: String },
    Cleared,
    KeyRotated { key_id: String, rotated: usize, failed: usize },
    ExpiredPurged { count: usize },
    EncryptionDisabled { reason: String },
}

/// 키 로테이션 1회 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// 새 키 지문 (암호화 비활성이면 `None`)
    pub key_id: Option<String>,
    pub rotated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy)]
enum Schedule {
    KeyRotation,
    Cleanup,
}

struct StoreInner {
    host: Arc<dyn HostPersistentStore>,
    namespace: Namespace,
    config: SecureStoreConfig,
    keys: KeyMaterialManager,
    /// 초기화 배리어 (FIFO 대기)
    init: tokio::sync::Mutex<InitState>,
    /// 로테이션끼리만 직렬화. 일반 쓰기와는 배타적이지 않으며, 멀티스레드 런타임에서는
    /// `rotate_record`의 재확인과 쓰기 사이에 들어온 `set_item`이 덮어써질 수 있음
    rotation_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<StoreEvent>,
}

/// Secure Store
///
/// tokio 런타임 안에서 생성해야 합니다. 생성 즉시 백그라운드에서 초기화를 시작하고
/// 설정된 주기로 키 로테이션/만료 정리를 실행합니다.
///
/// 로테이션 중인 항목에 대한 동시 쓰기는 멀티스레드 런타임에서 유실될 수 있습니다
/// (로테이션이 재확인 후 이전 값을 다시 씀). 단일 스레드 런타임에서는 발생하지 않습니다.
pub struct SecureStore {
    inner: Arc<StoreInner>,
    schedules: Mutex<Vec<JoinHandle<()>>>,
}

impl SecureStore {
    pub fn new(host: Arc<dyn HostPersistentStore>, config: SecureStoreConfig) -> Self {
        let namespace = Namespace::new(config.namespace.clone());
        let initial_state = if config.encryption_enabled {
            InitState::NotInitialized
        } else {
            InitState::Disabled("encryption disabled by configuration".to_string())
        };
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let inner = Arc::new(StoreInner {
            keys: KeyMaterialManager::new(host.clone(), namespace.clone()),
            host,
            namespace,
            config,
            init: tokio::sync::Mutex::new(initial_state),
            rotation_lock: tokio::sync::Mutex::new(()),
            events,
        });

        let kickoff = Arc::clone(&inner);
        tokio::spawn(async move {
            kickoff.ensure_initialized().await;
        });

        let store = Self {
            inner,
            schedules: Mutex::new(Vec::new()),
        };
        store.start_schedules();
        store
    }

    fn start_schedules(&self) {
        let mut handles = Vec::new();
        let config = &self.inner.config;

        if config.key_rotation_interval_ms > 0 {
            handles.push(spawn_schedule(
                Arc::clone(&self.inner),
                Duration::from_millis(config.key_rotation_interval_ms),
                Schedule::KeyRotation,
            ));
        }
        if config.cleanup_interval_ms > 0 {
            handles.push(spawn_schedule(
                Arc::clone(&self.inner),
                Duration::from_millis(config.cleanup_interval_ms),
                Schedule::Cleanup,
            ));
        }

        match self.schedules.lock() {
            Ok(mut schedules) => schedules.extend(handles),
            Err(poisoned) => poisoned.into_inner().extend(handles),
        }
    }

    /// 백그라운드 작업 중지. 저장된 데이터는 유지
    pub fn shutdown(&self) {
        let mut schedules = match self.schedules.lock() {
            Ok(schedules) => schedules,
            Err(poisoned) => poisoned.into_inner(),
        };
        for handle in schedules.drain(..) {
            handle.abort();
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.inner.namespace
    }

    /// 초기화를 기다린 뒤 암호화 사용 여부 반환
    pub async fn is_encryption_active(&self) -> bool {
        self.inner.ensure_initialized().await
    }

    pub async fn init_state(&self) -> InitState {
        self.inner.ensure_initialized().await;
        self.inner.init.lock().await.clone()
    }

    pub async fn current_key_id(&self) -> Option<String> {
        self.inner.ensure_initialized().await;
        self.inner.keys.current_key_id().await
    }

    /// 값 저장
    ///
    /// 민감 키는 암호화하며, 암호화 실패 시 해당 호출만 평문으로 저장합니다.
    pub async fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.set_item(key, value).await
    }

    /// 값 조회
    ///
    /// 없음, 복호화 실패, 손상된 레코드, 호스트 읽기 실패는 모두 `None`.
    pub async fn get_item(&self, key: &str) -> Option<String> {
        self.inner.get_item(key).await
    }

    pub async fn remove_item(&self, key: &str) -> StoreResult<()> {
        self.inner.ensure_initialized().await;
        if Namespace::is_reserved(key) {
            return Err(StoreError::ReservedKey(key.to_string()));
        }
        self.inner.host.delete(&self.inner.namespace.storage_key(key))?;
        self.inner.emit(StoreEvent::ItemRemoved {
            key: key.to_string(),
        });
        Ok(())
    }

    /// 네임스페이스 전체 삭제 (키 재료 포함)
    ///
    /// 암호화가 활성 상태였다면 다음 연산에서 새 키 재료를 생성합니다.
    pub async fn clear(&self) -> StoreResult<()> {
        self.inner.clear().await
    }

    /// 논리 키 목록 (키 재료 제외, 호스트 열거 순서)
    pub async fn keys(&self) -> StoreResult<Vec<String>> {
        self.inner.ensure_initialized().await;
        self.inner.logical_keys()
    }

    pub async fn length(&self) -> StoreResult<usize> {
        Ok(self.keys().await?.len())
    }

    pub async fn key(&self, index: usize) -> StoreResult<Option<String>> {
        Ok(self.keys().await?.into_iter().nth(index))
    }

    /// 키 로테이션 1회 실행
    pub async fn rotate_keys(&self) -> Result<RotationReport, KeyMaterialError> {
        self.inner.rotate_keys().await
    }

    /// 만료 정리 1회 실행. 삭제된 항목 수 반환
    pub async fn cleanup_expired(&self) -> StoreResult<usize> {
        self.inner.cleanup_expired().await
    }
}

impl Drop for SecureStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_schedule(inner: Arc<StoreInner>, period: Duration, schedule: Schedule) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 첫 tick은 즉시 발생하므로 건너뜀
        interval.tick().await;

        loop {
            interval.tick().await;
            match schedule {
                Schedule::KeyRotation => {
                    if let Err(e) = inner.rotate_keys().await {
                        tracing::warn!(error = %e, "scheduled key rotation failed");
                    }
                }
                Schedule::Cleanup => {
                    if let Err(e) = inner.cleanup_expired().await {
                        tracing::warn!(code = e.code(), error = %e, "scheduled cleanup failed");
                    }
                }
            }
        }
    })
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl StoreInner {
    fn emit(&self, event: StoreEvent) {
        // 구독자가 없으면 무시
        let _ = self.events.send(event);
    }

    /// 초기화 배리어. 암호화 사용 가능 여부 반환
    async fn ensure_initialized(&self) -> bool {
        let mut state = self.init.lock().await;
        if *state == InitState::NotInitialized {
            *state = match self.keys.initialize().await {
                Ok(_) => InitState::Ready,
                Err(e) => {
                    tracing::warn!(error = %e, "secure storage initialization failed; encryption disabled");
                    self.emit(StoreEvent::EncryptionDisabled {
                        reason: e.to_string(),
                    });
                    InitState::Disabled(e.to_string())
                }
            };
        }
        *state == InitState::Ready
    }

    fn logical_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .host
            .keys()?
            .iter()
            .filter_map(|storage_key| self.namespace.logical_name(storage_key))
            .filter(|logical| !Namespace::is_reserved(logical))
            .map(str::to_string)
            .collect())
    }

    async fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        let encryption_active = self.ensure_initialized().await;
        if Namespace::is_reserved(key) {
            return Err(StoreError::ReservedKey(key.to_string()));
        }

        let now = now_ms();
        let record = if encryption_active && is_sensitive_key(key) {
            match self.keys.encrypt(value, now).await {
                Ok(record) => StoredRecord::Encrypted(record),
                Err(e) => {
                    tracing::warn!(key, error = %e, "encryption failed; storing plain record");
                    StoredRecord::plain(value, now)
                }
            }
        } else {
            StoredRecord::plain(value, now)
        };

        let encrypted = matches!(record, StoredRecord::Encrypted(_));
        self.host
            .set(&self.namespace.storage_key(key), &record.to_json()?)?;
        tracing::debug!(key, encrypted, "item stored");

        self.emit(StoreEvent::ItemSet {
            key: key.to_string(),
            encrypted,
        });
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Option<String> {
        self.ensure_initialized().await;
        if Namespace::is_reserved(key) {
            return None;
        }

        let raw = match self.host.get(&self.namespace.storage_key(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, code = e.code(), error = %e, "host read failed; treating as not found");
                return None;
            }
        };

        match StoredRecord::parse(&raw) {
            Ok(StoredRecord::Plain(record)) => Some(record.value),
            Ok(StoredRecord::Encrypted(record)) => match self.keys.decrypt(&record).await {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "decryption failed; treating as not found");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupted record; treating as not found");
                None
            }
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        // 초기화 락을 잡아 진행 중인 다른 연산이 새 키 재료를 보지 못하게 함
        let mut state = self.init.lock().await;

        for storage_key in self.host.keys()? {
            if self.namespace.logical_name(&storage_key).is_some() {
                self.host.delete(&storage_key)?;
            }
        }

        if *state == InitState::Ready {
            self.keys.reset().await;
            *state = InitState::NotInitialized;
        }
        drop(state);

        tracing::info!(namespace = self.namespace.prefix(), "secure storage cleared");
        self.emit(StoreEvent::Cleared);
        Ok(())
    }

    async fn rotate_keys(&self) -> Result<RotationReport, KeyMaterialError> {
        if !self.ensure_initialized().await {
            tracing::debug!("encryption inactive; skipping key rotation");
            return Ok(RotationReport::default());
        }

        let _rotation = self.rotation_lock.lock().await;
        let rotation = self.keys.rotate_key().await?;
        let mut report = RotationReport {
            key_id: Some(rotation.current_key_id.clone()),
            ..RotationReport::default()
        };

        let names = match self.logical_keys() {
            Ok(names) => names,
            Err(e) => {
                self.keys.finish_rotation().await;
                return Err(e.into());
            }
        };

        for name in names {
            let storage_key = self.namespace.storage_key(&name);
            let raw = match self.host.get(&storage_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key = %name, code = e.code(), error = %e, "rotation read failed; item left under previous key");
                    report.failed += 1;
                    continue;
                }
            };

            let record = match StoredRecord::parse(&raw) {
                Ok(StoredRecord::Encrypted(record)) => record,
                _ => continue,
            };
            // 로테이션 시작 후 새 키로 쓰여진 항목
            if record.key_id.as_deref() == Some(rotation.current_key_id.as_str()) {
                continue;
            }

            match self.rotate_record(&storage_key, &raw, &record).await {
                Ok(true) => report.rotated += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(key = %name, error = %e, "rotation failed; item left under previous key");
                    report.failed += 1;
                }
            }
        }

        self.keys.finish_rotation().await;

        tracing::info!(
            previous_key_id = %rotation.previous_key_id,
            key_id = %rotation.current_key_id,
            rotated = report.rotated,
            failed = report.failed,
            "key rotation completed"
        );
        self.emit(StoreEvent::KeyRotated {
            key_id: rotation.current_key_id,
            rotated: report.rotated,
            failed: report.failed,
        });
        Ok(report)
    }

    /// 레코드 1개 재암호화. 읽은 뒤 값이 바뀐 항목은 건너뜀 (`Ok(false)`)
    ///
    /// 재확인과 쓰기는 별도 호스트 호출이라 원자적이지 않습니다.
    async fn rotate_record(
        &self,
        storage_key: &str,
        raw: &str,
        record: &EncryptedRecord,
    ) -> Result<bool, KeyMaterialError> {
        let rotated = StoredRecord::Encrypted(self.keys.reencrypt(record).await?);
        let json = rotated.to_json().map_err(StoreError::from)?;

        if self.host.get(storage_key)?.as_deref() != Some(raw) {
            return Ok(false);
        }
        self.host.set(storage_key, &json)?;
        Ok(true)
    }

    async fn cleanup_expired(&self) -> StoreResult<usize> {
        self.ensure_initialized().await;

        let now = now_ms();
        let retention = i64::try_from(self.config.retention_ms).unwrap_or(i64::MAX);
        let mut purged = 0;

        for name in self.logical_keys()? {
            let storage_key = self.namespace.storage_key(&name);
            let raw = match self.host.get(&storage_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key = %name, code = e.code(), error = %e, "cleanup read failed");
                    continue;
                }
            };

            let expired = match StoredRecord::parse(&raw) {
                Ok(record) => now.saturating_sub(record.timestamp()) > retention,
                Err(_) => {
                    tracing::warn!(key = %name, "purging corrupted record");
                    true
                }
            };

            if expired {
                match self.host.delete(&storage_key) {
                    Ok(()) => purged += 1,
                    Err(e) => {
                        tracing::warn!(key = %name, code = e.code(), error = %e, "failed to purge expired item")
                    }
                }
            }
        }

        if purged > 0 {
            tracing::info!(purged, "expired items purged");
            self.emit(StoreEvent::ExpiredPurged { count: purged });
        }
        Ok(purged)
    }
}
