//! SQLite 기반 HostPersistentStore
//!
//! 단일 `kv_store` 테이블에 문자열 키-값을 저장합니다.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};

use crate::error::{StoreError, StoreResult};
use crate::host::HostPersistentStore;

/// 키-값 테이블 스키마
const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// SQLite 연결 래퍼
pub struct SqliteHostStore {
    conn: Mutex<Connection>,
}

impl SqliteHostStore {
    /// 파일 DB 열기 (부모 디렉토리와 스키마 생성)
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// 메모리 DB 열기
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(CREATE_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl HostPersistentStore for SqliteHostStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            (key, value, chrono::Utc::now().timestamp_millis()),
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
        let iter = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for key in iter {
            keys.push(key?);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("host.db");

        {
            let store = SqliteHostStore::open(&db_path).unwrap();
            store.set("legacy_auth_access_token", "abc").unwrap();
            store.set("legacy_auth_access_token", "def").unwrap();
            store.set("feature_flags", "{}").unwrap();
        }

        let store = SqliteHostStore::open(&db_path).unwrap();
        assert_eq!(
            store.get("legacy_auth_access_token").unwrap(),
            Some("def".to_string())
        );
        assert_eq!(
            store.keys().unwrap(),
            vec!["feature_flags".to_string(), "legacy_auth_access_token".to_string()]
        );

        store.delete("feature_flags").unwrap();
        assert_eq!(store.get("feature_flags").unwrap(), None);
    }
}
