//! 테스트용 호스트 저장소 (지정한 키에서 오류 발생)

use std::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::host::{HostPersistentStore, MemoryHostStore};

#[derive(Default)]
pub(crate) struct FlakyHostStore {
    pub inner: MemoryHostStore,
    failing_reads: Mutex<Vec<String>>,
    failing_writes: Mutex<Vec<String>>,
}

impl FlakyHostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 키에 `needle`이 포함된 get 호출을 실패시킴
    pub fn fail_reads_containing(&self, needle: &str) {
        self.failing_reads.lock().unwrap().push(needle.to_string());
    }

    /// 키에 `needle`이 포함된 set 호출을 실패시킴
    pub fn fail_writes_containing(&self, needle: &str) {
        self.failing_writes.lock().unwrap().push(needle.to_string());
    }

    pub fn heal(&self) {
        self.failing_reads.lock().unwrap().clear();
        self.failing_writes.lock().unwrap().clear();
    }

    fn check(list: &Mutex<Vec<String>>, key: &str) -> StoreResult<()> {
        if list.lock().unwrap().iter().any(|needle| key.contains(needle)) {
            return Err(StoreError::Backend(format!("simulated failure for {}", key)));
        }
        Ok(())
    }
}

impl HostPersistentStore for FlakyHostStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Self::check(&self.failing_reads, key)?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        Self::check(&self.failing_writes, key)?;
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.inner.keys()
    }
}
