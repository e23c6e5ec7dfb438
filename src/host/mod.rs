//! Host Persistent Store
//!
//! 런타임 환경이 제공하는 문자열 키-값 저장소 계약.
//! 암호화, 만료, 트랜잭션 보장은 없으며 이 크레이트는 4가지 연산만 사용합니다.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryHostStore;
pub use sqlite::SqliteHostStore;

use crate::error::StoreResult;

/// 동기식 문자열 키-값 저장소
pub trait HostPersistentStore: Send + Sync {
    /// 값 조회 (없으면 `None`)
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// 값 저장 (덮어쓰기)
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// 값 삭제. 없는 키 삭제는 성공으로 취급
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// 저장된 모든 키 나열
    fn keys(&self) -> StoreResult<Vec<String>>;
}
