//! 네임스페이스 키 매핑
//!
//! 논리 키 `access_token` → 저장 키 `secure_store:access_token`

/// 키 재료 예약 이름
pub const KEY_MATERIAL_NAME: &str = "key_material";
/// salt 예약 이름
pub const SALT_NAME: &str = "salt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn storage_key(&self, logical: &str) -> String {
        format!("{}{}", self.prefix, logical)
    }

    /// 저장 키 → 논리 키. 네임스페이스 밖이면 `None`
    pub fn logical_name<'a>(&self, storage_key: &'a str) -> Option<&'a str> {
        storage_key.strip_prefix(self.prefix.as_str())
    }

    /// 키 재료 항목 여부 (열거/정리 대상에서 제외)
    pub fn is_reserved(logical: &str) -> bool {
        logical == KEY_MATERIAL_NAME || logical == SALT_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping() {
        let ns = Namespace::new("secure_store:");
        assert_eq!(ns.storage_key("access_token"), "secure_store:access_token");
        assert_eq!(ns.logical_name("secure_store:access_token"), Some("access_token"));
        assert_eq!(ns.logical_name("legacy_auth_access_token"), None);
        assert!(Namespace::is_reserved("salt"));
        assert!(!Namespace::is_reserved("access_token"));
    }
}
