//! 对象存储网关
//!
//! 目录文档与图片资源都以键值对象的形式存放在远程存储中。网关只做最薄的一层：
//! 读取最新版本、带前置条件写入、删除，以及计算资源的公开地址。

mod http;
mod memory;

pub use http::HttpObjectStore;
pub use memory::MemoryObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

/// 对象版本令牌（HTTP 后端为 ETag）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 读取到的对象
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    /// 后端不提供版本时为 `None`
    pub version: Option<Version>,
}

/// 写入前置条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// 无条件覆盖
    Any,
    /// 仅当对象尚不存在
    Absent,
    /// 仅当当前版本与给定版本一致
    Matches(Version),
}

/// 网关错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object store is not configured: {0}")]
    Unconfigured(String),

    #[error("precondition failed for `{key}`")]
    Conflict { key: String },

    #[error("object store unavailable")]
    Unavailable,

    #[error("object store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("object store returned {status} for {method} `{key}`: {body}")]
    Status {
        method: &'static str,
        key: String,
        status: u16,
        body: String,
    },
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// 对象存储网关
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// 读取键的最新版本；不存在时返回 `None`
    async fn fetch_latest(&self, key: &str) -> Result<Option<StoredObject>, StoreError>;

    /// 写入整个对象，前置条件不满足时返回 `StoreError::Conflict`
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        precondition: Precondition,
    ) -> Result<Option<Version>, StoreError>;

    /// 删除对象，不存在时视为成功
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// 资源的公开访问地址
    fn public_url(&self, key: &str) -> String;

    /// 后端名称，用于日志与健康检查
    fn backend_name(&self) -> &'static str;

    /// 上传资源并返回公开地址
    async fn put_asset(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, StoreError> {
        self.put(key, bytes, content_type, Precondition::Any).await?;
        Ok(self.public_url(key))
    }
}

/// 拼接基础地址与键
pub(crate) fn join_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(
            join_url("https://blob.example.com/", "/data/products.json"),
            "https://blob.example.com/data/products.json"
        );
        assert_eq!(
            join_url("https://blob.example.com", "products/a.png"),
            "https://blob.example.com/products/a.png"
        );
    }

    #[test]
    fn conflict_is_detected() {
        assert!(StoreError::Conflict { key: "k".into() }.is_conflict());
        assert!(!StoreError::Unavailable.is_conflict());
    }
}
