//! 基于 HTTP 的远程对象存储
//!
//! | 方法   | 路径              | 说明 |
//! |--------|-------------------|------|
//! | GET    | `{endpoint}/{key}`| 200 返回对象与 `ETag`，404 表示不存在 |
//! | PUT    | `{endpoint}/{key}`| `If-Match` / `If-None-Match: *` 携带前置条件，412 表示冲突 |
//! | DELETE | `{endpoint}/{key}`| 404 视为已删除 |

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, ETAG, IF_MATCH, IF_NONE_MATCH};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::{join_url, ObjectStore, Precondition, StoreError, StoredObject, Version};
use crate::infrastructure::config::StorageConfig;

/// 远程对象存储客户端
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    http: reqwest::Client,
    endpoint: String,
    public_base_url: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(
        endpoint: impl Into<String>,
        public_base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            public_base_url: public_base_url.into(),
            token,
        })
    }

    /// 按存储配置创建客户端
    pub fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        let endpoint = config
            .endpoint
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| StoreError::Unconfigured("storage.endpoint is not set".into()))?;
        let public_base = config.public_base().unwrap_or(&endpoint).to_string();
        Self::new(
            endpoint,
            public_base,
            config.token.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    fn object_url(&self, key: &str) -> String {
        join_url(&self.endpoint, key)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn status_error(method: &'static str, key: &str, resp: Response) -> StoreError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        StoreError::Status {
            method,
            key: key.to_string(),
            status,
            body,
        }
    }
}

fn etag(resp: &Response) -> Option<Version> {
    resp.headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(Version::new)
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn fetch_latest(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        let resp = self
            .authorized(self.http.get(self.object_url(key)))
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(key, "对象不存在");
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::status_error("GET", key, resp).await);
        }

        let version = etag(&resp);
        let bytes = resp.bytes().await?;
        Ok(Some(StoredObject { bytes, version }))
    }

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        precondition: Precondition,
    ) -> Result<Option<Version>, StoreError> {
        let mut request = self
            .authorized(self.http.put(self.object_url(key)))
            .header(CONTENT_TYPE, content_type)
            .body(bytes);
        request = match &precondition {
            Precondition::Any => request,
            Precondition::Absent => request.header(IF_NONE_MATCH, "*"),
            Precondition::Matches(version) => request.header(IF_MATCH, version.as_str()),
        };

        let resp = request.send().await?;
        if resp.status() == StatusCode::PRECONDITION_FAILED {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(Self::status_error("PUT", key, resp).await);
        }
        Ok(etag(&resp))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let resp = self
            .authorized(self.http.delete(self.object_url(key)))
            .send()
            .await?;
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(Self::status_error("DELETE", key, resp).await)
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, key)
    }

    fn backend_name(&self) -> &'static str {
        "http-object-store"
    }
}
