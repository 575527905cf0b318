//! 目录文档仓库
//!
//! 仓库在启动时按配置选定，作为实例注入 [`CatalogService`](super::CatalogService)：
//!
//! - [`DurableCatalogRepository`]：文档存放在对象存储的固定键下；
//! - [`MemoryCatalogRepository`]：进程内的一份文档，重启即丢失；
//! - [`FallbackCatalogRepository`]：显式开启时，远程存储每次出错都改用内存仓库。

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::CatalogError;
use super::model::CatalogDocument;
use crate::infrastructure::store::{ObjectStore, Precondition, Version};

/// 读取时刻文档的版本
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// 尚无快照
    Missing,
    /// 已知版本
    At(Version),
    /// 后端不提供版本时，读取到的文档内容的 SHA-256 摘要
    Digest(String),
    /// 不校验版本，写入无条件覆盖
    Untracked,
}

impl Revision {
    fn precondition(&self) -> Precondition {
        match self {
            Revision::Missing => Precondition::Absent,
            Revision::At(version) => Precondition::Matches(version.clone()),
            // 摘要在写入前由仓库自行比对
            Revision::Digest(_) | Revision::Untracked => Precondition::Any,
        }
    }
}

/// 一次读取得到的快照
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub document: CatalogDocument,
    pub revision: Revision,
}

#[async_trait]
pub trait CatalogRepository: Send + Sync + Debug {
    /// 读取最新快照，不存在时返回空文档
    async fn load(&self) -> Result<Snapshot, CatalogError>;

    /// 整体写入文档；`expected` 过期时返回 `CatalogError::Conflict`
    async fn save(
        &self,
        document: &CatalogDocument,
        expected: &Revision,
    ) -> Result<Revision, CatalogError>;

    fn name(&self) -> &'static str;
}

/// 对象存储中的目录文档
#[derive(Debug, Clone)]
pub struct DurableCatalogRepository {
    store: Arc<dyn ObjectStore>,
    key: String,
}

impl DurableCatalogRepository {
    pub fn new(store: Arc<dyn ObjectStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    fn revision_of(version: Option<Version>, bytes: &[u8]) -> Revision {
        match version {
            Some(version) => Revision::At(version),
            None => Revision::Digest(content_digest(bytes)),
        }
    }

    /// 后端不提供版本时，写入前重新读取并比对摘要
    ///
    /// 比对与写入之间仍有窗口，只能发现读取之后已落盘的修改。
    async fn check_digest(&self, expected: &str) -> Result<(), CatalogError> {
        warn!(key = %self.key, "对象存储未返回版本，改用内容摘要校验");
        let current = self
            .store
            .fetch_latest(&self.key)
            .await?
            .map(|object| content_digest(&object.bytes));
        if current.as_deref() == Some(expected) {
            Ok(())
        } else {
            Err(CatalogError::Conflict(self.key.clone()))
        }
    }
}

fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl CatalogRepository for DurableCatalogRepository {
    async fn load(&self) -> Result<Snapshot, CatalogError> {
        let Some(object) = self.store.fetch_latest(&self.key).await? else {
            debug!(key = %self.key, "目录文档尚不存在");
            return Ok(Snapshot {
                document: CatalogDocument::default(),
                revision: Revision::Missing,
            });
        };

        let document: CatalogDocument = serde_json::from_slice(&object.bytes)
            .map_err(|e| CatalogError::Corrupt(e.to_string()))?;
        let revision = Self::revision_of(object.version, &object.bytes);
        Ok(Snapshot { document, revision })
    }

    async fn save(
        &self,
        document: &CatalogDocument,
        expected: &Revision,
    ) -> Result<Revision, CatalogError> {
        if let Revision::Digest(digest) = expected {
            self.check_digest(digest).await?;
        }

        let body = Bytes::from(
            serde_json::to_vec_pretty(document)
                .map_err(|e| CatalogError::Corrupt(e.to_string()))?,
        );
        let version = self
            .store
            .put(
                &self.key,
                body.clone(),
                mime::APPLICATION_JSON.as_ref(),
                expected.precondition(),
            )
            .await?;
        Ok(Self::revision_of(version, &body))
    }

    fn name(&self) -> &'static str {
        "durable"
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    document: CatalogDocument,
    /// 0 表示从未写入
    version: u64,
}

/// 进程内目录文档
///
/// 锁只在单次 `load` / `save` 内持有，不跨请求；并发的读-改-写之间
/// 是否丢失更新取决于调用方是否携带版本。
#[derive(Debug, Default)]
pub struct MemoryCatalogRepository {
    state: Mutex<MemoryState>,
}

impl MemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn revision(version: u64) -> Revision {
        if version == 0 {
            Revision::Missing
        } else {
            Revision::At(Version::new(version.to_string()))
        }
    }
}

#[async_trait]
impl CatalogRepository for MemoryCatalogRepository {
    async fn load(&self) -> Result<Snapshot, CatalogError> {
        let state = self.state.lock();
        Ok(Snapshot {
            document: state.document.clone(),
            revision: Self::revision(state.version),
        })
    }

    async fn save(
        &self,
        document: &CatalogDocument,
        expected: &Revision,
    ) -> Result<Revision, CatalogError> {
        let mut state = self.state.lock();
        let current = Self::revision(state.version);
        if *expected != Revision::Untracked && *expected != current {
            return Err(CatalogError::Conflict("memory".to_string()));
        }

        state.document = document.clone();
        state.version += 1;
        Ok(Self::revision(state.version))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// 远程仓库出错时逐次改用内存仓库
///
/// 这是逐次调用的选择，不是持久的模式切换：同一进程可能交替读写两份文档。
/// 内存一侧的读写不携带版本，并发写入按最后写入者为准。
#[derive(Debug)]
pub struct FallbackCatalogRepository {
    primary: Arc<dyn CatalogRepository>,
    fallback: MemoryCatalogRepository,
}

impl FallbackCatalogRepository {
    pub fn new(primary: Arc<dyn CatalogRepository>, fallback: MemoryCatalogRepository) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl CatalogRepository for FallbackCatalogRepository {
    async fn load(&self) -> Result<Snapshot, CatalogError> {
        match self.primary.load().await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                warn!(error = %err, backend = self.primary.name(), "读取目录失败，改用内存仓库");
                let snapshot = self.fallback.load().await?;
                Ok(Snapshot {
                    document: snapshot.document,
                    revision: Revision::Untracked,
                })
            }
        }
    }

    async fn save(
        &self,
        document: &CatalogDocument,
        expected: &Revision,
    ) -> Result<Revision, CatalogError> {
        match self.primary.save(document, expected).await {
            Ok(revision) => Ok(revision),
            Err(err @ CatalogError::Conflict(_)) => Err(err),
            Err(err) => {
                warn!(error = %err, backend = self.primary.name(), "写入目录失败，改用内存仓库");
                self.fallback.save(document, &Revision::Untracked).await?;
                Ok(Revision::Untracked)
            }
        }
    }

    fn name(&self) -> &'static str {
        "durable+memory-fallback"
    }
}
