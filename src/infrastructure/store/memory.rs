//! 进程内对象存储

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{join_url, ObjectStore, Precondition, StoreError, StoredObject, Version};

#[derive(Debug, Clone)]
struct Entry {
    bytes: Bytes,
    content_type: String,
    version: u64,
}

/// 进程内对象存储，用于本地开发与测试
///
/// `set_offline(true)` 后所有调用都返回 `StoreError::Unavailable`，
/// 用来模拟远程存储不可达。
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Entry>>,
    next_version: AtomicU64,
    offline: AtomicBool,
    base_url: String,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::with_base_url("memory://objects")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            next_version: AtomicU64::new(1),
            offline: AtomicBool::new(false),
            base_url: base_url.into(),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.read().get(key).map(|e| e.content_type.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn fetch_latest(&self, key: &str) -> Result<Option<StoredObject>, StoreError> {
        self.check_online()?;
        Ok(self.objects.read().get(key).map(|entry| StoredObject {
            bytes: entry.bytes.clone(),
            version: Some(Version::new(entry.version.to_string())),
        }))
    }

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        precondition: Precondition,
    ) -> Result<Option<Version>, StoreError> {
        self.check_online()?;
        let mut objects = self.objects.write();
        let current = objects.get(key).map(|e| e.version.to_string());

        let satisfied = match (&precondition, current.as_deref()) {
            (Precondition::Any, _) => true,
            (Precondition::Absent, current) => current.is_none(),
            (Precondition::Matches(expected), Some(current)) => expected.as_str() == current,
            (Precondition::Matches(_), None) => false,
        };
        if !satisfied {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }

        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        objects.insert(
            key.to_string(),
            Entry {
                bytes,
                content_type: content_type.to_string(),
                version,
            },
        );
        Ok(Some(Version::new(version.to_string())))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check_online()?;
        self.objects.write().remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.base_url, key)
    }

    fn backend_name(&self) -> &'static str {
        "memory-object-store"
    }
}
