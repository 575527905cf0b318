//! 图片资源发布
//!
//! 优先上传到远程存储；上传失败或未配置远程存储时，把字节内嵌为 data URI，
//! 保证目录文档在没有外部存储的情况下也能渲染。

use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, warn};

use super::clock::Clock;
use super::model::{AssetRef, Product};
use crate::infrastructure::multipart::UploadedFile;
use crate::infrastructure::store::ObjectStore;

#[derive(Debug, Clone)]
pub struct AssetPublisher {
    store: Option<Arc<dyn ObjectStore>>,
    prefix: String,
    clock: Arc<dyn Clock>,
}

impl AssetPublisher {
    pub fn new(store: Option<Arc<dyn ObjectStore>>, prefix: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            prefix: prefix.trim_matches('/').to_string(),
            clock,
        }
    }

    /// 发布单个资源，从不失败
    pub async fn publish(&self, bytes: Bytes, content_type: &str, suggested_name: &str) -> AssetRef {
        let millis = self.clock.now().timestamp_millis();
        let key = self.asset_key(millis, 0, suggested_name);
        self.publish_at(key, bytes, content_type).await
    }

    /// 按上传顺序发布一批文件，共用同一个时间戳
    pub async fn publish_all<'a, I>(&self, files: I) -> Vec<AssetRef>
    where
        I: IntoIterator<Item = &'a UploadedFile>,
    {
        let millis = self.clock.now().timestamp_millis();
        let mut refs = Vec::new();
        for (index, file) in files.into_iter().enumerate() {
            let key = self.asset_key(millis, index, &file.filename);
            refs.push(
                self.publish_at(key, file.bytes.clone(), &file.content_type)
                    .await,
            );
        }
        refs
    }

    /// 商品拥有的资源
    ///
    /// 旧文档没有 `imageKey`；主图地址位于本存储的资源前缀之下时，同样视为远程资源。
    pub fn assets_of(&self, product: &Product) -> Vec<AssetRef> {
        let mut assets = product.assets();
        if product.image_key.is_none() {
            if let Some(key) = self.legacy_key(&product.image) {
                assets.insert(
                    0,
                    AssetRef::Durable {
                        key,
                        url: product.image.clone(),
                    },
                );
            }
        }
        assets
    }

    fn legacy_key(&self, url: &str) -> Option<String> {
        let store = self.store.as_ref()?;
        let prefix = store.public_url(&format!("{}/", self.prefix));
        let name = url.strip_prefix(&prefix)?;
        (!name.is_empty()).then(|| format!("{}/{name}", self.prefix))
    }

    /// 删除远程资源；内嵌资源无需处理，失败只记录日志
    pub async fn unpublish(&self, asset: &AssetRef) {
        let Some(key) = asset.durable_key() else {
            return;
        };
        let Some(store) = &self.store else {
            warn!(key, "未配置远程存储，无法删除资源");
            return;
        };
        match store.delete(key).await {
            Ok(()) => info!(key, "资源已删除"),
            Err(err) => warn!(key, error = %err, "删除资源失败，资源可能成为孤儿"),
        }
    }

    /// `{prefix}/{millis}-{name}`，同批次后续文件为 `{prefix}/{millis}-{index}-{name}`
    pub fn asset_key(&self, millis: i64, index: usize, suggested_name: &str) -> String {
        let name = sanitize_filename(suggested_name);
        if index == 0 {
            format!("{}/{millis}-{name}", self.prefix)
        } else {
            format!("{}/{millis}-{index}-{name}", self.prefix)
        }
    }

    async fn publish_at(&self, key: String, bytes: Bytes, content_type: &str) -> AssetRef {
        let octet_stream = mime::APPLICATION_OCTET_STREAM;
        let content_type = if content_type.trim().is_empty() {
            octet_stream.as_ref()
        } else {
            content_type
        };

        if let Some(store) = &self.store {
            match store.put_asset(&key, bytes.clone(), content_type).await {
                Ok(url) => {
                    info!(key = %key, size = bytes.len(), "资源已上传");
                    return AssetRef::Durable { key, url };
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "上传资源失败，改为内嵌");
                }
            }
        }
        AssetRef::embedded(content_type, &bytes)
    }
}

/// 先去掉首尾空白，再把空白串与路径分隔符替换为 `-`；空名称使用 `upload`
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_gap = false;
    for c in name.trim().chars() {
        if c.is_whitespace() || c == '/' || c == '\\' {
            if !in_gap {
                out.push('-');
                in_gap = true;
            }
        } else {
            out.push(c);
            in_gap = false;
        }
    }
    if out.is_empty() {
        "upload".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::catalog::clock::FixedClock;
    use crate::app::catalog::model::CatalogDocument;
    use crate::infrastructure::store::MemoryObjectStore;

    fn publisher(store: Option<Arc<MemoryObjectStore>>) -> AssetPublisher {
        AssetPublisher::new(
            store.map(|s| s as Arc<dyn ObjectStore>),
            "/products/",
            Arc::new(FixedClock::from_millis(1_700_000_000_000)),
        )
    }

    #[test]
    fn sanitize_replaces_whitespace_runs() {
        assert_eq!(sanitize_filename("front view  1.png"), "front-view-1.png");
        assert_eq!(sanitize_filename("a\tb\nc.jpg"), "a-b-c.jpg");
        assert_eq!(sanitize_filename("../etc/passwd"), "..-etc-passwd");
        assert_eq!(sanitize_filename(" a.png \n"), "a.png");
        assert_eq!(sanitize_filename("   "), "upload");
    }

    #[test]
    fn keys_are_namespaced_by_timestamp() {
        let p = publisher(None);
        assert_eq!(
            p.asset_key(1_700_000_000_000, 0, "pump one.png"),
            "products/1700000000000-pump-one.png"
        );
        assert_eq!(
            p.asset_key(1_700_000_000_000, 2, "pump.png"),
            "products/1700000000000-2-pump.png"
        );
    }

    #[tokio::test]
    async fn publish_uploads_to_store() {
        let store = Arc::new(MemoryObjectStore::with_base_url("https://cdn.example.com"));
        let p = publisher(Some(store.clone()));

        let asset = p
            .publish(Bytes::from_static(b"png"), "image/png", "pump one.png")
            .await;
        assert_eq!(
            asset,
            AssetRef::Durable {
                key: "products/1700000000000-pump-one.png".into(),
                url: "https://cdn.example.com/products/1700000000000-pump-one.png".into(),
            }
        );
        assert!(store.contains("products/1700000000000-pump-one.png"));
    }

    #[tokio::test]
    async fn publish_degrades_to_embedded_when_store_fails() {
        let store = Arc::new(MemoryObjectStore::new());
        store.set_offline(true);
        let p = publisher(Some(store));

        let asset = p.publish(Bytes::from_static(b"hi"), "image/png", "a.png").await;
        assert_eq!(asset.href(), "data:image/png;base64,aGk=");
    }

    #[tokio::test]
    async fn publish_without_store_embeds_and_defaults_content_type() {
        let asset = publisher(None)
            .publish(Bytes::from_static(b"hi"), "", "a.bin")
            .await;
        assert_eq!(asset.href(), "data:application/octet-stream;base64,aGk=");
    }

    #[test]
    fn legacy_image_under_public_base_is_owned() {
        let store = Arc::new(MemoryObjectStore::with_base_url("https://cdn.example.com"));
        let p = publisher(Some(store));
        let doc: CatalogDocument = serde_json::from_str(
            r#"{"products":[
            {"id":"hydraulics-1","category":"hydraulics","name":"Pump","description":"d",
             "link":"/l","image":"https://cdn.example.com/products/1-pump.png",
             "createdAt":"2024-05-01T10:00:00Z"},
            {"id":"hydraulics-2","category":"hydraulics","name":"Valve","description":"d",
             "link":"/l","image":"https://elsewhere.example.com/products/valve.png",
             "createdAt":"2024-05-01T10:00:00Z"}]}"#,
        )
        .unwrap();

        assert_eq!(
            p.assets_of(&doc.products[0]),
            vec![AssetRef::Durable {
                key: "products/1-pump.png".into(),
                url: "https://cdn.example.com/products/1-pump.png".into(),
            }]
        );
        assert!(p.assets_of(&doc.products[1]).is_empty());
        assert!(publisher(None).assets_of(&doc.products[0]).is_empty());
    }

    #[tokio::test]
    async fn unpublish_deletes_durable_and_ignores_embedded() {
        let store = Arc::new(MemoryObjectStore::new());
        let p = publisher(Some(store.clone()));
        let durable = p.publish(Bytes::from_static(b"x"), "image/png", "a.png").await;
        assert_eq!(store.len(), 1);

        p.unpublish(&AssetRef::embedded("image/png", b"x")).await;
        assert_eq!(store.len(), 1);

        p.unpublish(&durable).await;
        assert!(store.is_empty());

        store.set_offline(true);
        p.unpublish(&durable).await;
    }
}
