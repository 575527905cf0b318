//! 目录业务服务
//!
//! 负责目录文档的读-改-写循环。读取永不失败（出错时返回空目录）；新增和删除
//! 在 [`WritePolicy::Optimistic`] 下携带读取时的版本写入，版本过期则重新读取
//! 并重放这次变更，直到成功或用完尝试次数。

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::assets::AssetPublisher;
use super::clock::Clock;
use super::error::CatalogError;
use super::model::{AssetRef, CatalogDocument, Product, ProductFields};
use super::repository::{CatalogRepository, Revision};
use crate::infrastructure::config::WritePolicy;
use crate::infrastructure::multipart::{self, MultipartForm};

/// 承载图片的文件字段名
pub const IMAGE_FIELDS: [&str; 2] = ["image", "images"];

#[derive(Debug, Clone)]
pub struct CatalogService {
    repository: Arc<dyn CatalogRepository>,
    publisher: AssetPublisher,
    clock: Arc<dyn Clock>,
    policy: WritePolicy,
    max_attempts: usize,
}

impl CatalogService {
    pub fn new(
        repository: Arc<dyn CatalogRepository>,
        publisher: AssetPublisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            publisher,
            clock,
            policy: WritePolicy::Optimistic,
            max_attempts: 5,
        }
    }

    pub fn with_write_policy(mut self, policy: WritePolicy, max_attempts: usize) -> Self {
        self.policy = policy;
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn repository_name(&self) -> &'static str {
        self.repository.name()
    }

    /// 列出全部商品；读取失败时返回空目录
    pub async fn list(&self) -> CatalogDocument {
        match self.repository.load().await {
            Ok(snapshot) => snapshot.document,
            Err(err) => {
                warn!(error = %err, "读取目录失败，返回空目录");
                CatalogDocument::default()
            }
        }
    }

    /// 按分类列出商品，保持文档顺序
    pub async fn list_by_category(&self, category: &str) -> CatalogDocument {
        let document = self.list().await;
        CatalogDocument {
            products: document.in_category(category).cloned().collect(),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Product, CatalogError> {
        self.list()
            .await
            .find(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound("Product not found".to_string()))
    }

    /// 新增商品
    pub async fn add(
        &self,
        fields: ProductFields,
        assets: Vec<AssetRef>,
    ) -> Result<Product, CatalogError> {
        fields.validate()?;
        if assets.is_empty() {
            return Err(CatalogError::Validation(
                "At least one image is required".to_string(),
            ));
        }

        let created_at = self.clock.now();
        let millis = created_at.timestamp_millis();

        let product = self
            .mutate(|document| {
                let id = document.next_id(&fields.category, millis);
                let product = Product::new(id, fields.clone(), assets.clone(), created_at);
                document.products.push(product.clone());
                Ok(product)
            })
            .await?;

        info!(id = %product.id, category = %product.category, "商品已新增");
        Ok(product)
    }

    /// 解码后的上传表单：先校验字段，再发布图片，最后写入目录
    pub async fn add_upload(&self, form: &MultipartForm) -> Result<Product, CatalogError> {
        let fields = ProductFields::from_form(form);
        fields.validate()?;

        let files: Vec<_> = form.files_named(&IMAGE_FIELDS).collect();
        if files.is_empty() {
            return Err(CatalogError::Validation(
                "At least one image is required".to_string(),
            ));
        }

        let assets = self.publisher.publish_all(files).await;
        self.add(fields, assets).await
    }

    /// 原始 multipart 请求体：解码后走 [`add_upload`](Self::add_upload)
    pub async fn add_multipart(
        &self,
        content_type: &str,
        body: Bytes,
    ) -> Result<Product, CatalogError> {
        let form = multipart::decode(content_type, body).await.map_err(|err| {
            warn!(error = %err, "无法解码上传请求");
            CatalogError::from(err)
        })?;
        self.add_upload(&form).await
    }

    /// 删除商品，随后尽力删除其远程资源
    pub async fn remove(&self, id: &str) -> Result<Product, CatalogError> {
        let removed = self
            .mutate(|document| {
                let index = document
                    .position(id)
                    .ok_or_else(|| CatalogError::NotFound("Product not found".to_string()))?;
                Ok(document.products.remove(index))
            })
            .await?;

        for asset in self.publisher.assets_of(&removed) {
            self.publisher.unpublish(&asset).await;
        }

        info!(id = %removed.id, "商品已删除");
        Ok(removed)
    }

    /// 读取、修改、整体写回
    async fn mutate<T, F>(&self, mut op: F) -> Result<T, CatalogError>
    where
        F: FnMut(&mut CatalogDocument) -> Result<T, CatalogError> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let snapshot = self.repository.load().await?;
            let mut document = snapshot.document;
            let output = op(&mut document)?;

            let expected = match self.policy {
                WritePolicy::Optimistic => snapshot.revision,
                WritePolicy::LastWriterWins => Revision::Untracked,
            };

            match self.repository.save(&document, &expected).await {
                Ok(_) => return Ok(output),
                Err(CatalogError::Conflict(key)) if attempt < self.max_attempts => {
                    debug!(key = %key, attempt, "目录版本冲突，重新读取");
                }
                Err(err) => return Err(err),
            }
        }
    }
}
