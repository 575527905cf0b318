//! 目录数据模型

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::CatalogError;
use crate::infrastructure::multipart::MultipartForm;

/// 整个目录文档，始终整体读写
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub products: Vec<Product>,
}

impl CatalogDocument {
    pub fn find(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.products.iter().position(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Product> {
        self.products.iter().filter(move |p| p.category == category)
    }

    /// `{category}-{millis}`；同一毫秒已被占用时顺延到下一个空闲毫秒
    pub fn next_id(&self, category: &str, millis: i64) -> String {
        let mut millis = millis;
        loop {
            let id = format!("{category}-{millis}");
            if !self.contains(&id) {
                return id;
            }
            millis += 1;
        }
    }
}

/// 资源引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AssetRef {
    /// 存放在远程存储中的资源，删除商品时一并删除
    #[serde(rename_all = "camelCase")]
    Durable { key: String, url: String },
    /// 内嵌在目录文档里的 base64 资源
    #[serde(rename_all = "camelCase")]
    Embedded { content_type: String, data: String },
}

impl AssetRef {
    pub fn embedded(content_type: &str, bytes: &[u8]) -> Self {
        AssetRef::Embedded {
            content_type: content_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    /// 可直接用于渲染的地址：远程 URL 或 data URI
    pub fn href(&self) -> String {
        match self {
            AssetRef::Durable { url, .. } => url.clone(),
            AssetRef::Embedded { content_type, data } => {
                format!("data:{content_type};base64,{data}")
            }
        }
    }

    pub fn durable_key(&self) -> Option<&str> {
        match self {
            AssetRef::Durable { key, .. } => Some(key),
            AssetRef::Embedded { .. } => None,
        }
    }

    /// 解析 `data:{content_type};base64,{data}`
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (content_type, data) = rest.split_once(";base64,")?;
        Some(AssetRef::Embedded {
            content_type: content_type.to_string(),
            data: data.to_string(),
        })
    }
}

/// 商品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub category: String,
    pub name: String,
    pub description: String,
    pub link: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gallery: Vec<AssetRef>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// 第一个资源作为主图，其余进入图集；`assets` 必须非空
    pub(crate) fn new(
        id: String,
        fields: ProductFields,
        mut assets: Vec<AssetRef>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let primary = assets.remove(0);
        Self {
            id,
            category: fields.category,
            name: fields.name,
            description: fields.description,
            link: fields.link,
            image: primary.href(),
            image_key: primary.durable_key().map(str::to_string),
            gallery: assets,
            created_at,
        }
    }

    /// 主图与图集的全部资源引用；外部地址不属于本服务，不会出现在结果中
    pub fn assets(&self) -> Vec<AssetRef> {
        let primary = match &self.image_key {
            Some(key) => Some(AssetRef::Durable {
                key: key.clone(),
                url: self.image.clone(),
            }),
            None => AssetRef::from_data_uri(&self.image),
        };
        primary
            .into_iter()
            .chain(self.gallery.iter().cloned())
            .collect()
    }
}

/// 新增商品时的文本字段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFields {
    pub category: String,
    pub name: String,
    pub description: String,
    pub link: String,
}

impl ProductFields {
    pub fn from_form(form: &MultipartForm) -> Self {
        let get = |name: &str| form.field(name).unwrap_or_default().to_string();
        Self {
            category: get("category"),
            name: get("name"),
            description: get("description"),
            link: get("link"),
        }
    }

    /// 所有字段去除首尾空白后必须非空
    pub fn validate(&self) -> Result<(), CatalogError> {
        let missing: Vec<&str> = [
            ("category", &self.category),
            ("name", &self.name),
            ("description", &self.description),
            ("link", &self.link),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}
