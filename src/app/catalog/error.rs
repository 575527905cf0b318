//! 目录错误类型

use crate::core::error::CoreError;
use crate::infrastructure::multipart::MultipartError;
use crate::infrastructure::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    MalformedRequest(String),

    /// 文档在读取之后已被其他写入者修改
    #[error("catalog document was modified concurrently: {0}")]
    Conflict(String),

    #[error("catalog document is corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { key } => CatalogError::Conflict(key),
            other => CatalogError::Storage(other),
        }
    }
}

impl From<MultipartError> for CatalogError {
    fn from(err: MultipartError) -> Self {
        CatalogError::MalformedRequest(err.to_string())
    }
}

impl From<CatalogError> for CoreError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(msg) | CatalogError::MalformedRequest(msg) => {
                CoreError::BadRequest(msg)
            }
            CatalogError::NotFound(msg) => CoreError::NotFound(msg),
            CatalogError::Conflict(_) => CoreError::Conflict(
                "The catalog changed while saving, please retry".to_string(),
            ),
            other => CoreError::InternalServerError(other.to_string()),
        }
    }
}
