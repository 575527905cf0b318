//! 商品目录

pub mod assets;
pub mod clock;
pub mod error;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub use assets::AssetPublisher;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::CatalogError;
pub use model::{AssetRef, CatalogDocument, Product, ProductFields};
pub use repository::{
    CatalogRepository, DurableCatalogRepository, FallbackCatalogRepository,
    MemoryCatalogRepository, Revision, Snapshot,
};
pub use service::CatalogService;
