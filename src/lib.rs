//! # 商品目录服务
//!
//! 维护一份 JSON 目录文档，负责：
//! - 并发新增/删除下的目录文档读-改-写
//! - multipart 图片上传的解码
//! - 图片发布到远程存储，存储不可用时内嵌为 data URI
//!
//! 分层结构：
//! - `app`：路由、处理器与目录业务
//! - `core`：错误、响应与中间件
//! - `infrastructure`：配置、日志、对象存储网关与 multipart 解码

pub mod app;
pub mod core;
pub mod infrastructure;

pub use app::catalog::{CatalogError, CatalogService};
pub use infrastructure::config::Config;
