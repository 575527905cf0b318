//! 基础设施层：配置、日志、对象存储与请求解码

pub mod config;
pub mod logger;
pub mod multipart;
pub mod store;
