//! 服务配置

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// 存储令牌的环境变量名
pub const STORE_TOKEN_ENV: &str = "CATALOG_STORE_TOKEN";

/// 服务配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 服务配置
    pub http: HttpConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 存储配置
    pub storage: StorageConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// HTTP 服务端口
    pub port: u16,
    /// 绑定地址
    pub bind_address: String,
    /// 请求超时时间（秒）
    pub timeout_seconds: u64,
    /// 请求体上限（字节），由传输层施加
    pub max_body_bytes: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志文件目录
    pub log_path: PathBuf,
    /// 日志文件名前缀
    pub file_prefix: String,
    /// 是否写入日志文件
    pub file_output: bool,
    /// 是否启用控制台输出
    pub console_output: bool,
    /// 日志级别 (trace, debug, info, warn, error)
    pub level: String,
}

/// 存储后端，启动时选定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// 远程对象存储
    Durable,
    /// 进程内存储，重启即丢失
    Memory,
}

/// 目录文档的写入策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// 带版本校验写入，冲突时重新读取并重试
    Optimistic,
    /// 无条件覆盖，并发写入会丢失更新
    LastWriterWins,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// 对象存储的 HTTP 端点
    pub endpoint: Option<String>,
    /// 对外可访问的资源地址前缀，缺省与 endpoint 相同
    pub public_base_url: Option<String>,
    /// 访问令牌，可由 `CATALOG_STORE_TOKEN` 覆盖
    pub token: Option<String>,
    /// 目录文档的键
    pub document_key: String,
    /// 图片资源的键前缀
    pub asset_prefix: String,
    /// 远程存储出错时是否逐次退回内存存储
    pub fallback_on_error: bool,
    pub write_policy: WritePolicy,
    /// 一次变更最多尝试的读-改-写轮数
    pub max_write_attempts: usize,
    /// 对象存储请求超时（秒）
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            timeout_seconds: 30,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("./logs"),
            file_prefix: "catalog".to_string(),
            file_output: true,
            console_output: true,
            level: "info".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            endpoint: None,
            public_base_url: None,
            token: None,
            document_key: "data/products.json".to_string(),
            asset_prefix: "products".to_string(),
            fallback_on_error: false,
            write_policy: WritePolicy::Optimistic,
            max_write_attempts: 5,
            timeout_seconds: 10,
        }
    }
}

impl StorageConfig {
    /// 资源公开地址前缀
    pub fn public_base(&self) -> Option<&str> {
        self.public_base_url
            .as_deref()
            .or(self.endpoint.as_deref())
    }
}

impl Config {
    /// 从配置文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::FileWrite(e.to_string()))?;
        }

        fs::write(path.as_ref(), content).map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// 用环境变量覆盖敏感配置
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(STORE_TOKEN_ENV) {
            if !token.is_empty() {
                self.storage.token = Some(token);
            }
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::Validation("HTTP端口必须大于0".to_string()));
        }
        if self.http.bind_address.is_empty() {
            return Err(ConfigError::Validation("绑定地址不能为空".to_string()));
        }
        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::Validation("请求体上限必须大于0".to_string()));
        }

        let storage = &self.storage;
        if storage.document_key.trim().is_empty() {
            return Err(ConfigError::Validation("目录文档键不能为空".to_string()));
        }
        if storage.asset_prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::Validation("资源键前缀不能为空".to_string()));
        }
        if storage.max_write_attempts == 0 {
            return Err(ConfigError::Validation("写入尝试次数必须大于0".to_string()));
        }
        if storage.backend == StorageBackend::Durable
            && storage.endpoint.as_deref().map_or(true, |e| e.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "durable 后端需要配置 storage.endpoint".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "无效的日志级别: {}，有效值: {:?}",
                self.logging.level, valid_levels
            )));
        }

        Ok(())
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("文件读取错误: {0}")]
    FileRead(String),
    #[error("文件写入错误: {0}")]
    FileWrite(String),
    #[error("配置解析错误: {0}")]
    Parse(String),
    #[error("配置序列化错误: {0}")]
    Serialize(String),
    #[error("配置验证错误: {0}")]
    Validation(String),
}

/// 从指定文件、默认位置或默认值加载配置
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        info!("从配置文件加载: {}", path.display());
        return Config::load_from_file(path);
    }

    let config_paths = ["config.toml", "./config/config.toml"];

    for path in &config_paths {
        if Path::new(path).exists() {
            info!("从配置文件加载: {}", path);
            return Config::load_from_file(path);
        }
    }

    info!("未找到配置文件，使用默认配置");
    Ok(Config::default())
}
