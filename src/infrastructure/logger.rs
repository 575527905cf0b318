//! 日志基础设施

use std::io;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use super::config::LoggingConfig;

/// 日志守卫，丢弃后文件日志停止刷新
pub struct LoggerGuard {
    _file: Option<WorkerGuard>,
}

pub struct Logger;

impl Logger {
    /// 初始化日志系统
    ///
    /// 控制台与按日期分割的文件日志可分别开关；`RUST_LOG` 优先于配置中的级别。
    pub fn init(config: &LoggingConfig) -> Result<LoggerGuard> {
        let filter = || {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
        };

        let (file_layer, guard) = if config.file_output {
            std::fs::create_dir_all(&config.log_path)?;
            let appender = rolling::daily(&config.log_path, &config.file_prefix);
            let (writer, guard) = non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_thread_names(true)
                .with_filter(filter());
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };

        let console_layer = config.console_output.then(|| {
            fmt::layer()
                .with_writer(io::stdout)
                .with_ansi(true)
                .with_filter(filter())
        });

        tracing_subscriber::registry()
            .with(file_layer)
            .with(console_layer)
            .try_init()?;

        Ok(LoggerGuard { _file: guard })
    }
}
