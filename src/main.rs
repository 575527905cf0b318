use anyhow::Context;
use clap::Parser;
use nautics_catalog::app::{self, catalog::handler::AppState};
use nautics_catalog::infrastructure::config::load_config;
use nautics_catalog::infrastructure::logger::Logger;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;

/// 商品目录服务
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// 配置文件路径，缺省依次查找 config.toml 与 ./config/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("加载配置失败")?;
    config.apply_env();
    config.validate().context("配置无效")?;

    let _guard = Logger::init(&config.logging).context("初始化日志失败")?;

    let catalog = app::build_catalog(&config.storage).context("初始化目录存储失败")?;
    let state = AppState { catalog };
    let router = app::router(state, &config.http);

    let addr = format!("{}:{}", config.http.bind_address, config.http.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法绑定到 {addr}"))?;

    info!("🚀 目录服务运行在 http://{}", addr);
    info!("   GET    /products[?category=] - 列出商品");
    info!("   GET    /products/{{id}}       - 商品详情");
    info!("   POST   /products             - 新增商品 (multipart)");
    info!("   DELETE /products?id=         - 删除商品");
    info!("   GET    /health               - 健康检查");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务器运行失败")?;

    info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "无法监听退出信号");
    }
}
