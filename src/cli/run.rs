// src/cli/run.rs
//! Run 命令 - 启动桥接
//!
//! stdin 读入聊天事件（每行一个 JSON），stdout 写出反馈消息。

use crate::chat::StdioTransport;
use crate::config::BridgeConfig;
use crate::notification::{Dispatcher, DryRunBackend, HistoryStore, PushBackend, PushoverClient, PushoverConfig};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// 入站事件 channel 容量
const EVENT_BUFFER: usize = 256;

/// Run 命令参数
#[derive(Args)]
pub struct RunArgs {
    /// 配置文件路径（默认 ~/.config/andromeda/config.json）
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// 不真正推送，只打印
    #[arg(long)]
    pub dry_run: bool,
}

/// 根据配置创建推送后端
pub fn build_backend(config: &BridgeConfig, dry_run: bool) -> Result<Arc<dyn PushBackend>> {
    if dry_run {
        info!("Dry-run mode: notifications are logged, not pushed");
        return Ok(Arc::new(DryRunBackend::new()));
    }
    Ok(Arc::new(PushoverClient::new(PushoverConfig::from(config))?))
}

/// 处理 run 命令
pub async fn handle_run(args: RunArgs) -> Result<()> {
    let config = Arc::new(BridgeConfig::load(args.config.as_deref())?);
    let backend = build_backend(&config, args.dry_run)?;

    let transport = StdioTransport::new();

    let mut dispatcher = Dispatcher::new(config.clone(), backend, transport.clone());
    if config.history {
        dispatcher = dispatcher.with_history(HistoryStore::new(HistoryStore::default_path()));
    }

    // 订阅完成后才开始读 stdin，管道里先到的事件不会被当作未订阅丢掉
    dispatcher.subscribe(transport.as_ref()).await?;
    let events = transport.listen(EVENT_BUFFER);
    dispatcher.run(events).await
}
