//! andromeda CLI
//!
//! 把聊天里发给你的消息转成手机推送，支持需要确认的 page

use andromeda::{
    cli::{build_backend, format_history, format_output, handle_run, handle_setup, RunArgs, SetupArgs},
    notification::{
        backend::{classify, parse_acknowledged, StatusClass},
        notifier::submit,
        Delivery,
    },
    BridgeConfig, HistoryStore, Priority, PushMessage,
};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "andromeda")]
#[command(about = "andromeda - 把聊天消息转成手机推送")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动桥接（stdin 读事件，stdout 写反馈）
    Run(RunArgs),
    /// 直接发送一条推送
    Push {
        /// 推送内容
        message: String,
        /// 以 urgent 优先级发送
        #[arg(long)]
        urgent: bool,
        /// 配置文件路径
        #[arg(long, short)]
        config: Option<PathBuf>,
        /// 只打印不发送
        #[arg(long)]
        dry_run: bool,
    },
    /// 查询 page 回执是否已确认
    Receipt {
        /// 回执 ID
        id: String,
        /// 配置文件路径
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// 查看最近的分发记录
    History {
        /// 显示最近 N 条
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 交互式生成配置
    Setup(SetupArgs),
    /// 显示生效的配置（凭据已遮盖）
    Config {
        /// 配置文件路径
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug andromeda run
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("andromeda=info"));

    // stdout 留给反馈消息，日志只写 stderr
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            handle_run(args).await?;
        }
        Commands::Push { message, urgent, config, dry_run } => {
            let config = BridgeConfig::load(config.as_deref())?;
            let backend = build_backend(&config, dry_run)?;
            let priority = if urgent { Priority::Urgent } else { Priority::Normal };

            match submit(backend.as_ref(), &PushMessage::notification(message, priority)).await {
                Ok(_) => println!("{} sent to {}", priority.tier_name(), config.user),
                Err(Delivery::RejectedPermanent) => {
                    return Err(anyhow!("{} could not be notified; do not try again", config.user));
                }
                Err(_) => {
                    return Err(anyhow!("{} could not be notified; try again later", config.user));
                }
            }
        }
        Commands::Receipt { id, config } => {
            let config = BridgeConfig::load(config.as_deref())?;
            let backend = build_backend(&config, false)?;
            let reply = backend.receipt(&id).await?;

            if classify(reply.status) != StatusClass::Success {
                return Err(anyhow!("回执查询失败 (HTTP {}): {}", reply.status, reply.body));
            }
            match parse_acknowledged(&reply.body) {
                Some(true) => println!("{}: acknowledged", id),
                Some(false) => println!("{}: not acknowledged", id),
                None => return Err(anyhow!("无法解析回执响应: {}", reply.body)),
            }
        }
        Commands::History { limit, json } => {
            let store = HistoryStore::new(HistoryStore::default_path());
            println!("{}", format_history(&store.read_recent(limit), json));
        }
        Commands::Setup(args) => {
            handle_setup(args)?;
        }
        Commands::Config { config } => {
            let config = BridgeConfig::load(config.as_deref())?;
            println!("{}", format_output(&config.masked()));
        }
    }

    Ok(())
}
