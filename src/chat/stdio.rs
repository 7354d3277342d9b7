//! 标准输入输出传输 - 每行一个 JSON
//!
//! stdin 读入 `InboundEvent`，stdout 写出 `OutboundMessage`。
//! 用于把真正的聊天客户端通过管道接到桥上。

use super::event::{InboundEvent, OutboundMessage, Subscription};
use super::transport::ChatTransport;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

type SharedSubscriptions = Arc<Mutex<Vec<Subscription>>>;

/// 标准输入输出传输
pub struct StdioTransport {
    subscriptions: SharedSubscriptions,
    stdout: tokio::sync::Mutex<Stdout>,
}

impl StdioTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            stdout: tokio::sync::Mutex::new(tokio::io::stdout()),
        })
    }

    /// 开始读取 stdin，返回入站事件 channel
    ///
    /// 先 subscribe 再 listen：读取任务只转发已订阅的事件。
    pub fn listen(&self, buffer: usize) -> mpsc::Receiver<InboundEvent> {
        self.listen_on(tokio::io::stdin(), buffer)
    }

    /// 从任意输入读取事件
    pub fn listen_on<R>(&self, reader: R, buffer: usize) -> mpsc::Receiver<InboundEvent>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(buffer);
        let subscriptions = self.subscriptions.clone();
        tokio::spawn(async move {
            if let Err(e) = read_events(reader, subscriptions, tx).await {
                error!(error = %e, "stdin reader stopped");
            }
        });
        rx
    }
}

#[async_trait]
impl ChatTransport for StdioTransport {
    fn name(&self) -> &str {
        "stdio"
    }

    async fn subscribe(&self, subscription: &Subscription) -> Result<()> {
        info!(class = %subscription.class, instance = %subscription.instance, "Subscribed");
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription.clone());
        Ok(())
    }

    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await.context("写入 stdout 失败")?;
        stdout.flush().await?;
        Ok(())
    }
}

/// 逐行读取事件，丢弃无法解析或未订阅的
async fn read_events<R>(reader: R, subscriptions: SharedSubscriptions, tx: mpsc::Sender<InboundEvent>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: InboundEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "Skipping unparseable event line");
                continue;
            }
        };

        let subscribed = subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|s| s.matches(&event));
        if !subscribed {
            debug!(class = %event.class, "Skipping event for unsubscribed class");
            continue;
        }

        if tx.send(event).await.is_err() {
            // 消费者已退出
            break;
        }
    }

    info!("Inbound stream closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_events_filters_unsubscribed_and_garbage() {
        let input = concat!(
            r#"{"sender": "bob@ATHENA.MIT.EDU", "class": "alice", "instance": "andromeda", "auth": true, "fields": ["hi"]}"#,
            "\n",
            "not json at all\n",
            "\n",
            r#"{"sender": "bob@ATHENA.MIT.EDU", "class": "help", "instance": "x", "auth": true, "fields": ["?"]}"#,
            "\n",
        );
        let subscriptions = Arc::new(Mutex::new(vec![Subscription::class("alice")]));
        let (tx, mut rx) = mpsc::channel(8);

        read_events(input.as_bytes(), subscriptions, tx).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.class, "alice");
        assert_eq!(event.body(), Some("hi"));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_lines_written_before_subscribe_are_delivered() {
        let (mut writer, reader) = tokio::io::duplex(4096);
        let line = r#"{"sender": "bob@ATHENA.MIT.EDU", "class": "alice", "instance": "andromeda", "auth": true, "fields": ["early"]}"#;
        writer.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
        drop(writer);

        let transport = StdioTransport::new();
        transport.subscribe(&Subscription::class("alice")).await.unwrap();
        let mut rx = transport.listen_on(reader, 8);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.body(), Some("early"));
        assert!(rx.recv().await.is_none());
    }
}
