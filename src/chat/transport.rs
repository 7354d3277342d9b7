//! 聊天传输 trait

use super::event::{OutboundMessage, Subscription};
use anyhow::Result;
use async_trait::async_trait;

/// 聊天传输 - 分发管线只依赖这两个原语
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// 传输名称（用于日志）
    fn name(&self) -> &str;

    /// 订阅一个目的地，之后匹配的事件会送进入站 channel
    async fn subscribe(&self, subscription: &Subscription) -> Result<()>;

    /// 发送一条消息
    async fn send(&self, message: &OutboundMessage) -> Result<()>;
}
