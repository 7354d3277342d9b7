//! 内存传输 - 记录所有发出的消息，供测试检查

use super::event::{OutboundMessage, Subscription};
use super::transport::ChatTransport;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Default)]
pub struct MemoryTransport {
    subscriptions: Mutex<Vec<Subscription>>,
    sent: Mutex<Vec<OutboundMessage>>,
    failing: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 让后续 send 全部失败
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// 已发消息的正文
    pub fn texts(&self) -> Vec<String> {
        self.sent().iter().map(|m| m.text().to_string()).collect()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[async_trait]
impl ChatTransport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn subscribe(&self, subscription: &Subscription) -> Result<()> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription.clone());
        Ok(())
    }

    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("memory transport is failing"));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}
