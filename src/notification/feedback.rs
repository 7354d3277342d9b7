//! 反馈消息 - 把处理结果发回聊天流
//!
//! 反馈消息带 `auto` opcode，回流时会被过滤器识别并忽略。

use crate::chat::{ChatTransport, OutboundMessage};
use crate::config::BridgeConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::urgency::LOOPBACK_TAG;

/// 反馈发送器（可廉价 clone，page 任务各持一份）
#[derive(Clone)]
pub struct FeedbackEmitter {
    transport: Arc<dyn ChatTransport>,
    sender: String,
    signature: String,
    /// 发送前的固定延迟，避免短时间内刷屏
    delay: Duration,
}

impl FeedbackEmitter {
    pub fn new(transport: Arc<dyn ChatTransport>, sender: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            transport,
            sender: sender.into(),
            signature: signature.into(),
            delay: Duration::from_secs(1),
        }
    }

    pub fn from_config(transport: Arc<dyn ChatTransport>, config: &BridgeConfig) -> Self {
        Self::new(transport, config.name.clone(), config.signature.clone()).with_delay(config.feedback_delay())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 组装反馈消息
    pub fn compose(&self, class: &str, instance: &str, text: &str) -> OutboundMessage {
        OutboundMessage {
            class: class.to_string(),
            instance: instance.to_string(),
            sender: self.sender.clone(),
            opcode: LOOPBACK_TAG.to_string(),
            fields: vec![self.signature.clone(), text.to_string()],
        }
    }

    /// 延迟后发送；传输失败只记日志
    pub async fn emit(&self, class: &str, instance: &str, text: &str) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let message = self.compose(class, instance, text);
        match self.transport.send(&message).await {
            Ok(()) => debug!(class = %class, instance = %instance, text = %text, "Feedback sent"),
            Err(e) => warn!(
                transport = self.transport.name(),
                class = %class,
                error = %e,
                "Failed to send feedback"
            ),
        }
    }
}
