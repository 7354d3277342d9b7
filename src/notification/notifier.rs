//! 通知器 - 发送单条普通/紧急通知并解释后端响应
//!
//! 没有自动重试：聊天流里的反馈就是唯一的恢复信号。

use super::backend::{classify, PushBackend, PushMessage, StatusClass};
use super::feedback::FeedbackEmitter;
use super::filter::NormalizedRequest;
use crate::config::BridgeConfig;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 单次投递结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// 后端明确拒绝（4xx），重试无意义
    RejectedPermanent,
    /// 5xx、网络错误、超时
    RejectedTransient,
}

impl Delivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delivery::Sent => "sent",
            Delivery::RejectedPermanent => "rejected_permanent",
            Delivery::RejectedTransient => "rejected_transient",
        }
    }
}

/// 调用后端提交并分类；成功时返回响应体
///
/// Notifier 和 Pager 共用这一层。
pub async fn submit(backend: &dyn PushBackend, message: &PushMessage) -> Result<String, Delivery> {
    let reply = match backend.submit(message).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(backend = backend.name(), error = %e, "Push request failed");
            return Err(Delivery::RejectedTransient);
        }
    };

    match classify(reply.status) {
        StatusClass::Success => Ok(reply.body),
        StatusClass::ClientError => {
            error!(
                backend = backend.name(),
                status = reply.status,
                body = %reply.body,
                "Push rejected by backend"
            );
            Err(Delivery::RejectedPermanent)
        }
        StatusClass::Other => {
            warn!(
                backend = backend.name(),
                status = reply.status,
                body = %reply.body,
                "Push failed, backend unavailable"
            );
            Err(Delivery::RejectedTransient)
        }
    }
}

/// 推送正文：广播房间里本人发的消息只带 instance，其他带上发送者
pub fn compose_text(request: &NormalizedRequest, user: &str, large_room: Option<&str>) -> String {
    let own_broadcast = large_room == Some(request.class.as_str()) && request.sender == user;
    if own_broadcast {
        format!("{}: {}", request.instance, request.body)
    } else {
        format!("{}-{}: {}", request.sender, request.instance, request.body)
    }
}

/// 通知器
pub struct Notifier {
    backend: Arc<dyn PushBackend>,
    feedback: FeedbackEmitter,
    user: String,
    large_room: Option<String>,
}

impl Notifier {
    pub fn new(backend: Arc<dyn PushBackend>, feedback: FeedbackEmitter, config: &BridgeConfig) -> Self {
        Self {
            backend,
            feedback,
            user: config.user.clone(),
            large_room: config.large_room.clone(),
        }
    }

    pub fn compose(&self, request: &NormalizedRequest) -> String {
        compose_text(request, &self.user, self.large_room.as_deref())
    }

    /// 发送一条通知，并把结果反馈到来源房间
    pub async fn send(&self, request: &NormalizedRequest) -> Delivery {
        let message = PushMessage::notification(self.compose(request), request.priority);

        let delivery = match submit(self.backend.as_ref(), &message).await {
            Ok(_) => {
                info!(
                    sender = %request.sender,
                    class = %request.class,
                    priority = %request.priority,
                    "Notification sent"
                );
                Delivery::Sent
            }
            Err(delivery) => delivery,
        };

        let text = self.feedback_text(request, delivery);
        self.feedback.emit(&request.class, &request.instance, &text).await;
        delivery
    }

    fn feedback_text(&self, request: &NormalizedRequest, delivery: Delivery) -> String {
        match delivery {
            Delivery::Sent => format!("{} sent to {}", request.priority.tier_name(), self.user),
            Delivery::RejectedPermanent => {
                format!("{} could not be notified; do not try again", self.user)
            }
            Delivery::RejectedTransient => {
                format!("{} could not be notified; try again later", self.user)
            }
        }
    }
}
