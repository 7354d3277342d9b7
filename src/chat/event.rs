//! 聊天事件类型

use serde::{Deserialize, Serialize};

/// 传输层送来的原始事件，只被消费一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// 发送者身份，形如 `alice@ATHENA.MIT.EDU`
    pub sender: String,
    pub class: String,
    #[serde(default)]
    pub instance: String,
    #[serde(default)]
    pub opcode: String,
    /// 传输层是否认证过发送者
    #[serde(default)]
    pub auth: bool,
    /// 文本字段，最后一个是正文
    #[serde(default)]
    pub fields: Vec<String>,
}

impl InboundEvent {
    pub fn new(sender: impl Into<String>, class: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            class: class.into(),
            instance: instance.into(),
            opcode: String::new(),
            auth: true,
            fields: Vec::new(),
        }
    }

    pub fn with_opcode(mut self, opcode: impl Into<String>) -> Self {
        self.opcode = opcode.into();
        self
    }

    pub fn with_auth(mut self, auth: bool) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.fields.push(body.into());
        self
    }

    /// 正文（最后一个字段）
    pub fn body(&self) -> Option<&str> {
        self.fields.last().map(String::as_str)
    }
}

/// 发回聊天流的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub class: String,
    pub instance: String,
    pub sender: String,
    pub opcode: String,
    /// `[signature, text]`
    pub fields: Vec<String>,
}

impl OutboundMessage {
    /// 正文（最后一个字段）
    pub fn text(&self) -> &str {
        self.fields.last().map(String::as_str).unwrap_or("")
    }
}

/// 订阅三元组 (class, instance, recipient)，`*` 为通配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub class: String,
    pub instance: String,
    pub recipient: String,
}

impl Subscription {
    /// 订阅整个 class
    pub fn class(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            instance: "*".to_string(),
            recipient: "*".to_string(),
        }
    }

    pub fn matches(&self, event: &InboundEvent) -> bool {
        let class_ok = self.class == "*" || self.class.eq_ignore_ascii_case(&event.class);
        let instance_ok = self.instance == "*" || self.instance.eq_ignore_ascii_case(&event.instance);
        class_ok && instance_ok
    }
}
