//! 入站过滤 - 决定一条聊天事件是否需要处理，并提取请求
//!
//! 聊天流里充满不可信的流量，所有不合格的事件都是静默丢弃，
//! 只在 debug 级别留日志。

use crate::chat::InboundEvent;
use crate::config::BridgeConfig;
use serde::{Deserialize, Serialize};

use super::urgency::{get_priority, is_loopback, Priority};

/// 规范化后的通知请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRequest {
    /// 发送者（不含 realm）
    pub sender: String,
    pub class: String,
    pub instance: String,
    pub priority: Priority,
    pub body: String,
}

/// 用户在自己房间里的自言自语
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remark {
    pub class: String,
    pub instance: String,
    pub body: String,
}

/// 过滤结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// 发给桥的通知请求
    Request(NormalizedRequest),
    /// 用户本人说的话
    Remark(Remark),
}

/// 丢弃原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// sender 里没有 `@realm`
    MalformedSender,
    ForeignRealm,
    Unauthenticated,
    /// 桥自己发出的消息
    Loopback,
    /// 没有正文字段
    NoBody,
    /// 不是发给桥的
    Unrouted,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MalformedSender => "malformed_sender",
            DropReason::ForeignRealm => "foreign_realm",
            DropReason::Unauthenticated => "unauthenticated",
            DropReason::Loopback => "loopback",
            DropReason::NoBody => "no_body",
            DropReason::Unrouted => "unrouted",
        }
    }
}

/// 拆分 `name@REALM`
fn split_sender(sender: &str) -> Option<(&str, &str)> {
    let (name, realm) = sender.split_once('@')?;
    if name.is_empty() || realm.is_empty() || realm.contains('@') {
        return None;
    }
    Some((name, realm))
}

/// 过滤并规范化一条事件
pub fn normalize(event: &InboundEvent, config: &BridgeConfig) -> Result<Inbound, DropReason> {
    let (sender, realm) = split_sender(&event.sender).ok_or(DropReason::MalformedSender)?;
    if realm != config.realm {
        return Err(DropReason::ForeignRealm);
    }
    if !event.auth {
        return Err(DropReason::Unauthenticated);
    }
    if is_loopback(&event.opcode) {
        return Err(DropReason::Loopback);
    }
    let body = event.body().ok_or(DropReason::NoBody)?;

    let personal = event.class == config.room && event.instance == config.name;
    let broadcast = config.large_room.as_deref() == Some(event.class.as_str());

    if personal || broadcast {
        return Ok(Inbound::Request(NormalizedRequest {
            sender: sender.to_string(),
            class: event.class.clone(),
            instance: event.instance.clone(),
            priority: get_priority(&event.opcode),
            body: body.to_string(),
        }));
    }

    let own_room = event.class == config.room || config.is_sandbox(&event.class);
    if config.remarks && own_room && sender == config.user {
        return Ok(Inbound::Remark(Remark {
            class: event.class.clone(),
            instance: event.instance.clone(),
            body: body.to_string(),
        }));
    }

    Err(DropReason::Unrouted)
}
