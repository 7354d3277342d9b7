//! 授权检查 - 黑名单和优先级开关
//!
//! 在限流之前执行，被拒绝的请求不会占用限流名额。

use super::filter::NormalizedRequest;
use super::urgency::Priority;
use crate::config::BridgeConfig;
use std::collections::HashSet;

/// 拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Blocked,
    PriorityDisabled(Priority),
}

impl Rejection {
    /// 发回聊天流的说明
    pub fn feedback(&self, sender: &str, user: &str) -> String {
        match self {
            Rejection::Blocked => {
                format!("{}: you are blocked from sending notifications to {}", sender, user)
            }
            Rejection::PriorityDisabled(Priority::Page) => format!("paging is disabled for {}", user),
            Rejection::PriorityDisabled(priority) => {
                format!("{} are disabled for {}", priority.disabled_label(), user)
            }
        }
    }
}

/// 授权检查
pub struct AuthorizationGate {
    blocklist: HashSet<String>,
    priority_enabled: bool,
}

impl AuthorizationGate {
    pub fn new(blocklist: impl IntoIterator<Item = String>, priority_enabled: bool) -> Self {
        Self {
            blocklist: blocklist.into_iter().collect(),
            priority_enabled,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.blocklist.iter().cloned(), config.priority_enabled)
    }

    pub fn check(&self, request: &NormalizedRequest) -> Result<(), Rejection> {
        if self.blocklist.contains(&request.sender) {
            return Err(Rejection::Blocked);
        }
        if request.priority > Priority::Normal && !self.priority_enabled {
            return Err(Rejection::PriorityDisabled(request.priority));
        }
        Ok(())
    }
}
