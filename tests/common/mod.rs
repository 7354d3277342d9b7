//! 集成测试共用的脚本化后端和配置

#![allow(dead_code)]

use andromeda::notification::BackendReply;
use andromeda::{BridgeConfig, PushBackend, PushMessage};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const ACCEPTED: &str = r#"{"status":1,"request":"req-1","receipt":"rcpt1"}"#;
pub const PENDING: &str = r#"{"status":1,"acknowledged":0}"#;
pub const ACKED: &str = r#"{"status":1,"acknowledged":1}"#;

/// 按脚本回复的后端；脚本用完后提交总是成功，回执总是未确认
#[derive(Default)]
pub struct ScriptedBackend {
    submits: Mutex<VecDeque<Result<BackendReply, String>>>,
    receipts: Mutex<VecDeque<Result<BackendReply, String>>>,
    submitted: Mutex<Vec<PushMessage>>,
    queried: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_submit(self, status: u16, body: &str) -> Self {
        self.submits.lock().unwrap().push_back(Ok(BackendReply::new(status, body)));
        self
    }

    pub fn fail_submit(self, error: &str) -> Self {
        self.submits.lock().unwrap().push_back(Err(error.to_string()));
        self
    }

    pub fn reply_receipt(self, status: u16, body: &str) -> Self {
        self.receipts.lock().unwrap().push_back(Ok(BackendReply::new(status, body)));
        self
    }

    pub fn fail_receipt(self, error: &str) -> Self {
        self.receipts.lock().unwrap().push_back(Err(error.to_string()));
        self
    }

    pub fn submitted(&self) -> Vec<PushMessage> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn queried(&self) -> usize {
        self.queried.lock().unwrap().len()
    }
}

#[async_trait]
impl PushBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, message: &PushMessage) -> Result<BackendReply> {
        self.submitted.lock().unwrap().push(message.clone());
        match self.submits.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Ok(BackendReply::new(200, ACCEPTED)),
        }
    }

    async fn receipt(&self, receipt: &str) -> Result<BackendReply> {
        self.queried.lock().unwrap().push(receipt.to_string());
        match self.receipts.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Ok(BackendReply::new(200, PENDING)),
        }
    }
}

/// alice 的配置：个人房间 alice，广播房间 lunch-crew，无反馈延迟
pub fn config() -> BridgeConfig {
    BridgeConfig {
        user: "alice".to_string(),
        room: "alice".to_string(),
        large_room: Some("lunch-crew".to_string()),
        blocklist: vec!["mallory".to_string()],
        priority_enabled: true,
        feedback_delay_ms: 0,
        ..Default::default()
    }
}
