//! 推送后端 trait 和响应分类

use super::urgency::Priority;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// 发给后端的一条推送
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub message: String,
    pub priority: Priority,
    /// page 的重试间隔（秒）
    pub retry: Option<u64>,
    /// page 的有效期（秒）
    pub expire: Option<u64>,
}

impl PushMessage {
    /// 普通或紧急通知
    pub fn notification(message: impl Into<String>, priority: Priority) -> Self {
        let priority = priority.min(Priority::Urgent);
        Self {
            message: message.into(),
            priority,
            retry: None,
            expire: None,
        }
    }

    /// 需要确认的 page
    pub fn page(message: impl Into<String>, retry_secs: u64, expire_secs: u64) -> Self {
        Self {
            message: message.into(),
            priority: Priority::Page,
            retry: Some(retry_secs),
            expire: Some(expire_secs),
        }
    }
}

/// 后端的原始 HTTP 响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    pub status: u16,
    pub body: String,
}

impl BackendReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// HTTP 状态分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// 4xx（429 除外），重试无意义
    ClientError,
    /// 其他一律按暂时失败处理
    Other,
}

pub fn classify(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        // 429 是后端限流，稍后重试即可
        429 => StatusClass::Other,
        400..=499 => StatusClass::ClientError,
        _ => StatusClass::Other,
    }
}

/// 从提交响应里取出 receipt
pub fn parse_receipt(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("receipt")
        .and_then(|r| r.as_str())
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
}

/// 从回执查询响应里取出 acknowledged（布尔或 0/1）
pub fn parse_acknowledged(body: &str) -> Option<bool> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let value = json.get("acknowledged")?;
    value
        .as_bool()
        .or_else(|| value.as_i64().map(|n| n != 0))
}

/// 推送后端 - 网络层失败返回 Err，HTTP 状态交给调用方分类
#[async_trait]
pub trait PushBackend: Send + Sync {
    /// 后端名称（用于日志）
    fn name(&self) -> &str;

    /// 提交一条推送
    async fn submit(&self, message: &PushMessage) -> Result<BackendReply>;

    /// 查询 page 回执
    async fn receipt(&self, receipt: &str) -> Result<BackendReply>;
}

/// dry-run 后端：只记日志，总是成功，page 立即被确认
#[derive(Debug, Default)]
pub struct DryRunBackend {
    submitted: AtomicUsize,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushBackend for DryRunBackend {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn submit(&self, message: &PushMessage) -> Result<BackendReply> {
        let n = self.submitted.fetch_add(1, Ordering::SeqCst) + 1;
        info!(priority = %message.priority, message = %message.message, "[DRY-RUN] Would push");
        let body = serde_json::json!({"status": 1, "receipt": format!("dryrun{}", n)});
        Ok(BackendReply::new(200, body.to_string()))
    }

    async fn receipt(&self, receipt: &str) -> Result<BackendReply> {
        info!(receipt = %receipt, "[DRY-RUN] Would query receipt");
        Ok(BackendReply::new(200, r#"{"status":1,"acknowledged":1}"#))
    }
}
