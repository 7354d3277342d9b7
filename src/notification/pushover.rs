//! Pushover HTTP 客户端
//!
//! `POST /messages.json` 提交推送，`GET /receipts/{receipt}.json` 查询 page 回执。

use super::backend::{BackendReply, PushBackend, PushMessage};
use crate::config::{BridgeConfig, DEFAULT_API_URL};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Pushover 客户端配置
#[derive(Debug, Clone)]
pub struct PushoverConfig {
    /// API 基础 URL（如 https://api.pushover.net/1）
    pub api_url: String,
    /// Application token
    pub token: String,
    /// 接收者 user key
    pub user: String,
    /// 超时时间 (秒)
    pub timeout_secs: u64,
}

impl Default for PushoverConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: String::new(),
            user: String::new(),
            timeout_secs: 30,
        }
    }
}

impl From<&BridgeConfig> for PushoverConfig {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            api_url: config.api_url.clone(),
            token: config.push.token.clone(),
            user: config.push.user.clone(),
            timeout_secs: config.request_timeout_secs,
        }
    }
}

/// Pushover 客户端
#[derive(Debug)]
pub struct PushoverClient {
    client: Client,
    config: PushoverConfig,
}

impl PushoverClient {
    /// 创建新的客户端
    pub fn new(config: PushoverConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(anyhow!("push token is required"));
        }
        if config.user.is_empty() {
            return Err(anyhow!("push user key is required"));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    /// 表单字段
    fn form(&self, message: &PushMessage) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("token", self.config.token.clone()),
            ("user", self.config.user.clone()),
            ("message", message.message.clone()),
            ("priority", message.priority.api_value().to_string()),
        ];
        if let Some(retry) = message.retry {
            form.push(("retry", retry.to_string()));
        }
        if let Some(expire) = message.expire {
            form.push(("expire", expire.to_string()));
        }
        form
    }
}

#[async_trait]
impl PushBackend for PushoverClient {
    fn name(&self) -> &str {
        "pushover"
    }

    async fn submit(&self, message: &PushMessage) -> Result<BackendReply> {
        let response = self
            .client
            .post(self.url("messages.json"))
            .form(&self.form(message))
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        debug!(status, priority = %message.priority, "Pushover message response");

        Ok(BackendReply { status, body })
    }

    async fn receipt(&self, receipt: &str) -> Result<BackendReply> {
        if receipt.is_empty() || !receipt.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(anyhow!("invalid receipt: {:?}", receipt));
        }

        let response = self
            .client
            .get(self.url(&format!("receipts/{}.json", receipt)))
            .query(&[("token", self.config.token.as_str())])
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        debug!(status, receipt = %receipt, "Pushover receipt response");

        Ok(BackendReply { status, body })
    }
}
