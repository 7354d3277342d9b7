//! 配置模块 - 启动时加载一次，进程生命周期内只读
//!
//! 配置文件位于 `~/.config/andromeda/config.json`，推送凭据可以用
//! `ANDROMEDA_PUSH_TOKEN` / `ANDROMEDA_PUSH_USER` 环境变量覆盖。

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_REALM: &str = "ATHENA.MIT.EDU";
pub const DEFAULT_NAME: &str = "andromeda";
pub const DEFAULT_SIGNATURE: &str = "andromeda: your messages, on your phone";
pub const DEFAULT_API_URL: &str = "https://api.pushover.net/1";

pub const ENV_PUSH_TOKEN: &str = "ANDROMEDA_PUSH_TOKEN";
pub const ENV_PUSH_USER: &str = "ANDROMEDA_PUSH_USER";

/// 推送后端凭据（Pushover application token + user key）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushCredentials {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub user: String,
}

/// 桥接配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// 接收通知的用户
    pub user: String,
    /// 只接受这个 realm 的消息
    pub realm: String,
    /// 个人房间（class），为空时等于 user
    pub room: String,
    /// 广播房间，整个 class 的消息都会转发
    #[serde(alias = "largeRoom", skip_serializing_if = "Option::is_none")]
    pub large_room: Option<String>,
    /// 桥自身的发送者名称，也是个人房间里的 instance
    #[serde(alias = "selfName")]
    pub name: String,
    /// 附加在反馈消息上的签名
    pub signature: String,
    /// 禁止触发通知的发送者
    pub blocklist: Vec<String>,
    /// 是否允许 urgent / page
    #[serde(alias = "priorityEnabled")]
    pub priority_enabled: bool,
    pub push: PushCredentials,
    /// page 的重试间隔（秒）
    #[serde(alias = "retryInterval")]
    pub retry_interval: u64,
    /// page 的总有效期（秒）
    #[serde(alias = "expireDuration")]
    pub expire_duration: u64,
    /// 两次普通通知之间的最小间隔（秒）
    #[serde(alias = "rateInterval")]
    pub rate_interval: u64,
    /// 查询 page 回执的间隔（秒）
    #[serde(alias = "pollInterval")]
    pub poll_interval: u64,
    /// 反馈消息发出前的延迟（毫秒）
    pub feedback_delay_ms: u64,
    pub api_url: String,
    pub request_timeout_secs: u64,
    /// 只用于自言自语提醒的房间
    pub sandbox_rooms: Vec<String>,
    /// 是否回应 "I should really ..." 这类自言自语
    pub remarks: bool,
    /// 是否记录分发历史
    pub history: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            realm: DEFAULT_REALM.to_string(),
            room: String::new(),
            large_room: None,
            name: DEFAULT_NAME.to_string(),
            signature: DEFAULT_SIGNATURE.to_string(),
            blocklist: Vec::new(),
            priority_enabled: false,
            push: PushCredentials::default(),
            retry_interval: 30,
            expire_duration: 600,
            rate_interval: 5,
            poll_interval: 6,
            feedback_delay_ms: 1000,
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 30,
            sandbox_rooms: vec!["SANDBOX".to_string()],
            remarks: true,
            history: true,
        }
    }
}

impl BridgeConfig {
    /// 默认配置目录
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("andromeda")
    }

    /// 默认配置文件路径
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// 从文件加载，应用环境变量覆盖并校验
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("无法读取配置文件 {}", path.display()))?;

        let mut config = Self::from_json_str(&content)
            .with_context(|| format!("配置文件格式错误 {}", path.display()))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.finalize()?;

        info!(path = %path.display(), user = %config.user, room = %config.room, "Loaded configuration");
        Ok(config)
    }

    /// 解析 JSON（不校验）
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// 用环境变量覆盖推送凭据
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(ENV_PUSH_TOKEN).filter(|t| !t.is_empty()) {
            self.push.token = token;
        }
        if let Some(user) = lookup(ENV_PUSH_USER).filter(|u| !u.is_empty()) {
            self.push.user = user;
        }
    }

    /// 填充派生默认值并校验
    pub fn finalize(&mut self) -> Result<()> {
        if self.user.trim().is_empty() {
            return Err(anyhow!("配置缺少 user"));
        }
        if self.room.trim().is_empty() {
            self.room = self.user.clone();
        }
        if self.large_room.as_deref().is_some_and(|r| r.trim().is_empty()) {
            self.large_room = None;
        }
        if self.push.token.is_empty() || self.push.user.is_empty() {
            return Err(anyhow!(
                "配置缺少推送凭据 push.token / push.user（或 {} / {}）",
                ENV_PUSH_TOKEN,
                ENV_PUSH_USER
            ));
        }
        if self.poll_interval == 0 {
            return Err(anyhow!("poll_interval 必须大于 0"));
        }

        if self.retry_interval >= self.expire_duration {
            warn!(
                retry_interval = self.retry_interval,
                expire_duration = self.expire_duration,
                "retry_interval >= expire_duration; pages will never be retried before they expire"
            );
        }
        if self.priority_enabled && self.retry_interval < 30 {
            warn!(retry_interval = self.retry_interval, "Pushover rejects page retry intervals below 30 seconds");
        }

        Ok(())
    }

    pub fn retry(&self) -> Duration {
        Duration::from_secs(self.retry_interval)
    }

    pub fn expire(&self) -> Duration {
        Duration::from_secs(self.expire_duration)
    }

    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_secs(self.rate_interval)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn feedback_delay(&self) -> Duration {
        Duration::from_millis(self.feedback_delay_ms)
    }

    pub fn is_sandbox(&self, class: &str) -> bool {
        self.sandbox_rooms.iter().any(|r| r == class)
    }

    /// 需要订阅的 class 列表（去重，保持顺序）
    pub fn subscriptions(&self) -> Vec<String> {
        let mut classes = vec![self.room.clone()];
        if let Some(large) = &self.large_room {
            classes.push(large.clone());
        }
        if self.remarks {
            classes.extend(self.sandbox_rooms.iter().cloned());
        }

        let mut seen = Vec::new();
        for class in classes {
            if !seen.contains(&class) {
                seen.push(class);
            }
        }
        seen
    }

    /// 凭据打码后的副本（用于展示）
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        copy.push.token = mask(&copy.push.token);
        copy.push.user = mask(&copy.push.user);
        copy
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{}...", prefix)
}
