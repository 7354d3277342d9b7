//! Pager - 需要确认的 page
//!
//! # 状态机
//! Idle -> Requesting -> Submitted -> Polling -> Idle
//!
//! - 同一时间最多一个 page：排他性用单许可的 `Semaphore`，
//!   `try_acquire_owned` 拿不到就立刻返回 `PagerBusy`，不等待也不排队
//! - 许可随 page 任务移动，任务结束（确认、过期、被拒）时先释放许可再发反馈
//! - 轮询在独立的 tokio 任务里跑，终态通过 `PageHandle` 返回

use super::backend::{classify, parse_acknowledged, parse_receipt, PushBackend, PushMessage, StatusClass};
use super::feedback::FeedbackEmitter;
use super::filter::NormalizedRequest;
use super::notifier::{submit, Delivery};
use super::store::{HistoryRecord, HistoryStore};
use crate::config::BridgeConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// page 的时间参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSettings {
    /// 后端重复提醒的间隔
    pub retry: Duration,
    /// page 的总有效期
    pub expire: Duration,
    /// 查询回执的间隔
    pub poll_interval: Duration,
}

impl PageSettings {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            retry: config.retry(),
            expire: config.expire(),
            poll_interval: config.poll(),
        }
    }
}

/// page 的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Acknowledged,
    Expired,
    /// 提交被拒（4xx）
    RejectedPermanent,
    /// 提交失败（5xx、网络错误、缺少 receipt）
    RejectedTransient,
    /// 回执查询返回 4xx，回执失效
    ReceiptRejected,
}

impl PageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageOutcome::Acknowledged => "acknowledged",
            PageOutcome::Expired => "expired",
            PageOutcome::RejectedPermanent => "rejected_permanent",
            PageOutcome::RejectedTransient => "rejected_transient",
            PageOutcome::ReceiptRejected => "receipt_rejected",
        }
    }

    /// 终态反馈；回执失效只记日志
    pub fn feedback(&self, user: &str) -> Option<String> {
        match self {
            PageOutcome::Acknowledged => Some(format!("page acknowledged by {}", user)),
            PageOutcome::Expired => Some(format!("page to {} expired unacknowledged", user)),
            PageOutcome::RejectedPermanent => {
                Some(format!("{} could not be paged; do not try again", user))
            }
            PageOutcome::RejectedTransient => {
                Some(format!("{} could not be paged; try again later", user))
            }
            PageOutcome::ReceiptRejected => None,
        }
    }
}

/// 进行中的 page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSession {
    pub receipt: String,
    pub started_at: Instant,
    pub deadline: Instant,
    pub acknowledged: bool,
}

impl PageSession {
    pub fn new(receipt: String, started_at: Instant, expire: Duration) -> Self {
        Self {
            receipt,
            started_at,
            deadline: started_at + expire,
            acknowledged: false,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// 已有 page 在进行中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerBusy;

impl std::fmt::Display for PagerBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a page is already in flight")
    }
}

impl std::error::Error for PagerBusy {}

/// 进行中 page 的句柄，可等待终态
#[derive(Debug)]
pub struct PageHandle {
    join: JoinHandle<PageOutcome>,
}

impl PageHandle {
    /// 等待 page 结束
    pub async fn outcome(self) -> PageOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Page task failed");
                PageOutcome::RejectedTransient
            }
        }
    }
}

/// Pager
#[derive(Clone)]
pub struct Pager {
    backend: Arc<dyn PushBackend>,
    feedback: FeedbackEmitter,
    history: Option<HistoryStore>,
    settings: PageSettings,
    user: String,
    /// 单许可，持有即代表有 page 在进行
    slot: Arc<Semaphore>,
}

impl Pager {
    pub fn new(backend: Arc<dyn PushBackend>, feedback: FeedbackEmitter, user: impl Into<String>, settings: PageSettings) -> Self {
        Self {
            backend,
            feedback,
            history: None,
            settings,
            user: user.into(),
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn from_config(backend: Arc<dyn PushBackend>, feedback: FeedbackEmitter, config: &BridgeConfig) -> Self {
        Self::new(backend, feedback, config.user.clone(), PageSettings::from_config(config))
    }

    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    /// 是否有 page 在进行
    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// 非阻塞地开始一个 page
    ///
    /// 排他性被占用时立即返回 `PagerBusy`，调用方负责反馈。
    /// 成功时提交和轮询都在后台任务中进行。
    pub fn try_start(&self, request: NormalizedRequest, text: String) -> Result<PageHandle, PagerBusy> {
        let permit = self.slot.clone().try_acquire_owned().map_err(|_| PagerBusy)?;

        info!(sender = %request.sender, class = %request.class, "Page requested");
        let pager = self.clone();
        let join = tokio::spawn(async move { pager.run(permit, request, text).await });
        Ok(PageHandle { join })
    }

    async fn run(self, permit: OwnedSemaphorePermit, request: NormalizedRequest, text: String) -> PageOutcome {
        let outcome = self.escalate(&request, text).await;
        drop(permit);

        info!(sender = %request.sender, outcome = outcome.as_str(), "Page finished");
        if let Some(text) = outcome.feedback(&self.user) {
            self.feedback.emit(&request.class, &request.instance, &text).await;
        }
        if let Some(history) = &self.history {
            if let Err(e) = history.append(&HistoryRecord::new(&request, outcome.as_str())) {
                warn!(error = %e, "Failed to record page outcome");
            }
        }
        outcome
    }

    /// 提交并轮询，直到确认、过期或被拒
    async fn escalate(&self, request: &NormalizedRequest, text: String) -> PageOutcome {
        let message = PushMessage::page(text, self.settings.retry.as_secs(), self.settings.expire.as_secs());

        let body = match submit(self.backend.as_ref(), &message).await {
            Ok(body) => body,
            Err(Delivery::RejectedPermanent) => return PageOutcome::RejectedPermanent,
            Err(_) => return PageOutcome::RejectedTransient,
        };

        let Some(receipt) = parse_receipt(&body) else {
            warn!(body = %body, "Page accepted without a receipt");
            return PageOutcome::RejectedTransient;
        };

        let mut session = PageSession::new(receipt, Instant::now(), self.settings.expire);
        info!(receipt = %session.receipt, expire_secs = self.settings.expire.as_secs(), "Page submitted");
        self.feedback
            .emit(
                &request.class,
                &request.instance,
                &format!("paging {}; waiting for acknowledgment", self.user),
            )
            .await;

        self.poll(&mut session).await
    }

    /// 按固定间隔查询回执，到期为止
    async fn poll(&self, session: &mut PageSession) -> PageOutcome {
        loop {
            let now = Instant::now();
            if session.is_expired(now) {
                return PageOutcome::Expired;
            }

            sleep_until((now + self.settings.poll_interval).min(session.deadline)).await;
            if session.is_expired(Instant::now()) {
                warn!(receipt = %session.receipt, "Page expired without acknowledgment");
                return PageOutcome::Expired;
            }

            let reply = match self.backend.receipt(&session.receipt).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(receipt = %session.receipt, error = %e, "Receipt query failed, will retry");
                    continue;
                }
            };

            match classify(reply.status) {
                StatusClass::Success => match parse_acknowledged(&reply.body) {
                    Some(true) => {
                        session.acknowledged = true;
                        let waited = session.started_at.elapsed().as_secs();
                        info!(receipt = %session.receipt, waited_secs = waited, "Page acknowledged");
                        return PageOutcome::Acknowledged;
                    }
                    Some(false) => debug!(receipt = %session.receipt, "Page not yet acknowledged"),
                    None => warn!(receipt = %session.receipt, body = %reply.body, "Malformed receipt response"),
                },
                StatusClass::ClientError => {
                    error!(
                        receipt = %session.receipt,
                        status = reply.status,
                        body = %reply.body,
                        "Receipt rejected by backend, giving up"
                    );
                    return PageOutcome::ReceiptRejected;
                }
                StatusClass::Other => {
                    warn!(receipt = %session.receipt, status = reply.status, "Receipt query failed, will retry");
                }
            }
        }
    }
}
