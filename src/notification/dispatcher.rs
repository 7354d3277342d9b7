//! 通知分发器 - 逐条处理聊天事件
//!
//! 事件 -> 过滤 -> 授权 -> 限流 -> 按优先级走 Notifier 或 Pager -> 反馈。
//! 分发器是唯一的消费者，按到达顺序一次处理一条；只有 page 的轮询在后台任务中进行。

use super::backend::PushBackend;
use super::feedback::FeedbackEmitter;
use super::filter::{normalize, DropReason, Inbound, NormalizedRequest, Remark};
use super::gate::{AuthorizationGate, Rejection};
use super::notifier::{Delivery, Notifier};
use super::pager::{PageHandle, Pager};
use super::remark::{respond, REMARK_DELAY};
use super::store::{HistoryRecord, HistoryStore};
use super::throttle::RateLimiter;
use super::urgency::Priority;
use crate::chat::{ChatTransport, InboundEvent, Subscription};
use crate::config::BridgeConfig;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// 单条事件的处理结果
#[derive(Debug)]
pub enum DispatchOutcome {
    /// 不合格的事件，静默丢弃
    Dropped(DropReason),
    /// 用户自言自语，是否回复了
    Remark { replied: bool },
    Blocked,
    PriorityDisabled(Priority),
    RateLimited,
    Delivered(Delivery),
    /// 已有 page 在进行
    PagingBusy,
    /// page 已开始，句柄可等待终态
    Paging(PageHandle),
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Dropped(_) => "dropped",
            DispatchOutcome::Remark { .. } => "remark",
            DispatchOutcome::Blocked => "blocked",
            DispatchOutcome::PriorityDisabled(_) => "priority_disabled",
            DispatchOutcome::RateLimited => "rate_limited",
            DispatchOutcome::Delivered(delivery) => delivery.as_str(),
            DispatchOutcome::PagingBusy => "paging_busy",
            DispatchOutcome::Paging(_) => "paging",
        }
    }
}

/// 通知分发器
pub struct Dispatcher {
    config: Arc<BridgeConfig>,
    gate: AuthorizationGate,
    limiter: RateLimiter,
    notifier: Notifier,
    pager: Pager,
    feedback: FeedbackEmitter,
    history: Option<HistoryStore>,
    remark_delay: Duration,
}

impl Dispatcher {
    pub fn new(config: Arc<BridgeConfig>, backend: Arc<dyn PushBackend>, transport: Arc<dyn ChatTransport>) -> Self {
        let feedback = FeedbackEmitter::from_config(transport, &config);
        let notifier = Notifier::new(backend.clone(), feedback.clone(), &config);
        let pager = Pager::from_config(backend, feedback.clone(), &config);

        Self {
            gate: AuthorizationGate::from_config(&config),
            limiter: RateLimiter::new(config.rate_limit_interval()),
            notifier,
            pager,
            feedback,
            history: None,
            remark_delay: REMARK_DELAY,
            config,
        }
    }

    /// 记录分发历史
    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.pager = self.pager.with_history(history.clone());
        self.history = Some(history);
        self
    }

    /// 设置自言自语回复前的停顿
    pub fn with_remark_delay(mut self, delay: Duration) -> Self {
        self.remark_delay = delay;
        self
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    /// 订阅配置中的所有房间
    pub async fn subscribe(&self, transport: &dyn ChatTransport) -> Result<()> {
        for class in self.config.subscriptions() {
            transport
                .subscribe(&Subscription::class(class.clone()))
                .await
                .with_context(|| format!("订阅 {} 失败", class))?;
        }
        Ok(())
    }

    /// 消费入站事件直到 channel 关闭
    pub async fn run(mut self, mut events: mpsc::Receiver<InboundEvent>) -> Result<()> {
        info!(user = %self.config.user, room = %self.config.room, "Dispatcher started");

        while let Some(event) = events.recv().await {
            let outcome = self.handle(&event).await;
            debug!(outcome = outcome.as_str(), "Event handled");
        }

        if self.pager.is_busy() {
            warn!("Inbound stream closed with a page still in flight; abandoning it");
        }
        info!("Dispatcher stopped");
        Ok(())
    }

    /// 处理一条事件
    pub async fn handle(&mut self, event: &InboundEvent) -> DispatchOutcome {
        match normalize(event, &self.config) {
            Ok(Inbound::Request(request)) => {
                let outcome = self.dispatch(request.clone()).await;
                self.record(&request, &outcome);
                outcome
            }
            Ok(Inbound::Remark(remark)) => self.remark(remark).await,
            Err(reason) => {
                debug!(sender = %event.sender, class = %event.class, reason = reason.as_str(), "Dropped event");
                DispatchOutcome::Dropped(reason)
            }
        }
    }

    async fn dispatch(&mut self, request: NormalizedRequest) -> DispatchOutcome {
        // 授权先于限流：被拒的请求不占用限流名额
        if let Err(rejection) = self.gate.check(&request) {
            info!(sender = %request.sender, priority = %request.priority, ?rejection, "Request rejected");
            let text = rejection.feedback(&request.sender, &self.config.user);
            self.feedback.emit(&request.class, &request.instance, &text).await;
            return match rejection {
                Rejection::Blocked => DispatchOutcome::Blocked,
                Rejection::PriorityDisabled(priority) => DispatchOutcome::PriorityDisabled(priority),
            };
        }

        if request.priority == Priority::Page {
            return self.page(request).await;
        }

        if !self.limiter.try_acquire() {
            info!(sender = %request.sender, "Rate limited");
            let text = format!("{} could not be notified; try again later", self.config.user);
            self.feedback.emit(&request.class, &request.instance, &text).await;
            return DispatchOutcome::RateLimited;
        }

        DispatchOutcome::Delivered(self.notifier.send(&request).await)
    }

    async fn page(&self, request: NormalizedRequest) -> DispatchOutcome {
        let text = self.notifier.compose(&request);
        let (class, instance) = (request.class.clone(), request.instance.clone());

        match self.pager.try_start(request, text) {
            Ok(handle) => DispatchOutcome::Paging(handle),
            Err(busy) => {
                info!(class = %class, "{}", busy);
                let text = format!("{} is already being paged; try again later", self.config.user);
                self.feedback.emit(&class, &instance, &text).await;
                DispatchOutcome::PagingBusy
            }
        }
    }

    async fn remark(&self, remark: Remark) -> DispatchOutcome {
        let Some(reply) = respond(&remark.body) else {
            return DispatchOutcome::Remark { replied: false };
        };

        if !self.remark_delay.is_zero() {
            tokio::time::sleep(self.remark_delay).await;
        }
        self.feedback.emit(&remark.class, &remark.instance, &reply).await;
        DispatchOutcome::Remark { replied: true }
    }

    fn record(&self, request: &NormalizedRequest, outcome: &DispatchOutcome) {
        let Some(history) = &self.history else {
            return;
        };
        if let Err(e) = history.append(&HistoryRecord::new(request, outcome.as_str())) {
            warn!(error = %e, "Failed to record dispatch outcome");
        }
    }
}
