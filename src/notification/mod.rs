//! 通知分发管线
//!
//! # 流程
//! 1. `filter`：丢弃不可信、回环、不相关的事件，提取请求
//! 2. `gate`：黑名单、优先级开关
//! 3. `throttle`：普通/紧急通知的最小间隔
//! 4. `notifier` / `pager`：按优先级投递
//! 5. `feedback`：把结果发回聊天流
//!
//! # 使用示例
//! ```ignore
//! use andromeda::notification::Dispatcher;
//!
//! let mut dispatcher = Dispatcher::new(config, backend, transport);
//! dispatcher.subscribe(transport.as_ref()).await?;
//! dispatcher.run(events).await?;
//! ```

pub mod backend;
pub mod dispatcher;
pub mod feedback;
pub mod filter;
pub mod gate;
pub mod notifier;
pub mod pager;
pub mod pushover;
pub mod remark;
pub mod store;
pub mod throttle;
pub mod urgency;

pub use backend::{BackendReply, DryRunBackend, PushBackend, PushMessage};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use feedback::FeedbackEmitter;
pub use filter::{normalize, DropReason, Inbound, NormalizedRequest};
pub use gate::{AuthorizationGate, Rejection};
pub use notifier::{Delivery, Notifier};
pub use pager::{PageHandle, PageOutcome, PageSession, PageSettings, Pager, PagerBusy};
pub use pushover::{PushoverClient, PushoverConfig};
pub use store::{HistoryRecord, HistoryStore};
pub use throttle::RateLimiter;
pub use urgency::{get_priority, Priority};
