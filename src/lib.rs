//! andromeda - 把聊天里发给你的消息转成手机推送

pub mod chat;
pub mod cli;
pub mod config;
pub mod notification;

pub use chat::{ChatTransport, InboundEvent, MemoryTransport, OutboundMessage, StdioTransport, Subscription};
pub use config::BridgeConfig;
pub use notification::{
    Delivery, DispatchOutcome, Dispatcher, DryRunBackend, FeedbackEmitter, HistoryRecord, HistoryStore,
    PageHandle, PageOutcome, Pager, Priority, PushBackend, PushMessage, PushoverClient,
};
