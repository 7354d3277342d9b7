//! 聊天传输层 - 订阅房间、接收事件、回发消息
//!
//! 核心只依赖 `ChatTransport` 的两个原语（subscribe / send），
//! 入站事件通过 mpsc channel 送达分发器。

pub mod event;
pub mod memory;
pub mod stdio;
pub mod transport;

pub use event::{InboundEvent, OutboundMessage, Subscription};
pub use memory::MemoryTransport;
pub use stdio::StdioTransport;
pub use transport::ChatTransport;
