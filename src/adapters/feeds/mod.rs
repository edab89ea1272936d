//! Feed Transports - FIX and WebSocket Market Data Sessions
//!
//! Both transports implement `ports::transport::FeedTransport`:
//! - FIX: tag-value initiator over TCP, optionally TLS
//! - WebSocket: Coinbase-style JSON publish/subscribe over TLS
//! - TLS: shared rustls client context

pub mod fix_codec;
pub mod fix_session;
pub mod tls;
pub mod websocket;

pub use fix_session::{FixSessionConfig, FixTransport};
pub use websocket::WsTransport;
