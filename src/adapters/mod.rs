//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (TCP/TLS sockets, WebSockets, HTTP).
//!
//! Adapter categories:
//! - `feeds`: FIX and WebSocket transports
//! - `metrics`: Prometheus metrics export and health checks
//! - `sinks`: downstream consumers for classified events

pub mod feeds;
pub mod metrics;
pub mod sinks;
