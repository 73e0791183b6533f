//! # Application Layer Network Protocols
//!
//! Protocol clients built on [`Transport`](crate::network::Transport). They
//! follow the same rules: no heap allocation, fixed-size buffers, and all I/O
//! driven by the caller's loop.
//!
//! - **[`mqtt`]**: MQTT 3.1.1 client engine

/// MQTT client implementation.
///
/// Provides a poll-driven MQTT 3.1.1 client with an outbound frame queue,
/// keepalive and automatic reconnect.
pub mod mqtt;
