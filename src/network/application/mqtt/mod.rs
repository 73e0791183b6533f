//! MQTT 3.1.1 client engine.
//!
//! The engine is split the same way the data flows:
//!
//! - [`codec`] builds and parses packets in caller-provided buffers.
//! - [`Session`] holds the protocol state: pending transaction, timers,
//!   subscription table and a [`FramedQueue`](crate::queue::FramedQueue) of
//!   packets waiting to go out.
//! - [`MqttConnection`] owns a [`Transport`](crate::network::Transport) and
//!   drives the session from two entry points: [`MqttConnection::tick`] for I/O
//!   and [`MqttConnection::mqtt_timer`] for the once-per-second timers.
//!
//! Publishing, subscribing and unsubscribing never touch the network; they
//! serialize a packet into the queue. Each `tick` either writes one queued
//! packet or reads one incoming packet, so the host loop decides how much
//! time the client gets.
//!
//! # Usage
//!
//! ```rust,no_run
//! use mqttlink::network::application::mqtt::{ConnectInfo, LastWill, MqttConnection, QoS};
//! # use mqttlink::network::Transport;
//! # struct Modem;
//! # impl Transport for Modem {
//! #     type Error = ();
//! #     fn connect(&mut self, _: &str, _: u16, _: u32) -> Result<(), ()> { Ok(()) }
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, ()> { Ok(buf.len()) }
//! #     fn read(&mut self, _: &mut [u8], _: u32) -> Result<usize, ()> { Ok(0) }
//! #     fn available(&mut self) -> bool { false }
//! #     fn is_connected(&self) -> bool { true }
//! #     fn disconnect(&mut self) {}
//! # }
//!
//! let info = ConnectInfo::new("broker.local", 1883, "meter-7")
//!     .unwrap()
//!     .with_keepalive(60);
//! let will = LastWill::new("meters/7/status", "offline", 1, true).unwrap();
//!
//! let mut mqtt: MqttConnection<Modem> = MqttConnection::default();
//! mqtt.begin(Modem, info, Some(will)).unwrap();
//! mqtt.connect();
//! mqtt.subscribe("meters/7/cmd", QoS::AtLeastOnce).unwrap();
//! mqtt.tick(0);
//! ```

/// Packet encoders and decoders
pub mod codec;
/// Connection parameters and stored JSON configuration
pub mod config;
/// The client state machine
pub mod connection;
/// Error types
pub mod error;
/// Application callbacks
pub mod handler;
/// Packet types and inbound packet views
pub mod packet;
/// Protocol session state
pub mod session;
/// Lifecycle states and timer counters
pub mod state;
/// Subscription table
pub mod subscriptions;


pub use config::{ConnectInfo, LastWill};
pub use connection::MqttConnection;
pub use error::{CodecError, Error};
pub use handler::{Handler, LogHandler};
pub use packet::{Inbound, PacketType, QoS};
pub use session::Session;
pub use state::{ConnectionState, PendingTransaction, Timers};
pub use subscriptions::Subscriptions;

/// Size of the send and receive packet buffers.
pub const MQTT_BUF_SIZE: usize = 1024;
/// Capacity of the outbound frame queue in bytes.
pub const QUEUE_BUFFER_SIZE: usize = 2048;
/// Timer ticks to wait for a reply before reconnecting.
pub const MQTT_READ_TIMEOUT: u32 = 10;
/// Timer ticks spent connecting or failed before a reconnect.
pub const MQTT_HOST_CONNECT_TIMEOUT: u32 = 5;
/// Timeout handed to [`Transport::connect`](crate::network::Transport::connect).
pub const MQTT_CONNECT_TIMEOUT_MS: u32 = 2500;
/// Per-read timeout while a packet is being received.
pub const MQTT_PACKET_READ_TIMEOUT_MS: u32 = 100;
/// Keepalive in seconds when none is configured.
pub const MQTT_DEFAULT_KEEPALIVE: u16 = 30;
/// Broker port when none is configured.
pub const MQTT_DEFAULT_PORT: u16 = 1883;
/// Highest QoS level the client speaks.
pub const MQTT_MAX_QOS_LEVEL: u8 = 2;
