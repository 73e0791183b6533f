//! # mqttlink - poll-driven MQTT client engine
//!
//! An MQTT 3.1.1 client for IoT devices that cannot spare a thread or an
//! allocator for networking. The host firmware owns the main loop and gives
//! the client time through two calls: `tick`, as often as it likes, and
//! `mqtt_timer`, once per second. Everything else (publishing, subscribing)
//! only serializes packets into a fixed-size outbound queue.
//!
//! ## Features
//!
//! - **MQTT 3.1.1**: CONNECT with credentials and last will, PUBLISH at QoS
//!   0, 1 and 2, SUBSCRIBE, UNSUBSCRIBE, keepalive PINGREQ, DISCONNECT
//! - **Framed queue**: outbound packets are byte-stuffed into a ring buffer
//!   with oldest-first eviction under backpressure
//! - **Reconnect**: reply timeouts and failed connects escalate to a
//!   reconnect from the timer, without host involvement
//! - **Transport agnostic**: any blocking stream implementing
//!   [`network::Transport`] (TCP socket, TLS session, cellular modem)
//! - **Stored configuration**: connection, last will and topic lists parse
//!   from JSON documents without allocation
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! mqttlink = "0.1.0"
//! ```
//!
//! ```rust,no_run
//! use mqttlink::network::application::mqtt::{ConnectInfo, MqttConnection, QoS};
//! # use mqttlink::network::Transport;
//! # struct Socket;
//! # impl Transport for Socket {
//! #     type Error = ();
//! #     fn connect(&mut self, _: &str, _: u16, _: u32) -> Result<(), ()> { Ok(()) }
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, ()> { Ok(buf.len()) }
//! #     fn read(&mut self, _: &mut [u8], _: u32) -> Result<usize, ()> { Ok(0) }
//! #     fn available(&mut self) -> bool { false }
//! #     fn is_connected(&self) -> bool { true }
//! #     fn disconnect(&mut self) {}
//! # }
//! # fn millis() -> u64 { 0 }
//!
//! let mut mqtt: MqttConnection<Socket> = MqttConnection::default();
//! let info = ConnectInfo::new("broker.local", 1883, "device-01").unwrap();
//! mqtt.begin(Socket, info, None).unwrap();
//! mqtt.connect();
//!
//! let mut last_second = 0;
//! loop {
//!     let now = millis();
//!     mqtt.tick(now);
//!     if now - last_second >= 1000 {
//!         last_second = now;
//!         mqtt.mqtt_timer(now);
//!     }
//!     if mqtt.is_mqtt_connected() {
//!         let _ = mqtt.publish("devices/01/uptime", b"42", QoS::AtMostOnce, false);
//!     }
//! }
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger.
//! Enable the `defmt` feature to also derive `defmt::Format` for its error
//! and state types.
//!
//! ## `no_std` support
//!
//! The crate is `no_std` unless the `std` feature is enabled. `std` adds
//! [`network::tcp::TcpTransport`] and `From<std::io::Error>` conversions.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]
#![doc(html_root_url = "https://shishir-dey.github.io/mqttlink/")]

/// Transport abstraction and the MQTT client built on it.
pub mod network;

/// Byte-stuffed frame queue over a fixed-capacity ring buffer.
pub mod queue;
