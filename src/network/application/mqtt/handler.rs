//! Application callbacks.

use super::session::Session;
use log::info;

/// Receives connection events.
///
/// Every method has a no-op default, so an implementation only overrides what
/// it needs. Callbacks run synchronously inside `tick`, `mqtt_timer` or
/// `disconnect`; they must not block. The [`Session`] handed to
/// [`on_connected`](Self::on_connected) and [`on_data`](Self::on_data) may be
/// used to queue publishes, subscriptions and unsubscriptions.
///
/// ```rust
/// use mqttlink::network::application::mqtt::{Handler, QoS, Session};
///
/// #[derive(Debug, Default)]
/// struct Echo {
///     received: usize,
/// }
///
/// impl Handler for Echo {
///     fn on_connected(&mut self, session: &mut Session) {
///         let _ = session.subscribe("echo/in", QoS::AtLeastOnce);
///     }
///
///     fn on_data(&mut self, session: &mut Session, _topic: &str, payload: &[u8]) {
///         self.received += 1;
///         let _ = session.publish("echo/out", payload, QoS::AtMostOnce, false);
///     }
/// }
/// ```
pub trait Handler {
    /// CONNACK accepted; the session is ready.
    fn on_connected(&mut self, _session: &mut Session) {}

    /// The link went down, by request or by failure.
    fn on_disconnected(&mut self) {}

    /// A QoS 1 or 2 publish completed its handshake.
    fn on_published(&mut self, _id: u16) {}

    /// A SUBSCRIBE was acknowledged.
    fn on_subscribed(&mut self, _id: u16) {}

    /// An UNSUBSCRIBE was acknowledged.
    fn on_unsubscribed(&mut self, _id: u16) {}

    /// A reply did not arrive in time; the client is about to reconnect.
    fn on_timeout(&mut self) {}

    /// An application message arrived.
    fn on_data(&mut self, _session: &mut Session, topic: &str, payload: &[u8]) {
        info!(
            "mqtt data on {}: {}",
            topic,
            core::str::from_utf8(payload).unwrap_or("<binary>")
        );
    }
}

/// Handler that only logs incoming data.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl Handler for LogHandler {}
