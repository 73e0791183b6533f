//! The poll-driven MQTT connection state machine.

use super::codec;
use super::config::{ConnectInfo, LastWill, PubSubConfig};
use super::error::{CodecError, Error};
use super::handler::{Handler, LogHandler};
use super::packet::{self, QoS};
use super::session::Session;
use super::state::{ConnectionState, PendingTransaction, Timers};
use super::subscriptions::{MAX_SUBSCRIPTIONS, Subscriptions, Topic};
use super::{
    MQTT_BUF_SIZE, MQTT_CONNECT_TIMEOUT_MS, MQTT_HOST_CONNECT_TIMEOUT, MQTT_PACKET_READ_TIMEOUT_MS,
    MQTT_READ_TIMEOUT,
};
use crate::network::Transport;
use crate::queue::Error as QueueError;
use heapless::Vec;
use log::{debug, error, info, trace, warn};

/// An MQTT 3.1.1 client driven entirely by [`tick`](Self::tick) and
/// [`mqtt_timer`](Self::mqtt_timer).
///
/// The connection owns the transport, a receive buffer and the [`Session`]
/// (state, outbound queue, subscriptions). Public operations only queue
/// packets; all I/O happens in `tick`, which writes at most one queued packet
/// per call or otherwise reads at most one incoming packet. `mqtt_timer` is
/// expected once per second and handles keepalive, reply timeouts and
/// reconnect escalation.
///
/// Nothing here is thread-safe; the host must call into one connection from
/// one context only.
///
/// ```rust,no_run
/// use mqttlink::network::application::mqtt::{ConnectInfo, MqttConnection, QoS};
/// use mqttlink::network::Transport;
/// # struct Link;
/// # impl Transport for Link {
/// #     type Error = ();
/// #     fn connect(&mut self, _: &str, _: u16, _: u32) -> Result<(), ()> { Ok(()) }
/// #     fn write(&mut self, buf: &[u8]) -> Result<usize, ()> { Ok(buf.len()) }
/// #     fn read(&mut self, _: &mut [u8], _: u32) -> Result<usize, ()> { Ok(0) }
/// #     fn available(&mut self) -> bool { false }
/// #     fn is_connected(&self) -> bool { true }
/// #     fn disconnect(&mut self) {}
/// # }
/// # fn now_ms() -> u64 { 0 }
///
/// let mut mqtt: MqttConnection<Link> = MqttConnection::default();
/// let info = ConnectInfo::new("broker.local", 1883, "sensor-1").unwrap();
/// mqtt.begin(Link, info, None).unwrap();
/// mqtt.connect();
///
/// mqtt.publish("sensors/temp", b"21.5", QoS::AtLeastOnce, false).unwrap();
/// loop {
///     mqtt.tick(now_ms());
///     // once per second:
///     mqtt.mqtt_timer(now_ms());
/// }
/// ```
pub struct MqttConnection<T: Transport, H: Handler = LogHandler> {
    transport: Option<T>,
    handler: H,
    session: Session,
    rx: [u8; MQTT_BUF_SIZE],
}

enum Incoming {
    Nothing,
    Packet(usize),
    Dropped,
}

impl<T: Transport, H: Handler + Default> Default for MqttConnection<T, H> {
    fn default() -> Self {
        Self::new(H::default())
    }
}

impl<T: Transport, H: Handler> MqttConnection<T, H> {
    /// A disconnected client reporting events to `handler`.
    pub fn new(handler: H) -> Self {
        Self {
            transport: None,
            handler,
            session: Session::new(),
            rx: [0; MQTT_BUF_SIZE],
        }
    }

    /// Take ownership of `transport` and the connection parameters.
    ///
    /// Validates `info` (host, port, client id, keepalive above 5 s), resets
    /// every piece of session state and moves to
    /// [`ConnectionState::HostConnecting`]. `will`, when given, replaces any
    /// will already in `info`. Nothing is sent until [`connect`](Self::connect).
    pub fn begin(&mut self, transport: T, info: ConnectInfo, will: Option<LastWill>) -> Result<(), Error> {
        let mut info = info;
        if will.is_some() {
            info.will = will;
        }
        if let Err(e) = info.validate() {
            error!("rejecting mqtt config: {}", e);
            return Err(e.into());
        }
        info!("mqtt client {} for {}:{}", info.client_id, info.host, info.port);
        if let Some(old) = self.transport.as_mut() {
            old.disconnect();
        }
        self.transport = Some(transport);
        self.session.reset(info);
        Ok(())
    }

    /// Open the transport and send CONNECT.
    ///
    /// Blocks for at most the transport connect timeout. On failure the state
    /// becomes [`ConnectionState::ConnectFailed`] and `mqtt_timer` schedules
    /// the retry.
    pub fn connect(&mut self) {
        let (Some(info), Some(transport)) = (self.session.info.as_ref(), self.transport.as_mut())
        else {
            warn!("connect called before begin");
            return;
        };
        self.session.timers.keepalive = 0;
        self.session.timers.host_connect = 0;
        self.session.state = ConnectionState::HostConnecting;

        info!("connecting to {}:{}", info.host, info.port);
        if let Err(e) = transport.connect(&info.host, info.port, MQTT_CONNECT_TIMEOUT_MS) {
            error!("transport connect failed: {:?}", e);
            self.session.state = ConnectionState::ConnectFailed;
            return;
        }
        self.step();
    }

    /// Send DISCONNECT and close the link.
    pub fn disconnect(&mut self) {
        if self.session.info.is_none()
            || matches!(
                self.session.state,
                ConnectionState::Disconnected | ConnectionState::Deleting
            )
        {
            return;
        }
        self.session.state = ConnectionState::DisconnectReq;
        self.step();
    }

    /// Queue a PUBLISH. Returns its packet identifier, 0 for QoS 0.
    pub fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<u16, Error> {
        self.require_link()?;
        self.session.publish(topic, payload, qos, retain)
    }

    /// Queue a SUBSCRIBE. The topic enters the subscription table immediately
    /// and is listed again when the packet goes out after a reconnect.
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<u16, Error> {
        self.require_link()?;
        self.session.subscribe(topic, qos)
    }

    /// Queue an UNSUBSCRIBE. The topic leaves the subscription table immediately.
    pub fn unsubscribe(&mut self, topic: &str) -> Result<u16, Error> {
        self.require_link()?;
        self.session.unsubscribe(topic)
    }

    /// Bring the subscription table in line with `config`: unsubscribe from
    /// topics it no longer lists, subscribe to listed topics not yet in the
    /// table.
    pub fn sync_subscriptions(&mut self, config: &PubSubConfig<'_>) -> Result<(), Error> {
        let mut stale: Vec<Topic, MAX_SUBSCRIPTIONS> = Vec::new();
        for (topic, _) in self.session.subscriptions.iter() {
            if !config.wants_subscription(topic) {
                let topic = Topic::try_from(topic).map_err(|_| Error::TopicTooLong)?;
                let _ = stale.push(topic);
            }
        }
        for topic in &stale {
            self.unsubscribe(topic)?;
        }
        for wanted in &config.subscribe_topics {
            if !self.session.is_subscribed(wanted.topic) {
                self.subscribe(wanted.topic, QoS::clamped(wanted.qos))?;
            }
        }
        Ok(())
    }

    /// Advance the state machine. Call often, well under once per second.
    ///
    /// Timing is counted in [`mqtt_timer`](Self::mqtt_timer) calls, so
    /// `now_ms` is only traced.
    pub fn tick(&mut self, now_ms: u64) {
        trace!("tick at {} ms in {:?}", now_ms, self.session.state);
        self.step();
    }

    /// Advance keepalive, reply-timeout and reconnect counters. Call once per
    /// second.
    pub fn mqtt_timer(&mut self, now_ms: u64) {
        trace!("timer at {} ms in {:?}", now_ms, self.session.state);
        let timers = &mut self.session.timers;
        match self.session.state {
            ConnectionState::Data => {
                timers.keepalive += 1;
                let keepalive = self.session.info.as_ref().map_or(0, |i| u32::from(i.keepalive));
                if timers.keepalive > keepalive * 85 / 100 {
                    debug!("keepalive due after {} s", timers.keepalive);
                    self.session.state = ConnectionState::KeepaliveReq;
                }
            }
            ConnectionState::ConnectSent
            | ConnectionState::DataSent
            | ConnectionState::PingSent
            | ConnectionState::DisconnectSent => {
                timers.read_timeout += 1;
                if timers.read_timeout > MQTT_READ_TIMEOUT {
                    timers.read_timeout = 0;
                    warn!("no reply in state {:?}", self.session.state);
                    self.handler.on_timeout();
                    if self.session.state == ConnectionState::DisconnectSent {
                        self.link_down();
                        self.session.state = ConnectionState::Disconnected;
                    } else {
                        self.session.state = ConnectionState::HostReconnectReq;
                    }
                }
            }
            ConnectionState::HostConnecting
            | ConnectionState::ConnectFailed
            | ConnectionState::PingFailed
            | ConnectionState::DataFailed
            | ConnectionState::DisconnectFailed => {
                timers.host_connect += 1;
                if timers.host_connect > MQTT_HOST_CONNECT_TIMEOUT {
                    timers.host_connect = 0;
                    error!("host connect timed out in {:?}, reconnecting", self.session.state);
                    self.session.state = ConnectionState::HostReconnect;
                }
            }
            ConnectionState::Disconnected
            | ConnectionState::KeepaliveReq
            | ConnectionState::DisconnectReq
            | ConnectionState::HostReconnectReq
            | ConnectionState::HostReconnect
            | ConnectionState::Deleting => {}
        }
    }

    /// Close the link, clear the queue and subscriptions, and park in
    /// [`ConnectionState::Deleting`]. Parameters are kept, so
    /// [`connect`](Self::connect) can start again.
    pub fn stop(&mut self) {
        self.session.state = ConnectionState::Deleting;
        self.link_down();
        self.session.queue.clear();
        self.session.timers = Timers::default();
        info!("mqtt client stopped");
    }

    /// [`stop`](Self::stop), then drop the transport and the parameters.
    /// [`begin`](Self::begin) is needed before the client can be used again.
    pub fn delete_client(&mut self) {
        self.stop();
        self.transport = None;
        self.session.info = None;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.session.state
    }

    /// `true` once CONNACK was accepted and while the link stays up.
    pub fn is_mqtt_connected(&self) -> bool {
        !matches!(
            self.session.state,
            ConnectionState::Disconnected | ConnectionState::Deleting
        ) && self.session.mqtt_connected
            && self.transport.as_ref().is_some_and(|t| t.is_connected())
    }

    /// `true` if `topic` is in the subscription table.
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.session.is_subscribed(topic)
    }

    /// Read-only view of the subscription table.
    pub fn subscriptions(&self) -> &Subscriptions {
        self.session.subscriptions()
    }

    /// The outstanding request acknowledgements are matched against.
    pub fn pending(&self) -> PendingTransaction {
        self.session.pending()
    }

    /// Timer counters.
    pub fn timers(&self) -> Timers {
        self.session.timers()
    }

    /// Session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The event handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The event handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// The transport, if one was given to `begin`.
    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// The transport, mutably.
    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    fn require_link(&self) -> Result<(), Error> {
        match self.transport.as_ref() {
            None => Err(Error::NotInitialized),
            Some(t) if !t.is_connected() => Err(Error::NotConnected),
            Some(_) => Ok(()),
        }
    }

    fn step(&mut self) {
        match self.session.state {
            ConnectionState::Disconnected
            | ConnectionState::Deleting
            | ConnectionState::ConnectFailed
            | ConnectionState::PingFailed
            | ConnectionState::DataFailed
            | ConnectionState::DisconnectFailed => {}
            ConnectionState::HostReconnectReq | ConnectionState::HostReconnect => {
                info!("reconnecting from {:?}", self.session.state);
                self.link_down();
                self.connect();
            }
            ConnectionState::HostConnecting => self.send_connect(),
            ConnectionState::ConnectSent
            | ConnectionState::DataSent
            | ConnectionState::PingSent => self.receive(),
            ConnectionState::DisconnectSent => self.finish_disconnect(),
            ConnectionState::DisconnectReq => self.send_disconnect(),
            ConnectionState::KeepaliveReq => self.send_ping(),
            ConnectionState::Data => {
                if self.session.queue.is_empty() {
                    self.receive();
                } else {
                    self.send_queued();
                }
            }
        }
    }

    fn send_connect(&mut self) {
        if !self.transport.as_ref().is_some_and(|t| t.is_connected()) {
            return;
        }
        let Some(info) = self.session.info.as_ref() else {
            return;
        };
        let sent = codec::encode_connect(&mut self.session.tx, info)
            .map_err(Error::from)
            .and_then(|packet| send(&mut self.transport, packet));
        match sent {
            Ok(()) => {
                info!("CONNECT sent");
                self.session.pending.set(packet::PacketType::Connect, 0);
                self.session.timers.read_timeout = 0;
                self.session.state = ConnectionState::ConnectSent;
            }
            Err(e) => {
                error!("sending CONNECT failed: {}", e);
                self.session.state = ConnectionState::ConnectFailed;
                self.link_down();
            }
        }
    }

    fn send_disconnect(&mut self) {
        let sent = codec::encode_disconnect(&mut self.session.tx)
            .map_err(Error::from)
            .and_then(|packet| send(&mut self.transport, packet));
        // MQTT 3.1.1 has no reply to DISCONNECT; the client closes the link.
        self.link_down();
        match sent {
            Ok(()) => {
                info!("DISCONNECT sent");
                self.session.timers.read_timeout = 0;
                self.session.state = ConnectionState::DisconnectSent;
            }
            Err(e) => {
                error!("sending DISCONNECT failed: {}", e);
                self.session.state = ConnectionState::DisconnectFailed;
            }
        }
    }

    fn send_ping(&mut self) {
        let sent = codec::encode_pingreq(&mut self.session.tx)
            .map_err(Error::from)
            .and_then(|packet| send(&mut self.transport, packet));
        match sent {
            Ok(()) => {
                debug!("PINGREQ sent");
                self.session.timers.keepalive = 0;
                self.session.timers.read_timeout = 0;
                self.session.state = ConnectionState::PingSent;
            }
            Err(e) => {
                error!("sending PINGREQ failed: {}", e);
                self.session.state = ConnectionState::PingFailed;
                self.link_down();
            }
        }
    }

    fn send_queued(&mut self) {
        let len = match self.session.queue.dequeue(&mut self.session.tx) {
            Ok(len) => len,
            Err(QueueError::Empty) => {
                warn!("outbound queue holds no complete frame, clearing it");
                self.session.queue.clear();
                return;
            }
            Err(e) => {
                warn!("dropping queued frame: {}", e);
                return;
            }
        };
        let frame = &self.session.tx[..len];
        let expects_reply = packet::expects_reply(frame);
        match send(&mut self.transport, frame) {
            Ok(()) => {
                debug!(
                    "sent {:?} ({} bytes, {} still queued)",
                    packet::packet_type(frame),
                    len,
                    self.session.queue.len()
                );
                self.session.track_sent(len);
                if expects_reply {
                    self.session.timers.read_timeout = 0;
                    self.session.state = ConnectionState::DataSent;
                } else {
                    self.session.state = ConnectionState::Data;
                }
            }
            Err(e) => {
                error!("sending queued packet failed: {}", e);
                self.session.state = ConnectionState::DataFailed;
                self.link_down();
            }
        }
    }

    fn receive(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        if !transport.is_connected() {
            warn!("transport dropped in {:?}", self.session.state);
            self.link_down();
            self.session.state = ConnectionState::HostReconnectReq;
            return;
        }
        if !transport.available() {
            return;
        }
        match read_packet(transport, &mut self.rx) {
            Ok(Incoming::Packet(len)) => {
                self.session
                    .handle_packet(&mut self.handler, &self.rx[..len]);
            }
            Ok(Incoming::Nothing) | Ok(Incoming::Dropped) => {}
            // Bytes of a partial packet are gone, so the stream is out of step.
            Err(e) => {
                warn!("inbound stream lost: {}", e);
                self.link_down();
                self.session.state = ConnectionState::HostReconnectReq;
            }
        }
    }

    fn finish_disconnect(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            if transport.is_connected() {
                if !transport.available() {
                    return;
                }
                // Whatever arrives now is moot; the session is over.
                let _ = read_packet(transport, &mut self.rx);
            }
        }
        self.link_down();
        self.session.state = ConnectionState::Disconnected;
        info!("mqtt disconnected");
    }

    fn link_down(&mut self) {
        let transport_up = self.transport.as_ref().is_some_and(|t| t.is_connected());
        let was_up = transport_up || self.session.mqtt_connected;
        if let Some(transport) = self.transport.as_mut() {
            transport.disconnect();
        }
        self.session.forget_link();
        if was_up {
            info!("mqtt link down");
            self.handler.on_disconnected();
        }
    }
}

impl<T: Transport, H: Handler> core::fmt::Debug for MqttConnection<T, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MqttConnection")
            .field("session", &self.session)
            .field(
                "transport_connected",
                &self.transport.as_ref().is_some_and(|t| t.is_connected()),
            )
            .finish()
    }
}

fn send<T: Transport>(transport: &mut Option<T>, packet: &[u8]) -> Result<(), Error> {
    let transport = transport.as_mut().ok_or(Error::NotConnected)?;
    let mut written = 0;
    while written < packet.len() {
        match transport.write(&packet[written..]) {
            Ok(0) => return Err(Error::Transport),
            Ok(n) => written += n,
            Err(e) => {
                error!("transport write failed: {:?}", e);
                return Err(Error::Transport);
            }
        }
    }
    transport.flush().map_err(|e| {
        error!("transport flush failed: {:?}", e);
        Error::Transport
    })
}

fn next_byte<T: Transport>(transport: &mut T) -> Result<u8, Error> {
    match transport.read_byte(MQTT_PACKET_READ_TIMEOUT_MS) {
        Ok(Some(byte)) => Ok(byte),
        Ok(None) => Err(CodecError::Truncated.into()),
        Err(e) => {
            warn!("transport read failed: {:?}", e);
            Err(Error::Transport)
        }
    }
}

fn read_exact<T: Transport>(transport: &mut T, buf: &mut [u8]) -> Result<(), Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match transport.read(&mut buf[filled..], MQTT_PACKET_READ_TIMEOUT_MS) {
            Ok(0) => return Err(CodecError::Truncated.into()),
            Ok(n) => filled += n,
            Err(e) => {
                warn!("transport read failed: {:?}", e);
                return Err(Error::Transport);
            }
        }
    }
    Ok(())
}

/// Read one packet: the type byte, the remaining length one byte at a time,
/// then the body.
fn read_packet<T: Transport>(transport: &mut T, rx: &mut [u8; MQTT_BUF_SIZE]) -> Result<Incoming, Error> {
    let header = match transport.read_byte(MQTT_PACKET_READ_TIMEOUT_MS) {
        Ok(Some(byte)) => byte,
        Ok(None) => return Ok(Incoming::Nothing),
        Err(e) => {
            warn!("transport read failed: {:?}", e);
            return Err(Error::Transport);
        }
    };
    rx[0] = header;

    let mut used = 1;
    loop {
        if used > 4 {
            return Err(CodecError::MalformedLength.into());
        }
        let byte = next_byte(transport)?;
        rx[used] = byte;
        used += 1;
        if byte & 0x80 == 0 {
            break;
        }
    }
    let (remaining, _) = codec::decode_remaining_length(&rx[1..used])?;
    let total = used + remaining;

    if total > rx.len() {
        warn!("dropping {} byte packet, receive buffer holds {}", total, rx.len());
        let mut left = remaining;
        while left > 0 {
            let chunk = left.min(rx.len());
            read_exact(transport, &mut rx[..chunk])?;
            left -= chunk;
        }
        return Ok(Incoming::Dropped);
    }

    read_exact(transport, &mut rx[used..total])?;
    Ok(Incoming::Packet(total))
}
