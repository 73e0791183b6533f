//! Protocol state of one MQTT session.
//!
//! [`Session`] holds everything the state machine mutates except the
//! transport and the receive buffer: state, pending transaction, timers,
//! subscription table, outbound queue and send scratch buffer. Keeping it
//! apart from the transport lets callbacks receive `&mut Session` and queue
//! new packets while the connection is still dispatching.

use super::codec;
use super::config::ConnectInfo;
use super::error::{CodecError, Error};
use super::handler::Handler;
use super::packet::{Inbound, PacketType, QoS, packet_type, qos_bits};
use super::state::{ConnectionState, PendingTransaction, Timers};
use super::subscriptions::Subscriptions;
use super::{MQTT_BUF_SIZE, QUEUE_BUFFER_SIZE};
use crate::queue::FramedQueue;
use heapless::Vec;
use log::{debug, error, info, warn};

/// Inbound QoS 2 identifiers remembered until their PUBREL arrives.
pub const MAX_INBOUND_QOS2: usize = 8;

/// Protocol state owned by an [`MqttConnection`](super::MqttConnection).
pub struct Session {
    pub(crate) state: ConnectionState,
    pub(crate) info: Option<ConnectInfo>,
    pub(crate) pending: PendingTransaction,
    pub(crate) timers: Timers,
    pub(crate) next_packet_id: u16,
    pub(crate) mqtt_connected: bool,
    pub(crate) subscriptions: Subscriptions,
    pub(crate) awaiting_pubrel: Vec<u16, MAX_INBOUND_QOS2>,
    pub(crate) queue: FramedQueue<QUEUE_BUFFER_SIZE>,
    pub(crate) tx: [u8; MQTT_BUF_SIZE],
}

impl Session {
    /// A session in [`ConnectionState::Disconnected`] with no parameters.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            info: None,
            pending: PendingTransaction::default(),
            timers: Timers::default(),
            next_packet_id: 0,
            mqtt_connected: false,
            subscriptions: Subscriptions::new(),
            awaiting_pubrel: Vec::new(),
            queue: FramedQueue::new(),
            tx: [0; MQTT_BUF_SIZE],
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The outstanding request, if any.
    pub fn pending(&self) -> PendingTransaction {
        self.pending
    }

    /// Timer counters.
    pub fn timers(&self) -> Timers {
        self.timers
    }

    /// Parameters given to `begin`.
    pub fn connect_info(&self) -> Option<&ConnectInfo> {
        self.info.as_ref()
    }

    /// Subscription table.
    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// `true` if `topic` is in the subscription table.
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.contains(topic)
    }

    /// Bytes waiting in the outbound queue.
    pub fn queued_bytes(&self) -> usize {
        self.queue.len()
    }

    /// Queue a PUBLISH. Returns its packet identifier, 0 for QoS 0.
    ///
    /// A QoS 1 or 2 publish becomes the pending transaction once it is
    /// written to the transport, not when it is queued.
    pub fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<u16, Error> {
        if self.info.is_none() {
            return Err(Error::NotInitialized);
        }
        let (packet, id) = codec::encode_publish(
            &mut self.tx,
            topic,
            payload,
            qos,
            retain,
            &mut self.next_packet_id,
        )?;
        self.queue.enqueue_evicting(packet)?;
        debug!(
            "queued PUBLISH {} qos {} id {} ({} bytes queued)",
            topic,
            qos as u8,
            id,
            self.queue.len()
        );
        Ok(id)
    }

    /// Queue a SUBSCRIBE and record `topic` in the table right away.
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<u16, Error> {
        if self.info.is_none() {
            return Err(Error::NotInitialized);
        }
        if topic.len() > super::config::MAX_TOPIC_LEN {
            return Err(Error::TopicTooLong);
        }
        if !self.subscriptions.contains(topic) && self.subscriptions.is_full() {
            return Err(Error::SubscriptionTableFull);
        }
        let (packet, id) =
            codec::encode_subscribe(&mut self.tx, topic, qos, &mut self.next_packet_id)?;
        self.queue.enqueue_evicting(packet)?;
        self.subscriptions.insert(topic, qos)?;
        debug!("queued SUBSCRIBE {} qos {} id {}", topic, qos as u8, id);
        Ok(id)
    }

    /// Queue an UNSUBSCRIBE and drop `topic` from the table.
    pub fn unsubscribe(&mut self, topic: &str) -> Result<u16, Error> {
        if self.info.is_none() {
            return Err(Error::NotInitialized);
        }
        let (packet, id) = codec::encode_unsubscribe(&mut self.tx, topic, &mut self.next_packet_id)?;
        self.queue.enqueue_evicting(packet)?;
        self.subscriptions.remove(topic);
        debug!("queued UNSUBSCRIBE {} id {}", topic, id);
        Ok(id)
    }

    /// Start over with new parameters, ready to connect.
    pub(crate) fn reset(&mut self, info: ConnectInfo) {
        self.forget_link();
        self.queue.clear();
        self.timers = Timers::default();
        self.next_packet_id = 0;
        self.info = Some(info);
        self.state = ConnectionState::HostConnecting;
    }

    /// Drop everything tied to the broker-side session.
    pub(crate) fn forget_link(&mut self) {
        self.subscriptions.clear();
        self.awaiting_pubrel.clear();
        self.pending.clear();
        self.mqtt_connected = false;
    }

    /// Record the queued frame in `tx[..len]` that was just written to the
    /// transport.
    ///
    /// A QoS > 0 PUBLISH, a SUBSCRIBE or an UNSUBSCRIBE becomes the pending
    /// transaction. The subscription table follows what actually went out, so
    /// a SUBSCRIBE queued before a reconnect is listed again once it is sent.
    pub(crate) fn track_sent(&mut self, len: usize) {
        let frame = &self.tx[..len];
        let id = codec::decode_packet_id(frame);
        match packet_type(frame) {
            Some(PacketType::Publish) if qos_bits(frame) > 0 => {
                self.pending.set(PacketType::Publish, id);
            }
            Some(PacketType::Subscribe) => {
                self.pending.set(PacketType::Subscribe, id);
                match codec::decode_subscribe(frame) {
                    Ok((topic, qos)) => {
                        if let Err(e) = self.subscriptions.insert(topic, qos) {
                            warn!("cannot track subscription {}: {}", topic, e);
                        }
                    }
                    Err(e) => warn!("sent unreadable SUBSCRIBE: {}", e),
                }
            }
            Some(PacketType::Unsubscribe) => {
                self.pending.set(PacketType::Unsubscribe, id);
                if let Ok(topic) = codec::decode_unsubscribe(frame) {
                    self.subscriptions.remove(topic);
                }
            }
            _ => {}
        }
    }

    fn queue_reply<F>(&mut self, what: &str, encode: F)
    where
        F: FnOnce(&mut [u8]) -> Result<&[u8], CodecError>,
    {
        let packet = match encode(&mut self.tx[..]) {
            Ok(packet) => packet,
            Err(e) => {
                error!("cannot encode {}: {}", what, e);
                return;
            }
        };
        match self.queue.enqueue_evicting(packet) {
            Ok(_) => debug!("queued {}", what),
            Err(e) => warn!("cannot queue {}: {}", what, e),
        }
    }

    /// Handle one complete packet read from the broker.
    pub(crate) fn handle_packet<H: Handler>(&mut self, handler: &mut H, packet: &[u8]) {
        let inbound = match Inbound::parse(packet) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("ignoring malformed packet: {}", e);
                return;
            }
        };

        if !matches!(
            inbound,
            Inbound::Publish {
                qos: QoS::AtMostOnce,
                ..
            }
        ) {
            self.timers.keepalive = 0;
            self.timers.read_timeout = 0;
        }

        match self.state {
            ConnectionState::ConnectSent => self.handle_connect_reply(handler, inbound),
            ConnectionState::Data
            | ConnectionState::DataSent
            | ConnectionState::PingSent
            | ConnectionState::KeepaliveReq => {
                self.state = ConnectionState::Data;
                self.dispatch(handler, inbound);
            }
            other => debug!("ignoring {:?} in state {:?}", inbound, other),
        }
    }

    fn handle_connect_reply<H: Handler>(&mut self, handler: &mut H, inbound: Inbound<'_>) {
        let Inbound::Connack {
            session_present,
            return_code,
        } = inbound
        else {
            warn!("expected CONNACK, got {:?}", inbound);
            return;
        };

        if self.pending.kind != Some(PacketType::Connect) {
            error!("CONNACK without a pending CONNECT");
            self.state = ConnectionState::HostReconnectReq;
            return;
        }
        self.pending.clear();

        if return_code != 0 {
            error!("broker refused connection, return code {}", return_code);
            self.state = ConnectionState::ConnectFailed;
            return;
        }

        info!("CONNACK received, session present: {}", session_present);
        self.state = ConnectionState::Data;
        self.mqtt_connected = true;
        handler.on_connected(self);
    }

    fn dispatch<H: Handler>(&mut self, handler: &mut H, inbound: Inbound<'_>) {
        match inbound {
            Inbound::Publish {
                topic,
                payload,
                qos,
                id,
                ..
            } => self.deliver(handler, topic, payload, qos, id),
            Inbound::Puback(id) | Inbound::Pubcomp(id) => {
                if self.pending.matches(PacketType::Publish, id) {
                    self.pending.clear();
                    handler.on_published(id);
                } else {
                    warn!("publish ack for {} does not match pending {:?}", id, self.pending);
                }
            }
            Inbound::Pubrec(id) => {
                if self.pending.matches(PacketType::Publish, id) {
                    self.queue_reply("PUBREL", |buf| codec::encode_pubrel(buf, id));
                } else {
                    warn!("PUBREC for {} does not match pending {:?}", id, self.pending);
                }
            }
            Inbound::Pubrel(id) => {
                if let Some(pos) = self.awaiting_pubrel.iter().position(|&p| p == id) {
                    self.awaiting_pubrel.remove(pos);
                }
                self.queue_reply("PUBCOMP", |buf| codec::encode_pubcomp(buf, id));
            }
            Inbound::Suback { id, return_code } => {
                if self.pending.matches(PacketType::Subscribe, id) {
                    self.pending.clear();
                    if return_code == 0x80 {
                        warn!("broker rejected subscription {}", id);
                    }
                    handler.on_subscribed(id);
                } else {
                    warn!("SUBACK for {} does not match pending {:?}", id, self.pending);
                }
            }
            Inbound::Unsuback(id) => {
                if self.pending.matches(PacketType::Unsubscribe, id) {
                    self.pending.clear();
                    handler.on_unsubscribed(id);
                } else {
                    warn!("UNSUBACK for {} does not match pending {:?}", id, self.pending);
                }
            }
            Inbound::Pingreq => self.queue_reply("PINGRESP", codec::encode_pingresp),
            Inbound::Pingresp => debug!("PINGRESP"),
            Inbound::Connack { .. } | Inbound::Unexpected(_) => {
                warn!("unexpected {:?} in session", inbound);
            }
        }
    }

    fn deliver<H: Handler>(
        &mut self,
        handler: &mut H,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        id: u16,
    ) {
        debug!("PUBLISH {} qos {} id {} ({} bytes)", topic, qos as u8, id, payload.len());
        match qos {
            QoS::AtMostOnce => handler.on_data(self, topic, payload),
            QoS::AtLeastOnce => {
                handler.on_data(self, topic, payload);
                self.queue_reply("PUBACK", |buf| codec::encode_puback(buf, id));
            }
            QoS::ExactlyOnce => {
                if self.awaiting_pubrel.contains(&id) {
                    debug!("duplicate QoS 2 publish {}, not delivered again", id);
                } else {
                    if self.awaiting_pubrel.is_full() {
                        self.awaiting_pubrel.remove(0);
                    }
                    let _ = self.awaiting_pubrel.push(id);
                    handler.on_data(self, topic, payload);
                }
                self.queue_reply("PUBREC", |buf| codec::encode_pubrec(buf, id));
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("pending", &self.pending)
            .field("timers", &self.timers)
            .field("mqtt_connected", &self.mqtt_connected)
            .field("subscriptions", &self.subscriptions.len())
            .field("queued_bytes", &self.queue.len())
            .finish()
    }
}
