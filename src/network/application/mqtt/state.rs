//! Connection lifecycle state and per-exchange bookkeeping.

use super::packet::PacketType;

/// Lifecycle of one broker connection.
///
/// ```text
/// Disconnected -> HostConnecting -> ConnectSent -> Data <-> {DataSent, PingSent, KeepaliveReq}
///     Data -> DisconnectReq -> DisconnectSent -> Disconnected
/// {ConnectFailed, PingFailed, DataFailed, DisconnectFailed} -> HostReconnect -> HostConnecting
/// *Sent (read timeout) -> HostReconnectReq -> HostConnecting
/// any -> Deleting
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum ConnectionState {
    /// Idle, no session.
    #[default]
    Disconnected,
    /// Transport is being opened; CONNECT goes out once it is up.
    HostConnecting,
    /// CONNECT written, waiting for CONNACK.
    ConnectSent,
    /// Session established and idle.
    Data,
    /// A packet expecting a reply was written.
    DataSent,
    /// PINGREQ written, waiting for PINGRESP.
    PingSent,
    /// Keepalive interval nearly elapsed; PINGREQ goes out on the next tick.
    KeepaliveReq,
    /// DISCONNECT goes out on the next tick.
    DisconnectReq,
    /// DISCONNECT written and the link closed.
    DisconnectSent,
    /// Opening the transport or writing CONNECT failed.
    ConnectFailed,
    /// Writing PINGREQ failed.
    PingFailed,
    /// Writing a queued packet failed.
    DataFailed,
    /// Writing DISCONNECT failed.
    DisconnectFailed,
    /// A reply timed out or the protocol was violated; reconnect on the next tick.
    HostReconnectReq,
    /// A failure state timed out; reconnect on the next tick.
    HostReconnect,
    /// The client was stopped or deleted.
    Deleting,
}

impl ConnectionState {
    /// `true` for the four `*Failed` states.
    pub fn is_failed(self) -> bool {
        matches!(
            self,
            ConnectionState::ConnectFailed
                | ConnectionState::PingFailed
                | ConnectionState::DataFailed
                | ConnectionState::DisconnectFailed
        )
    }

    /// `true` while a reply from the broker is awaited.
    pub fn awaits_reply(self) -> bool {
        matches!(
            self,
            ConnectionState::ConnectSent
                | ConnectionState::DataSent
                | ConnectionState::PingSent
                | ConnectionState::DisconnectSent
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectionState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConnectionState::Disconnected => defmt::write!(f, "Disconnected"),
            ConnectionState::HostConnecting => defmt::write!(f, "HostConnecting"),
            ConnectionState::ConnectSent => defmt::write!(f, "ConnectSent"),
            ConnectionState::Data => defmt::write!(f, "Data"),
            ConnectionState::DataSent => defmt::write!(f, "DataSent"),
            ConnectionState::PingSent => defmt::write!(f, "PingSent"),
            ConnectionState::KeepaliveReq => defmt::write!(f, "KeepaliveReq"),
            ConnectionState::DisconnectReq => defmt::write!(f, "DisconnectReq"),
            ConnectionState::DisconnectSent => defmt::write!(f, "DisconnectSent"),
            ConnectionState::ConnectFailed => defmt::write!(f, "ConnectFailed"),
            ConnectionState::PingFailed => defmt::write!(f, "PingFailed"),
            ConnectionState::DataFailed => defmt::write!(f, "DataFailed"),
            ConnectionState::DisconnectFailed => defmt::write!(f, "DisconnectFailed"),
            ConnectionState::HostReconnectReq => defmt::write!(f, "HostReconnectReq"),
            ConnectionState::HostReconnect => defmt::write!(f, "HostReconnect"),
            ConnectionState::Deleting => defmt::write!(f, "Deleting"),
        }
    }
}

/// The single outstanding request acknowledgements are matched against.
///
/// Only one slot exists. A second QoS > 0 publish (or subscribe) replaces the
/// first, and acknowledgements for the replaced request are then ignored.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct PendingTransaction {
    /// Type of the request, `None` when nothing is pending.
    pub kind: Option<PacketType>,
    /// Packet identifier of the request; 0 for CONNECT.
    pub id: u16,
}

impl PendingTransaction {
    /// `true` if a `kind` request with identifier `id` is pending.
    pub fn matches(&self, kind: PacketType, id: u16) -> bool {
        self.kind == Some(kind) && self.id == id
    }

    /// `true` when nothing is pending.
    pub fn is_idle(&self) -> bool {
        self.kind.is_none()
    }

    pub(crate) fn set(&mut self, kind: PacketType, id: u16) {
        self.kind = Some(kind);
        self.id = id;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Counters advanced by `mqtt_timer`, in timer ticks (one per second).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Timers {
    /// Ticks since the broker was last heard from while idle.
    pub keepalive: u32,
    /// Ticks spent waiting for the current reply.
    pub read_timeout: u32,
    /// Ticks spent connecting or in a failure state.
    pub host_connect: u32,
}
