//! MQTT 3.1.1 control packet model.
//!
//! The first byte of every packet is the fixed header:
//!
//! ```text
//!  7   6   5   4 | 3   | 2   1 | 0
//! packet type    | dup | qos   | retain
//! ```

use super::codec;
use super::error::CodecError;

/// The fourteen MQTT 3.1.1 control packet types.
///
/// The discriminant is the value carried in the high nibble of the fixed header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum PacketType {
    /// Client request to connect.
    Connect = 1,
    /// Connect acknowledgement.
    Connack = 2,
    /// Publish message.
    Publish = 3,
    /// QoS 1 publish acknowledgement.
    Puback = 4,
    /// QoS 2 publish received (part 1).
    Pubrec = 5,
    /// QoS 2 publish release (part 2).
    Pubrel = 6,
    /// QoS 2 publish complete (part 3).
    Pubcomp = 7,
    /// Subscribe request.
    Subscribe = 8,
    /// Subscribe acknowledgement.
    Suback = 9,
    /// Unsubscribe request.
    Unsubscribe = 10,
    /// Unsubscribe acknowledgement.
    Unsuback = 11,
    /// Ping request.
    Pingreq = 12,
    /// Ping response.
    Pingresp = 13,
    /// Client is disconnecting.
    Disconnect = 14,
}

impl PacketType {
    /// Decode the packet type from a fixed header byte.
    pub fn from_header(header: u8) -> Option<Self> {
        let kind = match header >> 4 {
            1 => PacketType::Connect,
            2 => PacketType::Connack,
            3 => PacketType::Publish,
            4 => PacketType::Puback,
            5 => PacketType::Pubrec,
            6 => PacketType::Pubrel,
            7 => PacketType::Pubcomp,
            8 => PacketType::Subscribe,
            9 => PacketType::Suback,
            10 => PacketType::Unsubscribe,
            11 => PacketType::Unsuback,
            12 => PacketType::Pingreq,
            13 => PacketType::Pingresp,
            14 => PacketType::Disconnect,
            _ => return None,
        };
        Some(kind)
    }

    /// The type bits shifted into the high nibble, flags clear.
    pub const fn header_bits(self) -> u8 {
        (self as u8) << 4
    }
}

/// Quality of Service levels for MQTT messages.
///
/// ```rust
/// use mqttlink::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::AtLeastOnce as u8, 1);
/// assert_eq!(QoS::clamped(7), QoS::ExactlyOnce);
/// assert_eq!(QoS::from_bits(3), None);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, PartialOrd, Ord)]
pub enum QoS {
    /// **QoS 0**: fire and forget.
    #[default]
    AtMostOnce = 0,
    /// **QoS 1**: acknowledged with PUBACK, duplicates possible.
    AtLeastOnce = 1,
    /// **QoS 2**: four-packet PUBLISH/PUBREC/PUBREL/PUBCOMP handshake.
    ExactlyOnce = 2,
}

impl QoS {
    /// Map 0, 1 or 2 to a level. Any other value is invalid.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }

    /// Like [`from_bits`](Self::from_bits) but values above 2 become
    /// [`QoS::ExactlyOnce`].
    pub fn clamped(level: u8) -> Self {
        QoS::from_bits(level.min(super::MQTT_MAX_QOS_LEVEL)).unwrap_or_default()
    }
}

/// Packet type of a raw packet, if the header names one.
pub fn packet_type(packet: &[u8]) -> Option<PacketType> {
    packet.first().copied().and_then(PacketType::from_header)
}

/// QoS bits of a raw packet's fixed header.
pub fn qos_bits(packet: &[u8]) -> u8 {
    packet.first().map_or(0, |h| (h >> 1) & 0x03)
}

/// RETAIN flag of a raw packet's fixed header.
pub fn retain(packet: &[u8]) -> bool {
    packet.first().is_some_and(|h| h & 0x01 != 0)
}

/// DUP flag of a raw packet's fixed header.
pub fn dup(packet: &[u8]) -> bool {
    packet.first().is_some_and(|h| h & 0x08 != 0)
}

/// `true` if the peer answers this outbound packet.
///
/// QoS 0 publishes and the acknowledgements we send never get a reply; every
/// other outbound packet does.
pub fn expects_reply(packet: &[u8]) -> bool {
    match packet_type(packet) {
        Some(PacketType::Publish) => qos_bits(packet) > 0,
        Some(
            PacketType::Connect
            | PacketType::Pubrel
            | PacketType::Subscribe
            | PacketType::Unsubscribe
            | PacketType::Pingreq,
        ) => true,
        _ => false,
    }
}

/// A decoded packet received from the broker, borrowing from the receive buffer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Inbound<'a> {
    /// Connect acknowledgement.
    Connack {
        /// Broker kept a previous session.
        session_present: bool,
        /// 0 on success, 1-5 for the refusal reasons.
        return_code: u8,
    },
    /// Application message.
    Publish {
        /// Topic name.
        topic: &'a str,
        /// Message body, possibly empty.
        payload: &'a [u8],
        /// Delivery level.
        qos: QoS,
        /// Packet identifier, 0 for QoS 0.
        id: u16,
        /// Retained message.
        retain: bool,
        /// Redelivery of an earlier attempt.
        dup: bool,
    },
    /// QoS 1 acknowledgement.
    Puback(u16),
    /// QoS 2 step 1 acknowledgement.
    Pubrec(u16),
    /// QoS 2 release.
    Pubrel(u16),
    /// QoS 2 completion.
    Pubcomp(u16),
    /// Subscribe acknowledgement.
    Suback {
        /// Identifier of the SUBSCRIBE being acknowledged.
        id: u16,
        /// Granted QoS, or 0x80 for failure.
        return_code: u8,
    },
    /// Unsubscribe acknowledgement.
    Unsuback(u16),
    /// Broker-initiated ping.
    Pingreq,
    /// Ping response.
    Pingresp,
    /// A client-to-server packet type that a broker should never send.
    Unexpected(PacketType),
}

impl<'a> Inbound<'a> {
    /// Parse one complete packet.
    ///
    /// Never reads past the declared remaining length; a packet that declares
    /// more than `packet` holds fails with [`CodecError::Truncated`].
    pub fn parse(packet: &'a [u8]) -> Result<Self, CodecError> {
        let kind = packet_type(packet).ok_or(CodecError::InvalidPacketType)?;
        let body = codec::body(packet)?;
        let inbound = match kind {
            PacketType::Connack => {
                let [flags, return_code] = *first_n::<2>(body)?;
                Inbound::Connack {
                    session_present: flags & 0x01 != 0,
                    return_code,
                }
            }
            PacketType::Publish => {
                let qos = QoS::from_bits(qos_bits(packet)).ok_or(CodecError::InvalidQos)?;
                Inbound::Publish {
                    topic: codec::decode_publish_topic(packet)?,
                    payload: codec::decode_publish_payload(packet)?,
                    qos,
                    id: codec::decode_packet_id(packet),
                    retain: retain(packet),
                    dup: dup(packet),
                }
            }
            PacketType::Puback => Inbound::Puback(id_of(body)?),
            PacketType::Pubrec => Inbound::Pubrec(id_of(body)?),
            PacketType::Pubrel => Inbound::Pubrel(id_of(body)?),
            PacketType::Pubcomp => Inbound::Pubcomp(id_of(body)?),
            PacketType::Suback => {
                let [hi, lo, return_code] = *first_n::<3>(body)?;
                Inbound::Suback {
                    id: u16::from_be_bytes([hi, lo]),
                    return_code,
                }
            }
            PacketType::Unsuback => Inbound::Unsuback(id_of(body)?),
            PacketType::Pingreq => Inbound::Pingreq,
            PacketType::Pingresp => Inbound::Pingresp,
            other => Inbound::Unexpected(other),
        };
        Ok(inbound)
    }
}

fn first_n<const N: usize>(body: &[u8]) -> Result<&[u8; N], CodecError> {
    body.get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or(CodecError::Truncated)
}

fn id_of(body: &[u8]) -> Result<u16, CodecError> {
    first_n::<2>(body).map(|b| u16::from_be_bytes(*b))
}
