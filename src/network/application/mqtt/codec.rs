//! MQTT 3.1.1 wire codec.
//!
//! Encoders build a complete control packet into a caller-supplied scratch
//! buffer and return the slice holding it. They never leave a partial packet
//! behind: if anything does not fit, they fail with
//! [`CodecError::BufferTooSmall`] and the returned slice does not exist.
//!
//! Decoders work on one complete packet (fixed header included) and never read
//! past its declared remaining length.
//!
//! All multi-byte integers are big-endian and all strings carry a 2-byte
//! length prefix.
//!
//! ```rust
//! use mqttlink::network::application::mqtt::codec;
//! use mqttlink::network::application::mqtt::QoS;
//!
//! let mut scratch = [0u8; 64];
//! let mut next_id = 0;
//! let (packet, id) =
//!     codec::encode_publish(&mut scratch, "a/b", b"hi", QoS::AtLeastOnce, false, &mut next_id)
//!         .unwrap();
//!
//! assert_eq!(id, 1);
//! assert_eq!(packet, &[0x32, 9, 0, 3, b'a', b'/', b'b', 0, 1, b'h', b'i']);
//! assert_eq!(codec::decode_publish_topic(packet), Ok("a/b"));
//! assert_eq!(codec::decode_packet_id(packet), 1);
//! ```

use super::config::ConnectInfo;
use super::error::CodecError;
use super::packet::{PacketType, QoS, packet_type, qos_bits};

/// MQTT protocol name carried in CONNECT.
pub const PROTOCOL_NAME: &[u8] = b"MQTT";
/// Protocol level for MQTT 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;
/// Largest value a remaining length can encode.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

const MAX_LENGTH_BYTES: usize = 4;
// Worst case fixed header: type byte + four length bytes.
const HEADER_RESERVE: usize = 1 + MAX_LENGTH_BYTES;

const CONNECT_FLAG_USERNAME: u8 = 0x80;
const CONNECT_FLAG_PASSWORD: u8 = 0x40;
const CONNECT_FLAG_WILL_RETAIN: u8 = 0x20;
const CONNECT_FLAG_WILL: u8 = 0x04;
const CONNECT_FLAG_CLEAN_SESSION: u8 = 0x02;

/// Encode `len` as a remaining-length varint into `out`.
///
/// Returns the number of bytes used (1 to 4).
pub fn encode_remaining_length(
    mut len: usize,
    out: &mut [u8; MAX_LENGTH_BYTES],
) -> Result<usize, CodecError> {
    if len > MAX_REMAINING_LENGTH {
        return Err(CodecError::MalformedLength);
    }
    let mut count = 0;
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out[count] = byte;
        count += 1;
        if len == 0 {
            return Ok(count);
        }
    }
}

/// Decode a remaining-length varint from the start of `buf`.
///
/// Returns `(value, bytes_consumed)`. A continuation chain longer than four
/// bytes is [`CodecError::MalformedLength`]; running out of input first is
/// [`CodecError::Truncated`].
pub fn decode_remaining_length(buf: &[u8]) -> Result<(usize, usize), CodecError> {
    let mut value = 0usize;
    let mut multiplier = 1usize;
    for (i, &byte) in buf.iter().take(MAX_LENGTH_BYTES).enumerate() {
        value += usize::from(byte & 0x7F) * multiplier;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        multiplier *= 128;
    }
    if buf.len() >= MAX_LENGTH_BYTES {
        Err(CodecError::MalformedLength)
    } else {
        Err(CodecError::Truncated)
    }
}

/// Size of the whole packet starting at `packet[0]`: fixed header plus
/// remaining length.
pub fn decode_total_length(packet: &[u8]) -> Result<usize, CodecError> {
    let rest = packet.get(1..).ok_or(CodecError::Truncated)?;
    let (remaining, used) = decode_remaining_length(rest)?;
    Ok(1 + used + remaining)
}

/// The variable header and payload of `packet`, bounded by its remaining length.
pub fn body(packet: &[u8]) -> Result<&[u8], CodecError> {
    let rest = packet.get(1..).ok_or(CodecError::Truncated)?;
    let (remaining, used) = decode_remaining_length(rest)?;
    let start = 1 + used;
    packet
        .get(start..start + remaining)
        .ok_or(CodecError::Truncated)
}

fn read_u16(buf: &[u8], at: usize) -> Result<u16, CodecError> {
    match buf.get(at..at + 2) {
        Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo])),
        _ => Err(CodecError::Truncated),
    }
}

/// Topic name of a PUBLISH packet.
pub fn decode_publish_topic(packet: &[u8]) -> Result<&str, CodecError> {
    let body = body(packet)?;
    let len = usize::from(read_u16(body, 0)?);
    let topic = body.get(2..2 + len).ok_or(CodecError::Truncated)?;
    core::str::from_utf8(topic).map_err(|_| CodecError::InvalidUtf8)
}

/// Application payload of a PUBLISH packet.
///
/// Skips the topic and, for QoS 1 and 2, the packet identifier.
pub fn decode_publish_payload(packet: &[u8]) -> Result<&[u8], CodecError> {
    let body = body(packet)?;
    let mut offset = 2 + usize::from(read_u16(body, 0)?);
    if qos_bits(packet) > 0 {
        offset += 2;
    }
    body.get(offset..).ok_or(CodecError::Truncated)
}

/// Packet identifier of `packet`, or 0 if it carries none.
///
/// Defined for PUBLISH with QoS > 0, PUBACK, PUBREC, PUBREL, PUBCOMP,
/// SUBSCRIBE, SUBACK, UNSUBSCRIBE and UNSUBACK. Malformed or truncated packets
/// also yield 0.
pub fn decode_packet_id(packet: &[u8]) -> u16 {
    let Ok(body) = body(packet) else {
        return 0;
    };
    let id = match packet_type(packet) {
        Some(PacketType::Publish) if qos_bits(packet) > 0 => read_u16(body, 0)
            .and_then(|topic_len| read_u16(body, 2 + usize::from(topic_len))),
        Some(
            PacketType::Puback
            | PacketType::Pubrec
            | PacketType::Pubrel
            | PacketType::Pubcomp
            | PacketType::Subscribe
            | PacketType::Suback
            | PacketType::Unsubscribe
            | PacketType::Unsuback,
        ) => read_u16(body, 0),
        _ => return 0,
    };
    id.unwrap_or(0)
}

fn first_filter(packet: &[u8]) -> Result<(&str, &[u8]), CodecError> {
    let body = body(packet)?;
    let len = usize::from(read_u16(body, 2)?);
    let topic = body.get(4..4 + len).ok_or(CodecError::Truncated)?;
    let topic = core::str::from_utf8(topic).map_err(|_| CodecError::InvalidUtf8)?;
    Ok((topic, &body[4 + len..]))
}

/// Topic filter and requested QoS of a single-topic SUBSCRIBE.
pub fn decode_subscribe(packet: &[u8]) -> Result<(&str, QoS), CodecError> {
    let (topic, rest) = first_filter(packet)?;
    let qos = rest.first().ok_or(CodecError::Truncated)?;
    Ok((topic, QoS::clamped(*qos)))
}

/// Topic filter of a single-topic UNSUBSCRIBE.
pub fn decode_unsubscribe(packet: &[u8]) -> Result<&str, CodecError> {
    first_filter(packet).map(|(topic, _)| topic)
}

/// Advance a packet identifier counter. Identifiers wrap and skip 0.
pub fn next_packet_id(counter: &mut u16) -> u16 {
    *counter = counter.wrapping_add(1);
    if *counter == 0 {
        *counter = 1;
    }
    *counter
}

/// Builds one packet into a scratch buffer.
///
/// The body is written first, leaving room for the largest possible fixed
/// header; [`finish`](Self::finish) then writes the real header right-aligned
/// against the body so the packet is contiguous.
struct PacketWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> PacketWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Result<Self, CodecError> {
        if buf.len() < HEADER_RESERVE {
            return Err(CodecError::BufferTooSmall);
        }
        Ok(Self {
            buf,
            pos: HEADER_RESERVE,
        })
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let end = self.pos + bytes.len();
        self.buf
            .get_mut(self.pos..end)
            .ok_or(CodecError::BufferTooSmall)?
            .copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    fn put_u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.put_bytes(&[value])
    }

    fn put_u16(&mut self, value: u16) -> Result<(), CodecError> {
        self.put_bytes(&value.to_be_bytes())
    }

    fn put_str(&mut self, value: &[u8]) -> Result<(), CodecError> {
        let len = u16::try_from(value.len()).map_err(|_| CodecError::StringTooLong)?;
        self.put_u16(len)?;
        self.put_bytes(value)
    }

    fn finish(self, header: u8) -> Result<&'a [u8], CodecError> {
        let buf: &'a mut [u8] = self.buf;
        let mut length = [0u8; MAX_LENGTH_BYTES];
        let used = encode_remaining_length(self.pos - HEADER_RESERVE, &mut length)?;
        let start = HEADER_RESERVE - 1 - used;
        buf[start] = header;
        buf[start + 1..HEADER_RESERVE].copy_from_slice(&length[..used]);
        Ok(&buf[start..self.pos])
    }
}

/// Build a CONNECT packet.
///
/// Flags are derived from which optional fields are present; absent fields
/// are omitted from the payload and their flag stays clear. A password given
/// without a user name is dropped.
pub fn encode_connect<'a>(buf: &'a mut [u8], info: &ConnectInfo) -> Result<&'a [u8], CodecError> {
    if info.client_id.is_empty() {
        return Err(CodecError::MissingClientId);
    }

    let mut flags = 0u8;
    if info.clean_session {
        flags |= CONNECT_FLAG_CLEAN_SESSION;
    }
    let will = info.will.as_ref().filter(|w| !w.topic.is_empty());
    if let Some(will) = will {
        flags |= CONNECT_FLAG_WILL | ((will.qos as u8) << 3);
        if will.retain {
            flags |= CONNECT_FLAG_WILL_RETAIN;
        }
    }
    let username = info.username.as_ref().filter(|u| !u.is_empty());
    if username.is_some() {
        flags |= CONNECT_FLAG_USERNAME;
    }
    // MQTT 3.1.1 forbids a password without a user name.
    let password = info
        .password
        .as_ref()
        .filter(|p| !p.is_empty() && username.is_some());
    if password.is_some() {
        flags |= CONNECT_FLAG_PASSWORD;
    }

    let mut w = PacketWriter::new(buf)?;
    w.put_str(PROTOCOL_NAME)?;
    w.put_u8(PROTOCOL_LEVEL)?;
    w.put_u8(flags)?;
    w.put_u16(info.keepalive)?;

    w.put_str(info.client_id.as_bytes())?;
    if let Some(will) = will {
        w.put_str(will.topic.as_bytes())?;
        w.put_str(will.message.as_bytes())?;
    }
    if let Some(username) = username {
        w.put_str(username.as_bytes())?;
    }
    if let Some(password) = password {
        w.put_str(password.as_bytes())?;
    }
    w.finish(PacketType::Connect.header_bits())
}

/// Build a PUBLISH packet.
///
/// For QoS 0 no identifier is written and the returned id is 0; otherwise the
/// next identifier is drawn from `next_id` and written between topic and
/// payload.
pub fn encode_publish<'a>(
    buf: &'a mut [u8],
    topic: &str,
    payload: &[u8],
    qos: QoS,
    retain: bool,
    next_id: &mut u16,
) -> Result<(&'a [u8], u16), CodecError> {
    if topic.is_empty() {
        return Err(CodecError::EmptyTopic);
    }
    if payload.is_empty() {
        return Err(CodecError::EmptyPayload);
    }

    let mut w = PacketWriter::new(buf)?;
    w.put_str(topic.as_bytes())?;
    let id = match qos {
        QoS::AtMostOnce => 0,
        QoS::AtLeastOnce | QoS::ExactlyOnce => {
            let id = next_packet_id(next_id);
            w.put_u16(id)?;
            id
        }
    };
    w.put_bytes(payload)?;

    let header = PacketType::Publish.header_bits() | ((qos as u8) << 1) | u8::from(retain);
    Ok((w.finish(header)?, id))
}

fn encode_ack(buf: &mut [u8], header: u8, id: u16) -> Result<&[u8], CodecError> {
    let mut w = PacketWriter::new(buf)?;
    w.put_u16(id)?;
    w.finish(header)
}

/// Build a PUBACK for `id`.
pub fn encode_puback(buf: &mut [u8], id: u16) -> Result<&[u8], CodecError> {
    encode_ack(buf, PacketType::Puback.header_bits(), id)
}

/// Build a PUBREC for `id`.
pub fn encode_pubrec(buf: &mut [u8], id: u16) -> Result<&[u8], CodecError> {
    encode_ack(buf, PacketType::Pubrec.header_bits(), id)
}

/// Build a PUBREL for `id`. PUBREL has the reserved flag bits `0010`.
pub fn encode_pubrel(buf: &mut [u8], id: u16) -> Result<&[u8], CodecError> {
    encode_ack(buf, PacketType::Pubrel.header_bits() | 0x02, id)
}

/// Build a PUBCOMP for `id`.
pub fn encode_pubcomp(buf: &mut [u8], id: u16) -> Result<&[u8], CodecError> {
    encode_ack(buf, PacketType::Pubcomp.header_bits(), id)
}

/// Build a SUBSCRIBE for a single topic filter.
pub fn encode_subscribe<'a>(
    buf: &'a mut [u8],
    topic: &str,
    qos: QoS,
    next_id: &mut u16,
) -> Result<(&'a [u8], u16), CodecError> {
    if topic.is_empty() {
        return Err(CodecError::EmptyTopic);
    }
    let id = next_packet_id(next_id);
    let mut w = PacketWriter::new(buf)?;
    w.put_u16(id)?;
    w.put_str(topic.as_bytes())?;
    w.put_u8(qos as u8)?;
    Ok((w.finish(PacketType::Subscribe.header_bits() | 0x02)?, id))
}

/// Build an UNSUBSCRIBE for a single topic filter. Unlike SUBSCRIBE there is
/// no QoS byte.
pub fn encode_unsubscribe<'a>(
    buf: &'a mut [u8],
    topic: &str,
    next_id: &mut u16,
) -> Result<(&'a [u8], u16), CodecError> {
    if topic.is_empty() {
        return Err(CodecError::EmptyTopic);
    }
    let id = next_packet_id(next_id);
    let mut w = PacketWriter::new(buf)?;
    w.put_u16(id)?;
    w.put_str(topic.as_bytes())?;
    Ok((w.finish(PacketType::Unsubscribe.header_bits() | 0x02)?, id))
}

fn encode_empty(buf: &mut [u8], kind: PacketType) -> Result<&[u8], CodecError> {
    PacketWriter::new(buf)?.finish(kind.header_bits())
}

/// Build a PINGREQ.
pub fn encode_pingreq(buf: &mut [u8]) -> Result<&[u8], CodecError> {
    encode_empty(buf, PacketType::Pingreq)
}

/// Build a PINGRESP.
pub fn encode_pingresp(buf: &mut [u8]) -> Result<&[u8], CodecError> {
    encode_empty(buf, PacketType::Pingresp)
}

/// Build a DISCONNECT.
pub fn encode_disconnect(buf: &mut [u8]) -> Result<&[u8], CodecError> {
    encode_empty(buf, PacketType::Disconnect)
}
