//! Error types for the MQTT engine.

use super::config::ConfigError;
use crate::queue;

/// Failures while building or parsing MQTT control packets.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CodecError {
    /// The scratch buffer cannot hold the encoded packet. Nothing usable was written.
    BufferTooSmall,
    /// CONNECT without a client identifier.
    MissingClientId,
    /// PUBLISH, SUBSCRIBE or UNSUBSCRIBE with an empty topic.
    EmptyTopic,
    /// PUBLISH with an empty payload.
    EmptyPayload,
    /// A string longer than the 65535 bytes a length prefix can describe.
    StringTooLong,
    /// The remaining length exceeds 268,435,455 or uses more than 4 bytes.
    MalformedLength,
    /// The packet declares more bytes than were supplied.
    Truncated,
    /// The high nibble of the first byte is not a known packet type.
    InvalidPacketType,
    /// PUBLISH with both QoS bits set.
    InvalidQos,
    /// A topic that is not valid UTF-8.
    InvalidUtf8,
}

impl core::fmt::Display for CodecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            CodecError::BufferTooSmall => "packet does not fit the scratch buffer",
            CodecError::MissingClientId => "client id missing",
            CodecError::EmptyTopic => "empty topic",
            CodecError::EmptyPayload => "empty payload",
            CodecError::StringTooLong => "string longer than 65535 bytes",
            CodecError::MalformedLength => "malformed remaining length",
            CodecError::Truncated => "packet truncated",
            CodecError::InvalidPacketType => "invalid packet type",
            CodecError::InvalidQos => "invalid qos",
            CodecError::InvalidUtf8 => "topic is not valid utf-8",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CodecError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            CodecError::BufferTooSmall => defmt::write!(f, "BufferTooSmall"),
            CodecError::MissingClientId => defmt::write!(f, "MissingClientId"),
            CodecError::EmptyTopic => defmt::write!(f, "EmptyTopic"),
            CodecError::EmptyPayload => defmt::write!(f, "EmptyPayload"),
            CodecError::StringTooLong => defmt::write!(f, "StringTooLong"),
            CodecError::MalformedLength => defmt::write!(f, "MalformedLength"),
            CodecError::Truncated => defmt::write!(f, "Truncated"),
            CodecError::InvalidPacketType => defmt::write!(f, "InvalidPacketType"),
            CodecError::InvalidQos => defmt::write!(f, "InvalidQos"),
            CodecError::InvalidUtf8 => defmt::write!(f, "InvalidUtf8"),
        }
    }
}

/// Errors returned by the public operations of
/// [`MqttConnection`](super::connection::MqttConnection).
///
/// None of these change the connection state: a failed publish simply drops
/// that one message.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// `begin` has not been called, or the client was deleted.
    NotInitialized,
    /// The transport is not connected.
    NotConnected,
    /// The transport reported an error.
    Transport,
    /// Connection parameters failed validation.
    InvalidConfig(ConfigError),
    /// The packet could not be encoded or decoded.
    Codec(CodecError),
    /// The outbound queue rejected the packet.
    Queue(queue::Error),
    /// The subscription table has no free slot.
    SubscriptionTableFull,
    /// The topic is longer than a subscription table key.
    TopicTooLong,
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

impl From<queue::Error> for Error {
    fn from(e: queue::Error) -> Self {
        Error::Queue(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::InvalidConfig(e)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NotInitialized => f.write_str("client not initialized"),
            Error::NotConnected => f.write_str("transport not connected"),
            Error::Transport => f.write_str("transport error"),
            Error::InvalidConfig(e) => write!(f, "invalid config: {}", e),
            Error::Codec(e) => write!(f, "codec: {}", e),
            Error::Queue(e) => write!(f, "queue: {}", e),
            Error::SubscriptionTableFull => f.write_str("subscription table full"),
            Error::TopicTooLong => f.write_str("topic too long"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotInitialized => defmt::write!(f, "NotInitialized"),
            Error::NotConnected => defmt::write!(f, "NotConnected"),
            Error::Transport => defmt::write!(f, "Transport"),
            Error::InvalidConfig(e) => defmt::write!(f, "InvalidConfig({})", e),
            Error::Codec(e) => defmt::write!(f, "Codec({})", e),
            Error::Queue(e) => defmt::write!(f, "Queue({})", e),
            Error::SubscriptionTableFull => defmt::write!(f, "SubscriptionTableFull"),
            Error::TopicTooLong => defmt::write!(f, "TopicTooLong"),
        }
    }
}
