//! Connection parameters and persisted configuration documents.
//!
//! [`ConnectInfo`] is the owned, validated form the engine works with. The
//! `*Config` structs are borrowed views over the JSON documents kept by the
//! device's configuration store, parsed with `serde-json-core`:
//!
//! ```rust
//! use mqttlink::network::application::mqtt::config::{ConnectInfo, GeneralConfig};
//!
//! let json = r#"{"host":"broker.local","port":1883,"client_id":"dev-[mac]","keepalive":60}"#;
//! let general = GeneralConfig::from_json(json).unwrap();
//! let mut info = ConnectInfo::from_config(&general).unwrap();
//! info.expand_device_id("a0b1c2").unwrap();
//!
//! assert_eq!(info.client_id.as_str(), "dev-a0b1c2");
//! assert_eq!(info.keepalive, 60);
//! assert!(info.clean_session);
//! ```

use super::packet::QoS;
use super::{MQTT_DEFAULT_KEEPALIVE, MQTT_DEFAULT_PORT};
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

/// Longest broker host name.
pub const MAX_HOST_LEN: usize = 64;
/// Longest client identifier.
pub const MAX_CLIENT_ID_LEN: usize = 100;
/// Longest user name.
pub const MAX_USERNAME_LEN: usize = 64;
/// Longest password or token.
pub const MAX_PASSWORD_LEN: usize = 512;
/// Longest topic name or filter kept by the engine.
pub const MAX_TOPIC_LEN: usize = 64;
/// Longest last-will message.
pub const MAX_WILL_MESSAGE_LEN: usize = 128;
/// Topics per direction in a [`PubSubConfig`].
pub const MAX_PUBSUB_TOPICS: usize = 2;
/// Placeholder replaced by the device MAC address.
pub const DEVICE_MAC_PLACEHOLDER: &str = "[mac]";

// The broker needs time to answer a PINGREQ sent at 85% of the interval.
const MIN_KEEPALIVE: u16 = 5;

/// Why a configuration was rejected.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConfigError {
    /// Host name is empty.
    EmptyHost,
    /// Port is 0.
    InvalidPort,
    /// Client identifier is empty.
    MissingClientId,
    /// Keepalive must be more than 5 seconds.
    KeepaliveTooShort,
    /// A field does not fit its fixed-capacity buffer.
    FieldTooLong,
    /// The JSON document could not be parsed or written.
    InvalidJson,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            ConfigError::EmptyHost => "host is empty",
            ConfigError::InvalidPort => "port is 0",
            ConfigError::MissingClientId => "client id is empty",
            ConfigError::KeepaliveTooShort => "keepalive must exceed 5 seconds",
            ConfigError::FieldTooLong => "field too long",
            ConfigError::InvalidJson => "invalid json",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConfigError::EmptyHost => defmt::write!(f, "EmptyHost"),
            ConfigError::InvalidPort => defmt::write!(f, "InvalidPort"),
            ConfigError::MissingClientId => defmt::write!(f, "MissingClientId"),
            ConfigError::KeepaliveTooShort => defmt::write!(f, "KeepaliveTooShort"),
            ConfigError::FieldTooLong => defmt::write!(f, "FieldTooLong"),
            ConfigError::InvalidJson => defmt::write!(f, "InvalidJson"),
        }
    }
}

fn owned<const N: usize>(value: &str) -> Result<String<N>, ConfigError> {
    String::try_from(value).map_err(|_| ConfigError::FieldTooLong)
}

fn optional<const N: usize>(value: &str) -> Result<Option<String<N>>, ConfigError> {
    if value.is_empty() {
        Ok(None)
    } else {
        owned(value).map(Some)
    }
}

/// Replace every occurrence of `placeholder` in `template` with `value`.
///
/// ```rust
/// use mqttlink::network::application::mqtt::config::expand_placeholder;
///
/// let topic: heapless::String<32> =
///     expand_placeholder("dev/[mac]/status", "[mac]", "0a1b").unwrap();
/// assert_eq!(topic.as_str(), "dev/0a1b/status");
/// ```
pub fn expand_placeholder<const N: usize>(
    template: &str,
    placeholder: &str,
    value: &str,
) -> Result<String<N>, ConfigError> {
    let mut out = String::new();
    let mut rest = template;
    if !placeholder.is_empty() {
        while let Some(pos) = rest.find(placeholder) {
            out.push_str(&rest[..pos])
                .map_err(|_| ConfigError::FieldTooLong)?;
            out.push_str(value).map_err(|_| ConfigError::FieldTooLong)?;
            rest = &rest[pos + placeholder.len()..];
        }
    }
    out.push_str(rest).map_err(|_| ConfigError::FieldTooLong)?;
    Ok(out)
}

/// Last Will and Testament published by the broker if this client vanishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    /// Topic the will is published on.
    pub topic: String<MAX_TOPIC_LEN>,
    /// Will message body.
    pub message: String<MAX_WILL_MESSAGE_LEN>,
    /// Delivery level of the will.
    pub qos: QoS,
    /// Ask the broker to retain the will.
    pub retain: bool,
}

impl LastWill {
    /// Build a will. A `qos` above 2 is clamped to 2.
    pub fn new(topic: &str, message: &str, qos: u8, retain: bool) -> Result<Self, ConfigError> {
        Ok(Self {
            topic: owned(topic)?,
            message: owned(message)?,
            qos: QoS::clamped(qos),
            retain,
        })
    }

    /// Build a will from a stored document. An empty topic means no will.
    pub fn from_config(config: &LwtConfig<'_>) -> Result<Option<Self>, ConfigError> {
        if config.will_topic.is_empty() {
            return Ok(None);
        }
        Self::new(
            config.will_topic,
            config.will_message,
            config.will_qos,
            config.will_retain,
        )
        .map(Some)
    }
}

/// Everything needed to open one MQTT session.
///
/// Owned by the connection from `begin` until the client is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectInfo {
    /// Broker host name or address.
    pub host: String<MAX_HOST_LEN>,
    /// Broker port.
    pub port: u16,
    /// Client identifier, never empty.
    pub client_id: String<MAX_CLIENT_ID_LEN>,
    /// Optional user name.
    pub username: Option<String<MAX_USERNAME_LEN>>,
    /// Optional password.
    pub password: Option<String<MAX_PASSWORD_LEN>>,
    /// Keepalive interval in seconds.
    pub keepalive: u16,
    /// Ask the broker to drop previous session state.
    pub clean_session: bool,
    /// Optional last will.
    pub will: Option<LastWill>,
}

impl ConnectInfo {
    /// Connection parameters with the default keepalive and a clean session.
    pub fn new(host: &str, port: u16, client_id: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            host: owned(host)?,
            port,
            client_id: owned(client_id)?,
            username: None,
            password: None,
            keepalive: MQTT_DEFAULT_KEEPALIVE,
            clean_session: true,
            will: None,
        })
    }

    /// Set user name and password. Empty strings leave the field unset.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Result<Self, ConfigError> {
        self.username = optional(username)?;
        self.password = optional(password)?;
        Ok(self)
    }

    /// Set the keepalive interval in seconds.
    pub fn with_keepalive(mut self, keepalive: u16) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Set the clean session flag.
    pub fn with_clean_session(mut self, clean_session: bool) -> Self {
        self.clean_session = clean_session;
        self
    }

    /// Attach a last will.
    pub fn with_will(mut self, will: LastWill) -> Self {
        self.will = Some(will);
        self
    }

    /// Build from a stored general config document.
    pub fn from_config(config: &GeneralConfig<'_>) -> Result<Self, ConfigError> {
        Ok(Self::new(config.host, config.port, config.client_id)?
            .with_credentials(config.username, config.password)?
            .with_keepalive(config.keepalive)
            .with_clean_session(config.clean_session))
    }

    /// Substitute [`DEVICE_MAC_PLACEHOLDER`] in the client id, user name and
    /// will message.
    pub fn expand_device_id(&mut self, mac: &str) -> Result<(), ConfigError> {
        self.client_id = expand_placeholder(&self.client_id, DEVICE_MAC_PLACEHOLDER, mac)?;
        if let Some(username) = self.username.as_mut() {
            *username = expand_placeholder(username, DEVICE_MAC_PLACEHOLDER, mac)?;
        }
        if let Some(will) = self.will.as_mut() {
            will.message = expand_placeholder(&will.message, DEVICE_MAC_PLACEHOLDER, mac)?;
        }
        Ok(())
    }

    /// Check the parameters the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::MissingClientId);
        }
        if self.keepalive <= MIN_KEEPALIVE {
            return Err(ConfigError::KeepaliveTooShort);
        }
        Ok(())
    }
}

fn default_port() -> u16 {
    MQTT_DEFAULT_PORT
}

fn default_keepalive() -> u16 {
    MQTT_DEFAULT_KEEPALIVE
}

fn default_true() -> bool {
    true
}

fn from_json<'a, T: Deserialize<'a>>(json: &'a str) -> Result<T, ConfigError> {
    serde_json_core::from_str(json)
        .map(|(value, _)| value)
        .map_err(|_| ConfigError::InvalidJson)
}

fn to_json<T: Serialize>(value: &T, buf: &mut [u8]) -> Result<usize, ConfigError> {
    serde_json_core::to_slice(value, buf).map_err(|_| ConfigError::InvalidJson)
}

/// Broker and credential settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GeneralConfig<'a> {
    /// Broker host.
    pub host: &'a str,
    /// Broker port, 1883 if omitted.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Use a secured transport. Chosen by the host application; the engine
    /// only sees the resulting [`Transport`](crate::network::Transport).
    #[serde(default)]
    pub security: bool,
    /// Client identifier, may contain `[mac]`.
    pub client_id: &'a str,
    /// User name, empty for none.
    #[serde(default)]
    pub username: &'a str,
    /// Password, empty for none.
    #[serde(default)]
    pub password: &'a str,
    /// Keepalive in seconds, 30 if omitted.
    #[serde(default = "default_keepalive")]
    pub keepalive: u16,
    /// Clean session, true if omitted.
    #[serde(default = "default_true")]
    pub clean_session: bool,
}

impl<'a> GeneralConfig<'a> {
    /// Parse a stored document.
    pub fn from_json(json: &'a str) -> Result<Self, ConfigError> {
        from_json(json)
    }

    /// Serialize into `buf`, returning the number of bytes written.
    pub fn to_json(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        to_json(self, buf)
    }
}

/// Last will settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct LwtConfig<'a> {
    /// Will topic, empty for no will.
    #[serde(default)]
    pub will_topic: &'a str,
    /// Will message, may contain `[mac]`.
    #[serde(default)]
    pub will_message: &'a str,
    /// Will QoS; values above 2 are clamped.
    #[serde(default)]
    pub will_qos: u8,
    /// Retain the will.
    #[serde(default)]
    pub will_retain: bool,
}

impl<'a> LwtConfig<'a> {
    /// Parse a stored document.
    pub fn from_json(json: &'a str) -> Result<Self, ConfigError> {
        from_json(json)
    }

    /// Serialize into `buf`, returning the number of bytes written.
    pub fn to_json(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        to_json(self, buf)
    }
}

/// A topic the device publishes to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PublishTopic<'a> {
    /// Topic name.
    pub topic: &'a str,
    /// Delivery level.
    #[serde(default)]
    pub qos: u8,
    /// Retain flag.
    #[serde(default)]
    pub retain: bool,
}

/// A topic filter the device subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubscribeTopic<'a> {
    /// Topic filter.
    pub topic: &'a str,
    /// Requested QoS.
    #[serde(default)]
    pub qos: u8,
}

/// Topics to publish to and subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct PubSubConfig<'a> {
    /// Topics for periodic publishing.
    #[serde(borrow, default)]
    pub publish_topics: Vec<PublishTopic<'a>, MAX_PUBSUB_TOPICS>,
    /// Topic filters to keep subscribed.
    #[serde(borrow, default)]
    pub subscribe_topics: Vec<SubscribeTopic<'a>, MAX_PUBSUB_TOPICS>,
    /// Publish period in seconds.
    #[serde(default)]
    pub publish_frequency: u32,
}

impl<'a> PubSubConfig<'a> {
    /// Parse a stored document.
    pub fn from_json(json: &'a str) -> Result<Self, ConfigError> {
        from_json(json)
    }

    /// Serialize into `buf`, returning the number of bytes written.
    pub fn to_json(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        to_json(self, buf)
    }

    /// `true` if `topic` is one of the configured subscriptions.
    pub fn wants_subscription(&self, topic: &str) -> bool {
        self.subscribe_topics.iter().any(|t| t.topic == topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_config_defaults() {
        let config = GeneralConfig::from_json(r#"{"host":"broker","client_id":"dev1"}"#).unwrap();
        assert_eq!(config.port, 1883);
        assert_eq!(config.keepalive, 30);
        assert!(config.clean_session);
        assert_eq!(config.username, "");

        let info = ConnectInfo::from_config(&config).unwrap();
        assert_eq!(info.username, None);
        assert_eq!(info.password, None);
        assert!(info.validate().is_ok());
    }

    #[test]
    fn test_general_config_round_trip() {
        let json = r#"{"host":"h","port":8883,"security":true,"client_id":"c","username":"u","password":"p","keepalive":45,"clean_session":false}"#;
        let config = GeneralConfig::from_json(json).unwrap();
        let mut buf = [0u8; 256];
        let len = config.to_json(&mut buf).unwrap();
        assert_eq!(&buf[..len], json.as_bytes());
    }

    #[test]
    fn test_invalid_json() {
        assert_eq!(
            GeneralConfig::from_json("{\"host\":"),
            Err(ConfigError::InvalidJson)
        );
    }

    #[test]
    fn test_validate() {
        let info = ConnectInfo::new("broker", 1883, "dev1").unwrap();
        assert_eq!(info.clone().with_keepalive(5).validate(), Err(ConfigError::KeepaliveTooShort));
        assert!(info.clone().with_keepalive(6).validate().is_ok());

        let mut bad = info.clone();
        bad.host.clear();
        assert_eq!(bad.validate(), Err(ConfigError::EmptyHost));

        let mut bad = info.clone();
        bad.port = 0;
        assert_eq!(bad.validate(), Err(ConfigError::InvalidPort));

        let mut bad = info;
        bad.client_id.clear();
        assert_eq!(bad.validate(), Err(ConfigError::MissingClientId));
    }

    #[test]
    fn test_field_too_long() {
        let long = [b'x'; MAX_HOST_LEN + 1];
        let long = core::str::from_utf8(&long).unwrap();
        assert_eq!(
            ConnectInfo::new(long, 1883, "dev1"),
            Err(ConfigError::FieldTooLong)
        );
    }

    #[test]
    fn test_lwt_config() {
        let lwt = LwtConfig::from_json(
            r#"{"will_topic":"dev/status","will_message":"[mac] offline","will_qos":3,"will_retain":true}"#,
        )
        .unwrap();
        let will = LastWill::from_config(&lwt).unwrap().unwrap();
        assert_eq!(will.qos, QoS::ExactlyOnce);
        assert!(will.retain);

        let mut info = ConnectInfo::new("broker", 1883, "[mac]")
            .unwrap()
            .with_credentials("user-[mac]", "")
            .unwrap()
            .with_will(will);
        info.expand_device_id("aabb").unwrap();
        assert_eq!(info.client_id.as_str(), "aabb");
        assert_eq!(info.username.as_deref(), Some("user-aabb"));
        assert_eq!(info.will.unwrap().message.as_str(), "aabb offline");

        assert_eq!(LastWill::from_config(&LwtConfig::default()), Ok(None));
    }

    #[test]
    fn test_pubsub_config() {
        let json = r#"{"publish_topics":[{"topic":"dev/out","qos":1,"retain":false}],"subscribe_topics":[{"topic":"dev/in","qos":0},{"topic":"all/#","qos":2}],"publish_frequency":10}"#;
        let config = PubSubConfig::from_json(json).unwrap();
        assert_eq!(config.publish_topics.len(), 1);
        assert_eq!(config.subscribe_topics[1].topic, "all/#");
        assert_eq!(config.publish_frequency, 10);
        assert!(config.wants_subscription("dev/in"));
        assert!(!config.wants_subscription("dev/out"));
    }

    #[test]
    fn test_expand_placeholder() {
        let s: String<16> = expand_placeholder("[mac]-[mac]", "[mac]", "ab").unwrap();
        assert_eq!(s.as_str(), "ab-ab");
        let s: String<16> = expand_placeholder("plain", "", "ab").unwrap();
        assert_eq!(s.as_str(), "plain");
        assert_eq!(
            expand_placeholder::<4>("[mac]", "[mac]", "abcde"),
            Err(ConfigError::FieldTooLong)
        );
    }
}
