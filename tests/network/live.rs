//! Round trips against a real broker. Run with
//! `cargo test --features std -- --ignored`; set `TEST_MQTT_ADDRESS` to use a
//! broker other than test.mosquitto.org.

#![cfg(feature = "std")]

use super::Recorder;
use dotenvy::dotenv;
use mqttlink::network::application::mqtt::{ConnectInfo, MqttConnection, QoS};
use mqttlink::network::tcp::TcpTransport;
use std::env;
use std::time::{Duration, Instant};

type LiveClient = MqttConnection<TcpTransport, Recorder>;

fn broker() -> (String, u16) {
    dotenv().ok();
    let address = env::var("TEST_MQTT_ADDRESS").unwrap_or("test.mosquitto.org:1883".to_string());
    let (host, port) = address.rsplit_once(':').expect("address is host:port");
    (host.to_string(), port.parse().expect("numeric port"))
}

/// Drive the client until `done` holds or `limit` passes.
fn run_until(client: &mut LiveClient, limit: Duration, done: impl Fn(&LiveClient) -> bool) -> bool {
    let start = Instant::now();
    let mut last_second = 0;
    while start.elapsed() < limit {
        let now = start.elapsed().as_millis() as u64;
        client.tick(now);
        if now / 1000 > last_second {
            last_second = now / 1000;
            client.mqtt_timer(now);
        }
        if done(client) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

fn connect(client_id: &str) -> LiveClient {
    let (host, port) = broker();
    let info = ConnectInfo::new(&host, port, client_id)
        .unwrap()
        .with_keepalive(10);
    let mut client = LiveClient::default();
    client.begin(TcpTransport::new(), info, None).unwrap();
    client.connect();
    assert!(
        run_until(&mut client, Duration::from_secs(10), |c| c.is_mqtt_connected()),
        "no CONNACK, state {:?}",
        client.state()
    );
    client
}

#[test]
#[ignore]
fn test_connect_to_public_broker() {
    let mut client = connect("mqttlink-test-client-12345");
    assert_eq!(client.handler().connected, 1);
    client.disconnect();
    assert!(run_until(&mut client, Duration::from_secs(2), |c| !c.is_mqtt_connected()));
}

#[test]
#[ignore]
fn test_publish_and_subscribe() {
    let mut client = connect("mqttlink-test-client-67890");
    let topic = "mqttlink/test-topic";

    let sub = client.subscribe(topic, QoS::AtLeastOnce).unwrap();
    assert!(run_until(&mut client, Duration::from_secs(5), |c| {
        c.handler().subscribed.contains(&sub)
    }));

    let id = client
        .publish(topic, b"hello world", QoS::AtLeastOnce, false)
        .unwrap();
    assert!(run_until(&mut client, Duration::from_secs(5), |c| {
        c.handler().published.contains(&id) && !c.handler().data.is_empty()
    }));

    let (received_topic, payload) = &client.handler().data[0];
    assert_eq!(received_topic, topic);
    assert_eq!(payload, b"hello world");
}
