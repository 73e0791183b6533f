use super::{Client, MockTransport, connected_client, info, transport};
use mqttlink::network::application::mqtt::config::PubSubConfig;
use mqttlink::network::application::mqtt::{ConnectionState, Error, PacketType, QoS};

#[test]
fn test_connect_writes_connect_packet() {
    let mut client = Client::default();
    client
        .begin(MockTransport::default(), info(), None)
        .unwrap();
    assert_eq!(client.state(), ConnectionState::HostConnecting);

    client.connect();
    assert_eq!(client.state(), ConnectionState::ConnectSent);
    assert!(client.pending().matches(PacketType::Connect, 0));
    assert_eq!(
        transport(&mut client).take_written(),
        vec![
            0x10, 15, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C, 0x00, 0x03, b'd',
            b'e', b'v'
        ]
    );
    assert!(!client.is_mqtt_connected());
}

#[test]
fn test_connack_enters_data() {
    let client = connected_client();
    assert_eq!(client.state(), ConnectionState::Data);
    assert!(client.is_mqtt_connected());
    assert_eq!(client.handler().connected, 1);
    assert!(client.pending().is_idle());
}

#[test]
fn test_subscribe_before_connack() {
    let mut client = Client::default();
    client
        .begin(MockTransport::default(), info(), None)
        .unwrap();
    client.connect();
    let sub = client.subscribe("meters/7/cmd", QoS::AtLeastOnce).unwrap();
    assert!(client.pending().matches(PacketType::Connect, 0));

    transport(&mut client).inject(&[0x20, 0x02, 0x00, 0x00]);
    client.tick(0);
    assert_eq!(client.state(), ConnectionState::Data);
    assert_eq!(client.handler().connected, 1);

    transport(&mut client).take_written();
    client.tick(1);
    assert_eq!(client.state(), ConnectionState::DataSent);
    assert_eq!(transport(&mut client).take_written()[0], 0x82);
    assert!(client.pending().matches(PacketType::Subscribe, sub));
}

#[test]
fn test_connack_refused() {
    let mut client = Client::default();
    client
        .begin(MockTransport::default(), info(), None)
        .unwrap();
    client.connect();
    transport(&mut client).inject(&[0x20, 0x02, 0x00, 0x05]);
    client.tick(10);

    assert_eq!(client.state(), ConnectionState::ConnectFailed);
    assert_eq!(client.handler().connected, 0);
    assert!(!client.is_mqtt_connected());
}

#[test]
fn test_begin_rejects_bad_config() {
    let mut client = Client::default();
    let short = info().with_keepalive(5);
    assert!(matches!(
        client.begin(MockTransport::default(), short, None),
        Err(Error::InvalidConfig(_))
    ));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(
        client.publish("t", b"x", QoS::AtMostOnce, false),
        Err(Error::NotInitialized)
    );
}

#[test]
fn test_qos1_publish_lifecycle() {
    let mut client = connected_client();
    let id = client.publish("t", b"x", QoS::AtLeastOnce, false).unwrap();
    assert_eq!(id, 1);
    assert!(client.pending().is_idle());
    assert!(transport(&mut client).tx.is_empty());

    client.tick(1);
    assert_eq!(client.state(), ConnectionState::DataSent);
    assert!(client.pending().matches(PacketType::Publish, 1));
    assert_eq!(
        transport(&mut client).take_written(),
        vec![0x32, 6, 0, 1, b't', 0, 1, b'x']
    );

    transport(&mut client).inject(&[0x40, 2, 0, 1]);
    client.tick(2);
    assert_eq!(client.state(), ConnectionState::Data);
    assert_eq!(client.handler().published, vec![1]);
    assert!(client.pending().is_idle());
}

#[test]
fn test_qos1_mismatched_ack() {
    let mut client = connected_client();
    client.publish("t", b"x", QoS::AtLeastOnce, false).unwrap();
    client.tick(1);

    transport(&mut client).inject(&[0x40, 2, 0, 2]);
    client.tick(2);
    assert!(client.handler().published.is_empty());
    assert!(client.pending().matches(PacketType::Publish, 1));
}

#[test]
fn test_qos2_publish_lifecycle() {
    let mut client = connected_client();
    let id = client.publish("t", b"x", QoS::ExactlyOnce, false).unwrap();
    assert_eq!(id, 1);
    client.tick(1);
    assert_eq!(
        transport(&mut client).take_written(),
        vec![0x34, 6, 0, 1, b't', 0, 1, b'x']
    );

    transport(&mut client).inject(&[0x50, 2, 0, 1]);
    client.tick(2);
    assert_eq!(client.state(), ConnectionState::Data);
    assert!(client.handler().published.is_empty());

    client.tick(3);
    assert_eq!(client.state(), ConnectionState::DataSent);
    assert_eq!(transport(&mut client).take_written(), vec![0x62, 2, 0, 1]);

    transport(&mut client).inject(&[0x70, 2, 0, 1]);
    client.tick(4);
    assert_eq!(client.handler().published, vec![1]);
    assert!(client.pending().is_idle());
}

#[test]
fn test_inbound_qos1_is_acked_once() {
    let mut client = connected_client();
    transport(&mut client).inject(&[0x32, 6, 0, 1, b't', 0, 5, b'x']);
    client.tick(1);
    assert_eq!(
        client.handler().data,
        vec![("t".to_string(), b"x".to_vec())]
    );

    client.tick(2);
    client.tick(3);
    assert_eq!(transport(&mut client).take_written(), vec![0x40, 2, 0, 5]);
    assert_eq!(client.state(), ConnectionState::Data);
}

#[test]
fn test_broker_ping_is_answered() {
    let mut client = connected_client();
    transport(&mut client).inject(&[0xC0, 0]);
    client.tick(1);
    client.tick(2);
    assert_eq!(transport(&mut client).take_written(), vec![0xD0, 0]);
    assert_eq!(client.state(), ConnectionState::Data);
}

#[test]
fn test_subscription_table() {
    let mut client = connected_client();
    let sub = client.subscribe("cmd/#", QoS::AtLeastOnce).unwrap();
    assert!(client.is_subscribed("cmd/#"));
    assert_eq!(client.subscriptions().len(), 1);

    client.tick(1);
    assert_eq!(client.state(), ConnectionState::DataSent);
    transport(&mut client).inject(&[0x90, 3, 0, sub as u8, 1]);
    client.tick(2);
    assert_eq!(client.handler().subscribed, vec![sub]);

    let unsub = client.unsubscribe("cmd/#").unwrap();
    assert!(!client.is_subscribed("cmd/#"));
    client.tick(3);
    transport(&mut client).inject(&[0xB0, 2, 0, unsub as u8]);
    client.tick(4);
    assert_eq!(client.handler().unsubscribed, vec![unsub]);
}

#[test]
fn test_disconnect_clears_subscriptions() {
    let mut client = connected_client();
    client.subscribe("a", QoS::AtMostOnce).unwrap();

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::DisconnectSent);
    assert_eq!(transport(&mut client).take_written(), vec![0xE0, 0]);
    assert!(client.subscriptions().is_empty());
    assert!(!client.is_mqtt_connected());
    assert_eq!(client.handler().disconnected, 1);

    client.tick(1);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.handler().disconnected, 1);
    assert_eq!(
        client.publish("t", b"x", QoS::AtMostOnce, false),
        Err(Error::NotConnected)
    );
}

#[test]
fn test_keepalive_sends_ping() {
    let mut client = connected_client();
    // 60 s keepalive fires once the counter passes 51.
    for second in 1..=51 {
        client.mqtt_timer(second * 1000);
    }
    assert_eq!(client.state(), ConnectionState::Data);
    client.mqtt_timer(52_000);
    assert_eq!(client.state(), ConnectionState::KeepaliveReq);

    client.tick(52_001);
    assert_eq!(client.state(), ConnectionState::PingSent);
    assert_eq!(transport(&mut client).take_written(), vec![0xC0, 0]);
    assert_eq!(client.timers().keepalive, 0);

    transport(&mut client).inject(&[0xD0, 0]);
    client.tick(52_002);
    assert_eq!(client.state(), ConnectionState::Data);
}

#[test]
fn test_reply_timeout_reconnects() {
    let mut client = connected_client();
    client.publish("t", b"x", QoS::AtLeastOnce, false).unwrap();
    client.tick(1);
    assert_eq!(client.state(), ConnectionState::DataSent);

    for _ in 0..10 {
        client.mqtt_timer(0);
    }
    assert_eq!(client.state(), ConnectionState::DataSent);
    client.mqtt_timer(0);
    assert_eq!(client.state(), ConnectionState::HostReconnectReq);
    assert_eq!(client.handler().timeouts, 1);

    transport(&mut client).take_written();
    client.tick(2);
    assert_eq!(client.state(), ConnectionState::ConnectSent);
    assert_eq!(client.handler().disconnected, 1);
    assert_eq!(transport(&mut client).connects, 2);
    assert_eq!(transport(&mut client).take_written()[0], 0x10);
}

#[test]
fn test_failed_connect_retries_from_timer() {
    let mut client = Client::default();
    client
        .begin(MockTransport::default(), info(), None)
        .unwrap();
    transport(&mut client).refuse_connect = true;
    client.connect();
    assert_eq!(client.state(), ConnectionState::ConnectFailed);

    client.tick(0);
    assert_eq!(client.state(), ConnectionState::ConnectFailed);
    for _ in 0..5 {
        client.mqtt_timer(0);
    }
    assert_eq!(client.state(), ConnectionState::ConnectFailed);
    client.mqtt_timer(0);
    assert_eq!(client.state(), ConnectionState::HostReconnect);

    transport(&mut client).refuse_connect = false;
    client.tick(1);
    assert_eq!(client.state(), ConnectionState::ConnectSent);
}

#[test]
fn test_write_failure_enters_data_failed() {
    let mut client = connected_client();
    client.publish("t", b"x", QoS::AtMostOnce, false).unwrap();
    transport(&mut client).fail_writes = true;
    client.tick(1);
    assert_eq!(client.state(), ConnectionState::DataFailed);
    assert_eq!(client.handler().disconnected, 1);
}

#[test]
fn test_dropped_transport_reconnects() {
    let mut client = connected_client();
    client.subscribe("a", QoS::AtMostOnce).unwrap();
    client.tick(1);
    transport(&mut client).connected = false;

    client.tick(2);
    assert_eq!(client.state(), ConnectionState::HostReconnectReq);
    assert!(client.subscriptions().is_empty());
    assert_eq!(client.handler().disconnected, 1);

    client.tick(3);
    assert_eq!(client.state(), ConnectionState::ConnectSent);
}

#[test]
fn test_queued_packets_survive_reconnect() {
    let mut client = connected_client();
    client.publish("t", b"x", QoS::AtLeastOnce, false).unwrap();
    client.tick(1);
    assert_eq!(client.state(), ConnectionState::DataSent);

    let sub = client.subscribe("a", QoS::AtLeastOnce).unwrap();
    let id = client.publish("t", b"y", QoS::AtLeastOnce, false).unwrap();
    transport(&mut client).connected = false;
    client.tick(2);
    assert_eq!(client.state(), ConnectionState::HostReconnectReq);
    assert!(!client.is_subscribed("a"));
    assert!(client.pending().is_idle());

    client.tick(3);
    assert_eq!(client.state(), ConnectionState::ConnectSent);
    transport(&mut client).inject(&[0x20, 0x02, 0x00, 0x00]);
    client.tick(4);
    assert_eq!(client.state(), ConnectionState::Data);
    transport(&mut client).take_written();

    client.tick(5);
    assert_eq!(transport(&mut client).take_written()[0], 0x82);
    assert!(client.is_subscribed("a"));
    transport(&mut client).inject(&[0x90, 3, 0, sub as u8, 1]);
    client.tick(6);
    assert_eq!(client.handler().subscribed, vec![sub]);

    client.tick(7);
    assert_eq!(
        transport(&mut client).take_written(),
        vec![0x32, 6, 0, 1, b't', 0, id as u8, b'y']
    );
    transport(&mut client).inject(&[0x40, 2, 0, id as u8]);
    client.tick(8);
    assert_eq!(client.handler().published, vec![id]);
    assert_eq!(client.state(), ConnectionState::Data);
}

#[test]
fn test_truncated_packet_reconnects() {
    let mut client = connected_client();
    // PUBLISH announcing 10 body bytes but delivering 2.
    transport(&mut client).inject(&[0x30, 10, 0, 1]);
    client.tick(1);
    assert_eq!(client.state(), ConnectionState::HostReconnectReq);
    assert!(client.handler().data.is_empty());
    assert_eq!(client.handler().disconnected, 1);

    client.tick(2);
    assert_eq!(client.state(), ConnectionState::ConnectSent);
}

#[test]
fn test_oversize_packet_is_skipped() {
    let mut client = connected_client();
    let mut big = vec![0x30, 0xD0, 0x0F, 0, 1, b't'];
    big.resize(3 + 2000, 0xAA);
    transport(&mut client).inject(&big);
    transport(&mut client).inject(&[0x30, 4, 0, 1, b't', b'y']);

    client.tick(1);
    assert!(client.handler().data.is_empty());
    client.tick(2);
    assert_eq!(
        client.handler().data,
        vec![("t".to_string(), b"y".to_vec())]
    );
}

#[test]
fn test_sync_subscriptions() {
    let mut client = connected_client();
    client.subscribe("old", QoS::AtMostOnce).unwrap();

    let json = r#"{"subscribe_topics":[{"topic":"cmd","qos":1}]}"#;
    let config = PubSubConfig::from_json(json).unwrap();
    client.sync_subscriptions(&config).unwrap();

    assert!(!client.is_subscribed("old"));
    assert_eq!(client.subscriptions().qos("cmd"), Some(QoS::AtLeastOnce));
}

#[test]
fn test_stop_and_delete() {
    let mut client = connected_client();
    client.publish("t", b"x", QoS::AtMostOnce, false).unwrap();

    client.stop();
    assert_eq!(client.state(), ConnectionState::Deleting);
    assert_eq!(client.session().queued_bytes(), 0);
    client.tick(1);
    assert_eq!(client.state(), ConnectionState::Deleting);
    assert!(client.session().connect_info().is_some());

    client.connect();
    assert_eq!(client.state(), ConnectionState::ConnectSent);

    client.delete_client();
    assert!(client.transport().is_none());
    assert_eq!(
        client.publish("t", b"x", QoS::AtMostOnce, false),
        Err(Error::NotInitialized)
    );
}
