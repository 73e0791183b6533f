use criterion::{BatchSize, Criterion, Throughput};
use mqttlink::network::Transport;
use mqttlink::network::application::mqtt::{ConnectInfo, LogHandler, MqttConnection, QoS};
use std::collections::VecDeque;

/// A broker stand-in that acknowledges CONNECT and QoS 1 publishes.
#[derive(Default)]
struct Loopback {
    rx: VecDeque<u8>,
    connected: bool,
}

impl Transport for Loopback {
    type Error = ();

    fn connect(&mut self, _host: &str, _port: u16, _timeout_ms: u32) -> Result<(), ()> {
        self.connected = true;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, ()> {
        match buf.first().map(|h| h >> 4) {
            Some(1) => self.rx.extend([0x20, 2, 0, 0]),
            Some(3) if buf[0] & 0x06 == 0x02 => {
                // PUBACK carries the id that follows the topic.
                let topic_len = usize::from(u16::from_be_bytes([buf[2], buf[3]]));
                let id = &buf[4 + topic_len..6 + topic_len];
                self.rx.extend([0x40, 2, id[0], id[1]]);
            }
            _ => {}
        }
        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, ()> {
        let len = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }

    fn available(&mut self) -> bool {
        !self.rx.is_empty()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

type BenchClient = MqttConnection<Loopback, LogHandler>;

fn setup_client(client_id: &str) -> BenchClient {
    let info = ConnectInfo::new("loopback", 1883, client_id).expect("Failed to build info");
    let mut client = BenchClient::default();
    client
        .begin(Loopback::default(), info, None)
        .expect("Failed to begin");
    client.connect();
    client.tick(0);
    assert!(client.is_mqtt_connected());
    client
}

pub fn bench_publish_and_tick_qos0(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_and_tick_qos0");
    let payload = b"hello world from bench";
    group.throughput(Throughput::Bytes(payload.len() as u64 * 50));
    group.bench_function("publish_and_tick_qos0", |b| {
        b.iter_batched_ref(
            || setup_client("mqttlink-bench-qos0"),
            |client| {
                for _ in 0..50 {
                    client
                        .publish("mqttlink/bench-topic", payload, QoS::AtMostOnce, false)
                        .expect("Failed to publish");
                    client.tick(0);
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_publish_and_ack_qos1(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_and_ack_qos1");
    let payload = b"hello world from bench qos1";
    group.throughput(Throughput::Bytes(payload.len() as u64 * 50));
    group.bench_function("publish_and_ack_qos1", |b| {
        b.iter_batched_ref(
            || setup_client("mqttlink-bench-qos1"),
            |client| {
                for _ in 0..50 {
                    client
                        .publish("mqttlink/bench-topic", payload, QoS::AtLeastOnce, false)
                        .expect("Failed to publish");
                    client.tick(0); // send
                    client.tick(0); // PUBACK
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}
