use mqttlink::network::Transport;
use mqttlink::network::application::mqtt::{ConnectInfo, Handler, MqttConnection, Session};
use mqttlink::network::error::Error;
use std::collections::VecDeque;

mod live;
mod mqtt;

/// In-memory transport. Bytes pushed into `rx` are what the broker "sent";
/// everything the client writes lands in `tx`.
#[derive(Debug, Default)]
struct MockTransport {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    connected: bool,
    refuse_connect: bool,
    fail_writes: bool,
    connects: usize,
}

impl MockTransport {
    fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }
}

impl Transport for MockTransport {
    type Error = Error;

    fn connect(&mut self, _host: &str, _port: u16, _timeout_ms: u32) -> Result<(), Error> {
        if self.refuse_connect {
            return Err(Error::ConnectionRefused);
        }
        self.connected = true;
        self.connects += 1;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if !self.connected {
            return Err(Error::NotOpen);
        }
        if self.fail_writes {
            return Err(Error::WriteError);
        }
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, Error> {
        if !self.connected {
            return Err(Error::NotOpen);
        }
        let len = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }

    fn available(&mut self) -> bool {
        self.connected && !self.rx.is_empty()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.rx.clear();
    }
}

/// Records every callback.
#[derive(Debug, Default)]
struct Recorder {
    connected: usize,
    disconnected: usize,
    timeouts: usize,
    published: Vec<u16>,
    subscribed: Vec<u16>,
    unsubscribed: Vec<u16>,
    data: Vec<(String, Vec<u8>)>,
}

impl Handler for Recorder {
    fn on_connected(&mut self, _session: &mut Session) {
        self.connected += 1;
    }

    fn on_disconnected(&mut self) {
        self.disconnected += 1;
    }

    fn on_published(&mut self, id: u16) {
        self.published.push(id);
    }

    fn on_subscribed(&mut self, id: u16) {
        self.subscribed.push(id);
    }

    fn on_unsubscribed(&mut self, id: u16) {
        self.unsubscribed.push(id);
    }

    fn on_timeout(&mut self) {
        self.timeouts += 1;
    }

    fn on_data(&mut self, _session: &mut Session, topic: &str, payload: &[u8]) {
        self.data.push((topic.to_string(), payload.to_vec()));
    }
}

type Client = MqttConnection<MockTransport, Recorder>;

fn info() -> ConnectInfo {
    ConnectInfo::new("broker.test", 1883, "dev")
        .unwrap()
        .with_keepalive(60)
}

fn transport(client: &mut Client) -> &mut MockTransport {
    client.transport_mut().expect("transport present")
}

/// A client that has sent CONNECT, received CONNACK and has an empty `tx`.
fn connected_client() -> Client {
    let mut client = Client::default();
    client
        .begin(MockTransport::default(), info(), None)
        .unwrap();
    client.connect();
    transport(&mut client).inject(&[0x20, 0x02, 0x00, 0x00]);
    client.tick(0);
    transport(&mut client).take_written();
    client
}
