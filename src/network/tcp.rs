//! Blocking TCP transport over `std::net`.

use super::Transport;
use super::error::Error;
use log::{debug, warn};
use std::io::{Read as _, Write as _};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// A [`Transport`] backed by a [`TcpStream`].
///
/// ```rust,no_run
/// use mqttlink::network::Transport;
/// use mqttlink::network::tcp::TcpTransport;
///
/// let mut tcp = TcpTransport::new();
/// tcp.connect("test.mosquitto.org", 1883, 2500).unwrap();
/// assert!(tcp.is_connected());
/// ```
#[derive(Debug, Default)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// A transport with no open stream.
    pub fn new() -> Self {
        Self { stream: None }
    }

    fn stream(&mut self) -> Result<&mut TcpStream, Error> {
        self.stream.as_mut().ok_or(Error::NotOpen)
    }

    fn read_timeout(timeout_ms: u32) -> Option<Duration> {
        // A zero duration is rejected by set_read_timeout.
        Some(Duration::from_millis(u64::from(timeout_ms.max(1))))
    }
}

impl Transport for TcpTransport {
    type Error = Error;

    fn connect(&mut self, host: &str, port: u16, timeout_ms: u32) -> Result<(), Error> {
        self.disconnect();
        let timeout = Duration::from_millis(u64::from(timeout_ms));
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|_| Error::InvalidAddress)?;

        let mut last = Error::InvalidAddress;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!("tcp connected to {}", addr);
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => {
                    warn!("tcp connect to {} failed: {}", addr, e);
                    last = e.into();
                }
            }
        }
        Err(last)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let result = self.stream()?.write(buf);
        match result {
            Ok(n) => Ok(n),
            Err(e) => {
                self.stream = None;
                Err(match Error::from(e) {
                    Error::ReadError => Error::WriteError,
                    other => other,
                })
            }
        }
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.stream()?.flush().map_err(|_| Error::WriteError)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Error> {
        let stream = self.stream()?;
        stream.set_read_timeout(Self::read_timeout(timeout_ms))?;
        match stream.read(buf) {
            Ok(0) if !buf.is_empty() => {
                self.stream = None;
                Err(Error::ConnectionClosed)
            }
            Ok(n) => Ok(n),
            Err(e) => match Error::from(e) {
                Error::Timeout => Ok(0),
                other => {
                    self.stream = None;
                    Err(other)
                }
            },
        }
    }

    fn available(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        if stream.set_nonblocking(true).is_err() {
            return false;
        }
        let mut probe = [0u8; 1];
        // EOF and hard errors count as readable so the next read reports them.
        let ready = match stream.peek(&mut probe) {
            Ok(_) => true,
            Err(e) => e.kind() != std::io::ErrorKind::WouldBlock,
        };
        let _ = stream.set_nonblocking(false);
        ready
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!("tcp disconnected");
        }
    }
}
