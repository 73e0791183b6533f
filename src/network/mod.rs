//! Transport abstraction for the MQTT engine.
//!
//! The engine never opens sockets itself. It drives any stream that implements
//! [`Transport`]: a TCP socket, a TLS session, a modem AT-command pipe or a test
//! double. All calls are synchronous and bounded by caller-supplied timeouts.

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Application layer protocols built on [`Transport`]
pub mod application;

/// `std::net` backed transport
#[cfg(feature = "std")]
pub mod tcp;

/// Re-exports of common traits
pub mod prelude {
    pub use super::Transport;
}

/// A blocking, reconnectable byte stream to a remote host.
pub trait Transport {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Open a connection to `host:port`, giving up after `timeout_ms`.
    fn connect(&mut self, host: &str, port: u16, timeout_ms: u32) -> Result<(), Self::Error>;

    /// Write bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;

    /// Flush buffered output.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Read up to `buf.len()` bytes, waiting at most `timeout_ms`.
    /// `Ok(0)` means nothing arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Read a single byte, waiting at most `timeout_ms`.
    fn read_byte(&mut self, timeout_ms: u32) -> Result<Option<u8>, Self::Error> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte, timeout_ms)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// `true` if bytes can be read without blocking.
    fn available(&mut self) -> bool;

    /// `true` while the link is up.
    fn is_connected(&self) -> bool;

    /// Close the link. Safe to call on a closed transport.
    fn disconnect(&mut self);
}
