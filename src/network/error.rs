//! Common error types for network operations

/// A common error type for transport operations.
///
/// [`TcpTransport`](super::tcp::TcpTransport) reports these, and test doubles
/// are encouraged to reuse them. It is designed to be simple and portable for
/// `no_std` environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// A connection attempt was refused.
    ConnectionRefused,
    /// A timeout occurred.
    Timeout,
    /// The connection was closed by the peer.
    ConnectionClosed,
    /// The host could not be resolved or the address is malformed.
    InvalidAddress,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::NotOpen => "connection not open",
            Error::WriteError => "write failed",
            Error::ReadError => "read failed",
            Error::ConnectionRefused => "connection refused",
            Error::Timeout => "timed out",
            Error::ConnectionClosed => "connection closed by peer",
            Error::InvalidAddress => "invalid address",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => Error::Timeout,
            ErrorKind::ConnectionRefused => Error::ConnectionRefused,
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            ErrorKind::NotConnected => Error::NotOpen,
            ErrorKind::InvalidInput | ErrorKind::AddrNotAvailable => Error::InvalidAddress,
            _ => Error::ReadError,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
        }
    }
}
