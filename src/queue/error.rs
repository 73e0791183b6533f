//! Error type for the framed outbound queue

/// Errors reported by [`RingBuffer`](super::RingBuffer) and the framing layer.
///
/// Like the network errors, this enum is `Copy` and carries no payload so it can
/// travel through `no_std` call stacks without allocation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// There is not enough free space for the whole frame. Nothing was written.
    Full,
    /// The buffer holds no complete frame.
    Empty,
    /// A complete frame was found but it does not fit the caller's buffer.
    /// The frame has been consumed.
    BufferTooSmall,
    /// The frame can never fit, even in an empty queue.
    FrameTooLarge,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::Full => "queue full",
            Error::Empty => "queue empty",
            Error::BufferTooSmall => "output buffer too small for frame",
            Error::FrameTooLarge => "frame larger than queue capacity",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Full => defmt::write!(f, "Full"),
            Error::Empty => defmt::write!(f, "Empty"),
            Error::BufferTooSmall => defmt::write!(f, "BufferTooSmall"),
            Error::FrameTooLarge => defmt::write!(f, "FrameTooLarge"),
        }
    }
}
