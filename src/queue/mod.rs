//! Framed outbound packet queue.
//!
//! Outbound MQTT packets are variable length binary blobs. Rather than prefixing
//! each one with a length, they are byte-stuffed into frames (see [`framing`])
//! and written back to back into one fixed-capacity [`RingBuffer`]. The
//! [`FramedQueue`] wrapper adds the oldest-first eviction policy the connection
//! uses when the buffer is full.
//!
//! # Eviction
//!
//! Eviction does not look inside frames: the oldest queued packet goes first
//! whether it is a PINGREQ, a PUBACK or a QoS 2 PUBLISH. Dropping a queued ack
//! can stall the peer's QoS 1/2 flow until the broker retransmits. Keep the
//! queue sized so eviction only happens under real backpressure.
//!
//! ```rust
//! use mqttlink::queue::FramedQueue;
//!
//! let mut queue: FramedQueue<64> = FramedQueue::new();
//! queue.enqueue(&[0x30, 0x7E, 0x01]).unwrap();
//!
//! let mut out = [0u8; 16];
//! let len = queue.dequeue(&mut out).unwrap();
//! assert_eq!(&out[..len], &[0x30, 0x7E, 0x01]);
//! assert!(queue.is_empty());
//! ```

#![deny(unsafe_code)]

/// Queue error type.
pub mod error;

pub mod framing;

mod ring_buffer;


pub use error::Error;
pub use ring_buffer::RingBuffer;

use log::warn;

/// A FIFO of byte-stuffed frames stored in a `N`-byte ring buffer.
#[derive(Debug, Default)]
pub struct FramedQueue<const N: usize> {
    ring: RingBuffer<N>,
}

impl<const N: usize> FramedQueue<N> {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            ring: RingBuffer::new(),
        }
    }

    /// Append one frame. Fails with [`Error::Full`] without writing anything
    /// if the frame does not fit in the remaining space.
    pub fn enqueue(&mut self, payload: &[u8]) -> Result<(), Error> {
        framing::enqueue(&mut self.ring, payload).map(|_| ())
    }

    /// Append one frame, evicting the oldest frames until it fits.
    ///
    /// Each retry evicts exactly one complete frame. Returns how many frames
    /// were evicted. A frame that could never fit fails up front with
    /// [`Error::FrameTooLarge`] and evicts nothing.
    pub fn enqueue_evicting(&mut self, payload: &[u8]) -> Result<usize, Error> {
        let mut evicted = 0;
        loop {
            match self.enqueue(payload) {
                Ok(()) => return Ok(evicted),
                Err(Error::Full) => {
                    if !self.evict_oldest() {
                        // Only a torn frame can be left here; nothing in it is recoverable.
                        self.ring.clear();
                    }
                    evicted += 1;
                    warn!("outbound queue full, evicted oldest frame ({} so far)", evicted);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Take the oldest frame into `out`. See [`framing::dequeue`].
    pub fn dequeue(&mut self, out: &mut [u8]) -> Result<usize, Error> {
        framing::dequeue(&mut self.ring, out)
    }

    /// Drop the oldest complete frame. Returns `false` if there was none.
    pub fn evict_oldest(&mut self) -> bool {
        framing::discard(&mut self.ring)
    }

    /// `true` when no bytes are queued.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Queued bytes, framing overhead included.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Bytes still free.
    pub fn free(&self) -> usize {
        self.ring.free()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.ring.clear();
    }
}
