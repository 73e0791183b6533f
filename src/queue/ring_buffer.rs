//! Fixed-capacity circular byte buffer.

use super::error::Error;

/// A single-producer, single-consumer circular byte buffer of `N` bytes.
///
/// The whole capacity is usable; fullness is tracked with a length counter
/// instead of a sacrificial slot. Bytes come out in the order they went in and
/// unread data is never overwritten: [`put`](Self::put) fails when the buffer
/// is full.
///
/// # Examples
///
/// ```rust
/// use mqttlink::queue::RingBuffer;
///
/// let mut rb: RingBuffer<4> = RingBuffer::new();
/// rb.put(1).unwrap();
/// rb.put(2).unwrap();
///
/// assert_eq!(rb.peek(1), Some(2));
/// assert_eq!(rb.get(), Some(1));
/// assert_eq!(rb.len(), 1);
/// ```
pub struct RingBuffer<const N: usize> {
    buf: [u8; N],
    head: usize,
    len: usize,
}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty ring buffer.
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            head: 0,
            len: 0,
        }
    }

    /// Append one byte at the tail.
    pub fn put(&mut self, byte: u8) -> Result<(), Error> {
        if self.len == N {
            return Err(Error::Full);
        }
        let tail = (self.head + self.len) % N;
        self.buf[tail] = byte;
        self.len += 1;
        Ok(())
    }

    /// Remove and return the byte at the head.
    pub fn get(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let byte = self.buf[self.head];
        self.head = (self.head + 1) % N;
        self.len -= 1;
        Some(byte)
    }

    /// Look at the byte `offset` positions past the head without consuming it.
    pub fn peek(&self, offset: usize) -> Option<u8> {
        if offset >= self.len {
            return None;
        }
        Some(self.buf[(self.head + offset) % N])
    }

    /// Drop up to `count` bytes from the head. Returns how many were dropped.
    pub fn skip(&mut self, count: usize) -> usize {
        let count = count.min(self.len);
        if count > 0 {
            self.head = (self.head + count) % N;
            self.len -= count;
        }
        count
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Total number of bytes the buffer can hold.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of bytes that can still be written.
    pub fn free(&self) -> usize {
        N - self.len
    }

    /// `true` when there is nothing to read.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `true` when no byte can be written.
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Discard all unread bytes.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for RingBuffer<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &N)
            .field("len", &self.len)
            .field("head", &self.head)
            .finish()
    }
}
