//! Byte-stuffing framing over a [`RingBuffer`].
//!
//! A frame is `START`, the payload with every control byte escaped, then `END`.
//! Escaping emits `ESC` followed by the original byte XOR `0x20`, so the three
//! control values never appear unescaped inside a frame. The decoder restarts
//! on any unescaped `START`, which lets a reader resynchronize after a torn or
//! corrupted frame.
//!
//! ```text
//! payload: 01 7E 02
//! framed : 7E 01 7D 5E 02 7F
//! ```

use super::error::Error;
use super::ring_buffer::RingBuffer;

/// Frame start marker.
pub const START: u8 = 0x7E;
/// Frame end marker.
pub const END: u8 = 0x7F;
/// Escape marker.
pub const ESC: u8 = 0x7D;
/// Value XORed into an escaped byte.
pub const ESC_XOR: u8 = 0x20;

#[inline]
fn needs_escape(byte: u8) -> bool {
    matches!(byte, START | END | ESC)
}

/// Number of bytes `payload` occupies once framed.
pub fn framed_len(payload: &[u8]) -> usize {
    payload.len() + payload.iter().filter(|b| needs_escape(**b)).count() + 2
}

/// Frame `payload` into `out`. Returns the number of bytes written.
///
/// Fails with [`Error::BufferTooSmall`] before writing anything if `out`
/// cannot hold the whole frame.
pub fn encode_frame(payload: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    if framed_len(payload) > out.len() {
        return Err(Error::BufferTooSmall);
    }
    let mut pos = 0;
    out[pos] = START;
    pos += 1;
    for &byte in payload {
        if needs_escape(byte) {
            out[pos] = ESC;
            out[pos + 1] = byte ^ ESC_XOR;
            pos += 2;
        } else {
            out[pos] = byte;
            pos += 1;
        }
    }
    out[pos] = END;
    Ok(pos + 1)
}

/// What a single framed byte means to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// A new frame begins; any partial frame must be discarded.
    Start,
    /// A payload byte, already unescaped.
    Byte(u8),
    /// The current frame is complete.
    End,
    /// The byte carries no payload (an escape marker, or noise between frames).
    Skip,
}

/// Streaming byte-at-a-time frame decoder.
///
/// Control bytes always win over a pending escape: `ESC START` starts a new
/// frame rather than producing `START ^ 0x20`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder {
    in_frame: bool,
    escaped: bool,
}

impl FrameDecoder {
    /// A decoder waiting for the first `START`.
    pub const fn new() -> Self {
        Self {
            in_frame: false,
            escaped: false,
        }
    }

    /// Feed one byte.
    pub fn push(&mut self, byte: u8) -> Decoded {
        match byte {
            START => {
                self.in_frame = true;
                self.escaped = false;
                Decoded::Start
            }
            END if self.in_frame => {
                self.in_frame = false;
                self.escaped = false;
                Decoded::End
            }
            _ if !self.in_frame => Decoded::Skip,
            ESC => {
                self.escaped = true;
                Decoded::Skip
            }
            byte if self.escaped => {
                self.escaped = false;
                Decoded::Byte(byte ^ ESC_XOR)
            }
            byte => Decoded::Byte(byte),
        }
    }
}

/// Decode the first complete frame found in `framed` into `out`.
///
/// Returns the payload length. Bytes before the first `START` are ignored.
pub fn decode_frame(framed: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    let mut decoder = FrameDecoder::new();
    let mut collector = Collector::new(out);
    for &byte in framed {
        if let Some(result) = collector.step(decoder.push(byte)) {
            return result;
        }
    }
    Err(Error::Empty)
}

struct Collector<'a> {
    out: &'a mut [u8],
    len: usize,
    overflow: bool,
}

impl<'a> Collector<'a> {
    fn new(out: &'a mut [u8]) -> Self {
        Self {
            out,
            len: 0,
            overflow: false,
        }
    }

    fn step(&mut self, decoded: Decoded) -> Option<Result<usize, Error>> {
        match decoded {
            Decoded::Start => {
                self.len = 0;
                self.overflow = false;
            }
            Decoded::Byte(byte) => match self.out.get_mut(self.len) {
                Some(slot) => {
                    *slot = byte;
                    self.len += 1;
                }
                None => self.overflow = true,
            },
            Decoded::End if self.overflow => return Some(Err(Error::BufferTooSmall)),
            Decoded::End => return Some(Ok(self.len)),
            Decoded::Skip => {}
        }
        None
    }
}

/// Write `payload` into `ring` as one frame.
///
/// All or nothing: the framed length is checked against the free space first,
/// so a failed enqueue leaves no partial frame behind.
pub fn enqueue<const N: usize>(ring: &mut RingBuffer<N>, payload: &[u8]) -> Result<usize, Error> {
    let needed = framed_len(payload);
    if needed > N {
        return Err(Error::FrameTooLarge);
    }
    if needed > ring.free() {
        return Err(Error::Full);
    }
    ring.put(START)?;
    for &byte in payload {
        if needs_escape(byte) {
            ring.put(ESC)?;
            ring.put(byte ^ ESC_XOR)?;
        } else {
            ring.put(byte)?;
        }
    }
    ring.put(END)?;
    Ok(needed)
}

/// Take one complete frame from `ring`, unescaped into `out`.
///
/// Returns [`Error::Empty`] and consumes nothing if the ring does not yet hold
/// a complete frame. A complete frame that does not fit `out` is consumed and
/// reported as [`Error::BufferTooSmall`].
pub fn dequeue<const N: usize>(ring: &mut RingBuffer<N>, out: &mut [u8]) -> Result<usize, Error> {
    let mut decoder = FrameDecoder::new();
    let mut collector = Collector::new(out);
    let mut offset = 0;
    while let Some(byte) = ring.peek(offset) {
        offset += 1;
        if let Some(result) = collector.step(decoder.push(byte)) {
            ring.skip(offset);
            return result;
        }
    }
    Err(Error::Empty)
}

/// Drop the oldest complete frame from `ring`. Returns `false` if there was none.
pub fn discard<const N: usize>(ring: &mut RingBuffer<N>) -> bool {
    let mut decoder = FrameDecoder::new();
    let mut offset = 0;
    while let Some(byte) = ring.peek(offset) {
        offset += 1;
        if decoder.push(byte) == Decoded::End {
            ring.skip(offset);
            return true;
        }
    }
    false
}
