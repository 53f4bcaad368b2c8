//! Buffering for security layers.
//!
//! Outgoing data is cut into blocks of at most the negotiated payload
//! capacity by [`Rechunker`]; incoming data is reassembled into complete
//! length-prefixed packets by [`Reassembler`]. Both accept input in pieces of
//! any size and report how much of it they consumed.

use bytes::{Buf, BytesMut};

use crate::error::MechanismError;

/// Size of the big-endian length prefix of a packet.
pub const PREFIX_LEN: usize = 4;

/// Accumulates outgoing bytes into fixed-capacity blocks.
#[derive(Debug)]
pub struct Rechunker {
    capacity: usize,
    buf: BytesMut,
}

impl Rechunker {
    /// Creates a re-chunker emitting blocks of at most `capacity` bytes.
    pub fn new(capacity: usize) -> Rechunker {
        Rechunker {
            capacity,
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// The maximum block size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes waiting for a full block.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Takes as much of `input` as fits into the current block.
    ///
    /// Returns the number of bytes consumed and, once the block is full, the
    /// block itself. An empty `input` flushes whatever is pending.
    pub fn fetch(&mut self, input: &[u8]) -> (usize, Option<BytesMut>) {
        if input.is_empty() {
            if self.buf.is_empty() {
                return (0, None);
            }
            return (0, Some(self.buf.split()));
        }
        let n = input.len().min(self.capacity - self.buf.len());
        self.buf.extend_from_slice(&input[..n]);
        if n > 0 && self.buf.len() == self.capacity {
            return (n, Some(self.buf.split()));
        }
        (n, None)
    }
}

/// Reassembles `length ‖ payload` packets from a byte stream.
#[derive(Debug)]
pub struct Reassembler {
    maxbuf: usize,
    buf: BytesMut,
}

impl Reassembler {
    /// Creates a reassembler rejecting packets longer than `maxbuf`.
    pub fn new(maxbuf: usize) -> Reassembler {
        Reassembler {
            maxbuf,
            buf: BytesMut::with_capacity(PREFIX_LEN),
        }
    }

    /// Number of bytes buffered for the current packet.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn declared_len(&self) -> usize {
        (&self.buf[..PREFIX_LEN]).get_u32() as usize
    }

    /// Feeds `input` into the current packet.
    ///
    /// Returns the number of bytes consumed and, once the packet is
    /// complete, the whole packet including its length prefix.
    pub fn fetch(&mut self, input: &[u8]) -> Result<(usize, Option<BytesMut>), MechanismError> {
        let mut consumed = 0;
        if self.buf.len() < PREFIX_LEN {
            let n = input.len().min(PREFIX_LEN - self.buf.len());
            self.buf.extend_from_slice(&input[..n]);
            consumed += n;
            if self.buf.len() < PREFIX_LEN {
                return Ok((consumed, None));
            }
            let len = self.declared_len();
            if len == 0 {
                self.buf.clear();
                return Err(MechanismError::EmptyPacket);
            }
            if len > self.maxbuf {
                self.buf.clear();
                return Err(MechanismError::PacketTooLarge);
            }
            self.buf.reserve(len);
        }

        let total = PREFIX_LEN + self.declared_len();
        let rest = &input[consumed..];
        let n = rest.len().min(total - self.buf.len());
        self.buf.extend_from_slice(&rest[..n]);
        consumed += n;
        if self.buf.len() == total {
            return Ok((consumed, Some(self.buf.split())));
        }
        Ok((consumed, None))
    }
}
