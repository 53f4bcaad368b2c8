//! Integrity and confidentiality packets (RFC 2831 sections 2.3 and 2.4).
//!
//! ```text
//! auth-int:  len ‖ msg ‖ HMAC(Ki, seq ‖ msg)[0..10] ‖ 0x0001 ‖ seq
//! auth-conf: len ‖ CIPHER(Kc, msg ‖ pad ‖ HMAC(Ki, seq ‖ msg)[0..10]) ‖ 0x0001 ‖ seq
//! ```
//!
//! `len` and `seq` are big-endian 32-bit integers; `len` counts everything
//! after itself.

use bytes::{BufMut, BytesMut};
use zeroize::Zeroizing;

use crate::buffer::{Reassembler, Rechunker, PREFIX_LEN};
use crate::common::{hmac_md5, Md5Hash, MD5_LEN};
use crate::error::MechanismError;

use super::cipher::CipherContext;

/// Bytes of the HMAC kept in a packet.
const MAC_LEN: usize = 10;
/// The trailing `0x0001 ‖ seq`.
const TRAILER_LEN: usize = 6;
const VERSION: u16 = 1;

/// Largest payload that fits a packet of `maxbuf` bytes.
///
/// Block ciphers need at least one byte of padding, and the padded payload
/// plus the MAC has to be a multiple of the block size.
pub fn maxpayload(maxbuf: usize, block_size: usize) -> usize {
    if block_size <= 1 {
        return maxbuf.saturating_sub(MD5_LEN);
    }
    if maxbuf < 2 * block_size + TRAILER_LEN {
        return 0;
    }
    let l = (maxbuf - TRAILER_LEN) / block_size * block_size;
    if l <= MAC_LEN + 1 {
        return 0;
    }
    l - MAC_LEN - 1
}

fn padding(cipher: Option<&CipherContext>, len: usize) -> usize {
    match cipher {
        Some(cipher) if cipher.block_size() > 1 => {
            let bs = cipher.block_size();
            bs - (len + MAC_LEN) % bs
        }
        _ => 0,
    }
}

/// `HMAC(key, seq ‖ msg)[0..10] ‖ 0x0001 ‖ seq`
fn packet_trailer(key: &Md5Hash, seqnum: u32, msg: &[u8]) -> Result<Md5Hash, MechanismError> {
    let mut mac = hmac_md5(key, &[&seqnum.to_be_bytes()[..], msg])?;
    mac[MAC_LEN..MAC_LEN + 2].copy_from_slice(&VERSION.to_be_bytes());
    mac[MAC_LEN + 2..].copy_from_slice(&seqnum.to_be_bytes());
    Ok(mac)
}

/// The state of one direction of the security layer.
struct Coder {
    key: Zeroizing<Md5Hash>,
    seqnum: u32,
    cipher: Option<CipherContext>,
}

/// The sending half: cuts outgoing data into payloads and protects them.
pub struct Encoder {
    coder: Coder,
    chunker: Rechunker,
}

impl Encoder {
    /// `key` is Kic or Kcc, `server_maxbuf` the size the server can receive.
    pub fn new(
        key: &Md5Hash,
        cipher: Option<CipherContext>,
        server_maxbuf: usize,
    ) -> Result<Encoder, MechanismError> {
        let block_size = cipher.as_ref().map_or(0, CipherContext::block_size);
        if server_maxbuf < 2 * block_size + TRAILER_LEN {
            return Err(MechanismError::ServerBufferTooSmall);
        }
        Ok(Encoder {
            coder: Coder {
                key: Zeroizing::new(*key),
                seqnum: 0,
                cipher,
            },
            chunker: Rechunker::new(maxpayload(server_maxbuf, block_size)),
        })
    }

    /// Largest payload per packet.
    pub fn capacity(&self) -> usize {
        self.chunker.capacity()
    }

    /// Buffers `input`; returns the consumed byte count and, when a payload
    /// is complete, its packet. Empty input flushes a partial payload.
    pub fn encode(&mut self, input: &[u8]) -> Result<(usize, Vec<u8>), MechanismError> {
        let (consumed, block) = self.chunker.fetch(input);
        match block {
            Some(block) => Ok((consumed, self.coder.seal(&block)?)),
            None => Ok((consumed, Vec::new())),
        }
    }
}

/// The receiving half: reassembles incoming packets and verifies them.
pub struct Decoder {
    coder: Coder,
    reassembler: Reassembler,
}

impl Decoder {
    /// `key` is Kis or Kcs, `maxbuf` the size we told the server we accept.
    pub fn new(key: &Md5Hash, cipher: Option<CipherContext>, maxbuf: usize) -> Decoder {
        Decoder {
            coder: Coder {
                key: Zeroizing::new(*key),
                seqnum: 0,
                cipher,
            },
            reassembler: Reassembler::new(maxbuf),
        }
    }

    /// Buffers `input`; returns the consumed byte count and, when a packet
    /// is complete, its payload.
    pub fn decode(&mut self, input: &[u8]) -> Result<(usize, Vec<u8>), MechanismError> {
        let (consumed, block) = self.reassembler.fetch(input)?;
        match block {
            Some(block) => Ok((consumed, self.coder.open(block)?)),
            None => Ok((consumed, Vec::new())),
        }
    }
}

impl Coder {
    fn seal(&mut self, msg: &[u8]) -> Result<Vec<u8>, MechanismError> {
        let padlen = padding(self.cipher.as_ref(), msg.len());
        let trailer = packet_trailer(&self.key, self.seqnum, msg)?;

        let mut packet = BytesMut::with_capacity(PREFIX_LEN + msg.len() + padlen + MD5_LEN);
        packet.put_u32((msg.len() + padlen + MD5_LEN) as u32);
        packet.put_slice(msg);
        packet.put_bytes(padlen as u8, padlen);
        packet.put_slice(&trailer);
        if let Some(cipher) = &mut self.cipher {
            let end = packet.len() - TRAILER_LEN;
            cipher.apply(&mut packet[PREFIX_LEN..end]);
        }
        self.seqnum = self.seqnum.wrapping_add(1);
        Ok(packet.to_vec())
    }

    fn open(&mut self, mut packet: BytesMut) -> Result<Vec<u8>, MechanismError> {
        let inlen = packet.len();
        let min_padlen = padding(self.cipher.as_ref(), 1);
        if inlen < PREFIX_LEN + 1 + min_padlen + MD5_LEN {
            return Err(MechanismError::ZeroPayloadPacket);
        }
        let len = u32::from_be_bytes([packet[0], packet[1], packet[2], packet[3]]) as usize;
        if len + PREFIX_LEN != inlen {
            return Err(MechanismError::BadPacketLength);
        }

        let mut padlen = 0;
        if let Some(cipher) = &mut self.cipher {
            let bs = cipher.block_size();
            let sealed = len - TRAILER_LEN;
            if sealed % bs != 0 {
                return Err(MechanismError::BadPacketLength);
            }
            cipher.apply(&mut packet[PREFIX_LEN..inlen - TRAILER_LEN]);
            if bs > 1 {
                padlen = packet[inlen - MD5_LEN - 1] as usize;
                if padlen == 0 || padlen > bs || padlen + MD5_LEN > len {
                    return Err(MechanismError::InvalidPadding);
                }
            }
        }

        let msg_end = inlen - padlen - MD5_LEN;
        let expected = packet_trailer(&self.key, self.seqnum, &packet[PREFIX_LEN..msg_end])?;
        if packet[inlen - MD5_LEN..] != expected[..] {
            let got = &packet[inlen - 4..];
            let received = u32::from_be_bytes([got[0], got[1], got[2], got[3]]);
            if received != self.seqnum {
                return Err(MechanismError::BadSequenceNumber);
            }
            return Err(MechanismError::InvalidMac);
        }
        self.seqnum = self.seqnum.wrapping_add(1);
        Ok(packet[PREFIX_LEN..msg_end].to_vec())
    }
}
