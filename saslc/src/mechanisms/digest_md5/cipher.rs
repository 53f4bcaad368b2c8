//! Confidentiality ciphers (RFC 2831 section 2.4 and rfc2831bis for aes).

use aes::Aes128;
use cbc::cipher::consts::{U16, U5, U7};
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, StreamCipher};
use des::{Des, TdesEde2};
use rc4::Rc4;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::common::{md5, Md5Hash};
use crate::error::MechanismError;

use super::challenge::Cipher;

const AES_IV_MAGIC: &[u8] = b"aes-128";

/// Which way a context runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

enum State {
    DesEncrypt(cbc::Encryptor<Des>),
    DesDecrypt(cbc::Decryptor<Des>),
    TdesEncrypt(cbc::Encryptor<TdesEde2>),
    TdesDecrypt(cbc::Decryptor<TdesEde2>),
    AesEncrypt(cbc::Encryptor<Aes128>),
    AesDecrypt(cbc::Decryptor<Aes128>),
    Rc4(Rc4<U16>),
    Rc4_56(Rc4<U7>),
    Rc4_40(Rc4<U5>),
}

/// A keyed cipher for one direction of a security layer.
///
/// The CBC chaining value and the RC4 keystream carry over from one packet
/// to the next. Key schedules and chaining state are wiped on drop.
pub struct CipherContext {
    block_size: usize,
    state: State,
}

/// Spreads 7 key bytes over the high 7 bits of 8 DES key bytes, the layout
/// cyrus-sasl uses.
fn spread_des_key(key: &[u8]) -> [u8; 8] {
    [
        key[0],
        key[0] << 7 | key[1] >> 1,
        key[1] << 6 | key[2] >> 2,
        key[2] << 5 | key[3] >> 3,
        key[3] << 4 | key[4] >> 4,
        key[4] << 3 | key[5] >> 5,
        key[5] << 2 | key[6] >> 6,
        key[6] << 1,
    ]
}

fn encrypt_blocks<C: BlockEncryptMut>(cipher: &mut C, data: &mut [u8], block_size: usize) {
    for block in data.chunks_exact_mut(block_size) {
        cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

fn decrypt_blocks<C: BlockDecryptMut>(cipher: &mut C, data: &mut [u8], block_size: usize) {
    for block in data.chunks_exact_mut(block_size) {
        cipher.decrypt_block_mut(GenericArray::from_mut_slice(block));
    }
}

impl CipherContext {
    /// Keys `cipher` with a sealing key (Kcc or Kcs).
    pub fn new(
        cipher: Cipher,
        direction: Direction,
        key: &Md5Hash,
    ) -> Result<CipherContext, MechanismError> {
        let encrypt = direction == Direction::Encrypt;
        let (block_size, state) = match cipher {
            Cipher::Des => {
                let deskey = Zeroizing::new(spread_des_key(&key[..7]));
                let iv = &key[8..];
                let state = if encrypt {
                    State::DesEncrypt(cbc::Encryptor::new_from_slices(&deskey[..], iv)?)
                } else {
                    State::DesDecrypt(cbc::Decryptor::new_from_slices(&deskey[..], iv)?)
                };
                (8, state)
            }
            Cipher::TripleDes => {
                let mut deskey = Zeroizing::new([0u8; 16]);
                deskey[..8].copy_from_slice(&spread_des_key(&key[..7]));
                deskey[8..].copy_from_slice(&spread_des_key(&key[7..14]));
                let iv = &key[8..];
                let state = if encrypt {
                    State::TdesEncrypt(cbc::Encryptor::new_from_slices(&deskey[..], iv)?)
                } else {
                    State::TdesDecrypt(cbc::Decryptor::new_from_slices(&deskey[..], iv)?)
                };
                (8, state)
            }
            Cipher::Aes => {
                let iv = md5(&[&key[..], AES_IV_MAGIC]);
                let state = if encrypt {
                    State::AesEncrypt(cbc::Encryptor::new_from_slices(&key[..], &iv)?)
                } else {
                    State::AesDecrypt(cbc::Decryptor::new_from_slices(&key[..], &iv)?)
                };
                (16, state)
            }
            Cipher::Rc4 => (1, State::Rc4(Rc4::new_from_slice(&key[..16])?)),
            Cipher::Rc4_56 => (1, State::Rc4_56(Rc4::new_from_slice(&key[..7])?)),
            Cipher::Rc4_40 => (1, State::Rc4_40(Rc4::new_from_slice(&key[..5])?)),
        };
        Ok(CipherContext { block_size, state })
    }

    /// 1 for stream ciphers.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Encrypts or decrypts `data` in place. For block ciphers the length
    /// must be a multiple of the block size.
    pub fn apply(&mut self, data: &mut [u8]) {
        let bs = self.block_size;
        match &mut self.state {
            State::DesEncrypt(c) => encrypt_blocks(c, data, bs),
            State::DesDecrypt(c) => decrypt_blocks(c, data, bs),
            State::TdesEncrypt(c) => encrypt_blocks(c, data, bs),
            State::TdesDecrypt(c) => decrypt_blocks(c, data, bs),
            State::AesEncrypt(c) => encrypt_blocks(c, data, bs),
            State::AesDecrypt(c) => decrypt_blocks(c, data, bs),
            State::Rc4(c) => c.apply_keystream(data),
            State::Rc4_56(c) => c.apply_keystream(data),
            State::Rc4_40(c) => c.apply_keystream(data),
        }
    }
}

impl ZeroizeOnDrop for CipherContext {}

impl std::fmt::Debug for CipherContext {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("CipherContext")
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}
