use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::common::{md5, Md5Hash};

use super::challenge::Cipher;

const KIC_MAGIC: &[u8] = b"Digest session key to client-to-server signing key magic constant";
const KIS_MAGIC: &[u8] = b"Digest session key to server-to-client signing key magic constant";
const KCC_MAGIC: &[u8] = b"Digest H(A1) to client-to-server sealing key magic constant";
const KCS_MAGIC: &[u8] = b"Digest H(A1) to server-to-client sealing key magic constant";

/// The integrity (`kic`, `kis`) and confidentiality (`kcc`, `kcs`) keys of
/// a session, derived from H(A1) as in RFC 2831 sections 2.3 and 2.4.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct KeySet {
    pub kic: Md5Hash,
    pub kis: Md5Hash,
    pub kcc: Md5Hash,
    pub kcs: Md5Hash,
}

impl KeySet {
    /// Derives the keys; the sealing keys stay zero unless a cipher is given.
    pub fn derive(a1: &Md5Hash, cipher: Option<Cipher>) -> KeySet {
        let mut keys = KeySet::default();
        keys.kic = md5(&[&a1[..], KIC_MAGIC]);
        keys.kis = md5(&[&a1[..], KIS_MAGIC]);
        if let Some(cipher) = cipher {
            let n = cipher.sealing_key_len();
            keys.kcc = md5(&[&a1[..n], KCC_MAGIC]);
            keys.kcs = md5(&[&a1[..n], KCS_MAGIC]);
        }
        keys
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.write_str("KeySet { .. }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealing_keys_depend_on_cipher() {
        let a1 = [0x5au8; 16];
        let int = KeySet::derive(&a1, None);
        assert_eq!(int.kcc, [0; 16]);
        assert_ne!(int.kic, int.kis);

        let rc4 = KeySet::derive(&a1, Some(Cipher::Rc4));
        let rc4_40 = KeySet::derive(&a1, Some(Cipher::Rc4_40));
        assert_eq!(rc4.kic, int.kic);
        assert_eq!(rc4.kcc, md5(&[&a1[..], KCC_MAGIC]));
        assert_eq!(rc4_40.kcc, md5(&[&a1[..5], KCC_MAGIC]));
        assert_ne!(rc4.kcc, rc4_40.kcc);
        assert_ne!(rc4.kcc, rc4.kcs);
    }
}
