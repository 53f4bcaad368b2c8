use base64::{engine::general_purpose::STANDARD as Base64, Engine};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};

use crate::error::MechanismError;

/// Length of an MD5 digest.
pub const MD5_LEN: usize = 16;

/// An MD5 digest.
pub type Md5Hash = [u8; MD5_LEN];

/// Generate a base64 nonce from `len` random bytes.
pub fn generate_nonce(len: usize) -> Result<String, MechanismError> {
    let mut data = vec![0u8; len];
    getrandom::getrandom(&mut data)?;
    Ok(Base64.encode(&data))
}

/// MD5 of the concatenation of `parts`.
pub fn md5(parts: &[&[u8]]) -> Md5Hash {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part);
    }
    let mut ret = [0u8; MD5_LEN];
    ret.copy_from_slice(&hasher.finalize());
    ret
}

/// Lowercase hex MD5 of the concatenation of `parts`.
pub fn md5_hex(parts: &[&[u8]]) -> String {
    hex::encode(md5(parts))
}

/// HMAC-MD5 of the concatenation of `parts` under `key`.
pub fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> Result<Md5Hash, MechanismError> {
    type HmacMd5 = Hmac<Md5>;
    let mut mac = HmacMd5::new_from_slice(key)?;
    for part in parts {
        mac.update(part);
    }
    let mut ret = [0u8; MD5_LEN];
    ret.copy_from_slice(&mac.finalize().into_bytes());
    Ok(ret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_works() {
        // Source: RFC 1321, appendix A.5
        assert_eq!(md5_hex(&[&b""[..]]), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(&[&b"a"[..], &b"bc"[..]]), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn hmac_md5_works() {
        // Source: RFC 2104, test case 2
        let mac = hmac_md5(b"Jefe", &[&b"what do ya want "[..], &b"for nothing?"[..]]).unwrap();
        assert_eq!(hex::encode(mac), "750c783e6ab0b503eaa86e310a5db738");
    }

    #[test]
    fn nonce_has_expected_length() {
        let nonce = generate_nonce(33).unwrap();
        assert_eq!(Base64.decode(&nonce).unwrap().len(), 33);
        assert_ne!(nonce, generate_nonce(33).unwrap());
    }
}
