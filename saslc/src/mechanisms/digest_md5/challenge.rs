//! The server's `digest-challenge` (RFC 2831 section 2.1.1).

use log::debug;

use crate::error::MechanismError;
use crate::list::{list_flags, parse_list, strip_quotes};
use crate::mechanisms::{QopFlags, QOP_NAMES};

/// Default server receive buffer size.
pub const DEFAULT_MAXBUF: usize = 0x10000;
/// Largest maxbuf allowed on the wire, 2^24 - 1.
pub const MAX_MAXBUF: usize = 0xff_ffff;

/// Whether `maxbuf` is outside the allowed `(16, 16777215]` range.
pub fn invalid_maxbuf(maxbuf: usize) -> bool {
    maxbuf <= 16 || maxbuf > MAX_MAXBUF
}

bitflags::bitflags! {
    /// A set of confidentiality ciphers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CipherFlags: u32 {
        const DES = 1 << 0;
        const TDES = 1 << 1;
        const RC4 = 1 << 2;
        const RC4_40 = 1 << 3;
        const RC4_56 = 1 << 4;
        const AES = 1 << 5;
    }
}

/// A confidentiality cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cipher {
    Des,
    TripleDes,
    Rc4,
    Rc4_40,
    Rc4_56,
    Aes,
}

/// Ciphers by preference, strongest first.
const PREFERENCE: [Cipher; 6] = [
    Cipher::Aes,
    Cipher::TripleDes,
    Cipher::Des,
    Cipher::Rc4,
    Cipher::Rc4_56,
    Cipher::Rc4_40,
];

impl Cipher {
    /// The wire name of this cipher.
    pub fn name(self) -> &'static str {
        match self {
            Cipher::Des => "des",
            Cipher::TripleDes => "3des",
            Cipher::Rc4 => "rc4",
            Cipher::Rc4_40 => "rc4-40",
            Cipher::Rc4_56 => "rc4-56",
            Cipher::Aes => "aes",
        }
    }

    fn flag(self) -> CipherFlags {
        match self {
            Cipher::Des => CipherFlags::DES,
            Cipher::TripleDes => CipherFlags::TDES,
            Cipher::Rc4 => CipherFlags::RC4,
            Cipher::Rc4_40 => CipherFlags::RC4_40,
            Cipher::Rc4_56 => CipherFlags::RC4_56,
            Cipher::Aes => CipherFlags::AES,
        }
    }

    /// The strongest cipher in `flags`.
    pub fn best_of(flags: CipherFlags) -> Option<Cipher> {
        PREFERENCE.into_iter().find(|c| flags.contains(c.flag()))
    }

    /// How many bytes of H(A1) go into the sealing keys.
    pub fn sealing_key_len(self) -> usize {
        match self {
            Cipher::Rc4_40 => 5,
            Cipher::Rc4_56 => 7,
            _ => 16,
        }
    }
}

/// Names of the ciphers, for list parsing.
pub const CIPHER_NAMES: &[(&str, CipherFlags)] = &[
    ("des", CipherFlags::DES),
    ("3des", CipherFlags::TDES),
    ("rc4", CipherFlags::RC4),
    ("rc4-40", CipherFlags::RC4_40),
    ("rc4-56", CipherFlags::RC4_56),
    ("aes", CipherFlags::AES),
];

/// A parsed challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Offered realms, as ISO-8859-1 bytes if `utf8` is set and as received
    /// otherwise. Escapes are kept.
    pub realms: Vec<Vec<u8>>,
    pub nonce: String,
    /// Empty if the server sent no `qop` directive.
    pub qop: QopFlags,
    pub ciphers: CipherFlags,
    pub stale: bool,
    pub maxbuf: usize,
    pub utf8: bool,
}

/// Converts a string to ISO-8859-1, failing on any character above U+00FF.
pub(super) fn to_latin1(value: &str) -> Option<Vec<u8>> {
    value.chars().map(|c| u8::try_from(c).ok()).collect()
}

impl Challenge {
    /// Parses the text of a challenge.
    pub fn parse(text: &str, trace: bool) -> Result<Challenge, MechanismError> {
        if trace {
            debug!("challenge: '{}'", text);
        }
        let mut realms = Vec::new();
        let mut nonce = None;
        let mut qop = QopFlags::empty();
        let mut ciphers = CipherFlags::empty();
        let mut stale = false;
        let mut maxbuf = None;
        let mut utf8 = false;
        let mut algorithm = false;

        for directive in parse_list(text) {
            let (key, value) = directive
                .split_once('=')
                .ok_or(MechanismError::MalformedDirective)?;
            let key = key.trim_end();
            let value = strip_quotes(value.trim_start());

            if key.eq_ignore_ascii_case("realm") {
                realms.push(value.to_owned());
            } else if key.eq_ignore_ascii_case("nonce") {
                if nonce.is_some() {
                    return Err(MechanismError::MultipleNonce);
                }
                nonce = Some(value.to_owned());
            } else if key.eq_ignore_ascii_case("qop") {
                let flags = list_flags(&parse_list(value), QOP_NAMES);
                if flags.is_empty() {
                    return Err(MechanismError::UnknownQop);
                }
                qop |= flags;
            } else if key.eq_ignore_ascii_case("stale") {
                if stale {
                    return Err(MechanismError::MultipleStale);
                }
                if !value.eq_ignore_ascii_case("true") {
                    return Err(MechanismError::StaleMustBeTrue);
                }
                stale = true;
            } else if key.eq_ignore_ascii_case("maxbuf") {
                if maxbuf.is_some() {
                    return Err(MechanismError::MultipleMaxbuf);
                }
                let value = value
                    .parse::<usize>()
                    .map_err(|_| MechanismError::InvalidMaxbuf)?;
                if invalid_maxbuf(value) {
                    return Err(MechanismError::InvalidMaxbuf);
                }
                maxbuf = Some(value);
            } else if key.eq_ignore_ascii_case("charset") {
                if utf8 {
                    return Err(MechanismError::MultipleCharset);
                }
                if !value.eq_ignore_ascii_case("utf-8") {
                    return Err(MechanismError::InvalidCharset);
                }
                utf8 = true;
            } else if key.eq_ignore_ascii_case("algorithm") {
                if algorithm {
                    return Err(MechanismError::MultipleAlgorithm);
                }
                if !value.eq_ignore_ascii_case("md5-sess") {
                    return Err(MechanismError::InvalidAlgorithm);
                }
                algorithm = true;
            } else if key.eq_ignore_ascii_case("cipher") {
                let flags = list_flags(&parse_list(value), CIPHER_NAMES);
                if flags.is_empty() {
                    return Err(MechanismError::UnknownCipher);
                }
                ciphers |= flags;
            } else if trace {
                debug!("ignoring directive '{}'", key);
            }
        }

        let realms = if utf8 {
            realms
                .iter()
                .map(|realm| to_latin1(realm))
                .collect::<Option<Vec<_>>>()
                .ok_or(MechanismError::RealmConversion)?
        } else {
            realms.into_iter().map(String::into_bytes).collect()
        };
        let nonce = nonce.ok_or(MechanismError::NonceRequired)?;
        if !algorithm {
            return Err(MechanismError::AlgorithmRequired);
        }
        let maxbuf = maxbuf.unwrap_or(DEFAULT_MAXBUF);

        if trace {
            debug!("qop_flags={:?} cipher_flags={:?}", qop, ciphers);
        }
        Ok(Challenge {
            realms,
            nonce,
            qop,
            ciphers,
            stale,
            maxbuf,
            utf8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC2831: &str = r#"realm="elwood.innosoft.com",nonce="OA6MG9tEQGm2hh",qop="auth",algorithm=md5-sess,charset=utf-8"#;

    #[test]
    fn rfc_example() {
        let challenge = Challenge::parse(RFC2831, false).unwrap();
        assert_eq!(challenge.realms, [b"elwood.innosoft.com".to_vec()]);
        assert_eq!(challenge.nonce, "OA6MG9tEQGm2hh");
        assert_eq!(challenge.qop, QopFlags::AUTH);
        assert_eq!(challenge.ciphers, CipherFlags::empty());
        assert!(!challenge.stale);
        assert_eq!(challenge.maxbuf, DEFAULT_MAXBUF);
        assert!(challenge.utf8);
    }

    #[test]
    fn full_challenge() {
        let text = r#"realm="a",REALM="b",nonce="n",qop="auth,auth-int,auth-conf,x-token",cipher="rc4-40,rc4-56,rc4,des,3des,aes",maxbuf=4096,stale=true,algorithm=md5-sess,x-ext="whatever""#;
        let challenge = Challenge::parse(text, false).unwrap();
        assert_eq!(challenge.realms, [b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(challenge.qop, QopFlags::all());
        assert_eq!(challenge.ciphers, CipherFlags::all());
        assert_eq!(challenge.maxbuf, 4096);
        assert!(challenge.stale);
        assert!(!challenge.utf8);
    }

    #[test]
    fn quoted_commas_and_escapes() {
        let text = r#"realm="a\"b,c",nonce="x,y",algorithm="md5-sess""#;
        let challenge = Challenge::parse(text, false).unwrap();
        assert_eq!(challenge.realms, [br#"a\"b,c"#.to_vec()]);
        assert_eq!(challenge.nonce, "x,y");
    }

    #[test]
    fn duplicates_are_rejected() {
        let cases = [
            ("nonce=a,nonce=b,algorithm=md5-sess", MechanismError::MultipleNonce),
            ("nonce=a,stale=true,stale=true,algorithm=md5-sess", MechanismError::MultipleStale),
            ("nonce=a,maxbuf=100,maxbuf=100,algorithm=md5-sess", MechanismError::MultipleMaxbuf),
            ("nonce=a,charset=utf-8,charset=utf-8,algorithm=md5-sess", MechanismError::MultipleCharset),
            ("nonce=a,algorithm=md5-sess,algorithm=md5-sess", MechanismError::MultipleAlgorithm),
        ];
        for (text, err) in cases {
            assert_eq!(Challenge::parse(text, false), Err(err), "{}", text);
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            ("nonce=a,stale=false,algorithm=md5-sess", MechanismError::StaleMustBeTrue),
            ("nonce=a,charset=latin1,algorithm=md5-sess", MechanismError::InvalidCharset),
            ("nonce=a,algorithm=md5", MechanismError::InvalidAlgorithm),
            ("nonce=a,qop=\"x,y\",algorithm=md5-sess", MechanismError::UnknownQop),
            ("nonce=a,cipher=\"idea\",algorithm=md5-sess", MechanismError::UnknownCipher),
            ("algorithm=md5-sess", MechanismError::NonceRequired),
            ("nonce=a", MechanismError::AlgorithmRequired),
            ("nonce=a,bogus,algorithm=md5-sess", MechanismError::MalformedDirective),
            ("nonce=a,maxbuf=lots,algorithm=md5-sess", MechanismError::InvalidMaxbuf),
        ];
        for (text, err) in cases {
            assert_eq!(Challenge::parse(text, false), Err(err), "{}", text);
        }
    }

    #[test]
    fn maxbuf_bounds() {
        let parse = |maxbuf: usize| {
            Challenge::parse(&format!("nonce=a,algorithm=md5-sess,maxbuf={}", maxbuf), false)
        };
        assert_eq!(parse(16), Err(MechanismError::InvalidMaxbuf));
        assert_eq!(parse(17).unwrap().maxbuf, 17);
        assert_eq!(parse(16777215).unwrap().maxbuf, 16777215);
        assert_eq!(parse(16777216), Err(MechanismError::InvalidMaxbuf));
    }

    #[test]
    fn utf8_realms_become_latin1() {
        let text = "realm=\"caf\u{e9}\",nonce=a,algorithm=md5-sess,charset=utf-8";
        let challenge = Challenge::parse(text, false).unwrap();
        assert_eq!(challenge.realms, [b"caf\xe9".to_vec()]);

        let text = "realm=\"\u{20ac}\",nonce=a,algorithm=md5-sess,charset=utf-8";
        assert_eq!(
            Challenge::parse(text, false),
            Err(MechanismError::RealmConversion)
        );

        // Without charset the realm is used as received.
        let text = "realm=\"\u{20ac}\",nonce=a,algorithm=md5-sess";
        let challenge = Challenge::parse(text, false).unwrap();
        assert_eq!(challenge.realms, ["\u{20ac}".as_bytes().to_vec()]);
    }

    #[test]
    fn cipher_preference() {
        assert_eq!(Cipher::best_of(CipherFlags::all()), Some(Cipher::Aes));
        assert_eq!(
            Cipher::best_of(CipherFlags::DES | CipherFlags::RC4),
            Some(Cipher::Des)
        );
        assert_eq!(
            Cipher::best_of(CipherFlags::RC4_40 | CipherFlags::RC4_56),
            Some(Cipher::Rc4_56)
        );
        assert_eq!(Cipher::best_of(CipherFlags::empty()), None);
    }
}
