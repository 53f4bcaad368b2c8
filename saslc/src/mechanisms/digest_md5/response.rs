//! The client's `digest-response` (RFC 2831 section 2.1.2).

use log::debug;
use zeroize::Zeroizing;

use crate::common::{generate_nonce, md5, md5_hex, Md5Hash};
use crate::error::MechanismError;
use crate::list::{choose_from_hqlist, list_flags, parse_list, unescape};
use crate::mechanisms::{Qop, QopFlags, QOP_NAMES};
use crate::property::{self, Properties};

use super::challenge::{
    invalid_maxbuf, to_latin1, Challenge, Cipher, CipherFlags, CIPHER_NAMES,
};

/// Random bytes in a generated cnonce, as cyrus-sasl does.
const CNONCE_LEN: usize = 33;

const COLON: &[u8] = b":";

/// Picks the strongest QOP offered by the server and allowed by `QOPMASK`.
pub fn choose_qop(props: &Properties<'_>, offered: QopFlags) -> Result<Qop, MechanismError> {
    if offered.is_empty() {
        // The qop directive is optional and defaults to auth.
        return Ok(Qop::Auth);
    }
    let mut flags = offered;
    if let Some(mask) = props.get(property::QOPMASK) {
        flags &= list_flags(&parse_list(mask), QOP_NAMES);
    }
    if flags.contains(QopFlags::AUTH_CONF) {
        Ok(Qop::AuthConf)
    } else if flags.contains(QopFlags::AUTH_INT) {
        Ok(Qop::AuthInt)
    } else if flags.contains(QopFlags::AUTH) {
        Ok(Qop::Auth)
    } else {
        Err(MechanismError::NoAcceptableQop)
    }
}

/// Picks the strongest cipher offered by the server and allowed by
/// `CIPHERMASK`.
pub fn choose_cipher(
    props: &Properties<'_>,
    offered: CipherFlags,
) -> Result<Cipher, MechanismError> {
    if offered.is_empty() {
        return Err(MechanismError::NoCipherInChallenge);
    }
    let mask = match props.get(property::CIPHERMASK) {
        Some(mask) => list_flags(&parse_list(mask), CIPHER_NAMES),
        None => CipherFlags::all(),
    };
    Cipher::best_of(offered & mask).ok_or(MechanismError::NoAcceptableCipher)
}

/// Picks the realm, preferring the user's `REALM` choice when the server
/// offers it. With `latin1` set the offered realms are ISO-8859-1 and the
/// user's choice is converted before comparing.
pub fn choose_realm(
    props: &Properties<'_>,
    hostname: &str,
    offered: &[Vec<u8>],
    latin1: bool,
) -> Result<Vec<u8>, MechanismError> {
    let user_realms = props.get(property::REALM);
    let Some(first) = offered.first() else {
        let user_realms = user_realms.ok_or(MechanismError::CannotDetermineRealm)?;
        return choose_from_hqlist(user_realms, Some(hostname))
            .map(String::into_bytes)
            .ok_or(MechanismError::CannotChooseRealm);
    };
    let choice = user_realms
        .and_then(|list| choose_from_hqlist(list, Some(hostname)))
        .and_then(|choice| {
            if latin1 {
                to_latin1(&choice)
            } else {
                Some(choice.into_bytes())
            }
        });
    if let Some(choice) = choice {
        if offered.iter().any(|realm| realm.eq_ignore_ascii_case(&choice)) {
            return Ok(choice);
        }
    }
    Ok(first.clone())
}

/// Builds `serv-type "/" host [ "/" serv-name ]`.
pub fn digest_uri(props: &Properties<'_>, hostname: &str) -> Result<String, MechanismError> {
    let service = props
        .get(property::SERVICE)
        .ok_or(MechanismError::ServiceRequired)?;
    let servname = props
        .get(property::SERVNAME)
        .and_then(|list| choose_from_hqlist(list, Some(hostname)));
    Ok(match servname {
        Some(servname) if servname != hostname => {
            format!("{}/{}/{}", service, hostname, servname)
        }
        _ => format!("{}/{}", service, hostname),
    })
}

/// Everything the client decided while answering a challenge.
pub struct ResponseData {
    pub qop: Qop,
    /// Only set for auth-conf.
    pub cipher: Option<Cipher>,
    pub realm: Vec<u8>,
    pub authcid: String,
    pub authzid: Option<String>,
    passwd: Zeroizing<String>,
    pub cnonce: String,
    pub digest_uri: String,
    pub nonce_count: u32,
    /// Our receive buffer size; zero for plain auth.
    pub maxbuf: usize,
}

impl ResponseData {
    /// Chooses the response parameters for `challenge`.
    pub fn new(
        props: &Properties<'_>,
        challenge: &Challenge,
    ) -> Result<ResponseData, MechanismError> {
        let trace = props.debug();
        let qop = choose_qop(props, challenge.qop)?;
        let cipher = match qop {
            Qop::AuthConf => Some(choose_cipher(props, challenge.ciphers)?),
            _ => None,
        };
        let hostname = props
            .get(property::HOSTNAME)
            .ok_or(MechanismError::HostnameRequired)?;
        let realm = choose_realm(props, hostname, &challenge.realms, challenge.utf8)?;
        let digest_uri = digest_uri(props, hostname)?;
        let authcid = props
            .get(property::AUTHCID)
            .ok_or(MechanismError::AuthcidRequired)?;
        let authzid = props.get(property::AUTHZID);
        let passwd = props
            .get(property::PASSWD)
            .ok_or(MechanismError::PasswordRequired)?;
        let cnonce = match props.get(property::CNONCE) {
            Some(cnonce) => cnonce.to_owned(),
            None => generate_nonce(CNONCE_LEN)?,
        };

        let maxbuf = if qop == Qop::Auth {
            0
        } else {
            let maxbuf = match props.get(property::MAXBUF) {
                Some(value) => value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| MechanismError::InvalidMaxbufProperty)?,
                None => 0,
            };
            let maxbuf = if maxbuf == 0 { challenge.maxbuf } else { maxbuf };
            if invalid_maxbuf(maxbuf) {
                return Err(MechanismError::MaxbufOutOfRange);
            }
            maxbuf
        };

        if trace {
            debug!(
                "qop={} cipher={} realm='{}' digest-uri='{}' maxbuf={}",
                qop.name(),
                cipher.map_or("none", Cipher::name),
                String::from_utf8_lossy(&realm),
                digest_uri,
                maxbuf
            );
        }
        Ok(ResponseData {
            qop,
            cipher,
            realm,
            authcid: authcid.to_owned(),
            authzid: authzid.map(str::to_owned),
            passwd: Zeroizing::new(passwd.to_owned()),
            cnonce,
            digest_uri,
            nonce_count: 1,
            maxbuf,
        })
    }

    fn nc(&self) -> String {
        format!("{:08x}", self.nonce_count)
    }

    /// H(A1), the session key.
    pub fn a1(&self, nonce: &str) -> Md5Hash {
        let username = unescape(self.authcid.as_bytes());
        let realm = unescape(&self.realm);
        let userhash = Zeroizing::new(md5(&[
            &username[..],
            COLON,
            &realm[..],
            COLON,
            self.passwd.as_bytes(),
        ]));
        let mut parts: Vec<&[u8]> = vec![
            &userhash[..],
            COLON,
            nonce.as_bytes(),
            COLON,
            self.cnonce.as_bytes(),
        ];
        let authzid = self.authzid.as_deref().map(|authzid| unescape(authzid.as_bytes()));
        if let Some(authzid) = &authzid {
            parts.push(COLON);
            parts.push(authzid);
        }
        md5(&parts)
    }

    /// HEX(H(A2)); `method` is `AUTHENTICATE` for the response and empty
    /// for the server's rspauth.
    fn a2_hex(&self, method: &str) -> String {
        let mut parts: Vec<&[u8]> = vec![method.as_bytes(), COLON, self.digest_uri.as_bytes()];
        if self.qop != Qop::Auth {
            parts.push(&b":00000000000000000000000000000000"[..]);
        }
        md5_hex(&parts)
    }

    /// The `response-value` for `method`.
    pub fn response_value(&self, nonce: &str, a1: &Md5Hash, method: &str) -> String {
        let a1_hex = hex::encode(a1);
        let nc = self.nc();
        let a2_hex = self.a2_hex(method);
        md5_hex(&[
            a1_hex.as_bytes(),
            COLON,
            nonce.as_bytes(),
            COLON,
            nc.as_bytes(),
            COLON,
            self.cnonce.as_bytes(),
            COLON,
            self.qop.name().as_bytes(),
            COLON,
            a2_hex.as_bytes(),
        ])
    }

    /// The full `digest-response` text.
    pub fn reply(&self, nonce: &str, response: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"username=\"");
        out.extend_from_slice(self.authcid.as_bytes());
        out.extend_from_slice(b"\",realm=\"");
        out.extend_from_slice(&self.realm);
        out.extend_from_slice(b"\",");
        let mut rest = format!(
            "nonce=\"{}\",cnonce=\"{}\",nc={},qop={},",
            nonce,
            self.cnonce,
            self.nc(),
            self.qop.name()
        );
        if let Some(cipher) = self.cipher {
            rest.push_str(&format!("cipher=\"{}\",", cipher.name()));
        }
        if self.qop != Qop::Auth {
            rest.push_str(&format!("maxbuf={},", self.maxbuf));
        }
        rest.push_str(&format!(
            "digest-uri=\"{}\",response={}",
            self.digest_uri, response
        ));
        out.extend_from_slice(rest.as_bytes());
        out
    }
}
