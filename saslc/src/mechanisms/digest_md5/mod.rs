//! Provides the SASL "DIGEST-MD5" mechanism (RFC 2831), including its
//! integrity and confidentiality layers.

mod challenge;
mod cipher;
mod keys;
mod layer;
mod response;

pub use self::challenge::{Challenge, Cipher, CipherFlags, DEFAULT_MAXBUF, MAX_MAXBUF};
pub use self::cipher::{CipherContext, Direction};
pub use self::keys::KeySet;
pub use self::layer::{maxpayload, Decoder, Encoder};

use log::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{Error, MechanismError};
use crate::mechanisms::{Mechanism, Qop, Step};
use crate::property::Properties;

use self::response::ResponseData;

const RSPAUTH_PREFIX: &[u8] = b"rspauth=";

enum State {
    AwaitingChallenge,
    AwaitingRspauth {
        challenge: Challenge,
        response: ResponseData,
        keys: KeySet,
        rspauth: String,
    },
    Authenticated {
        qop: Qop,
        layer: Option<(Encoder, Decoder)>,
    },
    Failed,
}

/// A struct for the SASL DIGEST-MD5 mechanism.
pub struct DigestMd5 {
    state: State,
}

impl Default for DigestMd5 {
    fn default() -> DigestMd5 {
        DigestMd5::new()
    }
}

impl DigestMd5 {
    /// Constructs a new struct for authenticating using the SASL DIGEST-MD5 mechanism.
    pub fn new() -> DigestMd5 {
        DigestMd5 {
            state: State::AwaitingChallenge,
        }
    }

    fn answer_challenge(&mut self, props: &Properties<'_>, input: &[u8]) -> Result<Step, Error> {
        let text = std::str::from_utf8(input)?;
        let challenge = Challenge::parse(text, props.debug())?;
        let response = ResponseData::new(props, &challenge)?;
        let a1 = Zeroizing::new(response.a1(&challenge.nonce));
        let value = response.response_value(&challenge.nonce, &a1, "AUTHENTICATE");
        let rspauth = response.response_value(&challenge.nonce, &a1, "");
        let keys = KeySet::derive(&a1, response.cipher);
        let reply = response.reply(&challenge.nonce, &value);
        if props.debug() {
            debug!("reply: '{}'", String::from_utf8_lossy(&reply));
        }
        self.state = State::AwaitingRspauth {
            challenge,
            response,
            keys,
            rspauth,
        };
        Ok(Step::NeedMoreSteps(reply))
    }

    fn check_rspauth(&mut self, props: &Properties<'_>, input: &[u8]) -> Result<Step, Error> {
        let State::AwaitingRspauth {
            challenge,
            response,
            keys,
            rspauth,
        } = std::mem::replace(&mut self.state, State::Failed)
        else {
            return Err(Error::BadArgument("no challenge was answered"));
        };
        if input.strip_prefix(RSPAUTH_PREFIX) != Some(rspauth.as_bytes()) {
            warn!("rspauth from server does not match");
            return Err(MechanismError::InvalidRspauth.into());
        }

        let layer = match response.qop {
            Qop::Auth => None,
            Qop::AuthInt => Some((
                Encoder::new(&keys.kic, None, challenge.maxbuf)?,
                Decoder::new(&keys.kis, None, response.maxbuf),
            )),
            Qop::AuthConf => {
                let cipher = response.cipher.ok_or(MechanismError::NoAcceptableCipher)?;
                let encrypt = CipherContext::new(cipher, Direction::Encrypt, &keys.kcc)?;
                let decrypt = CipherContext::new(cipher, Direction::Decrypt, &keys.kcs)?;
                Some((
                    Encoder::new(&keys.kic, Some(encrypt), challenge.maxbuf)?,
                    Decoder::new(&keys.kis, Some(decrypt), response.maxbuf),
                ))
            }
        };
        if props.debug() {
            if let Some((encoder, _)) = &layer {
                debug!(
                    "security layer {} established, {} bytes per packet",
                    response.qop.name(),
                    encoder.capacity()
                );
            }
        }
        self.state = State::Authenticated {
            qop: response.qop,
            layer,
        };
        Ok(Step::Done(Vec::new()))
    }

    fn layer(&mut self) -> Result<&mut (Encoder, Decoder), MechanismError> {
        match &mut self.state {
            State::Authenticated {
                layer: Some(layer), ..
            } => Ok(layer),
            _ => Err(MechanismError::NoSecurityLayer),
        }
    }
}

impl Mechanism for DigestMd5 {
    fn name(&self) -> &str {
        "DIGEST-MD5"
    }

    fn step(&mut self, props: &Properties<'_>, input: &[u8]) -> Result<Step, Error> {
        let result = match self.state {
            State::AwaitingChallenge if input.is_empty() => {
                // Called before the server sent its challenge.
                return Ok(Step::NeedMoreSteps(Vec::new()));
            }
            State::AwaitingChallenge => self.answer_challenge(props, input),
            State::AwaitingRspauth { .. } => self.check_rspauth(props, input),
            State::Authenticated { .. } => {
                return Err(Error::BadArgument("authentication already complete"));
            }
            State::Failed => return Err(Error::BadArgument("authentication already failed")),
        };
        if result.is_err() {
            self.state = State::Failed;
        }
        result
    }

    fn qop(&self) -> Qop {
        match &self.state {
            State::AwaitingChallenge | State::Failed => Qop::Auth,
            State::AwaitingRspauth { response, .. } => response.qop,
            State::Authenticated { qop, .. } => *qop,
        }
    }

    fn encode(&mut self, input: &[u8]) -> Result<(usize, Vec<u8>), Error> {
        let (encoder, _) = self.layer()?;
        Ok(encoder.encode(input)?)
    }

    fn decode(&mut self, input: &[u8]) -> Result<(usize, Vec<u8>), Error> {
        let (_, decoder) = self.layer()?;
        Ok(decoder.decode(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{self, PropertyStore};

    const CHALLENGE: &[u8] = br#"realm="elwood.innosoft.com",nonce="OA6MG9tEQGm2hh",qop="auth",algorithm=md5-sess,charset=utf-8"#;

    fn credentials() -> PropertyStore {
        let mut store = PropertyStore::new();
        store.insert(property::AUTHCID, "chris").unwrap();
        store.insert(property::PASSWD, "secret").unwrap();
        store.insert(property::HOSTNAME, "elwood.innosoft.com").unwrap();
        store.insert(property::SERVICE, "imap").unwrap();
        store.insert(property::CNONCE, "OA6MHXh6VqTrRk").unwrap();
        store
    }

    #[test]
    fn rfc2831_exchange() {
        let session = credentials();
        let empty = PropertyStore::new();
        let props = Properties::new(&session, &empty, &empty, false);
        let mut mech = DigestMd5::new();

        assert_eq!(mech.step(&props, b"").unwrap(), Step::NeedMoreSteps(Vec::new()));
        let reply = match mech.step(&props, CHALLENGE).unwrap() {
            Step::NeedMoreSteps(reply) => String::from_utf8(reply).unwrap(),
            Step::Done(_) => panic!("finished too early"),
        };
        assert!(reply.ends_with(",response=d388dad90d4bbd760a152321f2143af7"));

        let step = mech
            .step(&props, b"rspauth=ea40f60335c427b5527b84dbabcdfffd")
            .unwrap();
        assert_eq!(step, Step::Done(Vec::new()));
        assert_eq!(mech.qop(), Qop::Auth);
        assert_eq!(
            mech.encode(b"data"),
            Err(MechanismError::NoSecurityLayer.into())
        );
    }

    #[test]
    fn wrong_rspauth() {
        let session = credentials();
        let empty = PropertyStore::new();
        let props = Properties::new(&session, &empty, &empty, false);
        let mut mech = DigestMd5::new();
        mech.step(&props, CHALLENGE).unwrap();
        assert_eq!(
            mech.step(&props, b"rspauth=00000000000000000000000000000000"),
            Err(MechanismError::InvalidRspauth.into())
        );
    }

    #[test]
    fn failure_is_terminal() {
        let session = credentials();
        let empty = PropertyStore::new();
        let props = Properties::new(&session, &empty, &empty, false);
        let mut mech = DigestMd5::new();
        mech.step(&props, CHALLENGE).unwrap();
        assert!(mech.step(&props, b"rspauth=00").is_err());
        assert_eq!(
            mech.step(&props, CHALLENGE),
            Err(Error::BadArgument("authentication already failed"))
        );
        assert_eq!(
            mech.step(&props, b""),
            Err(Error::BadArgument("authentication already failed"))
        );
        assert_eq!(mech.encode(b"data"), Err(MechanismError::NoSecurityLayer.into()));

        let mut mech = DigestMd5::new();
        assert!(mech.step(&props, b"realm=\"r\"").is_err());
        assert_eq!(
            mech.step(&props, CHALLENGE),
            Err(Error::BadArgument("authentication already failed"))
        );
    }

    #[test]
    fn challenge_must_be_utf8() {
        let session = credentials();
        let empty = PropertyStore::new();
        let props = Properties::new(&session, &empty, &empty, false);
        let err = DigestMd5::new().step(&props, b"nonce=\xff").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseError);
    }

    #[test]
    fn qop_is_known_before_authentication_ends() {
        let session = credentials();
        let empty = PropertyStore::new();
        let props = Properties::new(&session, &empty, &empty, false);
        let mut mech = DigestMd5::new();
        mech.step(
            &props,
            br#"realm="r",nonce="n",qop="auth-int",algorithm=md5-sess"#,
        )
        .unwrap();
        assert_eq!(mech.qop(), Qop::AuthInt);
    }
}
