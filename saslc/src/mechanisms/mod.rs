//! Provides the SASL mechanisms and the trait they implement.

mod anonymous;
mod cram_md5;
#[cfg(feature = "digest-md5")]
pub mod digest_md5;
mod external;
mod plain;

pub use self::anonymous::Anonymous;
pub use self::cram_md5::CramMd5;
#[cfg(feature = "digest-md5")]
#[cfg_attr(docsrs, doc(cfg(feature = "digest-md5")))]
pub use self::digest_md5::DigestMd5;
pub use self::external::External;
pub use self::plain::Plain;

use crate::error::{Error, MechanismError};
use crate::property::Properties;

/// The result of one successful authentication step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Send the output to the server and step again with its reply.
    NeedMoreSteps(Vec<u8>),
    /// Authentication finished; the output (possibly empty) is the last
    /// message for the server.
    Done(Vec<u8>),
}

impl Step {
    /// The data to send to the server.
    pub fn output(&self) -> &[u8] {
        match self {
            Step::NeedMoreSteps(out) | Step::Done(out) => out,
        }
    }

    /// Whether authentication is complete.
    pub fn is_done(&self) -> bool {
        matches!(self, Step::Done(_))
    }
}

/// Quality of protection of a security layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Qop {
    /// Authentication only, no security layer.
    Auth,
    /// Integrity protection.
    AuthInt,
    /// Integrity and confidentiality protection.
    AuthConf,
}

impl Qop {
    /// The wire name of this QOP.
    pub fn name(self) -> &'static str {
        match self {
            Qop::Auth => "auth",
            Qop::AuthInt => "auth-int",
            Qop::AuthConf => "auth-conf",
        }
    }
}

bitflags::bitflags! {
    /// A set of QOP values, as offered by a server or allowed by the user.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QopFlags: u32 {
        const AUTH = 1 << 0;
        const AUTH_INT = 1 << 1;
        const AUTH_CONF = 1 << 2;
    }
}

/// Names of the QOP values, for list parsing.
pub const QOP_NAMES: &[(&str, QopFlags)] = &[
    ("auth", QopFlags::AUTH),
    ("auth-int", QopFlags::AUTH_INT),
    ("auth-conf", QopFlags::AUTH_CONF),
];

/// A trait which defines SASL client mechanisms.
///
/// `step` is called once per server round trip. Once it returned
/// [`Step::Done`], `encode` and `decode` apply the negotiated security layer
/// one block at a time: they return how many input bytes they consumed and
/// the block they produced, which is empty while data is still being
/// buffered.
pub trait Mechanism {
    /// The name of the mechanism.
    fn name(&self) -> &str;

    /// Processes one server message.
    fn step(&mut self, props: &Properties<'_>, input: &[u8]) -> Result<Step, Error>;

    /// The negotiated quality of protection.
    fn qop(&self) -> Qop {
        Qop::Auth
    }

    /// Protects outgoing data.
    fn encode(&mut self, _input: &[u8]) -> Result<(usize, Vec<u8>), Error> {
        Err(MechanismError::NoSecurityLayer.into())
    }

    /// Unprotects incoming data.
    fn decode(&mut self, _input: &[u8]) -> Result<(usize, Vec<u8>), Error> {
        Err(MechanismError::NoSecurityLayer.into())
    }
}

/// The per-session state of whichever mechanism was selected.
pub enum MechanismState {
    /// ANONYMOUS
    Anonymous(Anonymous),
    /// CRAM-MD5
    CramMd5(CramMd5),
    /// DIGEST-MD5
    #[cfg(feature = "digest-md5")]
    DigestMd5(Box<DigestMd5>),
    /// EXTERNAL
    External(External),
    /// PLAIN
    Plain(Plain),
}

impl MechanismState {
    fn inner(&self) -> &dyn Mechanism {
        match self {
            MechanismState::Anonymous(m) => m,
            MechanismState::CramMd5(m) => m,
            #[cfg(feature = "digest-md5")]
            MechanismState::DigestMd5(m) => &**m,
            MechanismState::External(m) => m,
            MechanismState::Plain(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Mechanism {
        match self {
            MechanismState::Anonymous(m) => m,
            MechanismState::CramMd5(m) => m,
            #[cfg(feature = "digest-md5")]
            MechanismState::DigestMd5(m) => &mut **m,
            MechanismState::External(m) => m,
            MechanismState::Plain(m) => m,
        }
    }
}

impl Mechanism for MechanismState {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn step(&mut self, props: &Properties<'_>, input: &[u8]) -> Result<Step, Error> {
        self.inner_mut().step(props, input)
    }

    fn qop(&self) -> Qop {
        self.inner().qop()
    }

    fn encode(&mut self, input: &[u8]) -> Result<(usize, Vec<u8>), Error> {
        self.inner_mut().encode(input)
    }

    fn decode(&mut self, input: &[u8]) -> Result<(usize, Vec<u8>), Error> {
        self.inner_mut().decode(input)
    }
}
