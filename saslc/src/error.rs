use std::error::Error as StdError;
use std::fmt;

/// The stable category of an [`Error`], for callers that only care about
/// what went wrong and not about the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller passed something this crate can't work with.
    BadArgument,
    /// A property or key was not found.
    NotFound,
    /// A property key doesn't match `[A-Za-z][A-Za-z0-9_]*`.
    KeyInvalid,
    /// A property value can't be stored.
    ValueInvalid,
    /// A property key is already present.
    KeyExists,
    /// Malformed text or base64 input.
    ParseError,
    /// A protocol, crypto or policy violation inside a mechanism.
    MechanismError,
}

/// A wrapper enum for things that could go wrong in this crate.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// The call isn't valid in the current state, or an argument is malformed.
    BadArgument(&'static str),
    /// The named property doesn't exist.
    NotFound(String),
    /// The named property key is syntactically invalid.
    KeyInvalid(String),
    /// The value for the named property is invalid.
    ValueInvalid(String),
    /// The named property already exists.
    KeyExists(String),
    /// Text or base64 input couldn't be parsed.
    Parse(String),
    /// An error in a SASL mechanism.
    Mechanism(MechanismError),
}

impl Error {
    /// Returns the stable error code for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadArgument(_) => ErrorKind::BadArgument,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::KeyInvalid(_) => ErrorKind::KeyInvalid,
            Error::ValueInvalid(_) => ErrorKind::ValueInvalid,
            Error::KeyExists(_) => ErrorKind::KeyExists,
            Error::Parse(_) => ErrorKind::ParseError,
            Error::Mechanism(_) => ErrorKind::MechanismError,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BadArgument(msg) => write!(fmt, "bad argument: {}", msg),
            Error::NotFound(key) => write!(fmt, "property {} not found", key),
            Error::KeyInvalid(key) => write!(fmt, "invalid property key {:?}", key),
            Error::ValueInvalid(key) => write!(fmt, "invalid value for property {}", key),
            Error::KeyExists(key) => write!(fmt, "property {} already exists", key),
            Error::Parse(msg) => write!(fmt, "parse error: {}", msg),
            Error::Mechanism(err) => write!(fmt, "mechanism error: {}", err),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Mechanism(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MechanismError> for Error {
    fn from(err: MechanismError) -> Error {
        Error::Mechanism(err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Error {
        Error::Parse(format!("invalid base64: {}", err))
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Error {
        Error::Parse(format!("invalid UTF-8: {}", err))
    }
}

/// Everything a mechanism can reject, from policy selection down to a bad
/// MAC on a protected packet.
#[derive(Debug, PartialEq)]
pub enum MechanismError {
    /// None of the requested mechanisms is registered and allowed by the policy.
    MechanismNotSupported,

    AuthcidRequired,
    PasswordRequired,
    HostnameRequired,
    ServiceRequired,

    MalformedDirective,
    MultipleNonce,
    MultipleStale,
    MultipleMaxbuf,
    MultipleCharset,
    MultipleAlgorithm,
    StaleMustBeTrue,
    InvalidCharset,
    InvalidAlgorithm,
    InvalidMaxbuf,
    UnknownQop,
    UnknownCipher,
    NonceRequired,
    AlgorithmRequired,
    RealmConversion,

    NoAcceptableQop,
    NoCipherInChallenge,
    NoAcceptableCipher,
    CannotDetermineRealm,
    CannotChooseRealm,
    InvalidMaxbufProperty,
    MaxbufOutOfRange,
    RandomFailure(getrandom::Error),
    InvalidKeyLength(hmac::digest::InvalidLength),
    InvalidRspauth,
    ServerBufferTooSmall,

    NoSecurityLayer,
    EmptyPacket,
    PacketTooLarge,
    ZeroPayloadPacket,
    BadPacketLength,
    InvalidPadding,
    InvalidMac,
    BadSequenceNumber,
}

impl From<getrandom::Error> for MechanismError {
    fn from(err: getrandom::Error) -> MechanismError {
        MechanismError::RandomFailure(err)
    }
}

impl From<hmac::digest::InvalidLength> for MechanismError {
    fn from(err: hmac::digest::InvalidLength) -> MechanismError {
        MechanismError::InvalidKeyLength(err)
    }
}

impl fmt::Display for MechanismError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{}",
            match self {
                MechanismError::MechanismNotSupported => "no acceptable mechanism found",

                MechanismError::AuthcidRequired => "authcid is required for an authentication",
                MechanismError::PasswordRequired => "password is required for an authentication",
                MechanismError::HostnameRequired => "hostname is required for an authentication",
                MechanismError::ServiceRequired => "service is required for an authentication",

                MechanismError::MalformedDirective => "directive without a value in challenge",
                MechanismError::MultipleNonce => "multiple nonce in challenge",
                MechanismError::MultipleStale => "multiple stale in challenge",
                MechanismError::MultipleMaxbuf => "multiple maxbuf in challenge",
                MechanismError::MultipleCharset => "multiple charset in challenge",
                MechanismError::MultipleAlgorithm => "multiple algorithm in challenge",
                MechanismError::StaleMustBeTrue => "stale must be true",
                MechanismError::InvalidCharset => "charset != \"utf-8\" in challenge",
                MechanismError::InvalidAlgorithm => "algorithm != \"md5-sess\" in challenge",
                MechanismError::InvalidMaxbuf => "invalid maxbuf in challenge",
                MechanismError::UnknownQop => "qop required in challenge",
                MechanismError::UnknownCipher => "unknown cipher",
                MechanismError::NonceRequired => "nonce required in challenge",
                MechanismError::AlgorithmRequired => "algorithm required in challenge",
                MechanismError::RealmConversion =>
                    "unable to convert realms in challenge from \"utf-8\" to iso8859-1",

                MechanismError::NoAcceptableQop => "cannot choose an acceptable qop",
                MechanismError::NoCipherInChallenge => "no cipher spec in challenge",
                MechanismError::NoAcceptableCipher => "qop \"auth-conf\" requires a cipher",
                MechanismError::CannotDetermineRealm => "cannot determine the realm",
                MechanismError::CannotChooseRealm => "cannot choose a realm",
                MechanismError::InvalidMaxbufProperty => "maxbuf property is not a number",
                MechanismError::MaxbufOutOfRange => "maxbuf out of range",
                MechanismError::RandomFailure(err) =>
                    return write!(fmt, "failed to create cnonce: {}", err),
                MechanismError::InvalidKeyLength(err) =>
                    return write!(fmt, "invalid key length: {}", err),
                MechanismError::InvalidRspauth => "failed to validate rspauth response",
                MechanismError::ServerBufferTooSmall => "server buffer too small for packet",

                MechanismError::NoSecurityLayer => "no security layer was negotiated",
                MechanismError::EmptyPacket => "zero length packet",
                MechanismError::PacketTooLarge => "packet exceeds the maximum buffer size",
                MechanismError::ZeroPayloadPacket => "zero payload packet",
                MechanismError::BadPacketLength => "bad packet length",
                MechanismError::InvalidPadding => "invalid padding length after decode",
                MechanismError::InvalidMac => "invalid MAC",
                MechanismError::BadSequenceNumber => "invalid MAC (bad seqnum)",
            }
        )
    }
}

impl StdError for MechanismError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(
            Error::from(MechanismError::InvalidMac).kind(),
            ErrorKind::MechanismError
        );
        assert_eq!(Error::KeyExists("A".to_owned()).kind(), ErrorKind::KeyExists);
        assert_eq!(Error::NotFound("A".to_owned()).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn messages_are_readable() {
        assert_eq!(
            Error::from(MechanismError::BadSequenceNumber).to_string(),
            "mechanism error: invalid MAC (bad seqnum)"
        );
        assert_eq!(
            Error::KeyInvalid("1A".to_owned()).to_string(),
            "invalid property key \"1A\""
        );
    }
}
