//! Provides the SASL "CRAM-MD5" mechanism (RFC 2195).

use crate::common::hmac_md5;
use crate::error::{Error, MechanismError};
use crate::mechanisms::{Mechanism, Step};
use crate::property::{self, Properties};

/// A struct for the SASL CRAM-MD5 mechanism.
#[derive(Debug, Default)]
pub struct CramMd5;

impl CramMd5 {
    /// Constructs a new struct for authenticating using the SASL CRAM-MD5 mechanism.
    pub fn new() -> CramMd5 {
        CramMd5
    }
}

impl Mechanism for CramMd5 {
    fn name(&self) -> &str {
        "CRAM-MD5"
    }

    fn step(&mut self, props: &Properties<'_>, input: &[u8]) -> Result<Step, Error> {
        if input.is_empty() {
            // Called before the server sent its challenge.
            return Ok(Step::NeedMoreSteps(Vec::new()));
        }
        let authcid = props
            .get(property::AUTHCID)
            .ok_or(MechanismError::AuthcidRequired)?;
        let passwd = props
            .get(property::PASSWD)
            .ok_or(MechanismError::PasswordRequired)?;
        let digest = hmac_md5(passwd.as_bytes(), &[input])?;
        let response = format!("{} {}", authcid, hex::encode(digest));
        Ok(Step::Done(response.into_bytes()))
    }
}
