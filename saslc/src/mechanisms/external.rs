//! Provides the SASL "EXTERNAL" mechanism.

use crate::error::Error;
use crate::mechanisms::{Mechanism, Step};
use crate::property::{self, Properties};

/// A struct for the SASL EXTERNAL mechanism.
///
/// The credentials come from the transport; only the optional authorization
/// identity is sent.
#[derive(Debug, Default)]
pub struct External;

impl External {
    /// Constructs a new struct for authenticating using the SASL EXTERNAL mechanism.
    pub fn new() -> External {
        External
    }
}

impl Mechanism for External {
    fn name(&self) -> &str {
        "EXTERNAL"
    }

    fn step(&mut self, props: &Properties<'_>, _input: &[u8]) -> Result<Step, Error> {
        let authzid = props.get(property::AUTHZID).unwrap_or_default();
        Ok(Step::Done(authzid.as_bytes().to_vec()))
    }
}
