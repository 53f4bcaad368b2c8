//! Provides the SASL "ANONYMOUS" mechanism.

use crate::error::Error;
use crate::mechanisms::{Mechanism, Step};
use crate::property::{self, Properties};

/// A struct for the SASL ANONYMOUS mechanism.
///
/// The `AUTHCID` property, if set, is sent as the RFC 4505 trace string.
#[derive(Debug, Default)]
pub struct Anonymous;

impl Anonymous {
    /// Constructs a new struct for authenticating using the SASL ANONYMOUS mechanism.
    pub fn new() -> Anonymous {
        Anonymous
    }
}

impl Mechanism for Anonymous {
    fn name(&self) -> &str {
        "ANONYMOUS"
    }

    fn step(&mut self, props: &Properties<'_>, _input: &[u8]) -> Result<Step, Error> {
        let trace = props.get(property::AUTHCID).unwrap_or_default();
        Ok(Step::Done(trace.as_bytes().to_vec()))
    }
}
