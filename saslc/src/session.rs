//! A single authentication exchange and the security layer it negotiates.

use base64::{engine::general_purpose::STANDARD as Base64, Engine};
use log::debug;

use crate::context::Context;
use crate::error::Error;
use crate::mechanisms::{Mechanism, MechanismState, Qop, Step};
use crate::property::{self, parse_bool, Properties, PropertyStore};
use crate::registry::RegisteredMechanism;

/// Where a session is in its exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// More steps are expected.
    Authenticating,
    /// The mechanism finished successfully.
    Authenticated,
    /// A step failed; the session can't be used for anything but ending it.
    Failed,
}

/// One client authentication, created by [`Context::session_init`].
pub struct Session<'a> {
    context: &'a Context,
    entry: &'a RegisteredMechanism,
    mechanism: MechanismState,
    properties: PropertyStore,
    state: AuthState,
    base64_in: bool,
    base64_out: bool,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        context: &'a Context,
        entry: &'a RegisteredMechanism,
    ) -> Result<Session<'a>, Error> {
        context.session_started();
        let mut session = Session {
            context,
            entry,
            mechanism: entry.descriptor.create(),
            properties: PropertyStore::new(),
            state: AuthState::Authenticating,
            base64_in: false,
            base64_out: false,
        };
        let base64io = session.properties().get(property::BASE64IO).map(parse_bool);
        if let Some(value) = base64io {
            let enabled = value.ok_or(Error::BadArgument("invalid BASE64IO value"))?;
            session.set_base64_io(enabled, enabled);
        }
        Ok(session)
    }

    fn properties(&self) -> Properties<'_> {
        Properties::new(
            &self.properties,
            self.context.properties(),
            &self.entry.properties,
            self.context.debug(),
        )
    }

    /// The name of the selected mechanism.
    pub fn mechanism_name(&self) -> &'static str {
        self.entry.descriptor.name
    }

    /// The negotiated quality of protection.
    pub fn qop(&self) -> Qop {
        self.mechanism.qop()
    }

    /// The current authentication state.
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Looks `key` up in the session, then the context, then the
    /// mechanism's defaults.
    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.properties().get(key)
    }

    /// Sets or replaces a session property.
    pub fn set_property(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.properties.set(key, value)
    }

    /// Chooses whether step input is base64-decoded and step output
    /// base64-encoded.
    pub fn set_base64_io(&mut self, input: bool, output: bool) {
        self.base64_in = input;
        self.base64_out = output;
    }

    /// Feeds the next server message to the mechanism.
    pub fn step(&mut self, input: &[u8]) -> Result<Step, Error> {
        match self.state {
            AuthState::Authenticating => (),
            AuthState::Authenticated => {
                return Err(Error::BadArgument("authentication already complete"));
            }
            AuthState::Failed => return Err(Error::BadArgument("authentication already failed")),
        }
        match self.run_step(input) {
            Ok(step) => {
                if step.is_done() {
                    self.state = AuthState::Authenticated;
                }
                Ok(step)
            }
            Err(err) => {
                self.state = AuthState::Failed;
                Err(err)
            }
        }
    }

    fn run_step(&mut self, input: &[u8]) -> Result<Step, Error> {
        let decoded;
        let input = if self.base64_in {
            decoded = Base64.decode(input)?;
            &decoded[..]
        } else {
            input
        };

        let props = Properties::new(
            &self.properties,
            self.context.properties(),
            &self.entry.properties,
            self.context.debug(),
        );
        let step = self.mechanism.step(&props, input)?;
        if props.debug() {
            debug!(
                "{} step: {} bytes in, {} bytes out, done: {}",
                self.mechanism_name(),
                input.len(),
                step.output().len(),
                step.is_done()
            );
        }

        if !self.base64_out || step.output().is_empty() {
            return Ok(step);
        }
        Ok(match step {
            Step::NeedMoreSteps(out) => Step::NeedMoreSteps(Base64.encode(out).into_bytes()),
            Step::Done(out) => Step::Done(Base64.encode(out).into_bytes()),
        })
    }

    fn check_authenticated(&self) -> Result<(), Error> {
        if self.state != AuthState::Authenticated {
            return Err(Error::BadArgument("session is not authenticated"));
        }
        Ok(())
    }

    /// Protects outgoing data with the negotiated security layer.
    ///
    /// Data that doesn't fill a whole packet is kept until more arrives or
    /// until this is called with an empty `input`, which flushes it.
    pub fn encode(&mut self, input: &[u8]) -> Result<Vec<u8>, Error> {
        self.check_authenticated()?;
        if self.qop() == Qop::Auth {
            return Ok(input.to_vec());
        }
        let mechanism = &mut self.mechanism;
        run_codec(input, |rest| mechanism.encode(rest))
    }

    /// Verifies and unwraps incoming packets. Partial packets are buffered
    /// until the rest arrives.
    pub fn decode(&mut self, input: &[u8]) -> Result<Vec<u8>, Error> {
        self.check_authenticated()?;
        if self.qop() == Qop::Auth {
            return Ok(input.to_vec());
        }
        let mechanism = &mut self.mechanism;
        run_codec(input, |rest| mechanism.decode(rest))
    }

    /// Ends the session.
    pub fn end(self) {}
}

/// Drives a block codec until `input` is used up or it stops making
/// progress, concatenating every block it produces.
fn run_codec<F>(input: &[u8], mut codec: F) -> Result<Vec<u8>, Error>
where
    F: FnMut(&[u8]) -> Result<(usize, Vec<u8>), Error>,
{
    let mut output = Vec::new();
    let mut rest = input;
    loop {
        let (consumed, block) = codec(rest)?;
        rest = &rest[consumed..];
        if consumed == 0 && block.is_empty() {
            break;
        }
        output.extend_from_slice(&block);
        if rest.is_empty() {
            break;
        }
    }
    Ok(output)
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.context.session_ended();
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("Session")
            .field("mechanism", &self.mechanism_name())
            .field("state", &self.state)
            .field("base64_in", &self.base64_in)
            .field("base64_out", &self.base64_out)
            .finish_non_exhaustive()
    }
}
