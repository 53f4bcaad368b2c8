//! Provides the SASL "PLAIN" mechanism.

use crate::error::{Error, MechanismError};
use crate::mechanisms::{Mechanism, Step};
use crate::property::{self, Properties};

/// A struct for the SASL PLAIN mechanism.
#[derive(Debug, Default)]
pub struct Plain;

impl Plain {
    /// Constructs a new struct for authenticating using the SASL PLAIN mechanism.
    pub fn new() -> Plain {
        Plain
    }
}

impl Mechanism for Plain {
    fn name(&self) -> &str {
        "PLAIN"
    }

    fn step(&mut self, props: &Properties<'_>, _input: &[u8]) -> Result<Step, Error> {
        let authcid = props
            .get(property::AUTHCID)
            .ok_or(MechanismError::AuthcidRequired)?;
        let passwd = props
            .get(property::PASSWD)
            .ok_or(MechanismError::PasswordRequired)?;
        let mut auth = Vec::new();
        if let Some(authzid) = props.get(property::AUTHZID) {
            auth.extend(authzid.bytes());
        }
        auth.push(0);
        auth.extend(authcid.bytes());
        auth.push(0);
        auth.extend(passwd.bytes());
        Ok(Step::Done(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::PropertyStore;

    #[test]
    fn message() {
        let empty = PropertyStore::new();
        let mut session = PropertyStore::new();
        session.insert(property::AUTHCID, "tim").unwrap();
        session.insert(property::PASSWD, "tanstaaftanstaaf").unwrap();
        let props = Properties::new(&session, &empty, &empty, false);
        let step = Plain::new().step(&props, b"").unwrap();
        assert_eq!(step, Step::Done(b"\0tim\0tanstaaftanstaaf".to_vec()));

        session.insert(property::AUTHZID, "Ursel").unwrap();
        let props = Properties::new(&session, &empty, &empty, false);
        let step = Plain::new().step(&props, b"").unwrap();
        assert_eq!(step, Step::Done(b"Ursel\0tim\0tanstaaftanstaaf".to_vec()));
    }

    #[test]
    fn requires_credentials() {
        let empty = PropertyStore::new();
        let mut session = PropertyStore::new();
        let props = Properties::new(&session, &empty, &empty, false);
        assert_eq!(
            Plain::new().step(&props, b""),
            Err(MechanismError::AuthcidRequired.into())
        );
        session.insert(property::AUTHCID, "tim").unwrap();
        let props = Properties::new(&session, &empty, &empty, false);
        assert_eq!(
            Plain::new().step(&props, b""),
            Err(MechanismError::PasswordRequired.into())
        );
    }
}
