//! The table of known mechanisms and selection by security policy.

use crate::error::{Error, MechanismError};
use crate::list::{list_flags, parse_list};
#[cfg(feature = "digest-md5")]
use crate::mechanisms::DigestMd5;
use crate::mechanisms::{Anonymous, CramMd5, External, MechanismState, Plain};
use crate::property::PropertyStore;

bitflags::bitflags! {
    /// What a mechanism is (or isn't) resistant to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MechanismFlags: u32 {
        /// Allows anonymous login.
        const ANONYMOUS = 1 << 0;
        /// Sends the password in the clear.
        const PLAINTEXT = 1 << 1;
        /// Vulnerable to passive dictionary attacks.
        const DICTIONARY = 1 << 2;
        /// Vulnerable to active, non-dictionary attacks.
        const ACTIVE = 1 << 3;
        /// Authenticates the server to the client.
        const MUTUAL = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Constraints on which mechanisms may be selected. Each bit but
    /// `MUTUAL` rejects mechanisms with that flag; `MUTUAL` requires it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SecurityPolicy: u32 {
        /// Reject anonymous mechanisms.
        const NO_ANONYMOUS = 1 << 0;
        /// Reject mechanisms sending plaintext passwords.
        const NO_PLAINTEXT = 1 << 1;
        /// Reject mechanisms open to dictionary attacks.
        const NO_DICTIONARY = 1 << 2;
        /// Reject mechanisms open to active attacks.
        const NO_ACTIVE = 1 << 3;
        /// Require mutual authentication.
        const MUTUAL = 1 << 4;
    }
}

/// Names accepted in the `SECURITY` property.
const POLICY_NAMES: &[(&str, SecurityPolicy)] = &[
    ("noanonymous", SecurityPolicy::NO_ANONYMOUS),
    ("noplaintext", SecurityPolicy::NO_PLAINTEXT),
    ("nodictionary", SecurityPolicy::NO_DICTIONARY),
    ("noactive", SecurityPolicy::NO_ACTIVE),
    ("mutual", SecurityPolicy::MUTUAL),
];

impl SecurityPolicy {
    /// Parses a `SECURITY` property value; unknown names are ignored.
    pub fn from_list(list: &str) -> SecurityPolicy {
        list_flags(&parse_list(list), POLICY_NAMES)
    }

    /// Whether a mechanism with `flags` may be used under this policy.
    pub fn permits(self, flags: MechanismFlags) -> bool {
        let rejected = MechanismFlags::from_bits_truncate(
            (self - SecurityPolicy::MUTUAL).bits(),
        );
        if flags.intersects(rejected) {
            return false;
        }
        !self.contains(SecurityPolicy::MUTUAL) || flags.contains(MechanismFlags::MUTUAL)
    }
}

/// A static description of a mechanism.
pub struct MechanismDescriptor {
    /// The IANA name of the mechanism.
    pub name: &'static str,
    /// Its security properties.
    pub flags: MechanismFlags,
    create: fn() -> MechanismState,
}

impl MechanismDescriptor {
    /// Creates fresh per-session state for this mechanism.
    pub fn create(&self) -> MechanismState {
        (self.create)()
    }
}

impl std::fmt::Debug for MechanismDescriptor {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("MechanismDescriptor")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .finish()
    }
}

static MECHANISMS: &[MechanismDescriptor] = &[
    MechanismDescriptor {
        name: "ANONYMOUS",
        flags: MechanismFlags::ANONYMOUS,
        create: || MechanismState::Anonymous(Anonymous::new()),
    },
    MechanismDescriptor {
        name: "CRAM-MD5",
        flags: MechanismFlags::DICTIONARY,
        create: || MechanismState::CramMd5(CramMd5::new()),
    },
    #[cfg(feature = "digest-md5")]
    MechanismDescriptor {
        name: "DIGEST-MD5",
        flags: MechanismFlags::MUTUAL.union(MechanismFlags::DICTIONARY),
        create: || MechanismState::DigestMd5(Box::new(DigestMd5::new())),
    },
    MechanismDescriptor {
        name: "EXTERNAL",
        flags: MechanismFlags::empty(),
        create: || MechanismState::External(External::new()),
    },
    MechanismDescriptor {
        name: "PLAIN",
        flags: MechanismFlags::PLAINTEXT,
        create: || MechanismState::Plain(Plain::new()),
    },
];

/// A registered mechanism with its own default properties.
#[derive(Debug)]
pub struct RegisteredMechanism {
    /// The mechanism's description.
    pub descriptor: &'static MechanismDescriptor,
    /// Properties consulted after the session's and the context's.
    pub properties: PropertyStore,
}

/// The mechanisms available to a context.
#[derive(Debug)]
pub struct Registry {
    entries: Vec<RegisteredMechanism>,
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}

impl Registry {
    /// A registry holding every built-in mechanism.
    pub fn new() -> Registry {
        Registry {
            entries: MECHANISMS
                .iter()
                .map(|descriptor| RegisteredMechanism {
                    descriptor,
                    properties: PropertyStore::new(),
                })
                .collect(),
        }
    }

    /// Looks a mechanism up by name, ignoring case.
    pub fn find(&self, name: &str) -> Option<&RegisteredMechanism> {
        self.entries
            .iter()
            .find(|entry| entry.descriptor.name.eq_ignore_ascii_case(name))
    }

    /// Mutable access to a mechanism's properties.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut RegisteredMechanism> {
        self.entries
            .iter_mut()
            .find(|entry| entry.descriptor.name.eq_ignore_ascii_case(name))
    }

    /// Iterates over the registered mechanisms.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredMechanism> {
        self.entries.iter()
    }

    /// Picks the first mechanism of the comma separated `names` that is
    /// registered and allowed by `policy`.
    pub fn select(
        &self,
        names: &str,
        policy: SecurityPolicy,
    ) -> Result<&RegisteredMechanism, Error> {
        parse_list(names)
            .iter()
            .filter_map(|name| self.find(name))
            .find(|entry| policy.permits(entry.descriptor.flags))
            .ok_or_else(|| MechanismError::MechanismNotSupported.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_permits() {
        let none = SecurityPolicy::empty();
        assert!(none.permits(MechanismFlags::PLAINTEXT));
        assert!(none.permits(MechanismFlags::empty()));

        let policy = SecurityPolicy::NO_PLAINTEXT;
        assert!(!policy.permits(MechanismFlags::PLAINTEXT));
        assert!(policy.permits(MechanismFlags::DICTIONARY));

        let mutual = SecurityPolicy::MUTUAL;
        assert!(!mutual.permits(MechanismFlags::DICTIONARY));
        assert!(mutual.permits(MechanismFlags::MUTUAL | MechanismFlags::DICTIONARY));
        assert!(!(mutual | SecurityPolicy::NO_DICTIONARY)
            .permits(MechanismFlags::MUTUAL | MechanismFlags::DICTIONARY));
    }

    #[test]
    fn policy_from_list() {
        assert_eq!(
            SecurityPolicy::from_list("noplaintext, NoAnonymous, bogus"),
            SecurityPolicy::NO_PLAINTEXT | SecurityPolicy::NO_ANONYMOUS
        );
    }

    #[test]
    fn select_in_list_order() {
        let registry = Registry::new();
        let none = SecurityPolicy::empty();
        assert_eq!(
            registry.select("plain, anonymous", none).unwrap().descriptor.name,
            "PLAIN"
        );
        assert_eq!(
            registry
                .select("X-UNKNOWN PLAIN, cram-md5", SecurityPolicy::NO_PLAINTEXT)
                .unwrap()
                .descriptor
                .name,
            "CRAM-MD5"
        );
        assert_eq!(
            registry.select("PLAIN", SecurityPolicy::NO_PLAINTEXT).unwrap_err(),
            Error::Mechanism(MechanismError::MechanismNotSupported)
        );
        assert_eq!(
            registry.select("", none).unwrap_err(),
            Error::Mechanism(MechanismError::MechanismNotSupported)
        );
    }

    #[cfg(feature = "digest-md5")]
    #[test]
    fn mutual_selects_digest() {
        let registry = Registry::new();
        let entry = registry
            .select("PLAIN,CRAM-MD5,DIGEST-MD5", SecurityPolicy::MUTUAL)
            .unwrap();
        assert_eq!(entry.descriptor.name, "DIGEST-MD5");
    }

    #[test]
    fn mechanism_properties() {
        let mut registry = Registry::new();
        registry
            .find_mut("plain")
            .unwrap()
            .properties
            .insert("AUTHCID", "default")
            .unwrap();
        assert_eq!(
            registry.find("PLAIN").unwrap().properties.get("AUTHCID"),
            Some("default")
        );
        assert!(registry.find("GSSAPI").is_none());
    }
}
