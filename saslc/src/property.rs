//! Ordered key/value properties used for configuration and per-session options.

use zeroize::Zeroizing;

use crate::error::Error;

/// The authentication identity (user name).
pub const AUTHCID: &str = "AUTHCID";
/// The authorization identity, if different from the authentication identity.
pub const AUTHZID: &str = "AUTHZID";
/// The password.
pub const PASSWD: &str = "PASSWD";
/// Host-qualified list of acceptable realms (`[host:]realm, ...`).
pub const REALM: &str = "REALM";
/// Fully-qualified name of the server host.
pub const HOSTNAME: &str = "HOSTNAME";
/// Service type, e.g. `imap` or `smtp`.
pub const SERVICE: &str = "SERVICE";
/// Host-qualified list of service names for replicated services.
pub const SERVNAME: &str = "SERVNAME";
/// Maximum receive buffer size advertised to the server.
pub const MAXBUF: &str = "MAXBUF";
/// List of acceptable quality-of-protection values.
pub const QOPMASK: &str = "QOPMASK";
/// List of acceptable confidentiality ciphers.
pub const CIPHERMASK: &str = "CIPHERMASK";
/// Enables protocol traces.
pub const DEBUG: &str = "DEBUG";
/// Security policy flags applied when selecting a mechanism.
pub const SECURITY: &str = "SECURITY";
/// Base64-encode step input and output.
pub const BASE64IO: &str = "BASE64IO";
/// Fixed DIGEST-MD5 client nonce, for reproducing known exchanges.
pub const CNONCE: &str = "CNONCE";

/// Checks a property key against `[A-Za-z][A-Za-z0-9_]*`.
pub fn is_valid_key(key: &str) -> bool {
    let mut bytes = key.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() => (),
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// An insertion-ordered property dictionary.
///
/// Keys are case sensitive. Every value is wiped from memory when it is
/// removed, replaced, or when the store is dropped, since some of them are
/// passwords.
#[derive(Debug, Default)]
pub struct PropertyStore {
    entries: Vec<(String, Zeroizing<String>)>,
}

impl PropertyStore {
    /// Creates an empty store.
    pub fn new() -> PropertyStore {
        PropertyStore::default()
    }

    /// Inserts a new property; an existing key is never overwritten.
    pub fn insert<K: Into<String>, V: Into<String>>(
        &mut self,
        key: K,
        value: V,
    ) -> Result<(), Error> {
        let key = key.into();
        let value = Zeroizing::new(value.into());
        if !is_valid_key(&key) {
            return Err(Error::KeyInvalid(key));
        }
        if value.contains('\0') {
            return Err(Error::ValueInvalid(key));
        }
        if self.position(&key).is_some() {
            return Err(Error::KeyExists(key));
        }
        self.entries.push((key, value));
        Ok(())
    }

    /// Replaces the value of `key`, inserting it if it isn't there yet.
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> Result<(), Error> {
        let key = key.into();
        match self.remove(&key) {
            Ok(()) | Err(Error::NotFound(_)) => self.insert(key, value),
            Err(err) => Err(err),
        }
    }

    /// Looks up the value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.position(key).map(|i| self.entries[i].1.as_str())
    }

    /// Removes `key` and wipes its value.
    pub fn remove(&mut self, key: &str) -> Result<(), Error> {
        match self.position(key) {
            Some(i) => {
                // Zeroizing wipes the value as it is dropped here.
                self.entries.remove(i);
                Ok(())
            }
            None => Err(Error::NotFound(key.to_owned())),
        }
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the properties in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

/// The lookup chain a mechanism sees: session properties first, then the
/// context's global ones, then the mechanism's own.
#[derive(Debug, Clone, Copy)]
pub struct Properties<'a> {
    session: &'a PropertyStore,
    context: &'a PropertyStore,
    mechanism: &'a PropertyStore,
    debug: bool,
}

impl<'a> Properties<'a> {
    pub(crate) fn new(
        session: &'a PropertyStore,
        context: &'a PropertyStore,
        mechanism: &'a PropertyStore,
        debug: bool,
    ) -> Properties<'a> {
        Properties {
            session,
            context,
            mechanism,
            debug,
        }
    }

    /// Returns the first value found for `key` along the chain.
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.session
            .get(key)
            .or_else(|| self.context.get(key))
            .or_else(|| self.mechanism.get(key))
    }

    /// Whether protocol traces should be logged.
    pub fn debug(&self) -> bool {
        self.debug
    }
}

/// Parses a boolean property value.
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if ["true", "yes", "on"].iter().any(|v| value.eq_ignore_ascii_case(v)) {
        return Some(true);
    }
    if ["false", "no", "off"].iter().any(|v| value.eq_ignore_ascii_case(v)) {
        return Some(false);
    }
    value.parse::<i64>().ok().map(|n| n != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn key_syntax() {
        assert!(is_valid_key("AUTHCID"));
        assert!(is_valid_key("a1_b"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("1ABC"));
        assert!(!is_valid_key("_ABC"));
        assert!(!is_valid_key("AB-C"));
    }

    #[test]
    fn first_insert_wins() {
        let mut store = PropertyStore::new();
        store.insert(AUTHCID, "chris").unwrap();
        assert_eq!(
            store.insert(AUTHCID, "other"),
            Err(Error::KeyExists(AUTHCID.to_owned()))
        );
        assert_eq!(store.get(AUTHCID), Some("chris"));
    }

    #[test]
    fn invalid_inserts() {
        let mut store = PropertyStore::new();
        assert_eq!(
            store.insert("9X", "v"),
            Err(Error::KeyInvalid("9X".to_owned()))
        );
        assert_eq!(
            store.insert("X", "a\0b"),
            Err(Error::ValueInvalid("X".to_owned()))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn remove_then_insert() {
        let mut store = PropertyStore::new();
        assert_eq!(store.remove(PASSWD), Err(Error::NotFound(PASSWD.to_owned())));
        store.insert(PASSWD, "secret").unwrap();
        store.remove(PASSWD).unwrap();
        assert_eq!(store.get(PASSWD), None);
        store.insert(PASSWD, "other").unwrap();
        assert_eq!(store.get(PASSWD), Some("other"));
        store.set(PASSWD, "third").unwrap();
        assert_eq!(store.get(PASSWD), Some("third"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn keys_are_case_sensitive_and_ordered() {
        let mut store = PropertyStore::new();
        store.insert("realm", "a").unwrap();
        store.insert("REALM", "b").unwrap();
        store.insert("Alpha", "c").unwrap();
        let keys: Vec<_> = store.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["realm", "REALM", "Alpha"]);
    }

    #[test]
    fn lookup_chain_order() {
        let mut session = PropertyStore::new();
        let mut context = PropertyStore::new();
        let mut mechanism = PropertyStore::new();
        session.insert(AUTHCID, "session").unwrap();
        context.insert(AUTHCID, "context").unwrap();
        context.insert(REALM, "context").unwrap();
        mechanism.insert(REALM, "mechanism").unwrap();
        mechanism.insert(SERVICE, "imap").unwrap();

        let props = Properties::new(&session, &context, &mechanism, false);
        assert_eq!(props.get(AUTHCID), Some("session"));
        assert_eq!(props.get(REALM), Some("context"));
        assert_eq!(props.get(SERVICE), Some("imap"));
        assert_eq!(props.get(PASSWD), None);
    }

    #[test]
    fn booleans() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    proptest! {
        #[test]
        fn insert_then_get(
            key in "[A-Za-z][A-Za-z0-9_]{0,15}",
            value in "[^\\x00]{0,32}",
            other in "[^\\x00]{0,32}"
        ) {
            let mut store = PropertyStore::new();
            store.insert(key.clone(), value.clone()).unwrap();
            prop_assert_eq!(store.get(&key), Some(value.as_str()));
            prop_assert_eq!(store.insert(key.clone(), other), Err(Error::KeyExists(key.clone())));
            prop_assert_eq!(store.get(&key), Some(value.as_str()));
        }
    }
}
