//! The process-wide state sessions are created from.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Error;
use crate::property::{self, parse_bool, PropertyStore};
use crate::registry::{Registry, SecurityPolicy};
use crate::session::Session;

/// A builder for [`Context`].
#[derive(Debug, Default)]
pub struct ContextBuilder {
    app_name: Option<String>,
    config_path: Option<PathBuf>,
    debug: bool,
    properties: Vec<(String, String)>,
}

impl ContextBuilder {
    /// Creates a builder with no properties set.
    pub fn new() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Sets the application name, used by configuration loaders.
    pub fn set_app_name(mut self, name: &str) -> Self {
        self.app_name = Some(String::from(name));
        self
    }

    /// Sets where a configuration loader should look. This crate only
    /// stores the path.
    pub fn set_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables protocol traces at `debug` level.
    pub fn set_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Adds a global property. Later values for the same key replace
    /// earlier ones.
    pub fn set_property(mut self, key: &str, value: &str) -> Self {
        self.properties.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Builds the context, validating every property.
    pub fn build(self) -> Result<Context, Error> {
        let mut properties = PropertyStore::new();
        for (key, value) in self.properties {
            properties.set(key, value)?;
        }
        Ok(Context {
            app_name: self.app_name,
            config_path: self.config_path,
            debug: self.debug,
            properties,
            registry: Registry::new(),
            open: Cell::new(0),
        })
    }
}

/// Global properties, the mechanism registry and the debug switch shared by
/// every [`Session`].
///
/// Sessions borrow their context, so it can only be changed or dropped once
/// all of them have ended.
#[derive(Debug)]
pub struct Context {
    app_name: Option<String>,
    config_path: Option<PathBuf>,
    debug: bool,
    properties: PropertyStore,
    registry: Registry,
    open: Cell<usize>,
}

impl Default for Context {
    fn default() -> Context {
        Context::new()
    }
}

impl Context {
    /// A context with no properties and debugging disabled.
    pub fn new() -> Context {
        Context {
            app_name: None,
            config_path: None,
            debug: false,
            properties: PropertyStore::new(),
            registry: Registry::new(),
            open: Cell::new(0),
        }
    }

    /// Starts building a context.
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// The application name, if one was set.
    pub fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    /// The configuration search path, if one was set.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Whether protocol traces are enabled, by the builder or the `DEBUG`
    /// property.
    pub fn debug(&self) -> bool {
        self.debug
            || self
                .properties
                .get(property::DEBUG)
                .and_then(parse_bool)
                .unwrap_or(false)
    }

    /// Looks up a global property.
    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key)
    }

    /// Sets or replaces a global property.
    pub fn set_property(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.properties.set(key, value)
    }

    /// Removes a global property.
    pub fn remove_property(&mut self, key: &str) -> Result<(), Error> {
        self.properties.remove(key)
    }

    pub(crate) fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    /// The registered mechanisms.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The default properties of a registered mechanism.
    pub fn mechanism_properties_mut(&mut self, name: &str) -> Result<&mut PropertyStore, Error> {
        self.registry
            .find_mut(name)
            .map(|entry| &mut entry.properties)
            .ok_or_else(|| Error::NotFound(name.to_owned()))
    }

    /// Number of sessions that haven't ended yet.
    pub fn open_sessions(&self) -> usize {
        self.open.get()
    }

    /// Starts a session with the first mechanism in `mechanisms` (a comma
    /// separated list, usually what the server offered) that `policy` and
    /// the `SECURITY` property allow.
    pub fn session_init(
        &self,
        mechanisms: &str,
        policy: SecurityPolicy,
    ) -> Result<Session<'_>, Error> {
        let policy = policy
            | self
                .properties
                .get(property::SECURITY)
                .map(SecurityPolicy::from_list)
                .unwrap_or_default();
        let entry = self.registry.select(mechanisms, policy)?;
        if self.debug() {
            debug!(
                "selected {} from {:?} with policy {:?}",
                entry.descriptor.name, mechanisms, policy
            );
        }
        Session::new(self, entry)
    }

    pub(crate) fn session_started(&self) {
        self.open.set(self.open.get() + 1);
    }

    pub(crate) fn session_ended(&self) {
        self.open.set(self.open.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MechanismError;

    #[test]
    fn builder() {
        let context = Context::builder()
            .set_app_name("mail")
            .set_config_path("/etc/saslc")
            .set_property(property::SERVICE, "imap")
            .set_property(property::SERVICE, "smtp")
            .build()
            .unwrap();
        assert_eq!(context.app_name(), Some("mail"));
        assert_eq!(context.config_path(), Some(Path::new("/etc/saslc")));
        assert_eq!(context.get_property(property::SERVICE), Some("smtp"));
        assert!(!context.debug());
    }

    #[test]
    fn builder_rejects_bad_keys() {
        let err = Context::builder().set_property("1x", "v").build().unwrap_err();
        assert_eq!(err, Error::KeyInvalid("1x".to_owned()));
    }

    #[test]
    fn debug_from_property() {
        let mut context = Context::new();
        assert!(!context.debug());
        context.set_property(property::DEBUG, "yes").unwrap();
        assert!(context.debug());
        context.set_property(property::DEBUG, "0").unwrap();
        assert!(!context.debug());
        assert!(Context::builder().set_debug(true).build().unwrap().debug());
    }

    #[test]
    fn session_count() {
        let context = Context::new();
        assert_eq!(context.open_sessions(), 0);
        let first = context.session_init("PLAIN", SecurityPolicy::empty()).unwrap();
        let second = context.session_init("ANONYMOUS", SecurityPolicy::empty()).unwrap();
        assert_eq!(context.open_sessions(), 2);
        first.end();
        assert_eq!(context.open_sessions(), 1);
        drop(second);
        assert_eq!(context.open_sessions(), 0);
    }

    #[test]
    fn security_property_joins_policy() {
        let mut context = Context::new();
        context
            .set_property(property::SECURITY, "noplaintext")
            .unwrap();
        let session = context
            .session_init("PLAIN, CRAM-MD5", SecurityPolicy::empty())
            .unwrap();
        assert_eq!(session.mechanism_name(), "CRAM-MD5");
        drop(session);

        let err = context
            .session_init("PLAIN", SecurityPolicy::NO_ANONYMOUS)
            .unwrap_err();
        assert_eq!(err, Error::Mechanism(MechanismError::MechanismNotSupported));
        assert_eq!(context.open_sessions(), 0);
    }

    #[test]
    fn mechanism_defaults() {
        let mut context = Context::new();
        context
            .mechanism_properties_mut("anonymous")
            .unwrap()
            .insert(property::AUTHCID, "trace")
            .unwrap();
        assert_eq!(
            context.mechanism_properties_mut("GSSAPI").unwrap_err(),
            Error::NotFound("GSSAPI".to_owned())
        );
        let mut session = context
            .session_init("ANONYMOUS", SecurityPolicy::empty())
            .unwrap();
        assert_eq!(session.step(b"").unwrap().output(), b"trace");
    }
}
