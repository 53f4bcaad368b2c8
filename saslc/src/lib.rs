//! This crate provides a client-side SASL engine: a registry of mechanisms
//! selected by security policy, layered properties, and the DIGEST-MD5
//! integrity and confidentiality layers.
//!
//! # Examples
//!
//! ```rust
//! use saslc::{property, Context, SecurityPolicy, Step};
//!
//! let context = Context::builder()
//!     .set_property(property::AUTHCID, "user")
//!     .set_property(property::PASSWD, "pencil")
//!     .build()
//!     .unwrap();
//!
//! let mut session = context
//!     .session_init("DIGEST-MD5, PLAIN", SecurityPolicy::NO_ANONYMOUS)
//!     .unwrap();
//! assert_eq!(session.mechanism_name(), "DIGEST-MD5");
//!
//! // DIGEST-MD5 waits for the server to speak first.
//! assert_eq!(session.step(b"").unwrap(), Step::NeedMoreSteps(Vec::new()));
//! ```
//!
//! The tests under `tests/` run complete DIGEST-MD5 exchanges, including
//! protected traffic, against a small server.
//!
//! # Usage
//!
//! You can use this in your crate by adding this under `dependencies` in your `Cargo.toml`:
//!
//! ```toml,ignore
//! saslc = "*"
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod buffer;
mod common;
pub mod context;
pub mod error;
pub mod list;
pub mod mechanisms;
pub mod property;
pub mod registry;
pub mod session;

pub use crate::context::{Context, ContextBuilder};
pub use crate::error::{Error, ErrorKind, MechanismError};
pub use crate::mechanisms::{Mechanism, Qop, Step};
pub use crate::property::{Properties, PropertyStore};
pub use crate::registry::{MechanismFlags, Registry, SecurityPolicy};
pub use crate::session::{AuthState, Session};
