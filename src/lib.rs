//! An in-memory LDAP server for tests and demos.
//!
//! The server is provisioned from LDIF at startup and serves simple binds and searches over
//! LDAPv3. It is driven by a [`Lifecycle`] which starts and stops the registered [`Hook`]s in
//! order of their priority:
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use embedded_ldap::{EmbeddedLdapServer, Lifecycle, Registry};
//!
//! let config = embedded_ldap::ldap::Config {
//!     port: 0,
//!     publish_port: true,
//!     ..Default::default()
//! };
//!
//! let mut lifecycle = Lifecycle::new();
//! lifecycle.register(EmbeddedLdapServer::new(config));
//! lifecycle.start().await?;
//!
//! let port = Registry::global().get(EmbeddedLdapServer::PORT_PROPERTY);
//! println!("LDAP server listening on port {:?}", port);
//!
//! lifecycle.stop().await?;
//! # Ok(())
//! # }
//! ```

pub use crate::lifecycle::{Hook, Lifecycle};
pub use crate::registry::Registry;
pub use crate::server::EmbeddedLdapServer;

pub mod config;
pub mod directory;
pub mod ldap;
pub mod lifecycle;
pub mod registry;
pub mod server;
