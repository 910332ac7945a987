//! # NETCONF Transport
//!
//! Transport abstractions for the NETCONF client and the SSH transport that
//! carries the `netconf` subsystem (RFC 6242).
//!
//! ## Overview
//!
//! - **Traits**: [`Transport`] (an established byte pipe), [`Connector`]
//!   (opens transports) and [`PasswordPrompt`] (interactive credentials)
//! - **Types**: [`TransportState`], [`TransportEvent`]
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **Config**: [`SshConfig`]
//! - **SSH** (feature `ssh`, default): [`SshConnector`], [`SshTransport`]
//! - **Testing** (feature `test-utils`): [`memory::memory_pair`]
//!
//! Framing is not done here; transports move raw bytes and the session
//! engine owns the codec.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use netconf_transport::{Connector, NoPrompt, SshConfig, SshConnector, TransportEvent};
//!
//! # async fn run() -> Result<(), netconf_transport::TransportError> {
//! let connector = SshConnector::new(SshConfig::new("192.0.2.1", "admin").with_password("admin"));
//! let mut transport = connector.connect(&NoPrompt).await?;
//! while let Some(event) = transport.receive().await? {
//!     if let TransportEvent::Data(bytes) = event {
//!         println!("{}", String::from_utf8_lossy(&bytes));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod error;
#[cfg(feature = "ssh")]
mod greeting;
#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod memory;
#[cfg(feature = "ssh")]
mod ssh;
mod traits;
mod types;

pub use config::{DEFAULT_NETCONF_PORT, SshConfig};
pub use error::{TransportError, TransportResult};
#[cfg(feature = "ssh")]
#[cfg_attr(docsrs, doc(cfg(feature = "ssh")))]
pub use ssh::{NETCONF_SUBSYSTEM, SshConnector, SshTransport, WIRE_TARGET};
pub use traits::{BoxFuture, Connector, NoPrompt, PasswordPrompt, Transport};
pub use types::{TransportEvent, TransportState};
