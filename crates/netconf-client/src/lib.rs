//! # NETCONF Client
//!
//! Asynchronous NETCONF (RFC 6241) client for sessions over SSH (RFC 6242).
//!
//! ## Features
//!
//! - Hello exchange with automatic choice of end-of-message or chunked framing
//! - Request/reply correlation by `message-id`, with per-request timeouts
//! - Awaitable requests and fire-and-forget requests with reply callbacks
//! - Candidate datastore locking
//! - Download of every YANG module the server lists
//! - One typed event stream for everything that happens on the session
//!
//! ## Architecture
//!
//! ```text
//! NetconfClient handles ──commands──▶ session task ──▶ Transport (SSH)
//!        ▲                                │
//!        └──────── snapshot ◀─────────────┤
//!                                         ▼
//!                                  NetconfEvent stream
//! ```
//!
//! One task per connection owns the transport, the framing codec, the
//! [`MessageDispatcher`] and the [`RequestRegistry`]. Handles are cheap
//! clones that talk to it over a channel.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use netconf_client::{ClientConfig, NetconfClient, NetconfEvent};
//! use netconf_transport::{NoPrompt, SshConfig};
//!
//! # async fn example() -> netconf_protocol::NetconfResult<()> {
//! let (client, mut events) = NetconfClient::new(ClientConfig::default());
//! client
//!     .connect(SshConfig::new("192.0.2.1", "admin").with_password("secret"), &NoPrompt)
//!     .await?;
//!
//! let listener = tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         if let NetconfEvent::YangDefinition { name, .. } = event {
//!             println!("{name}");
//!         }
//!     }
//! });
//!
//! client.lock().await?;
//! let summary = client.get_yang_library(Some("yang".as_ref()), true).await?;
//! println!("{} of {} modules downloaded", summary.fetched, summary.total);
//! client.unlock().await?;
//! client.disconnect().await?;
//! drop(client);
//! let _ = listener.await;
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

mod client;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod registry;
pub mod schema;
mod session;

pub use client::NetconfClient;
pub use config::ClientConfig;
pub use dispatcher::{Dispatch, MessageDispatcher, Phase};
pub use events::{EventEmitter, EventReceiver, NetconfEvent};
pub use registry::{Completion, ReplyCallback, RequestRegistry, RpcResponse, format_elapsed};
pub use schema::{RpcExecutor, SchemaFetcher, SchemaSummary, discovery_flavor};
pub use session::{LOCAL_MESSAGE_ID_SEED, SessionInfo, SessionState};

pub use netconf_protocol::operations::Datastore;
pub use netconf_protocol::{Capability, CapabilitySet, ErrorKind, NetconfError, NetconfResult};
pub use netconf_wire::FramingMode;
