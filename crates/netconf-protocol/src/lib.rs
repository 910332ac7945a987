//! # NETCONF Protocol
//!
//! Protocol-level building blocks shared by the session engine and the CLI:
//!
//! - [`NetconfError`] / [`ErrorKind`]: the error taxonomy of the client
//! - [`capabilities`]: capability recognition, base version negotiation and
//!   the client `<hello>`
//! - [`message`]: classification of inbound messages
//! - [`request`]: turning caller XML into a correlatable `<rpc>`
//! - [`operations`]: requests the client builds itself
//! - [`yang_library`]: YANG module inventories and the download queue
//!
//! Nothing in this crate performs I/O.
//!
//! ## Example
//!
//! ```rust
//! use netconf_protocol::capabilities::{CapabilitySet, DEFAULT_CLIENT_CAPABILITIES, negotiate_framing};
//! use netconf_protocol::message::{InboundMessage, parse_message};
//! use netconf_wire::FramingMode;
//!
//! let hello = r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
//!   <capabilities><capability>urn:ietf:params:netconf:base:1.1</capability></capabilities>
//!   <session-id>7</session-id>
//! </hello>"#;
//!
//! let InboundMessage::Hello(server) = parse_message(hello).unwrap() else { unreachable!() };
//! let client = CapabilitySet::from_uris(DEFAULT_CLIENT_CAPABILITIES);
//! let server = CapabilitySet::from_uris(&server.capabilities);
//! assert_eq!(negotiate_framing(&client, &server).unwrap(), FramingMode::Chunked);
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

pub mod capabilities;
mod error;
pub mod message;
pub mod operations;
pub mod request;
pub mod yang_library;

pub use capabilities::{Capability, CapabilitySet};
pub use error::{ErrorContext, ErrorKind, NetconfError, NetconfResult};
pub use message::{InboundMessage, ReplyOutcome, RpcReply, ServerHello};
pub use request::{PreparedRequest, prepare_request};
pub use yang_library::{LibraryFlavor, YangModuleDescriptor};

/// NETCONF base namespace
pub const NETCONF_BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// ietf-yang-library namespace (RFC 7895 and RFC 8525)
pub const YANG_LIBRARY_NS: &str = "urn:ietf:params:xml:ns:yang:ietf-yang-library";

/// ietf-netconf-monitoring namespace (RFC 6022)
pub const MONITORING_NS: &str = "urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring";

/// RFC 5277 event notification namespace
pub const NOTIFICATION_NS: &str = "urn:ietf:params:xml:ns:netconf:notification:1.0";

/// Escape `&`, `<`, `>` and `"` for use in element text or attribute values.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
