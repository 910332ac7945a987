//! Capability identification and negotiation.
//!
//! Capabilities are exchanged as URIs in the `<hello>` messages. The client
//! only cares about a fixed set of them, recognised by substring match so
//! that query parameters (`?module=...&revision=...`) and minor version
//! suffixes do not get in the way.

use std::collections::BTreeSet;
use std::fmt;

use netconf_wire::FramingMode;
use serde::{Deserialize, Serialize};

use crate::NETCONF_BASE_NS;
use crate::error::{NetconfError, NetconfResult};

/// URI of the NETCONF 1.0 base capability
pub const BASE_1_0: &str = "urn:ietf:params:netconf:base:1.0";
/// URI of the NETCONF 1.1 base capability
pub const BASE_1_1: &str = "urn:ietf:params:netconf:base:1.1";

/// Capabilities the client advertises unless configured otherwise
pub const DEFAULT_CLIENT_CAPABILITIES: &[&str] = &[BASE_1_0, BASE_1_1];

/// A capability the client knows how to recognise
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Capability {
    /// NETCONF 1.0 base protocol
    Base10,
    /// NETCONF 1.1 base protocol
    Base11,
    /// `:writable-running`
    WritableRunning,
    /// `:candidate`
    Candidate,
    /// `:confirmed-commit`
    ConfirmedCommit,
    /// `:rollback-on-error`
    RollbackOnError,
    /// `:validate`
    Validate,
    /// `:startup`
    Startup,
    /// `:url`
    Url,
    /// `:xpath`
    Xpath,
    /// RFC 5277 notifications
    Notification10,
    /// Notification 2.0
    Notification20,
    /// `:interleave`
    Interleave,
    /// `:with-defaults`
    WithDefaults,
    /// YANG Library 1.0 (RFC 7895)
    YangLibrary10,
    /// YANG Library 1.1 (RFC 8525)
    YangLibrary11,
    /// ietf-netconf-monitoring (RFC 6022)
    NetconfMonitoring,
    /// ietf-netconf-nmda (RFC 8526)
    NetconfNmda,
}

const CAPABILITY_TABLE: &[(Capability, &str, &str)] = &[
    (Capability::Base10, "base:1.0", BASE_1_0),
    (Capability::Base11, "base:1.1", BASE_1_1),
    (
        Capability::WritableRunning,
        "writable-running",
        "urn:ietf:params:netconf:capability:writable-running:1.0",
    ),
    (
        Capability::Candidate,
        "candidate",
        "urn:ietf:params:netconf:capability:candidate:1.0",
    ),
    (
        Capability::ConfirmedCommit,
        "confirmed-commit",
        "urn:ietf:params:netconf:capability:confirmed-commit:1.",
    ),
    (
        Capability::RollbackOnError,
        "rollback-on-error",
        "urn:ietf:params:netconf:capability:rollback-on-error:1.0",
    ),
    (
        Capability::Validate,
        "validate",
        "urn:ietf:params:netconf:capability:validate:1.",
    ),
    (
        Capability::Startup,
        "startup",
        "urn:ietf:params:netconf:capability:startup:1.0",
    ),
    (Capability::Url, "url", "urn:ietf:params:netconf:capability:url:1.0"),
    (Capability::Xpath, "xpath", "urn:ietf:params:netconf:capability:xpath:1.0"),
    (
        Capability::Notification10,
        "notification:1.0",
        "urn:ietf:params:netconf:capability:notification:1.0",
    ),
    (
        Capability::Notification20,
        "notification:2.0",
        "urn:ietf:params:netconf:capability:notification:2.0",
    ),
    (
        Capability::Interleave,
        "interleave",
        "urn:ietf:params:netconf:capability:interleave:1.0",
    ),
    (
        Capability::WithDefaults,
        "with-defaults",
        "urn:ietf:params:netconf:capability:with-defaults:1.0",
    ),
    (
        Capability::YangLibrary10,
        "yang-library:1.0",
        "urn:ietf:params:netconf:capability:yang-library:1.0",
    ),
    (
        Capability::YangLibrary11,
        "yang-library:1.1",
        "urn:ietf:params:netconf:capability:yang-library:1.1",
    ),
    (
        Capability::NetconfMonitoring,
        "netconf-monitoring",
        "urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring",
    ),
    (
        Capability::NetconfNmda,
        "netconf-nmda",
        "urn:ietf:params:xml:ns:yang:ietf-netconf-nmda",
    ),
];

impl Capability {
    fn entry(self) -> &'static (Capability, &'static str, &'static str) {
        // The table lists every variant in declaration order.
        &CAPABILITY_TABLE[self as usize]
    }

    /// Short tag, e.g. `base:1.1` or `candidate`
    #[must_use]
    pub fn tag(self) -> &'static str {
        self.entry().1
    }

    /// URI fragment that identifies the capability
    #[must_use]
    pub fn uri(self) -> &'static str {
        self.entry().2
    }

    /// Look a capability up by its short tag
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        CAPABILITY_TABLE
            .iter()
            .find(|(_, t, _)| *t == tag)
            .map(|(cap, _, _)| *cap)
    }

    /// Every known capability recognised in `uri`
    pub fn matching(uri: &str) -> impl Iterator<Item = Capability> + '_ {
        CAPABILITY_TABLE
            .iter()
            .filter(move |(_, _, fragment)| uri.contains(fragment))
            .map(|(cap, _, _)| *cap)
    }

    /// All known capabilities
    pub fn all() -> impl Iterator<Item = Capability> {
        CAPABILITY_TABLE.iter().map(|(cap, _, _)| *cap)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl From<Capability> for &'static str {
    fn from(cap: Capability) -> Self {
        cap.tag()
    }
}

impl TryFrom<String> for Capability {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_tag(&value).ok_or_else(|| format!("unknown capability tag '{value}'"))
    }
}

/// The set of known capabilities found in a list of URIs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognise every known capability in the given URIs
    pub fn from_uris<I, S>(uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for uri in uris {
            set.extend(Capability::matching(uri.as_ref()));
        }
        Self(set)
    }

    /// Whether `cap` is present
    #[must_use]
    pub fn contains(&self, cap: Capability) -> bool {
        self.0.contains(&cap)
    }

    /// Add a capability
    pub fn insert(&mut self, cap: Capability) -> bool {
        self.0.insert(cap)
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Number of recognised capabilities
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was recognised
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in table order
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    /// Short tags of every capability present
    #[must_use]
    pub fn tags(&self) -> Vec<&'static str> {
        self.iter().map(Capability::tag).collect()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tags().join(", "))
    }
}

/// Pick the framing mode both peers support.
///
/// Chunked framing is used when both sides advertise `base:1.1`,
/// end-of-message framing when both advertise `base:1.0`.
///
/// # Errors
///
/// Returns an `IncompatibleCapabilities` error when the peers share no base
/// protocol version.
pub fn negotiate_framing(
    client: &CapabilitySet,
    server: &CapabilitySet,
) -> NetconfResult<FramingMode> {
    if client.contains(Capability::Base11) && server.contains(Capability::Base11) {
        Ok(FramingMode::Chunked)
    } else if client.contains(Capability::Base10) && server.contains(Capability::Base10) {
        Ok(FramingMode::EndOfMessage)
    } else {
        Err(NetconfError::incompatible_capabilities(format!(
            "no common base protocol version (client: [{client}], server: [{server}])"
        )))
    }
}

/// Build the client `<hello>` document advertising `uris`.
#[must_use]
pub fn client_hello<S: AsRef<str>>(uris: &[S]) -> String {
    let mut xml = String::with_capacity(128 + uris.len() * 64);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push_str(&format!(r#"<hello xmlns="{NETCONF_BASE_NS}"><capabilities>"#));
    for uri in uris {
        xml.push_str("<capability>");
        xml.push_str(&crate::escape_text(uri.as_ref()));
        xml.push_str("</capability>");
    }
    xml.push_str("</capabilities></hello>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_matches_declaration_order() {
        for (index, (cap, _, _)) in CAPABILITY_TABLE.iter().enumerate() {
            assert_eq!(*cap as usize, index);
        }
    }

    #[test]
    fn test_substring_recognition() {
        let set = CapabilitySet::from_uris([
            "urn:ietf:params:netconf:base:1.1",
            "urn:ietf:params:netconf:capability:candidate:1.0",
            "urn:ietf:params:netconf:capability:confirmed-commit:1.1",
            "urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring?module=ietf-netconf-monitoring&revision=2010-10-04",
            "http://example.com/vendor-extension",
        ]);
        assert_eq!(
            set.tags(),
            vec!["base:1.1", "candidate", "confirmed-commit", "netconf-monitoring"]
        );
    }

    #[test]
    fn test_negotiate_chunked_when_both_support_1_1() {
        let client = CapabilitySet::from_uris(DEFAULT_CLIENT_CAPABILITIES);
        let server = CapabilitySet::from_uris([BASE_1_0, BASE_1_1]);
        assert_eq!(negotiate_framing(&client, &server).unwrap(), FramingMode::Chunked);
    }

    #[test]
    fn test_negotiate_eom_for_1_0_server() {
        let client = CapabilitySet::from_uris(DEFAULT_CLIENT_CAPABILITIES);
        let server = CapabilitySet::from_uris([BASE_1_0]);
        assert_eq!(
            negotiate_framing(&client, &server).unwrap(),
            FramingMode::EndOfMessage
        );
    }

    #[test]
    fn test_negotiate_fails_without_common_base() {
        let client = CapabilitySet::from_uris([BASE_1_0]);
        let server = CapabilitySet::from_uris([BASE_1_1]);
        let err = negotiate_framing(&client, &server).unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::IncompatibleCapabilities);
    }

    #[test]
    fn test_client_hello_lists_capabilities() {
        let hello = client_hello(DEFAULT_CLIENT_CAPABILITIES);
        assert!(hello.starts_with("<?xml"));
        assert!(hello.contains("<capability>urn:ietf:params:netconf:base:1.0</capability>"));
        assert!(hello.contains("<capability>urn:ietf:params:netconf:base:1.1</capability>"));
        assert!(!hello.contains("session-id"));
    }

    #[test]
    fn test_serde_uses_tags() {
        let set: CapabilitySet = [Capability::Base11, Capability::Candidate]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["base:1.1","candidate"]"#);
        let back: CapabilitySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
