//! Hello exchange against captured server greetings

use netconf_protocol::capabilities::{
    BASE_1_0, Capability, CapabilitySet, DEFAULT_CLIENT_CAPABILITIES, client_hello,
    negotiate_framing,
};
use netconf_protocol::message::{InboundMessage, parse_message};
use netconf_protocol::{ErrorKind, ServerHello};
use netconf_wire::FramingMode;
use pretty_assertions::assert_eq;

const JUNOS_STYLE_HELLO: &str = r#"<!-- No zombies were killed during the creation of this user interface -->
<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
  <capabilities>
    <capability>urn:ietf:params:netconf:base:1.0</capability>
    <capability>urn:ietf:params:netconf:capability:candidate:1.0</capability>
    <capability>urn:ietf:params:netconf:capability:confirmed-commit:1.0</capability>
    <capability>urn:ietf:params:netconf:capability:validate:1.0</capability>
    <capability>urn:ietf:params:netconf:capability:url:1.0?scheme=http,ftp,file</capability>
    <capability>urn:ietf:params:xml:ns:netconf:base:1.0</capability>
    <capability>http://xml.juniper.net/netconf/junos/1.0</capability>
  </capabilities>
  <session-id>27700</session-id>
</hello>"#;

const NMDA_HELLO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nc:hello xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0">
  <nc:capabilities>
    <nc:capability>urn:ietf:params:netconf:base:1.0</nc:capability>
    <nc:capability>urn:ietf:params:netconf:base:1.1</nc:capability>
    <nc:capability>urn:ietf:params:netconf:capability:writable-running:1.0</nc:capability>
    <nc:capability>urn:ietf:params:netconf:capability:notification:1.0</nc:capability>
    <nc:capability>urn:ietf:params:netconf:capability:interleave:1.0</nc:capability>
    <nc:capability>urn:ietf:params:netconf:capability:yang-library:1.1?revision=2019-01-04&amp;content-id=42</nc:capability>
    <nc:capability>urn:ietf:params:xml:ns:yang:ietf-netconf-nmda?module=ietf-netconf-nmda&amp;revision=2019-01-07</nc:capability>
  </nc:capabilities>
  <nc:session-id>1</nc:session-id>
</nc:hello>"#;

fn server_hello(xml: &str) -> ServerHello {
    match parse_message(xml).expect("well-formed hello") {
        InboundMessage::Hello(hello) => hello,
        other => panic!("expected hello, got {other:?}"),
    }
}

#[test]
fn base_1_0_server_negotiates_end_of_message() {
    let hello = server_hello(JUNOS_STYLE_HELLO);
    assert_eq!(hello.session_id, Some(27700));

    let server = CapabilitySet::from_uris(&hello.capabilities);
    assert_eq!(
        server.tags(),
        vec!["base:1.0", "candidate", "confirmed-commit", "validate", "url"]
    );

    let client = CapabilitySet::from_uris(DEFAULT_CLIENT_CAPABILITIES);
    assert_eq!(
        negotiate_framing(&client, &server).unwrap(),
        FramingMode::EndOfMessage
    );
}

#[test]
fn prefixed_nmda_server_negotiates_chunked() {
    let hello = server_hello(NMDA_HELLO);
    assert_eq!(hello.session_id, Some(1));

    let server = CapabilitySet::from_uris(&hello.capabilities);
    assert!(server.contains(Capability::YangLibrary11));
    assert!(server.contains(Capability::NetconfNmda));
    assert!(!server.contains(Capability::YangLibrary10));

    let client = CapabilitySet::from_uris(DEFAULT_CLIENT_CAPABILITIES);
    assert_eq!(negotiate_framing(&client, &server).unwrap(), FramingMode::Chunked);
}

#[test]
fn client_restricted_to_1_1_cannot_talk_to_1_0_server() {
    let hello = server_hello(JUNOS_STYLE_HELLO);
    let server = CapabilitySet::from_uris(&hello.capabilities);
    let client = CapabilitySet::from_uris(["urn:ietf:params:netconf:base:1.1"]);

    let err = negotiate_framing(&client, &server).unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleCapabilities);
    assert!(err.kind.is_fatal());
}

#[test]
fn client_hello_is_a_hello() {
    let xml = client_hello(&[BASE_1_0]);
    let hello = server_hello(&xml);
    assert_eq!(hello.session_id, None);
    assert_eq!(hello.capabilities, vec![BASE_1_0.to_string()]);
}
