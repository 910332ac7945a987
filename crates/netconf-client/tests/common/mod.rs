//! Scripted NETCONF server on top of the in-memory transport
#![allow(dead_code)]

use std::time::Duration;

use netconf_client::{ClientConfig, EventReceiver, NetconfClient, NetconfEvent};
use netconf_transport::NoPrompt;
use netconf_transport::memory::{MemoryConnector, MemoryPeer, memory_pair};
use netconf_wire::FramingMode;
use tokio::task::JoinHandle;

pub const BASE_1_0: &str = "urn:ietf:params:netconf:base:1.0";
pub const BASE_1_1: &str = "urn:ietf:params:netconf:base:1.1";
pub const CANDIDATE: &str = "urn:ietf:params:netconf:capability:candidate:1.0";
pub const YANG_LIBRARY_1_1: &str =
    "urn:ietf:params:netconf:capability:yang-library:1.1?revision=2019-01-04&amp;content-id=1";

/// Server `<hello>` advertising `capabilities`
pub fn hello(capabilities: &[&str], session_id: u64) -> String {
    let caps: String = capabilities
        .iter()
        .map(|c| format!("<capability>{c}</capability>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><capabilities>{caps}</capabilities><session-id>{session_id}</session-id></hello>"#
    )
}

/// The `message-id` attribute of a request
pub fn message_id(request: &str) -> String {
    let start = request
        .find(r#"message-id=""#)
        .expect("request has a message-id")
        + r#"message-id=""#.len();
    let end = start + request[start..].find('"').expect("closing quote");
    request[start..end].to_string()
}

pub fn ok_reply(id: &str) -> String {
    format!(
        r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="{id}"><ok/></rpc-reply>"#
    )
}

pub fn data_reply(id: &str, data: &str) -> String {
    format!(
        r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="{id}"><data>{data}</data></rpc-reply>"#
    )
}

pub fn error_reply(id: &str, message: &str) -> String {
    format!(
        r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="{id}"><rpc-error><error-type>application</error-type><error-tag>operation-failed</error-tag><error-severity>error</error-severity><error-message xml:lang="en">{message}</error-message></rpc-error></rpc-reply>"#
    )
}

/// Connect a client to a scripted peer that answers with `server_hello`.
///
/// The peer has already consumed the client hello and switched to the
/// negotiated framing.
pub async fn connect(
    config: ClientConfig,
    server_hello: &str,
) -> (NetconfClient, EventReceiver, MemoryPeer) {
    let (transport, mut peer) = memory_pair();
    let (client, events) = NetconfClient::new(config);
    assert!(peer.send_message(FramingMode::EndOfMessage, server_hello));

    let info = client
        .connect_with(&MemoryConnector::new(transport), &NoPrompt)
        .await
        .expect("hello exchange");
    let client_hello = peer.recv_message().await.expect("client hello");
    assert!(client_hello.contains("<hello"));
    peer.set_mode(info.framing);
    (client, events, peer)
}

/// Connect with default settings to a base:1.0 + base:1.1 server
pub async fn connect_default() -> (NetconfClient, EventReceiver, MemoryPeer) {
    connect(
        ClientConfig::default(),
        &hello(&[BASE_1_0, BASE_1_1, CANDIDATE], 42),
    )
    .await
}

/// Answer every request with `respond` until the client closes.
pub fn serve<F>(mut peer: MemoryPeer, respond: F) -> JoinHandle<MemoryPeer>
where
    F: Fn(&str) -> Option<String> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(request) = peer.recv_message().await {
            if let Some(reply) = respond(&request) {
                peer.send_message(FramingMode::Chunked, &reply);
            }
        }
        peer
    })
}

/// Wait for the first event matching `predicate`, skipping others
pub async fn wait_for<P>(events: &mut EventReceiver, predicate: P) -> NetconfEvent
where
    P: Fn(&NetconfEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = events.recv().await.expect("event stream open");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event within timeout")
}

/// Everything emitted so far
pub fn drain(events: &mut EventReceiver) -> Vec<NetconfEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
