//! End-to-end session behaviour against a scripted server

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::*;
use netconf_client::{
    Capability, ClientConfig, ErrorKind, FramingMode, NetconfClient, NetconfEvent, SessionState,
};
use netconf_protocol::ReplyOutcome;
use netconf_transport::memory::{MemoryConnector, memory_pair};
use netconf_transport::{NoPrompt, TransportError};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

#[tokio::test]
async fn connect_negotiates_chunked_framing() {
    let (client, mut events, _peer) = connect_default().await;

    assert_eq!(client.state(), SessionState::Connected);
    assert_eq!(client.session_id(), Some(42));
    assert_eq!(client.framing_mode(), FramingMode::Chunked);
    assert!(client.capabilities().contains(Capability::Candidate));
    assert_eq!(
        client.capabilities().tags(),
        vec!["base:1.0", "base:1.1", "candidate"]
    );

    let NetconfEvent::Connected {
        hello_xml,
        session_id,
        ..
    } = wait_for(&mut events, |e| matches!(e, NetconfEvent::Connected { .. })).await
    else {
        unreachable!()
    };
    assert_eq!(session_id, Some(42));
    assert!(hello_xml.contains("<session-id>42</session-id>"));
}

#[tokio::test]
async fn connect_twice_is_rejected() {
    let (client, _events, _peer) = connect_default().await;
    let (transport, _other) = memory_pair();
    let err = client
        .connect_with(&MemoryConnector::new(transport), &NoPrompt)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyConnected);
    assert!(client.is_connected());
}

#[tokio::test]
async fn base_1_0_server_keeps_end_of_message_framing() {
    let (client, _events, peer) =
        connect(ClientConfig::default(), &hello(&[BASE_1_0], 7)).await;
    assert_eq!(client.framing_mode(), FramingMode::EndOfMessage);

    let server = tokio::spawn(async move {
        let mut peer = peer;
        let request = peer.recv_message().await.unwrap();
        peer.send_message(FramingMode::EndOfMessage, &ok_reply(&message_id(&request)));
        peer
    });
    let response = client.rpc("<commit/>", None).await.unwrap();
    assert!(response.is_ok());
    server.await.unwrap();
}

#[tokio::test]
async fn incompatible_server_is_closed_without_a_hello() {
    let (transport, mut peer) = memory_pair();
    let config = ClientConfig::default().with_client_capabilities([BASE_1_1]);
    let (client, mut events) = NetconfClient::new(config);
    peer.send_message(FramingMode::EndOfMessage, &hello(&[BASE_1_0], 3));

    let err = client
        .connect_with(&MemoryConnector::new(transport), &NoPrompt)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::IncompatibleCapabilities);

    wait_for(&mut events, |e| *e == NetconfEvent::Disconnected).await;
    assert_eq!(peer.recv_message().await, None);
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(client.capabilities().is_empty());
    assert_eq!(client.session_id(), None);
}

#[tokio::test]
async fn reply_before_hello_is_a_protocol_error() {
    let (transport, peer) = memory_pair();
    let (client, _events) = NetconfClient::new(ClientConfig::default());
    peer.send_message(FramingMode::EndOfMessage, &ok_reply("1"));

    let err = client
        .connect_with(&MemoryConnector::new(transport), &NoPrompt)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Protocol);
    assert_eq!(client.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn connector_failure_leaves_client_disconnected() {
    let (client, _events) = NetconfClient::new(ClientConfig::default());
    let connector =
        MemoryConnector::failing(TransportError::AuthenticationFailed("denied".into()));
    let err = client.connect_with(&connector, &NoPrompt).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert_eq!(client.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn rpc_without_session_fails() {
    let (client, _events) = NetconfClient::new(ClientConfig::default());
    let err = client.rpc("<get/>", None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotConnected);
}

#[tokio::test]
async fn bare_operation_is_wrapped_with_a_local_id() {
    let (client, _events, peer) = connect_default().await;
    let server = serve(peer, |request| {
        assert!(request.starts_with(r#"<rpc message-id="1000000""#));
        assert!(request.contains("<get-config><source><running/></source></get-config>"));
        Some(data_reply(&message_id(request), "<top/>"))
    });

    let response = client
        .rpc("<get-config><source><running/></source></get-config>", None)
        .await
        .unwrap();
    assert_eq!(response.message_id, "1000000");
    assert_eq!(response.outcome, ReplyOutcome::Data);
    assert_eq!(response.data_text().unwrap().as_deref(), Some(""));

    client.disconnect().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn rpc_error_resolves_only_its_request() {
    let (client, mut events, peer) = connect_default().await;
    let _server = serve(peer, |request| {
        let id = message_id(request);
        if id == "42" {
            Some(error_reply(&id, "bad filter"))
        } else {
            Some(ok_reply(&id))
        }
    });

    let response = client
        .rpc(r#"<rpc message-id="42"><get><filter>x</filter></get></rpc>"#, None)
        .await
        .unwrap();
    assert_eq!(
        response.outcome,
        ReplyOutcome::Error {
            message: "bad filter".into()
        }
    );
    let err = response.into_result().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Rpc);

    let NetconfEvent::RpcError { id, message, .. } =
        wait_for(&mut events, |e| matches!(e, NetconfEvent::RpcError { .. })).await
    else {
        unreachable!()
    };
    assert_eq!((id.as_str(), message.as_str()), ("42", "bad filter"));

    // The session is still usable.
    assert!(client.rpc("<get/>", None).await.unwrap().is_ok());
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn timed_out_request_ignores_late_reply() {
    let (client, mut events, mut peer) = connect_default().await;
    drain(&mut events);

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.rpc("<get/>", Some(Duration::from_secs(2))).await }
    });
    let request = peer.recv_message().await.unwrap();
    let late_id = message_id(&request);

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);

    // The reply arrives after the deadline and must change nothing.
    peer.send_message(FramingMode::Chunked, &ok_reply(&late_id));

    let follow_up = tokio::spawn({
        let client = client.clone();
        async move { client.rpc("<get-config/>", None).await }
    });
    let request = peer.recv_message().await.unwrap();
    let next_id = message_id(&request);
    peer.send_message(FramingMode::Chunked, &ok_reply(&next_id));
    assert!(follow_up.await.unwrap().unwrap().is_ok());

    let lifecycle: Vec<String> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            NetconfEvent::Busy => Some("busy".to_string()),
            NetconfEvent::Idle => Some("idle".to_string()),
            NetconfEvent::RpcTimeout { id } => Some(format!("timeout {id}")),
            NetconfEvent::RpcOk { id, .. } => Some(format!("ok {id}")),
            _ => None,
        })
        .collect();
    assert_eq!(
        lifecycle,
        vec![
            "busy".to_string(),
            format!("timeout {late_id}"),
            "idle".to_string(),
            "busy".to_string(),
            format!("ok {next_id}"),
            "idle".to_string(),
        ]
    );
}

#[tokio::test]
async fn callback_runs_once_and_may_issue_requests() {
    let (client, _events, peer) = connect_default().await;
    let server = serve(peer, |request| Some(ok_reply(&message_id(request))));

    let calls = Arc::new(AtomicUsize::new(0));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let id = client
        .rpc_with_callback("<get/>", None, {
            let calls = Arc::clone(&calls);
            let client = client.clone();
            move |first| {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let second = client.rpc("<get-config/>", None).await;
                    let _ = done_tx.send((first, second));
                });
            }
        })
        .await
        .unwrap();

    let (first, second) = done_rx.recv().await.unwrap();
    assert_eq!(first.message_id, id);
    assert_eq!(second.unwrap().message_id, "1000001");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    client.disconnect().await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn huge_timeout_keeps_the_session_usable() {
    let (client, _events, peer) = connect_default().await;
    let _server = serve(peer, |request| Some(ok_reply(&message_id(request))));

    let reply = client
        .rpc("<get/>", Some(Duration::from_secs(u64::MAX)))
        .await
        .unwrap();
    assert!(reply.is_ok());
    assert!(client.rpc("<get/>", Some(Duration::MAX)).await.is_ok());
    assert_eq!(client.state(), SessionState::Connected);
}

#[tokio::test]
async fn dead_session_task_leaves_client_disconnected() {
    let (client, mut events, peer) = connect_default().await;
    let server = serve(peer, |request| Some(ok_reply(&message_id(request))));

    client
        .rpc_with_callback("<get/>", None, |_| panic!("callback failure"))
        .await
        .unwrap();
    // The transport goes away with the session task
    server.await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while client.state() != SessionState::Disconnected {
        let err = client.rpc("<get/>", None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotConnected);
        assert!(tokio::time::Instant::now() < deadline, "client still {}", client.state());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    wait_for(&mut events, |e| matches!(e, NetconfEvent::Disconnected)).await;
    assert_eq!(client.session_id(), None);
}

#[tokio::test]
async fn lock_and_unlock_target_candidate() {
    let (client, mut events, peer) = connect_default().await;
    let _server = serve(peer, |request| {
        assert!(request.contains("<target><candidate/></target>"));
        Some(ok_reply(&message_id(request)))
    });

    client.lock().await.unwrap();
    wait_for(&mut events, |e| *e == NetconfEvent::Locked).await;
    client.unlock().await.unwrap();
    wait_for(&mut events, |e| *e == NetconfEvent::Unlocked).await;
}

#[tokio::test]
async fn refused_lock_is_an_rpc_error() {
    let (client, mut events, peer) = connect_default().await;
    let _server = serve(peer, |request| {
        Some(error_reply(&message_id(request), "lock held by session 9"))
    });

    let err = client.lock().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Rpc);
    assert_eq!(err.message, "lock held by session 9");
    assert!(!drain(&mut events).contains(&NetconfEvent::Locked));
}

#[tokio::test]
async fn notifications_and_malformed_messages_do_not_end_the_session() {
    let (client, mut events, peer) = connect_default().await;
    let notification = r#"<notification xmlns="urn:ietf:params:xml:ns:netconf:notification:1.0"><eventTime>2024-05-01T10:00:00Z</eventTime><netconf-config-change/></notification>"#;
    peer.send_message(FramingMode::Chunked, notification);
    peer.send_message(FramingMode::Chunked, "<rpc-reply message-id='1'><data>");

    let NetconfEvent::Notification { xml } =
        wait_for(&mut events, |e| matches!(e, NetconfEvent::Notification { .. })).await
    else {
        unreachable!()
    };
    assert_eq!(xml, notification);
    let NetconfEvent::NetconfError { xml, .. } =
        wait_for(&mut events, |e| matches!(e, NetconfEvent::NetconfError { .. })).await
    else {
        unreachable!()
    };
    assert!(xml.is_some());

    let _server = serve(peer, |request| Some(ok_reply(&message_id(request))));
    assert!(client.rpc("<get/>", None).await.unwrap().is_ok());
}

#[tokio::test]
async fn remote_close_fails_pending_requests_and_allows_reconnect() {
    let (client, mut events, mut peer) = connect_default().await;

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.rpc("<get/>", None).await }
    });
    peer.recv_message().await.unwrap();
    peer.close();

    assert_eq!(
        pending.await.unwrap().unwrap_err().kind,
        ErrorKind::NotConnected
    );
    wait_for(&mut events, |e| *e == NetconfEvent::Disconnected).await;
    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(client.framing_mode(), FramingMode::EndOfMessage);

    let (transport, mut peer) = memory_pair();
    peer.send_message(FramingMode::EndOfMessage, &hello(&[BASE_1_0, BASE_1_1], 43));
    let info = client
        .connect_with(&MemoryConnector::new(transport), &NoPrompt)
        .await
        .unwrap();
    assert_eq!(info.session_id, Some(43));
    assert!(peer.recv_message().await.is_some());
}

#[tokio::test]
async fn disconnect_closes_the_transport() {
    let (client, mut events, mut peer) = connect_default().await;
    client.disconnect().await.unwrap();

    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(peer.recv_message().await, None);
    wait_for(&mut events, |e| *e == NetconfEvent::Disconnected).await;

    // Nothing left to disconnect.
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn dropping_every_handle_ends_the_session() {
    let (client, _events, mut peer) = connect_default().await;
    drop(client);
    assert_eq!(peer.recv_message().await, None);
}
