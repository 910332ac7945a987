//! Classification of inbound NETCONF messages.
//!
//! Every framed message is parsed once with a read-only DOM and reduced to
//! the handful of facts the session engine routes on: the root element, the
//! `message-id` of replies, and whether a reply is `<ok/>`, data or an
//! `<rpc-error>`. The original XML text travels alongside for event
//! consumers.

use roxmltree::{Document, Node};

use crate::error::{NetconfError, NetconfResult};

/// A classified inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// `<hello>` from the server
    Hello(ServerHello),
    /// `<rpc-reply>` to one of our requests
    RpcReply(RpcReply),
    /// `<notification>` pushed by the server
    Notification,
    /// Any other root element
    Unknown {
        /// Local name of the root element
        root: String,
    },
}

/// Facts extracted from the server `<hello>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerHello {
    /// Session id assigned by the server
    pub session_id: Option<u64>,
    /// Advertised capability URIs, in document order
    pub capabilities: Vec<String>,
}

/// Facts extracted from an `<rpc-reply>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcReply {
    /// Correlation id, `None` if the server omitted it
    pub message_id: Option<String>,
    /// How the reply resolved
    pub outcome: ReplyOutcome,
}

/// Resolution of an `<rpc-reply>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Reply contains `<ok/>`
    Ok,
    /// Reply carries data
    Data,
    /// Reply has at least one `<rpc-error>` child
    Error {
        /// Text of the first `error-message`, or a fallback
        message: String,
    },
}

impl ReplyOutcome {
    /// Whether the server reported an error
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Parse `xml` and classify it by root element.
///
/// # Errors
///
/// Returns a `MalformedMessage` error carrying the XML when it is not
/// well-formed.
pub fn parse_message(xml: &str) -> NetconfResult<InboundMessage> {
    let doc = parse_document(xml)?;
    let root = doc.root_element();
    let message = match root.tag_name().name() {
        "hello" => InboundMessage::Hello(parse_hello(root)),
        "rpc-reply" => InboundMessage::RpcReply(parse_reply(root)),
        "notification" => InboundMessage::Notification,
        other => InboundMessage::Unknown {
            root: other.to_string(),
        },
    };
    Ok(message)
}

/// Concatenated text of the `<data>` element of an `<rpc-reply>`.
///
/// Entity references and CDATA sections are decoded, so for a
/// `<get-schema>` reply this is the raw module source.
///
/// # Errors
///
/// Returns a `MalformedMessage` error when `xml` is not well-formed.
pub fn reply_data_text(xml: &str) -> NetconfResult<Option<String>> {
    let doc = parse_document(xml)?;
    Ok(child(doc.root_element(), "data").map(text_content))
}

pub(crate) fn parse_document(xml: &str) -> NetconfResult<Document<'_>> {
    Document::parse(xml)
        .map_err(|e| NetconfError::malformed(format!("not well-formed XML: {e}")).with_xml(xml))
}

fn parse_hello(root: Node<'_, '_>) -> ServerHello {
    let session_id = child(root, "session-id")
        .map(text_content)
        .and_then(|id| id.trim().parse().ok());
    let capabilities = child(root, "capabilities")
        .map(|caps| {
            elements(caps, "capability")
                .map(|c| text_content(c).trim().to_string())
                .filter(|uri| !uri.is_empty())
                .collect()
        })
        .unwrap_or_default();
    ServerHello {
        session_id,
        capabilities,
    }
}

fn parse_reply(root: Node<'_, '_>) -> RpcReply {
    let message_id = attribute(root, "message-id").map(str::to_string);

    // Only a direct child counts; payloads may carry their own rpc-error elements.
    let outcome = if let Some(error) = child(root, "rpc-error") {
        ReplyOutcome::Error {
            message: rpc_error_message(error),
        }
    } else if child(root, "ok").is_some() {
        ReplyOutcome::Ok
    } else {
        ReplyOutcome::Data
    };

    RpcReply {
        message_id,
        outcome,
    }
}

fn rpc_error_message(error: Node<'_, '_>) -> String {
    let find = |name: &str| {
        error
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == name)
            .map(|n| text_content(n).trim().to_string())
            .filter(|text| !text.is_empty())
    };
    find("error-message")
        .or_else(|| find("error-tag").map(|tag| format!("rpc-error: {tag}")))
        .unwrap_or_else(|| "rpc-error without error-message".to_string())
}

/// Attribute by local name, ignoring any namespace prefix.
pub(crate) fn attribute<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name() == name)
        .map(|a| a.value())
}

/// First child element with the given local name.
pub(crate) fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    elements(node, name).next()
}

/// Child elements with the given local name.
pub(crate) fn elements<'a, 'input>(
    node: Node<'a, 'input>,
    name: &str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    let name = name.to_string();
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

/// All descendant text of `node`, concatenated.
pub(crate) fn text_content(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect()
}
