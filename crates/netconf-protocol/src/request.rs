//! Outbound request preparation.
//!
//! Callers may hand the client either a complete `<rpc>` element or just the
//! operation inside it. Either way the request that goes on the wire is an
//! `<rpc>` with a `message-id` the session engine can correlate on.

use crate::NETCONF_BASE_NS;
use crate::error::{NetconfError, NetconfResult};
use crate::message::{attribute, parse_document};

/// A request ready for framing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    /// Correlation id of the request
    pub message_id: String,
    /// Full `<rpc>` document
    pub xml: String,
}

/// Turn caller XML into an `<rpc>` with a `message-id`.
///
/// - an `<rpc>` that already carries a `message-id` is sent unchanged
/// - an `<rpc>` without one gets `allocate()` inserted into its start tag
/// - anything else is wrapped in `<rpc message-id="..." xmlns="...">`
///
/// # Errors
///
/// Returns an `InvalidRequest` error when `xml` is not well-formed.
pub fn prepare_request<F>(xml: &str, allocate: F) -> NetconfResult<PreparedRequest>
where
    F: FnOnce() -> String,
{
    let doc = parse_document(xml).map_err(|e| NetconfError::invalid_request(e.message))?;
    let root = doc.root_element();

    if root.tag_name().name() != "rpc" {
        let message_id = allocate();
        let body = strip_declaration(xml);
        return Ok(PreparedRequest {
            xml: format!(r#"<rpc message-id="{message_id}" xmlns="{NETCONF_BASE_NS}">{body}</rpc>"#),
            message_id,
        });
    }

    if let Some(existing) = attribute(root, "message-id") {
        return Ok(PreparedRequest {
            message_id: existing.to_string(),
            xml: xml.to_string(),
        });
    }

    let message_id = allocate();
    let start = root.range().start;
    let name_len = xml[start + 1..]
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .ok_or_else(|| NetconfError::invalid_request("unterminated rpc start tag"))?;
    let insert_at = start + 1 + name_len;

    let mut out = String::with_capacity(xml.len() + message_id.len() + 16);
    out.push_str(&xml[..insert_at]);
    out.push_str(&format!(r#" message-id="{message_id}""#));
    out.push_str(&xml[insert_at..]);
    Ok(PreparedRequest {
        message_id,
        xml: out,
    })
}

/// Drop a leading `<?xml ...?>` declaration.
fn strip_declaration(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    if let Some(rest) = trimmed.strip_prefix("<?xml")
        && let Some(end) = rest.find("?>")
    {
        return rest[end + 2..].trim();
    }
    xml.trim()
}
