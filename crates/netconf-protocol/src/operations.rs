//! Builders for the protocol operations the client issues on its own.

use crate::escape_text;
use crate::{MONITORING_NS, NOTIFICATION_NS, YANG_LIBRARY_NS};

/// Datastore targeted by lock operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Datastore {
    /// `<candidate/>`
    #[default]
    Candidate,
    /// `<running/>`
    Running,
    /// `<startup/>`
    Startup,
}

impl Datastore {
    fn element(self) -> &'static str {
        match self {
            Self::Candidate => "<candidate/>",
            Self::Running => "<running/>",
            Self::Startup => "<startup/>",
        }
    }
}

/// `<lock>` on `target`
#[must_use]
pub fn lock(target: Datastore) -> String {
    format!("<lock><target>{}</target></lock>", target.element())
}

/// `<unlock>` on `target`
#[must_use]
pub fn unlock(target: Datastore) -> String {
    format!("<unlock><target>{}</target></unlock>", target.element())
}

/// `<get>` of the RFC 8525 `yang-library` container
#[must_use]
pub fn get_yang_library() -> String {
    format!(
        r#"<get><filter type="subtree"><yang-library xmlns="{YANG_LIBRARY_NS}"/></filter></get>"#
    )
}

/// `<get>` of the RFC 7895 `modules-state` container
#[must_use]
pub fn get_modules_state() -> String {
    format!(
        r#"<get><filter type="subtree"><modules-state xmlns="{YANG_LIBRARY_NS}"/></filter></get>"#
    )
}

/// `<get>` of the RFC 6022 schema list
#[must_use]
pub fn get_monitoring_schemas() -> String {
    format!(
        r#"<get><filter type="subtree"><netconf-state xmlns="{MONITORING_NS}"><schemas/></netconf-state></filter></get>"#
    )
}

/// `<get-schema>` for one module, in YANG format.
///
/// `<version>` is only sent when a revision is known.
#[must_use]
pub fn get_schema(identifier: &str, version: Option<&str>) -> String {
    let mut xml = format!(
        r#"<get-schema xmlns="{MONITORING_NS}"><identifier>{}</identifier>"#,
        escape_text(identifier)
    );
    if let Some(version) = version.filter(|v| !v.is_empty()) {
        xml.push_str(&format!("<version>{}</version>", escape_text(version)));
    }
    xml.push_str("<format>yang</format></get-schema>");
    xml
}

/// RFC 5277 `<create-subscription>`, on the server's default stream unless `stream` is given
#[must_use]
pub fn create_subscription(stream: Option<&str>) -> String {
    let mut xml = format!(r#"<create-subscription xmlns="{NOTIFICATION_NS}">"#);
    if let Some(stream) = stream.filter(|s| !s.is_empty()) {
        xml.push_str(&format!("<stream>{}</stream>", escape_text(stream)));
    }
    xml.push_str("</create-subscription>");
    xml
}

/// `<close-session>`
#[must_use]
pub fn close_session() -> String {
    "<close-session/>".to_string()
}
