//! YANG module inventories.
//!
//! Three server-side inventories are understood:
//!
//! - RFC 8525 `yang-library` (`yang-library:1.1`): module sets holding
//!   implemented and import-only modules
//! - RFC 7895 `modules-state` (`yang-library:1.0`): one flat module list
//! - RFC 6022 `netconf-state/schemas`: the monitoring schema list, used when
//!   the server advertises neither YANG Library revision
//!
//! All of them reduce to [`YangModuleDescriptor`]s, which [`flatten`] turns
//! into the download queue.

use roxmltree::Node;
use serde::{Deserialize, Serialize};

use crate::error::{NetconfError, NetconfResult};
use crate::message::{child, elements, parse_document, text_content};

/// One module or submodule known to the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YangModuleDescriptor {
    /// Module name
    pub name: String,
    /// Revision date, if the server reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// XML namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Download location advertised by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Submodules included by this module
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub submodules: Vec<YangModuleDescriptor>,
}

impl YangModuleDescriptor {
    /// Descriptor with just a name and revision
    #[must_use]
    pub fn new(name: impl Into<String>, revision: Option<&str>) -> Self {
        Self {
            name: name.into(),
            revision: revision.map(str::to_string),
            ..Self::default()
        }
    }

    /// File name used when persisting the module source.
    ///
    /// # Errors
    ///
    /// Returns a `Schema` error when the name or revision could leave the
    /// destination directory: empty, `.`/`..`, or containing a path
    /// separator.
    pub fn file_name(&self, with_revision: bool) -> NetconfResult<String> {
        path_component(&self.name, "module name")?;
        match (&self.revision, with_revision) {
            (Some(revision), true) => {
                path_component(revision, "revision")?;
                Ok(format!("{}@{revision}.yang", self.name))
            }
            _ => Ok(format!("{}.yang", self.name)),
        }
    }
}

/// Server-supplied text that becomes part of a local file name
fn path_component(text: &str, what: &str) -> NetconfResult<()> {
    let unsafe_text = text.is_empty()
        || text == "."
        || text.contains("..")
        || text.contains(['/', '\\'])
        || text.chars().any(char::is_control);
    if unsafe_text {
        return Err(NetconfError::schema(format!(
            "{what} {text:?} is not usable as a file name"
        )));
    }
    Ok(())
}

/// Which inventory a reply carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryFlavor {
    /// RFC 8525 `yang-library`
    YangLibrary,
    /// RFC 7895 `modules-state`
    ModulesState,
    /// RFC 6022 `netconf-state/schemas`
    MonitoringSchemas,
}

/// Parse an `<rpc-reply>` carrying the given inventory.
///
/// # Errors
///
/// Returns a `MalformedMessage` error for XML that is not well-formed and a
/// `Schema` error when the reply does not contain the expected container.
pub fn parse_library_reply(
    xml: &str,
    flavor: LibraryFlavor,
) -> NetconfResult<Vec<YangModuleDescriptor>> {
    let doc = parse_document(xml)?;
    let data = child(doc.root_element(), "data")
        .ok_or_else(|| NetconfError::schema("reply carries no <data> element").with_xml(xml))?;

    let container = match flavor {
        LibraryFlavor::YangLibrary => child(data, "yang-library"),
        LibraryFlavor::ModulesState => child(data, "modules-state"),
        LibraryFlavor::MonitoringSchemas => {
            child(data, "netconf-state").and_then(|state| child(state, "schemas"))
        }
    }
    .ok_or_else(|| NetconfError::schema(format!("reply carries no {flavor:?} data")).with_xml(xml))?;

    let modules = match flavor {
        LibraryFlavor::YangLibrary => elements(container, "module-set")
            .flat_map(|set| {
                elements(set, "module").chain(elements(set, "import-only-module"))
            })
            .map(module)
            .collect(),
        LibraryFlavor::ModulesState => elements(container, "module").map(module).collect(),
        LibraryFlavor::MonitoringSchemas => elements(container, "schema")
            .filter(|schema| {
                leaf(*schema, "format")
                    .is_some_and(|format| format.rsplit(':').next() == Some("yang"))
            })
            .filter_map(|schema| {
                Some(YangModuleDescriptor {
                    name: leaf(schema, "identifier")?,
                    revision: leaf(schema, "version"),
                    namespace: leaf(schema, "namespace"),
                    location: leaf(schema, "location"),
                    submodules: Vec::new(),
                })
            })
            .collect(),
    };
    Ok(modules)
}

/// Flatten modules into the download queue.
///
/// Every submodule is promoted to its own entry right after its parent.
#[must_use]
pub fn flatten(modules: Vec<YangModuleDescriptor>) -> Vec<YangModuleDescriptor> {
    let mut queue = Vec::with_capacity(modules.len());
    for mut module in modules {
        let submodules = std::mem::take(&mut module.submodules);
        queue.push(module);
        queue.extend(flatten(submodules));
    }
    queue
}

fn module(node: Node<'_, '_>) -> YangModuleDescriptor {
    YangModuleDescriptor {
        name: leaf(node, "name").unwrap_or_default(),
        revision: leaf(node, "revision"),
        namespace: leaf(node, "namespace"),
        location: leaf(node, "location")
            .or_else(|| leaf(node, "schema"))
            .filter(|l| l != "NETCONF"),
        submodules: elements(node, "submodule").map(module).collect(),
    }
}

/// Trimmed text of a child leaf; empty leaves count as absent.
fn leaf(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name)
        .map(|n| text_content(n).trim().to_string())
        .filter(|text| !text.is_empty())
}
