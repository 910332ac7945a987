//! Discovery and download of the server's YANG modules.
//!
//! The server inventory is read from the richest source its capabilities
//! advertise, flattened into one work queue, and every entry is fetched with
//! `<get-schema>` exactly once. A module that cannot be fetched is reported
//! and skipped; the download carries on with the next one.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use netconf_protocol::operations;
use netconf_protocol::yang_library::{flatten, parse_library_reply};
use netconf_protocol::{
    Capability, CapabilitySet, ErrorKind, LibraryFlavor, NetconfError, NetconfResult,
    YangModuleDescriptor,
};
use netconf_transport::BoxFuture;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::events::{EventEmitter, NetconfEvent};
use crate::registry::RpcResponse;

/// Something that can run requests on an established session
pub trait RpcExecutor: Send + Sync {
    /// Send `request` and wait for its reply
    fn execute<'a>(
        &'a self,
        request: &'a str,
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, NetconfResult<RpcResponse>>;

    /// Capabilities negotiated for the session
    fn capabilities(&self) -> CapabilitySet;
}

/// Outcome of a schema download
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaSummary {
    /// Modules in the work queue
    pub total: usize,
    /// Modules downloaded
    pub fetched: usize,
    /// Modules that could not be downloaded
    pub failed: usize,
}

/// Which inventory to read for a capability set, richest first
#[must_use]
pub fn discovery_flavor(capabilities: &CapabilitySet) -> Option<LibraryFlavor> {
    if capabilities.contains(Capability::YangLibrary11) {
        Some(LibraryFlavor::YangLibrary)
    } else if capabilities.contains(Capability::YangLibrary10) {
        Some(LibraryFlavor::ModulesState)
    } else if capabilities.contains(Capability::NetconfMonitoring) {
        Some(LibraryFlavor::MonitoringSchemas)
    } else {
        None
    }
}

/// Downloads YANG modules through an [`RpcExecutor`]
pub struct SchemaFetcher<'a, E: ?Sized> {
    executor: &'a E,
    events: EventEmitter,
    timeout: Option<Duration>,
}

impl<E: ?Sized> fmt::Debug for SchemaFetcher<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaFetcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<'a, E: RpcExecutor + ?Sized> SchemaFetcher<'a, E> {
    /// Fetcher issuing requests through `executor` and reporting on `events`
    pub fn new(executor: &'a E, events: EventEmitter) -> Self {
        Self {
            executor,
            events,
            timeout: None,
        }
    }

    /// Timeout of each request, instead of the executor's default
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read the server inventory and return the download queue.
    ///
    /// # Errors
    ///
    /// Returns a `Schema` error when the server advertises no inventory or
    /// its reply cannot be understood, and the request error when the
    /// inventory request itself fails.
    pub async fn discover(&self) -> NetconfResult<Vec<YangModuleDescriptor>> {
        let Some(flavor) = discovery_flavor(&self.executor.capabilities()) else {
            let error = NetconfError::schema(
                "server supports neither yang-library nor netconf-monitoring",
            );
            self.events.emit_error(error.message.clone(), None);
            return Err(error);
        };
        let request = match flavor {
            LibraryFlavor::YangLibrary => operations::get_yang_library(),
            LibraryFlavor::ModulesState => operations::get_modules_state(),
            LibraryFlavor::MonitoringSchemas => operations::get_monitoring_schemas(),
        };
        debug!(?flavor, "Reading module inventory");

        let response = self
            .executor
            .execute(&request, self.timeout)
            .await?
            .into_result()?;
        let modules = parse_library_reply(&response.xml, flavor).inspect_err(|e| {
            self.events
                .emit_error(e.message.clone(), e.xml().map(str::to_string));
        })?;
        Ok(flatten(modules))
    }

    /// Download every module of the inventory.
    ///
    /// With a `destination`, each module is also written to
    /// `<destination>/<name>.yang`, or `<name>@<revision>.yang` when
    /// `include_revision` is set and the revision is known.
    ///
    /// Each downloaded module is delivered as a
    /// [`NetconfEvent::YangDefinition`], waiting while the event channel is
    /// full.
    ///
    /// # Errors
    ///
    /// Fails when discovery fails or `destination` cannot be created.
    /// Failures of single modules only count towards
    /// [`SchemaSummary::failed`].
    pub async fn fetch_all(
        &self,
        destination: Option<&Path>,
        include_revision: bool,
    ) -> NetconfResult<SchemaSummary> {
        let mut queue = self.discover().await?;
        if let Some(dir) = destination {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                NetconfError::io(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        // Popped from the end, so reverse to download in inventory order.
        queue.reverse();
        let mut summary = SchemaSummary {
            total: queue.len(),
            ..SchemaSummary::default()
        };
        info!(total = summary.total, "Downloading YANG modules");

        let mut index = 0;
        while let Some(module) = queue.pop() {
            index += 1;
            match self.fetch_one(&module, destination, include_revision).await {
                Ok(yang) => {
                    summary.fetched += 1;
                    debug!(module = %module.name, index, bytes = yang.len(), "Module downloaded");
                    self.events
                        .deliver(NetconfEvent::YangDefinition {
                            name: module.name,
                            revision: module.revision,
                            yang,
                            index,
                            total: summary.total,
                        })
                        .await;
                }
                Err(error) if error.kind == ErrorKind::NotConnected => {
                    warn!(remaining = queue.len() + 1, "Session lost during schema download");
                    return Err(error);
                }
                Err(error) => {
                    summary.failed += 1;
                    warn!(module = %module.name, error = %error, "Module download failed");
                    self.events.emit_error(
                        format!("{}: {}", module.name, error.message),
                        error.xml().map(str::to_string),
                    );
                }
            }
        }
        info!(
            fetched = summary.fetched,
            failed = summary.failed,
            "Schema download finished"
        );
        Ok(summary)
    }

    async fn fetch_one(
        &self,
        module: &YangModuleDescriptor,
        destination: Option<&Path>,
        include_revision: bool,
    ) -> NetconfResult<String> {
        let path = destination
            .map(|dir| module.file_name(include_revision).map(|name| dir.join(name)))
            .transpose()?;
        let request = operations::get_schema(&module.name, module.revision.as_deref());
        let response = self
            .executor
            .execute(&request, self.timeout)
            .await?
            .into_result()?;
        let yang = response.data_text()?.ok_or_else(|| {
            NetconfError::schema("get-schema reply carries no <data>").with_xml(response.xml)
        })?;

        if let Some(path) = path {
            tokio::fs::write(&path, yang.as_bytes())
                .await
                .map_err(|e| NetconfError::io(format!("cannot write {}: {e}", path.display())))?;
        }
        Ok(yang)
    }
}
