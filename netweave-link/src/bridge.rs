//! Bridge devices scoped to one namespace

use rtnetlink::{LinkBridge, LinkUnspec};
use std::path::Path;

use netweave_core::{BridgeOps, Error, IfName, ResourceKind, Result};

use crate::netlink::{find_link, in_namespace, link_kind, request_error, require_link};

/// Kernel-backed [`BridgeOps`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeManager;

impl BridgeManager {
    /// Create a new bridge manager
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BridgeOps for BridgeManager {
    fn create(&self, name: &IfName, namespace: &Path) -> Result<()> {
        in_namespace(namespace, |handle| async move {
            if find_link(&handle, name.as_str()).await?.is_some() {
                return Err(Error::already_exists(ResourceKind::Bridge, name.as_str()));
            }

            handle
                .link()
                .add(LinkBridge::new(name.as_str()).build())
                .execute()
                .await
                .map_err(|e| request_error("bridge add", ResourceKind::Bridge, name, e))?;

            let bridge = require_link(&handle, ResourceKind::Bridge, name.as_str()).await?;
            handle
                .link()
                .set(LinkUnspec::new_with_index(bridge.header.index).up().build())
                .execute()
                .await
                .map_err(|e| request_error("link up", ResourceKind::Bridge, name, e))
        })?;

        tracing::info!(bridge = %name, namespace = %namespace.display(), "Bridge created");
        Ok(())
    }

    fn attach_interface(&self, bridge: &IfName, ifname: &IfName, namespace: &Path) -> Result<()> {
        in_namespace(namespace, |handle| async move {
            let controller = require_link(&handle, ResourceKind::Bridge, bridge.as_str()).await?;
            if link_kind(&controller).is_some_and(|kind| kind != "bridge") {
                return Err(Error::invalid(format!("'{bridge}' is not a bridge")));
            }

            let port = require_link(&handle, ResourceKind::Interface, ifname.as_str()).await?;

            handle
                .link()
                .set(
                    LinkUnspec::new_with_index(port.header.index)
                        .controller(controller.header.index)
                        .up()
                        .build(),
                )
                .execute()
                .await
                .map_err(|e| request_error("bridge attach", ResourceKind::Interface, ifname, e))
        })?;

        tracing::debug!(
            bridge = %bridge,
            ifname = %ifname,
            namespace = %namespace.display(),
            "Attached interface to bridge"
        );
        Ok(())
    }

    fn delete(&self, name: &IfName, namespace: &Path) -> Result<()> {
        if !namespace.exists() {
            tracing::debug!(
                bridge = %name,
                namespace = %namespace.display(),
                "Namespace already gone, bridge went with it"
            );
            return Ok(());
        }

        in_namespace(namespace, |handle| async move {
            let bridge = require_link(&handle, ResourceKind::Bridge, name.as_str()).await?;

            handle
                .link()
                .del(bridge.header.index)
                .execute()
                .await
                .map_err(|e| request_error("bridge del", ResourceKind::Bridge, name, e))
        })?;

        tracing::info!(bridge = %name, namespace = %namespace.display(), "Bridge deleted");
        Ok(())
    }
}
