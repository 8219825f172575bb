//! Veth pairs and per-interface operations
//!
//! Pairs are always created in the reference namespace. Until an end is
//! moved it can only be found there, which is why [`LinkOps::move_end`] also
//! looks it up from the reference namespace.

use rtnetlink::{LinkUnspec, LinkVeth};
use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::Path;

use netweave_core::{
    Cidr, Error, IfName, InterfaceState, LinkOps, NetConfig, ResourceKind, Result,
};

use crate::netlink::{dump_interfaces, find_link, in_namespace, request_error, require_link};

/// Kernel-backed [`LinkOps`]
#[derive(Debug, Clone)]
pub struct VethManager {
    config: NetConfig,
}

impl VethManager {
    /// Create a new veth manager
    #[must_use]
    pub const fn new(config: NetConfig) -> Self {
        Self { config }
    }

    /// Reference namespace path
    #[must_use]
    pub fn reference(&self) -> &Path {
        self.config.reference()
    }
}

impl LinkOps for VethManager {
    fn create_pair(&self, name_a: &IfName, name_b: &IfName) -> Result<()> {
        in_namespace(self.reference(), |handle| async move {
            for name in [name_a, name_b] {
                if find_link(&handle, name.as_str()).await?.is_some() {
                    return Err(Error::already_exists(ResourceKind::Interface, name.as_str()));
                }
            }

            handle
                .link()
                .add(LinkVeth::new(name_a.as_str(), name_b.as_str()).build())
                .execute()
                .await
                .map_err(|e| {
                    request_error(
                        "veth add",
                        ResourceKind::Veth,
                        format!("{name_a}<->{name_b}"),
                        e,
                    )
                })
        })?;

        tracing::info!(name_a = %name_a, name_b = %name_b, "Veth pair created");
        Ok(())
    }

    fn move_end(&self, ifname: &IfName, target: &Path) -> Result<()> {
        let namespace = File::open(target).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found(ResourceKind::Namespace, target.display().to_string())
            } else {
                Error::kernel("namespace open", target.display().to_string(), e)
            }
        })?;

        in_namespace(self.reference(), |handle| async move {
            let link = require_link(&handle, ResourceKind::Interface, ifname.as_str()).await?;

            // The namespace fd must stay open until the request completes
            handle
                .link()
                .set(
                    LinkUnspec::new_with_index(link.header.index)
                        .setns_by_fd(namespace.as_raw_fd())
                        .build(),
                )
                .execute()
                .await
                .map_err(|e| request_error("link setns", ResourceKind::Interface, ifname, e))
        })?;

        tracing::debug!(ifname = %ifname, namespace = %target.display(), "Moved interface");
        Ok(())
    }

    fn assign_address(&self, ifname: &IfName, cidr: &Cidr, namespace: &Path) -> Result<()> {
        in_namespace(namespace, |handle| async move {
            let link = require_link(&handle, ResourceKind::Interface, ifname.as_str()).await?;
            let index = link.header.index;

            match handle
                .address()
                .add(index, cidr.addr(), cidr.prefix_len())
                .execute()
                .await
            {
                Ok(()) => {}
                Err(e) => match request_error("address add", ResourceKind::Interface, ifname, e) {
                    Error::AlreadyExists { .. } => {
                        tracing::debug!(ifname = %ifname, address = %cidr, "Address already present");
                    }
                    other => return Err(other),
                },
            }

            handle
                .link()
                .set(LinkUnspec::new_with_index(index).up().build())
                .execute()
                .await
                .map_err(|e| request_error("link up", ResourceKind::Interface, ifname, e))
        })?;

        tracing::debug!(
            ifname = %ifname,
            address = %cidr,
            namespace = %namespace.display(),
            "Assigned address"
        );
        Ok(())
    }

    fn delete(&self, ifname: &IfName, namespace: &Path) -> Result<()> {
        in_namespace(namespace, |handle| async move {
            let link = require_link(&handle, ResourceKind::Interface, ifname.as_str()).await?;

            handle
                .link()
                .del(link.header.index)
                .execute()
                .await
                .map_err(|e| request_error("link del", ResourceKind::Interface, ifname, e))
        })?;

        tracing::debug!(ifname = %ifname, namespace = %namespace.display(), "Deleted interface");
        Ok(())
    }

    fn interface(&self, ifname: &str, namespace: &Path) -> Result<InterfaceState> {
        self.interfaces(namespace)?
            .into_iter()
            .find(|state| state.name == ifname)
            .ok_or_else(|| Error::not_found(ResourceKind::Interface, ifname))
    }

    fn interfaces(&self, namespace: &Path) -> Result<Vec<InterfaceState>> {
        in_namespace(namespace, |handle| async move { dump_interfaces(&handle).await })
    }
}
