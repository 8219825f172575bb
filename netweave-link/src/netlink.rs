//! rtnetlink session inside a namespace, lookups and state decoding

use futures::TryStreamExt;
use netlink_packet_route::address::{AddressAttribute, AddressMessage};
use netlink_packet_route::link::{InfoKind, LinkAttribute, LinkFlags, LinkInfo, LinkMessage};
use rtnetlink::Handle;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::path::Path;

use netweave_core::{Cidr, Error, InterfaceState, ResourceKind, Result};
use netweave_namespace::with_namespace;

/// Run `f` with a netlink handle bound to the namespace at `namespace`
///
/// The socket is opened after the worker has switched, so every request made
/// through the handle applies to that namespace.
pub(crate) fn in_namespace<T, F, Fut>(namespace: &Path, f: F) -> Result<T>
where
    F: FnOnce(Handle) -> Fut + Send,
    Fut: Future<Output = Result<T>>,
    T: Send,
{
    with_namespace(namespace, || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()?;

        runtime.block_on(async {
            let (connection, handle, _) = rtnetlink::new_connection()?;
            tokio::spawn(connection);
            f(handle).await
        })
    })
}

/// Errno carried by a netlink error reply
fn errno(err: &rtnetlink::Error) -> Option<i32> {
    match err {
        rtnetlink::Error::NetlinkError(msg) => Some(-msg.raw_code()),
        _ => None,
    }
}

/// Map a failed request to the error taxonomy
pub(crate) fn request_error(
    operation: &str,
    kind: ResourceKind,
    target: impl Display,
    err: rtnetlink::Error,
) -> Error {
    match errno(&err) {
        Some(libc::ENODEV) => Error::not_found(kind, target.to_string()),
        Some(libc::EEXIST) => Error::already_exists(kind, target.to_string()),
        _ => Error::kernel(operation, target.to_string(), err),
    }
}

/// Look up a link by name, `None` if it does not exist in this namespace
pub(crate) async fn find_link(handle: &Handle, name: &str) -> Result<Option<LinkMessage>> {
    let mut links = handle.link().get().match_name(name.to_string()).execute();

    match links.try_next().await {
        Ok(link) => Ok(link),
        Err(e) if errno(&e) == Some(libc::ENODEV) => Ok(None),
        Err(e) => Err(Error::kernel("link get", name, e)),
    }
}

/// Look up a link by name
pub(crate) async fn require_link(
    handle: &Handle,
    kind: ResourceKind,
    name: &str,
) -> Result<LinkMessage> {
    find_link(handle, name)
        .await?
        .ok_or_else(|| Error::not_found(kind, name))
}

/// Link name carried in the message attributes
pub(crate) fn link_name(link: &LinkMessage) -> Option<&str> {
    link.attributes.iter().find_map(|attr| match attr {
        LinkAttribute::IfName(name) => Some(name.as_str()),
        _ => None,
    })
}

/// Link kind carried in the message attributes
pub(crate) fn link_kind(link: &LinkMessage) -> Option<String> {
    link.attributes.iter().find_map(|attr| match attr {
        LinkAttribute::LinkInfo(infos) => infos.iter().find_map(|info| match info {
            LinkInfo::Kind(InfoKind::Veth) => Some("veth".to_string()),
            LinkInfo::Kind(InfoKind::Bridge) => Some("bridge".to_string()),
            LinkInfo::Kind(InfoKind::Other(other)) => Some(other.clone()),
            LinkInfo::Kind(other) => Some(format!("{other:?}").to_lowercase()),
            _ => None,
        }),
        _ => None,
    })
}

fn controller_index(link: &LinkMessage) -> Option<u32> {
    link.attributes.iter().find_map(|attr| match attr {
        LinkAttribute::Controller(index) => Some(*index),
        _ => None,
    })
}

fn address_of(msg: &AddressMessage) -> Option<Cidr> {
    msg.attributes.iter().find_map(|attr| match attr {
        AddressAttribute::Address(addr) => Cidr::new(*addr, msg.header.prefix_len).ok(),
        _ => None,
    })
}

/// Every link in this namespace with its addresses, ordered by index
pub(crate) async fn dump_interfaces(handle: &Handle) -> Result<Vec<InterfaceState>> {
    let links: Vec<LinkMessage> = handle
        .link()
        .get()
        .execute()
        .try_collect()
        .await
        .map_err(|e| Error::kernel("link dump", "*", e))?;

    let messages: Vec<AddressMessage> = handle
        .address()
        .get()
        .execute()
        .try_collect()
        .await
        .map_err(|e| Error::kernel("address dump", "*", e))?;

    let mut addresses: HashMap<u32, Vec<Cidr>> = HashMap::new();
    for msg in &messages {
        if let Some(cidr) = address_of(msg) {
            addresses.entry(msg.header.index).or_default().push(cidr);
        }
    }

    let names: HashMap<u32, String> = links
        .iter()
        .filter_map(|link| Some((link.header.index, link_name(link)?.to_string())))
        .collect();

    let mut states: Vec<InterfaceState> = links
        .iter()
        .map(|link| InterfaceState {
            name: names.get(&link.header.index).cloned().unwrap_or_default(),
            index: link.header.index,
            kind: link_kind(link),
            up: link.header.flags.contains(LinkFlags::Up),
            master: controller_index(link).and_then(|i| names.get(&i).cloned()),
            addresses: addresses.remove(&link.header.index).unwrap_or_default(),
        })
        .collect();

    states.sort_by_key(|s| s.index);
    Ok(states)
}
