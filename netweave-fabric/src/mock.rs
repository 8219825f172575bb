//! In-memory kernel model for testing without root
//!
//! Models just enough of the kernel for lifecycle and topology logic:
//! namespaces keyed by path (the reference namespace always exists), veth
//! pairs whose ends die together, bridges and their ports, and addresses.
//! Moving an interface to another namespace takes it down and flushes its
//! addresses, as the kernel does.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;

use netweave_core::{
    BridgeOps, Cidr, Error, IfName, InterfaceState, LinkOps, Namespace, NamespaceOps, NetConfig,
    ResourceKind, ResourceName, Result,
};

/// Mock kernel (doesn't touch the system)
///
/// Clones share state, so one mock can back every ops trait at once.
///
/// # Example
/// ```
/// use netweave_core::{IfName, LinkOps, NamespaceOps, ResourceName};
/// use netweave_fabric::MockKernel;
///
/// let kernel = MockKernel::new();
/// let h1 = kernel.create(&ResourceName::new("h1").unwrap()).unwrap();
///
/// let (a, b) = (IfName::new("h1-s1").unwrap(), IfName::new("s1-h1").unwrap());
/// kernel.create_pair(&a, &b).unwrap();
/// kernel.move_end(&a, &h1.path).unwrap();
///
/// assert!(kernel.has_interface(&h1.path, "h1-s1"));
/// assert!(!kernel.has_interface(kernel.reference(), "h1-s1"));
/// ```
#[derive(Clone)]
pub struct MockKernel {
    config: NetConfig,
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum MockKind {
    Loopback,
    Veth { peer: u32 },
    Bridge,
}

#[derive(Debug, Clone)]
struct MockLink {
    name: String,
    index: u32,
    kind: MockKind,
    up: bool,
    master: Option<String>,
    addresses: Vec<Cidr>,
}

#[derive(Default)]
struct MockState {
    namespaces: BTreeMap<PathBuf, Vec<MockLink>>,
    next_index: u32,
    commands: Vec<(PathBuf, Vec<String>)>,
    failures: HashSet<&'static str>,
    call_count: usize,
}

impl MockState {
    fn allocate_index(&mut self) -> u32 {
        self.next_index += 1;
        self.next_index
    }

    fn loopback(&mut self) -> MockLink {
        MockLink {
            name: "lo".to_string(),
            index: self.allocate_index(),
            kind: MockKind::Loopback,
            up: true,
            master: None,
            addresses: Vec::new(),
        }
    }

    /// Count the call and fail it if a failure was injected for `operation`
    fn enter(&mut self, operation: &'static str, target: &str) -> Result<()> {
        self.call_count += 1;
        if self.failures.contains(operation) {
            return Err(Error::kernel(operation, target, "injected failure"));
        }
        Ok(())
    }

    fn links(&self, namespace: &Path) -> Result<&Vec<MockLink>> {
        self.namespaces
            .get(namespace)
            .ok_or_else(|| Error::not_found(ResourceKind::Namespace, namespace.display().to_string()))
    }

    fn links_mut(&mut self, namespace: &Path) -> Result<&mut Vec<MockLink>> {
        self.namespaces
            .get_mut(namespace)
            .ok_or_else(|| Error::not_found(ResourceKind::Namespace, namespace.display().to_string()))
    }

    fn link_mut(&mut self, namespace: &Path, kind: ResourceKind, name: &str) -> Result<&mut MockLink> {
        self.links_mut(namespace)?
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| Error::not_found(kind, name))
    }

    /// Remove links matching `doomed` everywhere, plus veth peers and port bindings
    fn destroy(&mut self, mut doomed: HashSet<u32>) {
        for links in self.namespaces.values() {
            for link in links {
                if let MockKind::Veth { peer } = link.kind {
                    if doomed.contains(&link.index) || doomed.contains(&peer) {
                        doomed.insert(link.index);
                        doomed.insert(peer);
                    }
                }
            }
        }

        for links in self.namespaces.values_mut() {
            let removed: Vec<String> = links
                .iter()
                .filter(|l| doomed.contains(&l.index) && l.kind == MockKind::Bridge)
                .map(|l| l.name.clone())
                .collect();

            links.retain(|l| !doomed.contains(&l.index));

            for link in links.iter_mut() {
                if link.master.as_ref().is_some_and(|m| removed.contains(m)) {
                    link.master = None;
                }
            }
        }
    }
}

fn state_of(link: &MockLink, links: &[MockLink]) -> InterfaceState {
    InterfaceState {
        name: link.name.clone(),
        index: link.index,
        kind: match link.kind {
            MockKind::Loopback => None,
            MockKind::Veth { .. } => Some("veth".to_string()),
            MockKind::Bridge => Some("bridge".to_string()),
        },
        up: link.up,
        master: link
            .master
            .clone()
            .filter(|m| links.iter().any(|l| &l.name == m)),
        addresses: link.addresses.clone(),
    }
}

impl MockKernel {
    /// Create a mock kernel with default paths
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(NetConfig::default())
    }

    /// Create a mock kernel using the paths of `config`
    #[must_use]
    pub fn with_config(config: NetConfig) -> Self {
        let mut state = MockState::default();
        let lo = state.loopback();
        state
            .namespaces
            .insert(config.reference_netns.clone(), vec![lo]);

        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Configuration the mock was built with
    #[must_use]
    pub const fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Reference namespace path
    #[must_use]
    pub fn reference(&self) -> &Path {
        self.config.reference()
    }

    /// Paths of all namespaces, reference namespace included
    #[must_use]
    pub fn namespaces(&self) -> Vec<PathBuf> {
        self.state.lock().namespaces.keys().cloned().collect()
    }

    /// Names of the interfaces in `namespace`, empty if it does not exist
    #[must_use]
    pub fn interface_names(&self, namespace: &Path) -> Vec<String> {
        self.state
            .lock()
            .namespaces
            .get(namespace)
            .map(|links| links.iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Whether `ifname` exists in `namespace`
    #[must_use]
    pub fn has_interface(&self, namespace: &Path, ifname: &str) -> bool {
        self.interface_names(namespace).iter().any(|n| n == ifname)
    }

    /// Number of veth pairs alive anywhere
    #[must_use]
    pub fn veth_pairs(&self) -> usize {
        let state = self.state.lock();
        let ends = state
            .namespaces
            .values()
            .flatten()
            .filter(|l| matches!(l.kind, MockKind::Veth { .. }))
            .count();
        ends / 2
    }

    /// Remove a namespace behind the fabric's back, as `ip netns del` would
    pub fn remove_namespace_externally(&self, namespace: &Path) {
        let mut state = self.state.lock();
        if let Some(links) = state.namespaces.remove(namespace) {
            let doomed = links.iter().map(|l| l.index).collect();
            state.destroy(doomed);
        }
    }

    /// Make every later call of `operation` fail (e.g. `"bridge attach"`)
    pub fn fail_operation(&self, operation: &'static str) {
        self.state.lock().failures.insert(operation);
    }

    /// Commands run through exec or attach, with their namespace
    #[must_use]
    pub fn commands(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.state.lock().commands.clone()
    }

    /// Get the number of kernel calls made (for testing)
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().call_count
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockKernel")
            .field("reference", &self.config.reference_netns)
            .finish_non_exhaustive()
    }
}

impl NamespaceOps for MockKernel {
    fn create(&self, name: &ResourceName) -> Result<Namespace> {
        let path = self.config.netns_path(name.as_str());
        let mut state = self.state.lock();
        state.enter("namespace create", name.as_str())?;

        if state.namespaces.contains_key(&path) {
            return Err(Error::already_exists(ResourceKind::Namespace, name.as_str()));
        }

        let lo = state.loopback();
        state.namespaces.insert(path.clone(), vec![lo]);

        tracing::debug!(namespace = %path.display(), "Mock: Created namespace");
        Ok(Namespace::new(name.clone(), path))
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock();
        state.enter("namespace delete", &path.display().to_string())?;

        if path == self.config.reference() {
            return Err(Error::kernel(
                "namespace delete",
                path.display().to_string(),
                "refusing to delete the reference namespace",
            ));
        }

        let links = state
            .namespaces
            .remove(path)
            .ok_or_else(|| Error::not_found(ResourceKind::Namespace, path.display().to_string()))?;
        state.destroy(links.iter().map(|l| l.index).collect());

        tracing::debug!(namespace = %path.display(), "Mock: Deleted namespace");
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.state.lock().namespaces.contains_key(path)
    }

    fn exec(&self, path: &Path, argv: &[String]) -> Result<ExitStatus> {
        if argv.is_empty() {
            return Err(Error::invalid("Command cannot be empty"));
        }

        let mut state = self.state.lock();
        state.enter("exec", &path.display().to_string())?;
        state.links(path)?;
        state.commands.push((path.to_path_buf(), argv.to_vec()));

        Ok(ExitStatus::from_raw(0))
    }

    fn attach(&self, path: &Path, name: &str) -> Result<ExitStatus> {
        let mut state = self.state.lock();
        state.enter("attach", &path.display().to_string())?;
        state.links(path)?;
        state
            .commands
            .push((path.to_path_buf(), vec![self.config.shell.display().to_string(), name.to_string()]));

        Ok(ExitStatus::from_raw(0))
    }
}

impl LinkOps for MockKernel {
    fn create_pair(&self, name_a: &IfName, name_b: &IfName) -> Result<()> {
        let reference = self.config.reference();
        let mut state = self.state.lock();
        state.enter("veth add", name_a.as_str())?;

        if name_a == name_b {
            return Err(Error::already_exists(ResourceKind::Interface, name_b.as_str()));
        }
        for name in [name_a, name_b] {
            if state.links(reference)?.iter().any(|l| l.name == name.as_str()) {
                return Err(Error::already_exists(ResourceKind::Interface, name.as_str()));
            }
        }

        let (index_a, index_b) = (state.allocate_index(), state.allocate_index());
        let end = |name: &IfName, index, peer| MockLink {
            name: name.to_string(),
            index,
            kind: MockKind::Veth { peer },
            up: false,
            master: None,
            addresses: Vec::new(),
        };
        let links = state.links_mut(reference)?;
        links.push(end(name_a, index_a, index_b));
        links.push(end(name_b, index_b, index_a));

        tracing::debug!(name_a = %name_a, name_b = %name_b, "Mock: Created veth pair");
        Ok(())
    }

    fn move_end(&self, ifname: &IfName, target: &Path) -> Result<()> {
        let reference = self.config.reference();
        let mut state = self.state.lock();
        state.enter("link setns", ifname.as_str())?;

        if state.links(target)?.iter().any(|l| l.name == ifname.as_str()) {
            return Err(Error::already_exists(ResourceKind::Interface, ifname.as_str()));
        }

        let links = state.links_mut(reference)?;
        let position = links
            .iter()
            .position(|l| l.name == ifname.as_str())
            .ok_or_else(|| Error::not_found(ResourceKind::Interface, ifname.as_str()))?;

        let mut link = links.remove(position);
        link.up = false;
        link.master = None;
        link.addresses.clear();
        state.links_mut(target)?.push(link);

        tracing::debug!(ifname = %ifname, namespace = %target.display(), "Mock: Moved interface");
        Ok(())
    }

    fn assign_address(&self, ifname: &IfName, cidr: &Cidr, namespace: &Path) -> Result<()> {
        let mut state = self.state.lock();
        state.enter("address add", ifname.as_str())?;

        let link = state.link_mut(namespace, ResourceKind::Interface, ifname.as_str())?;
        if !link.addresses.contains(cidr) {
            link.addresses.push(*cidr);
        }
        link.up = true;

        Ok(())
    }

    fn delete(&self, ifname: &IfName, namespace: &Path) -> Result<()> {
        let mut state = self.state.lock();
        state.enter("link del", ifname.as_str())?;

        let index = state.link_mut(namespace, ResourceKind::Interface, ifname.as_str())?.index;
        state.destroy(HashSet::from([index]));

        Ok(())
    }

    fn interface(&self, ifname: &str, namespace: &Path) -> Result<InterfaceState> {
        self.interfaces(namespace)?
            .into_iter()
            .find(|s| s.name == ifname)
            .ok_or_else(|| Error::not_found(ResourceKind::Interface, ifname))
    }

    fn interfaces(&self, namespace: &Path) -> Result<Vec<InterfaceState>> {
        let state = self.state.lock();
        let links = state.links(namespace)?;
        Ok(links.iter().map(|l| state_of(l, links)).collect())
    }
}

impl BridgeOps for MockKernel {
    fn create(&self, name: &IfName, namespace: &Path) -> Result<()> {
        let mut state = self.state.lock();
        state.enter("bridge add", name.as_str())?;

        if state.links(namespace)?.iter().any(|l| l.name == name.as_str()) {
            return Err(Error::already_exists(ResourceKind::Bridge, name.as_str()));
        }

        let index = state.allocate_index();
        state.links_mut(namespace)?.push(MockLink {
            name: name.to_string(),
            index,
            kind: MockKind::Bridge,
            up: true,
            master: None,
            addresses: Vec::new(),
        });

        Ok(())
    }

    fn attach_interface(&self, bridge: &IfName, ifname: &IfName, namespace: &Path) -> Result<()> {
        let mut state = self.state.lock();
        state.enter("bridge attach", ifname.as_str())?;

        let controller = state.link_mut(namespace, ResourceKind::Bridge, bridge.as_str())?;
        if controller.kind != MockKind::Bridge {
            return Err(Error::invalid(format!("'{bridge}' is not a bridge")));
        }

        let port = state.link_mut(namespace, ResourceKind::Interface, ifname.as_str())?;
        port.master = Some(bridge.to_string());
        port.up = true;

        Ok(())
    }

    fn delete(&self, name: &IfName, namespace: &Path) -> Result<()> {
        let mut state = self.state.lock();
        state.enter("bridge del", name.as_str())?;

        if !state.namespaces.contains_key(namespace) {
            return Ok(());
        }

        let index = state.link_mut(namespace, ResourceKind::Bridge, name.as_str())?.index;
        state.destroy(HashSet::from([index]));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ifname(s: &str) -> IfName {
        IfName::new(s).unwrap()
    }

    fn namespace(kernel: &MockKernel, name: &str) -> PathBuf {
        NamespaceOps::create(kernel, &ResourceName::new(name).unwrap())
            .unwrap()
            .path
    }

    #[test]
    fn test_namespace_lifecycle() {
        let kernel = MockKernel::new();
        let h1 = namespace(&kernel, "h1");

        assert!(kernel.exists(&h1));
        assert!(kernel.has_interface(&h1, "lo"));
        assert!(
            NamespaceOps::create(&kernel, &ResourceName::new("h1").unwrap())
                .unwrap_err()
                .is_already_exists()
        );

        NamespaceOps::delete(&kernel, &h1).unwrap();
        assert!(!kernel.exists(&h1));
        assert!(NamespaceOps::delete(&kernel, &h1).unwrap_err().is_not_found());
    }

    #[test]
    fn test_deleting_namespace_kills_veth_peer() {
        let kernel = MockKernel::new();
        let h1 = namespace(&kernel, "h1");
        let h2 = namespace(&kernel, "h2");

        kernel.create_pair(&ifname("h1-h2"), &ifname("h2-h1")).unwrap();
        kernel.move_end(&ifname("h1-h2"), &h1).unwrap();
        kernel.move_end(&ifname("h2-h1"), &h2).unwrap();
        assert_eq!(kernel.veth_pairs(), 1);

        NamespaceOps::delete(&kernel, &h1).unwrap();
        assert!(!kernel.has_interface(&h2, "h2-h1"));
        assert_eq!(kernel.veth_pairs(), 0);
    }

    #[test]
    fn test_move_resets_link_state() {
        let kernel = MockKernel::new();
        let h1 = namespace(&kernel, "h1");
        let reference = kernel.reference().to_path_buf();
        let cidr: Cidr = "10.0.0.1/24".parse().unwrap();

        kernel.create_pair(&ifname("a"), &ifname("b")).unwrap();
        kernel.assign_address(&ifname("a"), &cidr, &reference).unwrap();
        kernel.move_end(&ifname("a"), &h1).unwrap();

        let state = kernel.interface("a", &h1).unwrap();
        assert!(!state.up);
        assert!(state.addresses.is_empty());
    }

    #[test]
    fn test_bridge_delete_clears_ports() {
        let kernel = MockKernel::new();
        let s1 = namespace(&kernel, "s1");

        BridgeOps::create(&kernel, &ifname("br-s1"), &s1).unwrap();
        kernel.create_pair(&ifname("s1-h1"), &ifname("h1-s1")).unwrap();
        kernel.move_end(&ifname("s1-h1"), &s1).unwrap();
        kernel
            .attach_interface(&ifname("br-s1"), &ifname("s1-h1"), &s1)
            .unwrap();
        assert_eq!(
            kernel.interface("s1-h1", &s1).unwrap().master.as_deref(),
            Some("br-s1")
        );

        BridgeOps::delete(&kernel, &ifname("br-s1"), &s1).unwrap();
        assert_eq!(kernel.interface("s1-h1", &s1).unwrap().master, None);

        // Namespace gone: nothing to do
        NamespaceOps::delete(&kernel, &s1).unwrap();
        BridgeOps::delete(&kernel, &ifname("br-s1"), &s1).unwrap();
    }

    #[test]
    fn test_injected_failure() {
        let kernel = MockKernel::new();
        kernel.fail_operation("veth add");

        let err = kernel.create_pair(&ifname("a"), &ifname("b")).unwrap_err();
        assert!(matches!(err, Error::KernelOperation { .. }));
        assert_eq!(kernel.veth_pairs(), 0);
        assert_eq!(kernel.call_count(), 1);
    }
}
