use netweave_core::{BridgeOps, Cidr, IfName, LinkOps, NamespaceOps, NetConfig, ResourceName};
use netweave_link::{BridgeManager, VethManager};
use netweave_namespace::NetnsManager;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Lab {
    _dir: TempDir,
    config: NetConfig,
    netns: NetnsManager,
    paths: Vec<PathBuf>,
}

impl Lab {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = NetConfig::new().with_netns_dir(dir.path());
        Self {
            netns: NetnsManager::new(config.clone()),
            config,
            _dir: dir,
            paths: Vec::new(),
        }
    }

    fn namespace(&mut self, name: &str) -> PathBuf {
        let ns = self.netns.create(&ResourceName::new(name).unwrap()).unwrap();
        self.paths.push(ns.path.clone());
        ns.path
    }
}

impl Drop for Lab {
    fn drop(&mut self) {
        for path in &self.paths {
            let _ = self.netns.delete(path);
        }
    }
}

fn ifname(name: &str) -> IfName {
    IfName::new(name).unwrap()
}

fn names(links: &VethManager, ns: &Path) -> Vec<String> {
    links
        .interfaces(ns)
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect()
}

#[test]
fn test_bridge_delete_in_missing_namespace_succeeds() {
    let bridges = BridgeManager::new();
    bridges
        .delete(&ifname("br-gone"), Path::new("/nonexistent/netns/gone"))
        .unwrap();
}

#[test]
fn test_move_to_missing_namespace_is_not_found() {
    let links = VethManager::new(NetConfig::new());
    let err = links
        .move_end(&ifname("nw-a"), Path::new("/nonexistent/netns/gone"))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
#[ignore] // Requires root
fn test_veth_ends_follow_moves() {
    let mut lab = Lab::new();
    let n1 = lab.namespace("nwl-n1");
    let n2 = lab.namespace("nwl-n2");
    let links = VethManager::new(lab.config.clone());
    let reference = lab.config.reference().to_path_buf();

    let (a, b) = (ifname("nwl-a"), ifname("nwl-b"));
    links.create_pair(&a, &b).unwrap();

    let visible = names(&links, &reference);
    assert!(visible.contains(&"nwl-a".to_string()));
    assert!(visible.contains(&"nwl-b".to_string()));
    assert!(!names(&links, &n1).contains(&"nwl-a".to_string()));

    links.move_end(&a, &n1).unwrap();
    links.move_end(&b, &n2).unwrap();

    let visible = names(&links, &reference);
    assert!(!visible.contains(&"nwl-a".to_string()));
    assert!(!visible.contains(&"nwl-b".to_string()));
    assert!(names(&links, &n1).contains(&"nwl-a".to_string()));
    assert!(!names(&links, &n1).contains(&"nwl-b".to_string()));
    assert!(names(&links, &n2).contains(&"nwl-b".to_string()));

    // Already moved: no longer visible from the reference namespace
    assert!(links.move_end(&a, &n2).unwrap_err().is_not_found());
}

#[test]
#[ignore] // Requires root
fn test_duplicate_pair_is_rejected() {
    let lab = Lab::new();
    let links = VethManager::new(lab.config.clone());

    links.create_pair(&ifname("nwl-dup-a"), &ifname("nwl-dup-b")).unwrap();
    let err = links
        .create_pair(&ifname("nwl-dup-a"), &ifname("nwl-dup-c"))
        .unwrap_err();
    assert!(err.is_already_exists());

    links
        .delete(&ifname("nwl-dup-a"), lab.config.reference())
        .unwrap();
    assert!(
        links
            .interface("nwl-dup-b", lab.config.reference())
            .unwrap_err()
            .is_not_found()
    );
}

#[test]
#[ignore] // Requires root
fn test_assign_address_brings_interface_up() {
    let mut lab = Lab::new();
    let n1 = lab.namespace("nwl-addr");
    let links = VethManager::new(lab.config.clone());

    let (a, b) = (ifname("nwl-addr-a"), ifname("nwl-addr-b"));
    links.create_pair(&a, &b).unwrap();
    links.move_end(&a, &n1).unwrap();

    let cidr: Cidr = "10.0.0.1/24".parse().unwrap();
    links.assign_address(&a, &cidr, &n1).unwrap();

    let state = links.interface("nwl-addr-a", &n1).unwrap();
    assert!(state.up);
    assert!(state.has_address(&cidr));
    assert_eq!(state.kind.as_deref(), Some("veth"));

    // Absent from this namespace
    assert!(
        links
            .assign_address(&b, &cidr, &n1)
            .unwrap_err()
            .is_not_found()
    );
}

#[test]
#[ignore] // Requires root
fn test_attach_sets_master_and_up() {
    let mut lab = Lab::new();
    let s1 = lab.namespace("nwl-sw");
    let links = VethManager::new(lab.config.clone());
    let bridges = BridgeManager::new();

    let br = ifname("br-nwl");
    bridges.create(&br, &s1).unwrap();
    assert!(bridges.create(&br, &s1).unwrap_err().is_already_exists());

    let (a, b) = (ifname("nwl-port-a"), ifname("nwl-port-b"));
    links.create_pair(&a, &b).unwrap();
    links.move_end(&a, &s1).unwrap();

    bridges.attach_interface(&br, &a, &s1).unwrap();

    let port = links.interface("nwl-port-a", &s1).unwrap();
    assert_eq!(port.master.as_deref(), Some("br-nwl"));
    assert!(port.up);

    // Not in the bridge's namespace
    assert!(
        bridges
            .attach_interface(&br, &b, &s1)
            .unwrap_err()
            .is_not_found()
    );

    bridges.delete(&br, &s1).unwrap();
    links.delete(&b, lab.config.reference()).unwrap();
}
