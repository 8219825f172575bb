use netweave_core::{Cidr, Error, IfName, NetConfig, ResourceName};
use netweave_fabric::{
    ContainerManager, Kernel, MockKernel, NodeKind, Stores, Topology, TopologyBuilder,
};
use std::path::PathBuf;
use tempfile::TempDir;

fn setup() -> (MockKernel, ContainerManager) {
    let kernel = MockKernel::new();
    let manager = ContainerManager::new(
        kernel.config().clone(),
        Kernel::mock(&kernel),
        Stores::in_memory(),
    );
    (kernel, manager)
}

fn netns(manager: &ContainerManager, name: &str) -> PathBuf {
    manager
        .find(name)
        .unwrap()
        .namespace
        .unwrap()
        .path
}

fn cidr(s: &str) -> Cidr {
    s.parse().unwrap()
}

#[test]
fn test_demo_topology_end_to_end() {
    let (kernel, manager) = setup();
    let built = TopologyBuilder::new(&manager)
        .build(&Topology::demo())
        .unwrap();

    assert_eq!(built.containers.len(), 3);
    // Reference namespace plus h1, h2, s1
    assert_eq!(kernel.namespaces().len(), 4);
    assert_eq!(kernel.veth_pairs(), 2);

    let s1 = built.container("s1").unwrap();
    assert_eq!(s1.bridges.len(), 1);
    assert_eq!(s1.bridges[0].name.as_str(), "br-s1");
    assert_eq!(s1.bridges[0].interfaces.len(), 2);

    let s1_ns = netns(&manager, "s1");
    let ports: Vec<_> = manager
        .interfaces(s1)
        .unwrap()
        .into_iter()
        .filter(|i| i.master.as_deref() == Some("br-s1"))
        .collect();
    assert_eq!(ports.len(), 2);
    assert!(ports.iter().all(|p| p.addresses.is_empty() && p.up));
    assert!(kernel.has_interface(&s1_ns, "s1-h1"));
    assert!(kernel.has_interface(&s1_ns, "s1-h2"));

    let h1 = built.container("h1").unwrap();
    let h1_end = manager
        .interfaces(h1)
        .unwrap()
        .into_iter()
        .find(|i| i.name == "h1-s1")
        .unwrap();
    assert!(h1_end.has_address(&cidr("10.0.0.1/24")));
    assert!(h1_end.up);

    let h2 = built.container("h2").unwrap();
    let h2_end = manager
        .interfaces(h2)
        .unwrap()
        .into_iter()
        .find(|i| i.name == "h2-s1")
        .unwrap();
    assert!(h2_end.has_address(&cidr("10.0.0.2/24")));

    // Nothing left behind in the reference namespace
    assert_eq!(kernel.interface_names(kernel.reference()), vec!["lo"]);

    // Host containers own their links
    assert_eq!(h1.veths.len(), 1);
    assert!(s1.veths.is_empty());
}

#[test]
fn test_second_build_fails_on_first_node() {
    let (kernel, manager) = setup();
    let builder = TopologyBuilder::new(&manager);
    let topology = Topology::demo();

    let first = builder.build(&topology).unwrap();
    let err = builder.build(&topology).unwrap_err();

    assert!(err.is_already_exists());
    match &err {
        Error::Topology { context, .. } => assert_eq!(context, "node 'h1'"),
        other => panic!("unexpected error: {other}"),
    }

    let listed = manager.list().unwrap();
    assert_eq!(listed.len(), 3);
    for container in listed {
        assert_eq!(
            &container,
            first.container(container.name.as_str()).unwrap()
        );
    }
    assert_eq!(kernel.veth_pairs(), 2);
}

#[test]
fn test_delete_all_removes_everything() {
    let (kernel, manager) = setup();
    TopologyBuilder::new(&manager)
        .build(&Topology::demo())
        .unwrap();

    let outcomes = manager.delete_all().unwrap();
    assert_eq!(outcomes.len(), 3);
    for (container, outcome) in outcomes {
        assert!(outcome.is_ok(), "{} failed to delete", container.name);
    }

    assert!(manager.list().unwrap().is_empty());
    assert!(manager.registry().list().unwrap().is_empty());
    assert_eq!(kernel.namespaces(), vec![kernel.reference().to_path_buf()]);
    assert_eq!(kernel.veth_pairs(), 0);
}

#[test]
fn test_delete_after_external_namespace_removal() {
    let (kernel, manager) = setup();
    TopologyBuilder::new(&manager)
        .build(&Topology::demo())
        .unwrap();

    let s1_ns = netns(&manager, "s1");
    kernel.remove_namespace_externally(&s1_ns);
    // Both veths died with their s1 ends
    assert_eq!(kernel.veth_pairs(), 0);

    let h1 = manager.find("h1").unwrap();
    let report = manager.delete(&h1).unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].name, "h1-s1");
    assert!(manager.find("h1").unwrap_err().is_not_found());

    let s1 = manager.find("s1").unwrap();
    let report = manager.delete(&s1).unwrap();
    // The bridge died with the namespace; only the unbind complains
    assert_eq!(report.warnings.len(), 1);
    assert!(manager.find("s1").unwrap_err().is_not_found());

    let h2 = manager.find("h2").unwrap();
    manager.delete(&h2).unwrap();
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn test_veth_visibility_follows_moves() {
    let (kernel, manager) = setup();
    let mut h1 = manager.create(&ResourceName::new("h1").unwrap()).unwrap();
    let h2 = manager.create(&ResourceName::new("h2").unwrap()).unwrap();
    let (a, b) = (IfName::new("v-a").unwrap(), IfName::new("v-b").unwrap());

    manager.add_veth(&mut h1, &a, &b).unwrap();
    assert!(kernel.has_interface(kernel.reference(), "v-a"));
    assert!(kernel.has_interface(kernel.reference(), "v-b"));

    let h1_ns = h1.namespace.clone().unwrap();
    let h2_ns = h2.namespace.clone().unwrap();
    manager.move_veth_end(&mut h1, &a, &h1_ns).unwrap();
    manager.move_veth_end(&mut h1, &b, &h2_ns).unwrap();

    assert!(!kernel.has_interface(kernel.reference(), "v-a"));
    assert!(!kernel.has_interface(kernel.reference(), "v-b"));
    assert!(kernel.has_interface(&h1_ns.path, "v-a"));
    assert!(kernel.has_interface(&h2_ns.path, "v-b"));

    let stored = manager.find("h1").unwrap();
    assert_eq!(stored.veths[0].namespace_b.as_ref(), Some(&h2_ns));
}

#[test]
fn test_invalid_topology_never_touches_kernel() {
    let (kernel, manager) = setup();
    let mut topology = Topology::new();
    topology.add_host("h1").unwrap().add_switch("s1").unwrap();
    topology.add_link("h1", "s1", None, None).unwrap();
    topology.add_link("h1", "s9", None, None).unwrap();

    let err = TopologyBuilder::new(&manager).build(&topology).unwrap_err();
    assert!(matches!(err, Error::InvalidInput { .. }));
    assert_eq!(kernel.call_count(), 0);
    assert!(manager.list().unwrap().is_empty());
}

#[test]
fn test_failed_link_leaves_partial_build() {
    let (kernel, manager) = setup();
    kernel.fail_operation("address add");

    let err = TopologyBuilder::new(&manager)
        .build(&Topology::demo())
        .unwrap_err();

    match &err {
        Error::Topology { context, source } => {
            assert_eq!(context, "link 'h1'<->'s1'");
            assert!(matches!(**source, Error::KernelOperation { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Nodes and the first link are left in place
    assert_eq!(manager.list().unwrap().len(), 3);
    assert_eq!(kernel.veth_pairs(), 1);
    let h1 = manager.find("h1").unwrap();
    assert_eq!(h1.veths.len(), 1);
}

#[test]
fn test_switch_to_switch_link() {
    let (_kernel, manager) = setup();
    let mut topology = Topology::new();
    topology.add_switch("s1").unwrap().add_switch("s2").unwrap();
    topology.add_link("s1", "s2", None, None).unwrap();

    let built = TopologyBuilder::new(&manager).build(&topology).unwrap();
    assert_eq!(topology.node(&ResourceName::new("s2").unwrap()).unwrap().kind, NodeKind::Switch);

    for (node, port) in [("s1", "s1-s2"), ("s2", "s2-s1")] {
        let container = built.container(node).unwrap();
        let state = manager
            .interfaces(container)
            .unwrap()
            .into_iter()
            .find(|i| i.name == port)
            .unwrap();
        assert_eq!(state.master, Some(format!("br-{node}")));
    }
}

#[test]
fn test_exec_runs_in_container_namespace() {
    let (kernel, manager) = setup();
    let h1 = manager.create(&ResourceName::new("h1").unwrap()).unwrap();

    let status = manager
        .exec(&h1, &["ip".to_string(), "addr".to_string()])
        .unwrap();
    assert!(status.success());

    let commands = kernel.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].0, h1.namespace.unwrap().path);
}

#[test]
fn test_records_survive_reopen_with_json_store() {
    let dir = TempDir::new().unwrap();
    let config = NetConfig::new().with_state_dir(dir.path());
    let kernel = MockKernel::with_config(config.clone());

    let manager = ContainerManager::new(config.clone(), Kernel::mock(&kernel), Stores::json(&config));
    TopologyBuilder::new(&manager)
        .build(&Topology::demo())
        .unwrap();
    drop(manager);

    let reopened = ContainerManager::new(config.clone(), Kernel::mock(&kernel), Stores::json(&config));
    let names: Vec<String> = reopened
        .list()
        .unwrap()
        .into_iter()
        .map(|c| c.name.to_string())
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.contains(&"s1".to_string()));

    let s1 = reopened.find("s1").unwrap();
    assert_eq!(s1.bridges[0].interfaces.len(), 2);

    for (_, outcome) in reopened.delete_all().unwrap() {
        assert!(outcome.unwrap().is_clean());
    }
    assert!(reopened.list().unwrap().is_empty());
}
