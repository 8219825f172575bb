use netweave_core::{Bridge, Container, IfName, Namespace, ResourceName, Veth, VethEnd};
use netweave_store::{JsonFileStore, MemoryStore, RecordStore};
use tempfile::TempDir;

fn sample_container() -> Container {
    let name = ResourceName::new("s1").unwrap();
    let ns = Namespace::new(name.clone(), "/var/run/netns/s1");

    let mut bridge = Bridge::new(IfName::new("br-s1").unwrap(), ns.clone());
    bridge.record_port(IfName::new("s1-h1").unwrap());

    let mut veth = Veth::new(IfName::new("s1-h1").unwrap(), IfName::new("h1-s1").unwrap());
    veth.set_namespace(VethEnd::A, ns.clone());

    let mut container = Container::new(name);
    container.namespace = Some(ns);
    container.bridges.push(bridge);
    container.veths.push(veth);
    container
}

fn exercise_store(store: &dyn RecordStore<Container>) {
    let container = sample_container();
    store.save(&container).unwrap();

    let loaded = store.find_by_id(&container.id).unwrap();
    assert_eq!(loaded, container);
    assert_eq!(loaded.bridges[0].interfaces.len(), 1);

    let by_name = store.find_by_name("s1").unwrap().unwrap();
    assert_eq!(by_name.id, container.id);

    let prefix = &container.id.as_str()[..4];
    assert_eq!(store.resolve(prefix).unwrap().id, container.id);

    assert_eq!(store.list().unwrap().len(), 1);

    store.delete(&container.id).unwrap();
    assert!(store.list().unwrap().is_empty());
    assert!(store.find_by_id(&container.id).unwrap_err().is_not_found());
}

#[test]
fn test_memory_store_contract() {
    exercise_store(&MemoryStore::<Container>::new());
}

#[test]
fn test_json_store_contract() {
    let dir = TempDir::new().unwrap();
    exercise_store(&JsonFileStore::<Container>::new(dir.path()));
}

#[test]
fn test_json_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let container = sample_container();

    JsonFileStore::<Container>::new(dir.path())
        .save(&container)
        .unwrap();

    let reopened: JsonFileStore<Container> = JsonFileStore::new(dir.path());
    let loaded = reopened.find_by_id(&container.id).unwrap();
    assert_eq!(loaded.created_at, container.created_at);
    assert_eq!(
        loaded.veths[0].namespace_of(VethEnd::A).map(|n| n.name.as_str()),
        Some("s1")
    );
}

#[test]
fn test_json_store_kinds_are_separate() {
    let dir = TempDir::new().unwrap();
    let containers: JsonFileStore<Container> = JsonFileStore::new(dir.path());
    let namespaces: JsonFileStore<Namespace> = JsonFileStore::new(dir.path());

    let container = sample_container();
    containers.save(&container).unwrap();
    namespaces
        .save(container.namespace.as_ref().unwrap())
        .unwrap();

    assert_eq!(containers.list().unwrap().len(), 1);
    assert_eq!(namespaces.list().unwrap().len(), 1);
    assert!(dir.path().join("namespaces").is_dir());
}

#[test]
fn test_records_are_ordered_by_id() {
    let store = MemoryStore::<Container>::new();
    for name in ["h1", "h2", "h3"] {
        store
            .save(&Container::new(ResourceName::new(name).unwrap()))
            .unwrap();
    }

    let ids: Vec<_> = store.list().unwrap().into_iter().map(|c| c.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[test]
fn test_json_store_skips_record_with_invalid_id() {
    let dir = TempDir::new().unwrap();
    let store: JsonFileStore<Container> = JsonFileStore::new(dir.path());
    let container = sample_container();
    store.save(&container).unwrap();

    let good = std::fs::read_to_string(store.dir().join(format!("{}.json", container.id))).unwrap();
    let tampered = good.replace(container.id.as_str(), "ééééééééééééé");
    std::fs::write(store.dir().join("tampered.json"), tampered).unwrap();

    let listed = store.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, container.id);
    assert_eq!(listed[0].id.short(), container.id.as_str());
}
