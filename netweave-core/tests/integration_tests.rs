use netweave_core::*;

#[test]
fn test_resource_name_validation() {
    // Valid names
    assert!(ResourceName::new("h1").is_ok());
    assert!(ResourceName::new("switch-01").is_ok());
    assert!(ResourceName::new("core_sw").is_ok());
    assert!(ResourceName::new("A").is_ok());

    // Invalid names - empty
    assert!(ResourceName::new("").is_err());

    // Invalid names - too long
    assert!(ResourceName::new("a".repeat(65)).is_err());

    // Invalid names - bad characters
    assert!(ResourceName::new("h1@lab").is_err());
    assert!(ResourceName::new("h 1").is_err());
    assert!(ResourceName::new("../etc").is_err());
    assert!(ResourceName::new("h1.lab").is_err());
    assert!(ResourceName::new("_h1").is_err());
}

#[test]
fn test_resource_name_serialization() {
    let name = ResourceName::new("s1").unwrap();

    let json = serde_json::to_string(&name).unwrap();
    assert_eq!(json, "\"s1\"");

    let deserialized: ResourceName = serde_json::from_str(&json).unwrap();
    assert_eq!(name, deserialized);

    // Validation also applies on the way in
    assert!(serde_json::from_str::<ResourceName>("\"bad name\"").is_err());
}

#[test]
fn test_ifname_rejects_long_derived_names() {
    let a = "a".repeat(8);
    let b = "b".repeat(8);
    assert!(IfName::new(format!("{a}-{b}")).is_err());
    assert!(IfName::new("h1-s1").is_ok());
}

#[test]
fn test_cidr_serialization() {
    let cidr: Cidr = "10.0.0.2/24".parse().unwrap();

    let json = serde_json::to_string(&cidr).unwrap();
    assert_eq!(json, "\"10.0.0.2/24\"");

    let back: Cidr = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cidr);

    assert!(serde_json::from_str::<Cidr>("\"10.0.0.2\"").is_err());
}

#[test]
fn test_error_types() {
    let err = Error::not_found(ResourceKind::Container, "h9");
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "container 'h9' not found");

    let err = Error::kernel("bridge attach", "s1-h1", "No such device");
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("bridge attach"));

    let err = Error::invalid("bad cidr").in_topology("link 'h1'<->'s1'");
    assert!(matches!(err.root(), Error::InvalidInput { .. }));
}

#[test]
fn test_veth_record_tracks_ends() {
    let mut veth = Veth::new(IfName::new("h1-s1").unwrap(), IfName::new("s1-h1").unwrap());
    assert_eq!(Record::name(&veth), "h1-s1");
    assert_eq!(<Veth as Record>::KIND, ResourceKind::Veth);

    let ns = Namespace::new(ResourceName::new("s1").unwrap(), "/var/run/netns/s1");
    veth.set_namespace(VethEnd::B, ns);

    assert!(veth.namespace_of(VethEnd::A).is_none());
    assert_eq!(
        veth.namespace_of(VethEnd::B).map(|n| n.name.as_str()),
        Some("s1")
    );
}

#[test]
fn test_config_from_env_defaults() {
    let config = NetConfig::from_env();
    assert!(!config.prompt_prefix.is_empty());
    assert_eq!(config.prompt_for("h1"), format!("{}@h1:\\w $ ", config.prompt_prefix));
}
