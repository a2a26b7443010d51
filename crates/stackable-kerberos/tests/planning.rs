use indoc::indoc;
use stackable_kerberos::{
    ClusterTopology, DescriptorCodec, Planner, RootDescriptor, principal::PrincipalType,
};

const STACK_DESCRIPTOR: &str = include_str!("fixtures/stack_descriptor.json");
const USER_DESCRIPTOR: &str = include_str!("fixtures/user_descriptor.yaml");
const TOPOLOGY: &str = include_str!("fixtures/topology.yaml");

fn effective_descriptor() -> RootDescriptor {
    let mut descriptor =
        RootDescriptor::from_json_str(STACK_DESCRIPTOR).expect("stack descriptor is valid");
    let overlay =
        RootDescriptor::from_yaml_str(USER_DESCRIPTOR).expect("user descriptor is valid");
    descriptor.update(&overlay);
    descriptor
}

#[test]
fn user_descriptor_is_merged_into_stack() {
    let descriptor = effective_descriptor();

    assert_eq!(descriptor.property("keytab_dir"), Some("/var/lib/keytabs"));

    let hdfs = descriptor.service("HDFS").expect("HDFS is described");
    assert_eq!(hdfs.preconfigure, Some(false));
    assert_eq!(
        hdfs.components().keys().collect::<Vec<_>>(),
        ["NAMENODE", "DATANODE", "JOURNALNODE"]
    );

    let datanode = descriptor
        .component_ref("HDFS", "DATANODE")
        .expect("DATANODE is described");
    let configurations = datanode.configurations(true);
    let hdfs_site = configurations.get("hdfs-site").expect("hdfs-site is present");
    assert_eq!(hdfs_site.property("dfs.datanode.address"), Some("0.0.0.0:2019"));
    assert_eq!(hdfs_site.property("dfs.datanode.http.address"), Some("0.0.0.0:1022"));
    assert_eq!(hdfs_site.property("dfs.block.access.token.enable"), Some("true"));
    assert!(configurations.contains_key("core-site"));
}

#[test]
fn effective_descriptor_survives_encoding() {
    let descriptor = effective_descriptor();

    let yaml = descriptor.to_yaml_string().expect("descriptor serializes");
    let decoded = RootDescriptor::from_yaml_str(&yaml).expect("serialized descriptor is valid");
    assert_eq!(decoded, descriptor);

    let map = descriptor.to_map().expect("descriptor encodes");
    assert_eq!(
        RootDescriptor::from_map(map).expect("encoded descriptor decodes"),
        descriptor
    );
}

#[test]
fn component_identities_resolve_root_references() {
    let descriptor = effective_descriptor();
    let namenode = descriptor
        .component_ref("HDFS", "NAMENODE")
        .expect("NAMENODE is described");

    let identities = namenode.identities(true).expect("references resolve");
    let spnego = identities
        .iter()
        .find(|identity| identity.name == "/spnego")
        .expect("spnego is referenced");
    let principal = spnego.principal.as_ref().expect("principal is inherited");

    assert_eq!(principal.value.as_deref(), Some("HTTP/_HOST@${realm}"));
    assert_eq!(principal.principal_type, Some(PrincipalType::Service));
    assert_eq!(
        principal.configuration.as_deref(),
        Some("hdfs-site/dfs.namenode.kerberos.internal.spnego.principal")
    );
}

#[test]
fn plan_for_topology() {
    let descriptor = effective_descriptor();
    let topology: ClusterTopology = serde_yaml::from_str(TOPOLOGY).expect("topology is valid");

    let plan = Planner::new(&descriptor)
        .plan(&topology)
        .expect("planning succeeds");

    // Three service level identities on three hosts, two DataNodes, one JournalNode and one
    // NameNode. The NameNode's spnego is the same as the service level one.
    assert_eq!(plan.identities.len(), 13);

    let master = plan
        .identities_on_host("master-1.example.com")
        .map(|identity| identity.principal.as_str())
        .collect::<Vec<_>>();
    assert_eq!(master, [
        "HTTP/master-1.example.com@EXAMPLE.COM",
        "ambari-qa-prod@EXAMPLE.COM",
        "hdfs-prod@EXAMPLE.COM",
        "jn/master-1.example.com@EXAMPLE.COM",
        "nn/master-1.example.com@EXAMPLE.COM",
    ]);

    let journalnode = plan
        .identities
        .iter()
        .find(|identity| identity.name == "journalnode_jn")
        .and_then(|identity| identity.keytab.as_ref())
        .expect("JournalNode keytab is planned");
    assert_eq!(journalnode.file, "/var/lib/keytabs/jn.service.keytab");
    assert!(!journalnode.cachable);

    assert_eq!(
        plan.configuration_value("cluster-env", "smokeuser_keytab"),
        Some("/var/lib/keytabs/smokeuser.headless.keytab")
    );
    assert_eq!(
        plan.configuration_value("hdfs-site", "dfs.namenode.kerberos.internal.spnego.principal"),
        Some("HTTP/_HOST@EXAMPLE.COM")
    );
    assert_eq!(
        plan.configuration_value("hdfs-site", "dfs.datanode.address"),
        Some("0.0.0.0:2019")
    );
    assert_eq!(
        plan.configuration_value("core-site", "hadoop.security.auth_to_local"),
        Some(indoc! {r"
            RULE:[1:$1@$0](ambari-qa-prod@EXAMPLE.COM)s/.*/ambari-qa/
            RULE:[1:$1@$0](hdfs-prod@EXAMPLE.COM)s/.*/hdfs/
            RULE:[2:$1@$0](dn@EXAMPLE.COM)s/.*/hdfs/
            RULE:[2:$1@$0](jn@EXAMPLE.COM)s/.*/hdfs/
            RULE:[2:$1@$0](nn@EXAMPLE.COM)s/.*/hdfs/
            RULE:[1:$1@$0](.*@EXAMPLE.COM)s/@.*//
            DEFAULT"})
    );

    // HIVE isn't installed, so its identities aren't planned
    assert!(
        plan.identities
            .iter()
            .all(|identity| identity.service == "HDFS")
    );
}
