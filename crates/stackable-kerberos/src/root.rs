use std::{
    collections::{BTreeMap, BTreeSet},
    ops::{Deref, DerefMut},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    codec::named_list,
    container::DescriptorContainer,
    node::ContainerRef,
    service::ServiceDescriptor,
};

/// The top of a Kerberos descriptor tree.
///
/// Besides the data every container has, the root holds the global properties (available to
/// variable substitution without a group) and the services.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RootDescriptor {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty", with = "named_list")]
    services: IndexMap<String, ServiceDescriptor>,

    #[serde(flatten)]
    container: DescriptorContainer,
}

impl RootDescriptor {
    pub fn with_service(mut self, service: ServiceDescriptor) -> Self {
        self.put_service(service);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.put_property(name, value);
        self
    }

    pub fn services(&self) -> &IndexMap<String, ServiceDescriptor> {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(name)
    }

    pub fn service_mut(&mut self, name: &str) -> Option<&mut ServiceDescriptor> {
        self.services.get_mut(name)
    }

    /// Inserts `service`, replacing any service with the same name.
    pub fn put_service(&mut self, service: ServiceDescriptor) {
        self.services.insert(service.name.clone(), service);
    }

    pub fn remove_service(&mut self, name: &str) -> Option<ServiceDescriptor> {
        self.services.shift_remove(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn put_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    /// The auth-to-local properties declared anywhere in the tree.
    pub fn all_auth_to_local_properties(&self) -> BTreeSet<String> {
        let mut properties = self.auth_to_local_properties().clone();
        for service in self.services.values() {
            properties.extend(service.auth_to_local_properties().iter().cloned());
            for component in service.components().values() {
                properties.extend(component.auth_to_local_properties().iter().cloned());
            }
        }
        properties
    }

    /// A handle to the root for tree navigation.
    pub fn as_container_ref(&self) -> ContainerRef<'_> {
        ContainerRef::from(self)
    }

    pub fn service_ref(&self, name: &str) -> Option<ContainerRef<'_>> {
        self.as_container_ref().child(name)
    }

    pub fn component_ref(&self, service: &str, component: &str) -> Option<ContainerRef<'_>> {
        self.service_ref(service)?.child(component)
    }

    /// Merges `overlay` into `self`.
    ///
    /// Services are merged by name and unknown services are inserted as copies. Properties of
    /// the overlay replace properties with the same name.
    pub fn update(&mut self, overlay: &Self) {
        for (name, value) in &overlay.properties {
            self.properties.insert(name.clone(), value.clone());
        }

        for (name, service) in &overlay.services {
            trace!(service = %name, "merging service");
            self.services
                .entry(name.clone())
                .and_modify(|existing| existing.update(service))
                .or_insert_with(|| service.clone());
        }

        self.container.update(&overlay.container);
    }
}

impl Deref for RootDescriptor {
    type Target = DescriptorContainer;

    fn deref(&self) -> &Self::Target {
        &self.container
    }
}

impl DerefMut for RootDescriptor {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.container
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::{codec::DescriptorCodec, service::ComponentDescriptor};

    const STACK_DESCRIPTOR: &str = indoc! {r#"
        {
          "properties": {
            "realm": "${kerberos-env/realm}",
            "keytab_dir": "/etc/security/keytabs"
          },
          "identities": [
            {"name": "spnego", "principal": {"value": "HTTP/_HOST@${realm}"}}
          ],
          "auth_to_local_properties": ["core-site/hadoop.security.auth_to_local"],
          "services": [
            {
              "name": "HDFS",
              "identities": [{"name": "/spnego"}],
              "components": [
                {"name": "NAMENODE", "identities": [{"name": "namenode_nn"}]}
              ]
            },
            {
              "name": "HBASE",
              "auth_to_local_properties": ["hbase-site/hbase.security.authentication.spnego.kerberos.name.rules"],
              "components": [
                {"name": "HBASE_MASTER", "auth_to_local_properties": ["hbase-site/hbase.master.auth_to_local"]}
              ]
            }
          ]
        }
    "#};

    const USER_DESCRIPTOR: &str = indoc! {r#"
        properties:
          keytab_dir: /opt/keytabs
          principal_suffix: -c1
        services:
          - name: HDFS
            preconfigure: true
            components:
              - name: NAMENODE
                identities:
                  - name: namenode_nn
                    principal:
                      value: nn/_HOST@${realm}
              - name: JOURNALNODE
          - name: KAFKA
    "#};

    fn stack() -> RootDescriptor {
        RootDescriptor::from_json_str(STACK_DESCRIPTOR).expect("stack JSON is valid")
    }

    #[test]
    fn services_and_properties() {
        let mut root = stack();

        assert_eq!(root.property("realm"), Some("${kerberos-env/realm}"));
        assert_eq!(root.property("missing"), None);
        assert_eq!(root.services().keys().collect::<Vec<_>>(), ["HDFS", "HBASE"]);

        root.put_service(ServiceDescriptor::new("HDFS"));
        assert!(
            root.service("HDFS")
                .expect("HDFS is present")
                .identities()
                .is_empty()
        );

        assert!(root.remove_service("HBASE").is_some());
        assert!(root.service("HBASE").is_none());
    }

    #[test]
    fn all_auth_to_local_properties_walks_the_tree() {
        let properties = stack().all_auth_to_local_properties();

        assert_eq!(
            properties.iter().map(String::as_str).collect::<Vec<_>>(),
            [
                "core-site/hadoop.security.auth_to_local",
                "hbase-site/hbase.master.auth_to_local",
                "hbase-site/hbase.security.authentication.spnego.kerberos.name.rules",
            ]
        );
    }

    #[test]
    fn update_merges_user_descriptor() {
        let mut root = stack();
        let overlay = RootDescriptor::from_yaml_str(USER_DESCRIPTOR).expect("user YAML is valid");

        root.update(&overlay);

        assert_eq!(root.property("keytab_dir"), Some("/opt/keytabs"));
        assert_eq!(root.property("principal_suffix"), Some("-c1"));
        assert_eq!(root.property("realm"), Some("${kerberos-env/realm}"));
        assert_eq!(
            root.services().keys().collect::<Vec<_>>(),
            ["HDFS", "HBASE", "KAFKA"]
        );

        let hdfs = root.service("HDFS").expect("HDFS is present");
        assert_eq!(hdfs.preconfigure, Some(true));
        assert_eq!(hdfs.identities().len(), 1);
        assert!(hdfs.component("JOURNALNODE").is_some());

        let namenode_nn = hdfs
            .component("NAMENODE")
            .and_then(|c| c.identity("namenode_nn"))
            .expect("namenode_nn is present");
        assert_eq!(
            namenode_nn.principal.as_ref().and_then(|p| p.value.as_deref()),
            Some("nn/_HOST@${realm}")
        );

        // The overlay is copied, not shared
        assert!(overlay.service("HBASE").is_none());
    }

    #[test]
    fn component_ref_requires_both_levels() {
        let root = stack().with_service(
            ServiceDescriptor::new("YARN").with_component(ComponentDescriptor::new("NODEMANAGER")),
        );

        assert!(root.component_ref("YARN", "NODEMANAGER").is_some());
        assert!(root.component_ref("YARN", "RESOURCEMANAGER").is_none());
        assert!(root.component_ref("HIVE", "NODEMANAGER").is_none());
        assert!(root.as_container_ref().parent().is_none());
    }
}
