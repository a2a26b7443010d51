use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    codec::{Named, named_list},
    container::DescriptorContainer,
};

/// A component of a service, for example the `NAMENODE` of `HDFS`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ComponentDescriptor {
    pub name: String,

    #[serde(flatten)]
    container: DescriptorContainer,
}

impl ComponentDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container: DescriptorContainer::default(),
        }
    }

    /// Overwrites the name and merges the container data of `overlay` into `self`.
    pub fn update(&mut self, overlay: &Self) {
        self.name.clone_from(&overlay.name);
        self.container.update(&overlay.container);
    }
}

impl Deref for ComponentDescriptor {
    type Target = DescriptorContainer;

    fn deref(&self) -> &Self::Target {
        &self.container
    }
}

impl DerefMut for ComponentDescriptor {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.container
    }
}

impl Named for ComponentDescriptor {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A service (`HDFS`, `YARN`, ...) with its components.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ServiceDescriptor {
    pub name: String,

    /// Whether the service is to be preconfigured for Kerberos before it is installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preconfigure: Option<bool>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty", with = "named_list")]
    components: IndexMap<String, ComponentDescriptor>,

    #[serde(flatten)]
    container: DescriptorContainer,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preconfigure: None,
            components: IndexMap::new(),
            container: DescriptorContainer::default(),
        }
    }

    pub fn with_component(mut self, component: ComponentDescriptor) -> Self {
        self.put_component(component);
        self
    }

    /// [`None`] is treated as `false`.
    pub fn should_preconfigure(&self) -> bool {
        self.preconfigure.unwrap_or(false)
    }

    pub fn components(&self) -> &IndexMap<String, ComponentDescriptor> {
        &self.components
    }

    pub fn component(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.components.get(name)
    }

    pub fn component_mut(&mut self, name: &str) -> Option<&mut ComponentDescriptor> {
        self.components.get_mut(name)
    }

    /// Inserts `component`, replacing any component with the same name.
    pub fn put_component(&mut self, component: ComponentDescriptor) {
        self.components.insert(component.name.clone(), component);
    }

    pub fn remove_component(&mut self, name: &str) -> Option<ComponentDescriptor> {
        self.components.shift_remove(name)
    }

    /// Merges `overlay` into `self`.
    ///
    /// The name is overwritten and `preconfigure` is taken from the overlay if it is set there.
    /// Components are merged by name, unknown components are inserted as copies.
    pub fn update(&mut self, overlay: &Self) {
        self.name.clone_from(&overlay.name);

        if overlay.preconfigure.is_some() {
            self.preconfigure = overlay.preconfigure;
        }

        for (name, component) in &overlay.components {
            trace!(service = %self.name, component = %name, "merging component");
            self.components
                .entry(name.clone())
                .and_modify(|existing| existing.update(component))
                .or_insert_with(|| component.clone());
        }

        self.container.update(&overlay.container);
    }
}

impl Deref for ServiceDescriptor {
    type Target = DescriptorContainer;

    fn deref(&self) -> &Self::Target {
        &self.container
    }
}

impl DerefMut for ServiceDescriptor {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.container
    }
}

impl Named for ServiceDescriptor {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::DescriptorCodec, configuration::ConfigurationDescriptor,
        identity::IdentityDescriptor,
    };

    fn hdfs() -> ServiceDescriptor {
        let mut namenode = ComponentDescriptor::new("NAMENODE");
        namenode.put_identity(IdentityDescriptor::new("namenode_nn"));

        let mut hdfs = ServiceDescriptor::new("HDFS").with_component(namenode);
        hdfs.put_configuration(
            ConfigurationDescriptor::new("core-site")
                .with_property("hadoop.security.authentication", "kerberos"),
        );
        hdfs
    }

    #[test]
    fn components_are_keyed_by_name() {
        let mut hdfs = hdfs();
        hdfs.put_component(ComponentDescriptor::new("DATANODE"));
        hdfs.put_component(ComponentDescriptor::new("NAMENODE"));

        let names = hdfs.components().keys().collect::<Vec<_>>();
        assert_eq!(names, ["NAMENODE", "DATANODE"]);
        assert!(
            hdfs.component("NAMENODE")
                .expect("NAMENODE is present")
                .identities()
                .is_empty()
        );

        assert!(hdfs.remove_component("DATANODE").is_some());
        assert!(hdfs.component("DATANODE").is_none());
    }

    #[test]
    fn update_merges_components() {
        let mut hdfs = hdfs();

        let mut namenode = ComponentDescriptor::new("NAMENODE");
        namenode.put_identity(IdentityDescriptor::new("namenode_nn").with_password("pw"));
        let mut overlay = ServiceDescriptor::new("HDFS")
            .with_component(namenode)
            .with_component(ComponentDescriptor::new("JOURNALNODE"));
        overlay.preconfigure = Some(true);

        hdfs.update(&overlay);

        assert!(hdfs.should_preconfigure());
        assert_eq!(hdfs.components().len(), 2);
        assert_eq!(
            hdfs.component("NAMENODE")
                .and_then(|c| c.identity("namenode_nn"))
                .and_then(|i| i.password.as_deref()),
            Some("pw")
        );
        assert!(hdfs.configuration("core-site").is_some());
    }

    #[test]
    fn update_keeps_preconfigure_if_unset() {
        let mut hdfs = hdfs();
        hdfs.preconfigure = Some(true);

        hdfs.update(&ServiceDescriptor::new("HDFS"));

        assert_eq!(hdfs.preconfigure, Some(true));
    }

    #[test]
    fn component_fields_are_flattened() {
        let map = hdfs().to_map().expect("service encodes");

        assert_eq!(map["name"], "HDFS");
        assert!(map.contains_key("configurations"));
        assert!(map.contains_key("components"));
        assert!(!map.contains_key("container"));
        assert!(!map.contains_key("preconfigure"));
        assert_eq!(map["components"][0]["identities"][0]["name"], "namenode_nn");
    }
}
