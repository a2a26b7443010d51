use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    codec::{named_list, unique_list},
    configuration::ConfigurationDescriptor,
    identity::IdentityDescriptor,
};

/// The data shared by every level of the descriptor tree (root, service and component).
///
/// A container only holds its *own* declarations. Operations that need to look at ancestors
/// (inherited configurations, identity references) live on
/// [`ContainerRef`](crate::node::ContainerRef), which knows where in the tree the container
/// sits.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DescriptorContainer {
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "unique_list::deserialize"
    )]
    identities: Vec<IdentityDescriptor>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty", with = "named_list")]
    configurations: IndexMap<String, ConfigurationDescriptor>,

    /// Properties (`configType/propertyName`) that receive generated auth-to-local rules.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    auth_to_local_properties: BTreeSet<String>,
}

impl DescriptorContainer {
    /// The identities declared by this container, in insertion order, with references left
    /// unresolved.
    pub fn identities(&self) -> &[IdentityDescriptor] {
        &self.identities
    }

    pub fn identity(&self, name: &str) -> Option<&IdentityDescriptor> {
        self.identities.iter().find(|identity| identity.name == name)
    }

    pub fn identity_mut(&mut self, name: &str) -> Option<&mut IdentityDescriptor> {
        self.identities
            .iter_mut()
            .find(|identity| identity.name == name)
    }

    /// Appends `identity`, replacing any identity with the same name.
    pub fn put_identity(&mut self, identity: IdentityDescriptor) {
        self.identities.retain(|existing| existing.name != identity.name);
        self.identities.push(identity);
    }

    pub fn remove_identity(&mut self, name: &str) -> Option<IdentityDescriptor> {
        let position = self
            .identities
            .iter()
            .position(|identity| identity.name == name)?;
        Some(self.identities.remove(position))
    }

    /// The configurations declared by this container, without anything inherited.
    pub fn configurations(&self) -> &IndexMap<String, ConfigurationDescriptor> {
        &self.configurations
    }

    pub fn configuration(&self, config_type: &str) -> Option<&ConfigurationDescriptor> {
        self.configurations.get(config_type)
    }

    pub fn configuration_mut(&mut self, config_type: &str) -> Option<&mut ConfigurationDescriptor> {
        self.configurations.get_mut(config_type)
    }

    /// Inserts `configuration`, replacing any configuration of the same type.
    pub fn put_configuration(&mut self, configuration: ConfigurationDescriptor) {
        self.configurations
            .insert(configuration.config_type().to_owned(), configuration);
    }

    pub fn remove_configuration(&mut self, config_type: &str) -> Option<ConfigurationDescriptor> {
        self.configurations.shift_remove(config_type)
    }

    pub fn auth_to_local_properties(&self) -> &BTreeSet<String> {
        &self.auth_to_local_properties
    }

    pub fn put_auth_to_local_property(&mut self, property: impl Into<String>) {
        self.auth_to_local_properties.insert(property.into());
    }

    /// Merges `overlay` into this container.
    ///
    /// Configurations and identities which don't exist yet are inserted as copies, existing ones
    /// are updated in place (configurations by type, identities by name). Auth-to-local
    /// properties are unioned, never removed.
    pub fn update(&mut self, overlay: &Self) {
        for (config_type, configuration) in &overlay.configurations {
            trace!(%config_type, "merging configuration");
            self.configurations
                .entry(config_type.clone())
                .and_modify(|existing| existing.update(configuration))
                .or_insert_with(|| configuration.clone());
        }

        for identity in &overlay.identities {
            match self.identity_mut(&identity.name) {
                Some(existing) => existing.update(identity),
                None => self.identities.push(identity.clone()),
            }
        }

        self.auth_to_local_properties
            .extend(overlay.auth_to_local_properties.iter().cloned());
    }
}
