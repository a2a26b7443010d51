//! Navigation inside the descriptor tree.
//!
//! Descriptors own their children but don't store a pointer back to their parent. Instead, a
//! [`ContainerRef`] is obtained by walking down from the root, and carries the borrowed chain of
//! ancestors with it. This gives every container a parent for the purpose of inheritance and
//! reference resolution, without creating ownership cycles. A root never has a parent.
use std::{borrow::Cow, fmt::Display, str::FromStr};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    configuration::ConfigurationDescriptor,
    container::DescriptorContainer,
    identity::IdentityDescriptor,
    reference::{self, IdentityPath},
    root::RootDescriptor,
    service::{ComponentDescriptor, ServiceDescriptor},
};

const PARENT_PREFIX: &str = "../";

/// The kind of container a [`ContainerRef`] points at.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ContainerKind {
    Root,
    Service,
    Component,
}

/// A borrowed handle to a container together with its ancestors.
#[derive(Clone, Copy, Debug)]
pub enum ContainerRef<'a> {
    Root(&'a RootDescriptor),
    Service {
        root: Option<&'a RootDescriptor>,
        service: &'a ServiceDescriptor,
    },
    Component {
        root: Option<&'a RootDescriptor>,
        service: Option<&'a ServiceDescriptor>,
        component: &'a ComponentDescriptor,
    },
}

impl<'a> From<&'a RootDescriptor> for ContainerRef<'a> {
    fn from(root: &'a RootDescriptor) -> Self {
        Self::Root(root)
    }
}

/// A service which isn't attached to a root.
impl<'a> From<&'a ServiceDescriptor> for ContainerRef<'a> {
    fn from(service: &'a ServiceDescriptor) -> Self {
        Self::Service {
            root: None,
            service,
        }
    }
}

/// A component which isn't attached to a service.
impl<'a> From<&'a ComponentDescriptor> for ContainerRef<'a> {
    fn from(component: &'a ComponentDescriptor) -> Self {
        Self::Component {
            root: None,
            service: None,
            component,
        }
    }
}

/// `SERVICE/COMPONENT`, or `<root>` for the root.
impl Display for ContainerRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.lineage().as_slice() {
            [] => f.write_str("<root>"),
            names => f.write_str(&names.join("/")),
        }
    }
}

impl<'a> ContainerRef<'a> {
    pub fn kind(&self) -> ContainerKind {
        match self {
            Self::Root(_) => ContainerKind::Root,
            Self::Service { .. } => ContainerKind::Service,
            Self::Component { .. } => ContainerKind::Component,
        }
    }

    /// The root has no name.
    pub fn name(&self) -> Option<&'a str> {
        match *self {
            Self::Root(_) => None,
            Self::Service { service, .. } => Some(service.name.as_str()),
            Self::Component { component, .. } => Some(component.name.as_str()),
        }
    }

    pub fn container(&self) -> &'a DescriptorContainer {
        match *self {
            Self::Root(root) => root,
            Self::Service { service, .. } => service,
            Self::Component { component, .. } => component,
        }
    }

    pub fn parent(&self) -> Option<Self> {
        match *self {
            Self::Root(_) => None,
            Self::Service { root, .. } => root.map(Self::Root),
            Self::Component { root, service, .. } => {
                service.map(|service| Self::Service { root, service })
            }
        }
    }

    /// The top-most container reachable through [`Self::parent`].
    pub fn top(&self) -> Self {
        let mut current = *self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// The direct child container with the given name: a service of a root, or a component of
    /// a service. Components have no child containers.
    pub fn child(&self, name: &str) -> Option<Self> {
        match *self {
            Self::Root(root) => root.service(name).map(|service| Self::Service {
                root: Some(root),
                service,
            }),
            Self::Service { root, service } => {
                service
                    .component(name)
                    .map(|component| Self::Component {
                        root,
                        service: Some(service),
                        component,
                    })
            }
            Self::Component { .. } => None,
        }
    }

    /// Names of all named containers from the top down to (and including) `self`.
    fn lineage(&self) -> Vec<&'a str> {
        let mut names = Vec::new();
        let mut current = Some(*self);
        while let Some(node) = current {
            names.extend(node.name());
            current = node.parent();
        }
        names.reverse();
        names
    }

    /// The identities of this container.
    ///
    /// Without `resolve_references`, the identities are returned as declared. Otherwise every
    /// identity is returned as a detached copy, and identities referencing another identity are
    /// replaced by a copy of the referenced identity with the referencing identity's fields
    /// applied on top. References that can't be resolved are kept as they are.
    pub fn identities(
        &self,
        resolve_references: bool,
    ) -> reference::Result<Cow<'a, [IdentityDescriptor]>> {
        let declared = self.container().identities();
        if !resolve_references {
            return Ok(Cow::Borrowed(declared));
        }

        let mut resolved = Vec::with_capacity(declared.len());
        for identity in declared {
            let detached = match identity.reference_path() {
                Some(path) => match self.referenced_identity(path)? {
                    Some(referenced) => {
                        trace!(identity = %identity.name, path, "resolved identity reference");
                        let mut merged = referenced.clone();
                        merged.update(identity);
                        merged
                    }
                    None => {
                        debug!(
                            identity = %identity.name,
                            path,
                            "identity reference could not be resolved, keeping it as is"
                        );
                        identity.clone()
                    }
                },
                None => identity.clone(),
            };
            resolved.push(detached);
        }

        Ok(Cow::Owned(resolved))
    }

    /// Resolved identities (see [`Self::identities`]) whose `when` predicate holds for
    /// `context`.
    pub fn active_identities(&self, context: &Value) -> reference::Result<Vec<IdentityDescriptor>> {
        let identities = self.identities(true)?.into_owned();
        Ok(identities
            .into_iter()
            .filter(|identity| {
                let include = identity.should_include(context);
                if !include {
                    trace!(identity = %identity.name, "identity excluded by its when predicate");
                }
                include
            })
            .collect())
    }

    /// The configurations of this container.
    ///
    /// With `include_inherited`, the configurations of all ancestors are merged in as well,
    /// starting at the top-most ancestor. Descendants override ancestors property by property.
    /// The result is always detached from the tree in that case.
    pub fn configurations(
        &self,
        include_inherited: bool,
    ) -> Cow<'a, IndexMap<String, ConfigurationDescriptor>> {
        if !include_inherited {
            return Cow::Borrowed(self.container().configurations());
        }

        let mut chain = vec![*self];
        while let Some(parent) = chain.last().and_then(ContainerRef::parent) {
            chain.push(parent);
        }

        let mut merged: IndexMap<String, ConfigurationDescriptor> = IndexMap::new();
        for node in chain.iter().rev() {
            for (config_type, configuration) in node.container().configurations() {
                merged
                    .entry(config_type.clone())
                    .and_modify(|existing| existing.update(configuration))
                    .or_insert_with(|| configuration.clone());
            }
        }

        Cow::Owned(merged)
    }

    /// Looks up the identity addressed by `path`.
    ///
    /// `path` is either absolute (`/[service/[component/]]identity`, resolved from the top of
    /// the tree) or relative to the parent of this container (`../identity`, every additional
    /// `../` moves one more level up). Missing services, components or identities yield
    /// [`None`], as do paths which aren't absolute or contain empty segments. Only a path with
    /// too many segments is an error.
    pub fn referenced_identity(
        &self,
        path: &str,
    ) -> reference::Result<Option<&'a IdentityDescriptor>> {
        let Some(absolute) = self.absolute_path(path) else {
            debug!(path, "relative identity reference points above the root");
            return Ok(None);
        };
        let path = match IdentityPath::from_str(&absolute) {
            Ok(path) => path,
            Err(error) if error.is_not_found() => {
                debug!(%error, "identity reference doesn't point at an identity");
                return Ok(None);
            }
            Err(error) => return Err(error),
        };

        let mut container = Some(self.top());
        for name in [&path.service, &path.component].into_iter().flatten() {
            container = container.and_then(|c| c.child(name));
        }

        Ok(container.and_then(|c| c.container().identity(&path.identity)))
    }

    /// Turns a `../`-relative path into an absolute one. Absolute (or malformed) paths are
    /// returned unchanged.
    fn absolute_path<'p>(&self, path: &'p str) -> Option<Cow<'p, str>> {
        if !path.starts_with(PARENT_PREFIX) {
            return Some(Cow::Borrowed(path));
        }

        let mut remaining = path;
        let mut current = *self;
        while let Some(rest) = remaining.strip_prefix(PARENT_PREFIX) {
            current = current.parent()?;
            remaining = rest;
        }

        let mut segments = current.lineage();
        segments.push(remaining);
        Some(Cow::Owned(format!("/{}", segments.join("/"))))
    }
}
