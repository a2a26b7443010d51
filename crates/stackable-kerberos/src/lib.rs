//! A Kerberos descriptor tree and the engine resolving it.
//!
//! A descriptor declares, for a whole stack of services, which Kerberos identities (principal
//! and keytab) every service and component needs, which configuration properties have to be set
//! and which properties receive auth-to-local rules. Descriptors are layered: a user supplied
//! descriptor is merged on top of the stack default with [`RootDescriptor::update`].
//!
//! Resolution happens on borrowed [`ContainerRef`]s, which know the ancestors of a container and
//! can therefore resolve inherited configurations and identity references. The [`Planner`]
//! combines all of this with a [`ClusterTopology`] into the final list of principals and
//! configuration changes.
pub mod auth_to_local;
pub mod codec;
pub mod configuration;
pub mod container;
pub mod identity;
pub mod keytab;
pub mod node;
pub mod plan;
pub mod predicate;
pub mod principal;
pub mod realm;
pub mod reference;
pub mod root;
pub mod service;
pub mod substitution;

pub use crate::{
    codec::DescriptorCodec,
    node::ContainerRef,
    plan::{ClusterTopology, KerberosPlan, Planner},
    root::RootDescriptor,
    service::{ComponentDescriptor, ServiceDescriptor},
    substitution::VariableSubstitutor,
};
