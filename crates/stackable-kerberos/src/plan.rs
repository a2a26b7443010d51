//! Turns an effective descriptor and an installed cluster topology into the concrete principals,
//! keytabs and configuration changes needed to kerberize the cluster.
use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, warn};

use crate::{
    auth_to_local::AuthToLocalBuilder,
    identity::IdentityDescriptor,
    keytab::{FileAccess, KeytabDescriptor},
    node::ContainerRef,
    principal::{HOST_MARKER, PrincipalType},
    realm::KerberosRealmName,
    reference,
    root::RootDescriptor,
    substitution::{self, Lookup, VariableSubstitutor},
};

/// The substitution group holding per-component host lists (`${clusterHostInfo/namenode_hosts}`).
pub const CLUSTER_HOST_INFO_GROUP: &str = "clusterHostInfo";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to resolve the identities of {container}"))]
    ResolveIdentities {
        source: reference::Error,
        container: String,
    },

    #[snafu(display("failed to substitute variables of identity {identity:?} in {container}"))]
    SubstituteIdentity {
        source: substitution::Error,
        container: String,
        identity: String,
    },

    #[snafu(display("failed to substitute variables of property {config_type}/{property}"))]
    SubstituteConfiguration {
        source: substitution::Error,
        config_type: String,
        property: String,
    },
}

/// What is installed where.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ClusterTopology {
    pub realm: KerberosRealmName,

    /// Hosts by component, by service.
    #[serde(default)]
    pub services: BTreeMap<String, BTreeMap<String, Vec<String>>>,

    /// The current cluster configurations by config type. Every config type is a substitution
    /// group.
    #[serde(default)]
    pub configurations: Lookup,

    /// The context `when` predicates are evaluated against. Defaults to
    /// `{"services": [<installed services>]}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ClusterTopology {
    pub fn predicate_context(&self) -> Cow<'_, Value> {
        match &self.context {
            Some(context) => Cow::Borrowed(context),
            None => Cow::Owned(json!({ "services": self.services.keys().collect::<Vec<_>>() })),
        }
    }

    fn cluster_host_info(&self) -> BTreeMap<String, String> {
        self.services
            .values()
            .flatten()
            .map(|(component, hosts)| {
                (
                    format!("{}_hosts", component.to_lowercase()),
                    hosts.join(","),
                )
            })
            .collect()
    }
}

/// The outcome of planning.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct KerberosPlan {
    /// One entry per distinct principal and keytab on every host.
    pub identities: Vec<ResolvedIdentity>,

    /// Property values to set, by config type.
    pub configurations: BTreeMap<String, BTreeMap<String, String>>,
}

impl KerberosPlan {
    pub fn identities_on_host<'a>(
        &'a self,
        host: &'a str,
    ) -> impl Iterator<Item = &'a ResolvedIdentity> + 'a {
        self.identities
            .iter()
            .filter(move |identity| identity.host == host)
    }

    pub fn configuration_value(&self, config_type: &str, property: &str) -> Option<&str> {
        self.configurations
            .get(config_type)
            .and_then(|properties| properties.get(property))
            .map(String::as_str)
    }

    fn set_configuration(&mut self, config_type: &str, property: &str, value: String) {
        self.configurations
            .entry(config_type.to_owned())
            .or_default()
            .insert(property.to_owned(), value);
    }

    /// Sets a `configType/propertyName` target. Malformed targets are skipped.
    fn set_target(&mut self, target: &str, value: String) {
        match target.split_once('/') {
            Some((config_type, property)) if !config_type.is_empty() && !property.is_empty() => {
                self.set_configuration(config_type, property, value)
            }
            _ => warn!(
                property = target,
                "ignoring malformed configuration target, expected configType/propertyName"
            ),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ResolvedIdentity {
    pub name: String,
    pub service: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,

    pub host: String,
    pub principal: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub principal_type: Option<PrincipalType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keytab: Option<ResolvedKeytab>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ResolvedKeytab {
    pub file: String,

    #[serde(skip_serializing_if = "FileAccess::is_empty")]
    pub owner: FileAccess,

    #[serde(skip_serializing_if = "FileAccess::is_empty")]
    pub group: FileAccess,

    pub cachable: bool,
}

/// Computes a [`KerberosPlan`] from an effective descriptor.
///
/// Service level identities are created on every host running a component of the service,
/// component level identities on the hosts running the component. Root level identities are
/// only used through references.
pub struct Planner<'a> {
    descriptor: &'a RootDescriptor,
    substitutor: VariableSubstitutor,
}

/// Mutable state of a single planning run.
struct Run<'t> {
    context: Cow<'t, Value>,
    plan: KerberosPlan,
    seen: BTreeSet<(String, String, Option<String>)>,
    auth_to_local: AuthToLocalBuilder,
}

impl<'a> Planner<'a> {
    pub fn new(descriptor: &'a RootDescriptor) -> Self {
        Self {
            descriptor,
            substitutor: VariableSubstitutor::default(),
        }
    }

    pub fn with_substitutor(mut self, substitutor: VariableSubstitutor) -> Self {
        self.substitutor = substitutor;
        self
    }

    pub fn plan(&self, topology: &ClusterTopology) -> Result<KerberosPlan> {
        let mut run = Run {
            context: topology.predicate_context(),
            plan: KerberosPlan::default(),
            seen: BTreeSet::new(),
            auth_to_local: AuthToLocalBuilder::new(topology.realm.clone()),
        };
        let lookup = self.lookup(topology);

        for (service_name, components) in &topology.services {
            let Some(service) = self.descriptor.service_ref(service_name) else {
                debug!(service = %service_name, "installed service is not described, skipping it");
                continue;
            };

            let service_hosts = components
                .values()
                .flatten()
                .map(String::as_str)
                .collect::<BTreeSet<_>>();
            self.plan_container(&mut run, &lookup, service, &service_hosts)?;

            for (component_name, hosts) in components {
                let Some(component) = service.child(component_name) else {
                    debug!(
                        service = %service_name,
                        component = %component_name,
                        "installed component is not described, skipping it"
                    );
                    continue;
                };
                let hosts = hosts.iter().map(String::as_str).collect::<BTreeSet<_>>();
                self.plan_container(&mut run, &lookup, component, &hosts)?;
            }
        }

        for target in self.descriptor.all_auth_to_local_properties() {
            let existing = target
                .split_once('/')
                .and_then(|(config_type, property)| {
                    topology.configurations.get(config_type)?.get(property)
                })
                .map_or("", String::as_str);

            let rules = run
                .auth_to_local
                .clone()
                .add_rules_from_text(existing)
                .generate();
            run.plan.set_target(&target, rules);
        }

        info!(
            identities = run.plan.identities.len(),
            config_types = run.plan.configurations.len(),
            "computed Kerberos plan"
        );
        Ok(run.plan)
    }

    /// The variables available to substitution: the cluster configurations, host lists and
    /// the descriptor properties together with the realm in the default group.
    fn lookup(&self, topology: &ClusterTopology) -> Lookup {
        let mut lookup = topology.configurations.clone();

        let host_info = lookup.entry(CLUSTER_HOST_INFO_GROUP.to_owned()).or_default();
        for (name, hosts) in topology.cluster_host_info() {
            host_info.entry(name).or_insert(hosts);
        }

        let globals = lookup.entry(String::new()).or_default();
        globals.extend(
            self.descriptor
                .properties()
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        globals.insert("realm".to_owned(), topology.realm.to_string());
        lookup
    }

    fn plan_container(
        &self,
        run: &mut Run<'_>,
        lookup: &Lookup,
        container: ContainerRef<'_>,
        hosts: &BTreeSet<&str>,
    ) -> Result<()> {
        let label = container.to_string();

        for (config_type, configuration) in container.configurations(true).iter() {
            for (property, value) in configuration.properties() {
                let value = self.substitutor.substitute(value, lookup).context(
                    SubstituteConfigurationSnafu {
                        config_type,
                        property,
                    },
                )?;
                run.plan.set_configuration(config_type, property, value);
            }
        }

        let identities = container
            .active_identities(&run.context)
            .context(ResolveIdentitiesSnafu { container: &label })?;

        let mut host_lookup = lookup.clone();
        for identity in &identities {
            let substitute = |template: &str, lookup: &Lookup| {
                self.substitutor
                    .substitute(template, lookup)
                    .context(SubstituteIdentitySnafu {
                        container: &label,
                        identity: &identity.name,
                    })
            };

            let Some(principal) = identity.principal.as_ref() else {
                debug!(
                    container = %label,
                    identity = %identity.name,
                    "identity has no principal, skipping it"
                );
                continue;
            };
            let Some(principal_template) = principal.value.as_deref() else {
                debug!(
                    container = %label,
                    identity = %identity.name,
                    "identity has no principal value, skipping it"
                );
                continue;
            };

            // Configuration values keep _HOST, Hadoop replaces it at runtime
            let cluster_principal = substitute(principal_template, lookup)?;
            if let Some(target) = &principal.configuration {
                run.plan.set_target(target, cluster_principal.clone());
            }
            if let Some(KeytabDescriptor {
                file: Some(file),
                configuration: Some(target),
                ..
            }) = &identity.keytab
            {
                run.plan.set_target(target, substitute(file, lookup)?);
            }

            let local_username = principal
                .local_username
                .as_deref()
                .map(|username| substitute(username, lookup))
                .transpose()?;
            if let Some(local_username) = &local_username {
                run.auth_to_local.add_rule(&cluster_principal, local_username);
            }

            for host in hosts {
                host_lookup
                    .entry(String::new())
                    .or_default()
                    .insert("hostname".to_owned(), (*host).to_owned());

                let resolved = Self::resolve_on_host(
                    container,
                    identity,
                    host,
                    &host_lookup,
                    local_username.clone(),
                    &substitute,
                )?;

                let key = (
                    resolved.host.clone(),
                    resolved.principal.clone(),
                    resolved.keytab.as_ref().map(|k| k.file.clone()),
                );
                if run.seen.insert(key) {
                    run.plan.identities.push(resolved);
                }
            }
        }

        Ok(())
    }

    fn resolve_on_host(
        container: ContainerRef<'_>,
        identity: &IdentityDescriptor,
        host: &str,
        lookup: &Lookup,
        local_username: Option<String>,
        substitute: impl Fn(&str, &Lookup) -> Result<String>,
    ) -> Result<ResolvedIdentity> {
        let principal = identity.principal.as_ref();
        let principal_value = principal
            .and_then(|p| p.value.as_deref())
            .map(|value| substitute(value, lookup))
            .transpose()?
            .unwrap_or_default()
            .replace(HOST_MARKER, &host.to_lowercase());

        let substitute_access = |access: &FileAccess| -> Result<FileAccess> {
            Ok(FileAccess {
                name: access
                    .name
                    .as_deref()
                    .map(|name| substitute(name, lookup))
                    .transpose()?,
                access: access.access.clone(),
            })
        };

        let keytab = match &identity.keytab {
            Some(keytab @ KeytabDescriptor {
                file: Some(file), ..
            }) => Some(ResolvedKeytab {
                file: substitute(file, lookup)?,
                owner: substitute_access(&keytab.owner)?,
                group: substitute_access(&keytab.group)?,
                cachable: keytab.is_cachable(),
            }),
            _ => None,
        };

        let (service, component) = match container {
            ContainerRef::Component {
                service, component, ..
            } => (
                service.map(|s| s.name.clone()).unwrap_or_default(),
                Some(component.name.clone()),
            ),
            other => (other.name().unwrap_or_default().to_owned(), None),
        };

        Ok(ResolvedIdentity {
            name: identity.name.clone(),
            service,
            component,
            host: host.to_owned(),
            principal: principal_value,
            principal_type: principal.and_then(|p| p.principal_type),
            local_username,
            keytab,
        })
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::*;
    use crate::codec::DescriptorCodec;

    const DESCRIPTOR: &str = indoc! {r#"
        {
          "properties": {
            "realm": "${kerberos-env/realm}",
            "keytab_dir": "/etc/security/keytabs",
            "principal_suffix": "-${cluster-env/cluster_name|toLower()}"
          },
          "identities": [
            {
              "name": "spnego",
              "principal": {"value": "HTTP/_HOST@${realm}", "type": "service"},
              "keytab": {
                "file": "${keytab_dir}/spnego.service.keytab",
                "owner": {"name": "root", "access": "r"},
                "group": {"name": "${cluster-env/user_group}", "access": "r"}
              }
            },
            {
              "name": "smokeuser",
              "principal": {
                "value": "${cluster-env/smokeuser}${principal_suffix}@${realm}",
                "type": "user",
                "local_username": "${cluster-env/smokeuser}"
              },
              "keytab": {"file": "${keytab_dir}/smokeuser.headless.keytab", "cachable": false}
            }
          ],
          "auth_to_local_properties": ["core-site/hadoop.security.auth_to_local"],
          "configurations": [
            {"core-site": {"hadoop.security.authentication": "kerberos"}}
          ],
          "services": [
            {
              "name": "HDFS",
              "identities": [
                {
                  "name": "/spnego",
                  "principal": {"configuration": "hdfs-site/dfs.web.authentication.kerberos.principal"},
                  "keytab": {"configuration": "hdfs-site/dfs.web.authentication.kerberos.keytab"}
                },
                {"name": "/smokeuser"}
              ],
              "configurations": [
                {"hdfs-site": {"dfs.block.access.token.enable": "true"}}
              ],
              "components": [
                {
                  "name": "NAMENODE",
                  "identities": [
                    {
                      "name": "namenode_nn",
                      "principal": {
                        "value": "nn/_HOST@${realm}",
                        "type": "service",
                        "configuration": "hdfs-site/dfs.namenode.kerberos.principal",
                        "local_username": "${hadoop-env/hdfs_user}"
                      },
                      "keytab": {
                        "file": "${keytab_dir}/nn.service.keytab",
                        "owner": {"name": "${hadoop-env/hdfs_user}", "access": "r"},
                        "configuration": "hdfs-site/dfs.namenode.keytab.file"
                      }
                    }
                  ]
                },
                {
                  "name": "DATANODE",
                  "identities": [
                    {
                      "name": "datanode_dn",
                      "principal": {
                        "value": "dn/_HOST@${realm}",
                        "configuration": "hdfs-site/dfs.datanode.kerberos.principal",
                        "local_username": "${hadoop-env/hdfs_user}"
                      },
                      "keytab": {"file": "${keytab_dir}/dn.service.keytab"}
                    }
                  ]
                }
              ]
            },
            {
              "name": "HIVE",
              "components": [
                {
                  "name": "HIVE_SERVER",
                  "identities": [
                    {
                      "name": "hive_server_hive",
                      "principal": {"value": "hive/_HOST@${realm}"},
                      "when": {"contains": ["services", "HIVE"]}
                    }
                  ]
                }
              ]
            },
            {
              "name": "ZOOKEEPER",
              "configurations": [
                {"zoo.cfg": {"zk.connect": "${clusterHostInfo/zookeeper_server_hosts|each(%s:2181, \\,, \\,)}"}}
              ]
            }
          ]
        }
    "#};

    const TOPOLOGY: &str = indoc! {r#"
        {
          "realm": "EXAMPLE.COM",
          "services": {
            "HDFS": {
              "NAMENODE": ["nn1.example.com"],
              "DATANODE": ["dn1.example.com", "dn2.example.com"],
              "JOURNALNODE": ["nn1.example.com"]
            },
            "KAFKA": {"KAFKA_BROKER": ["kafka1.example.com"]},
            "ZOOKEEPER": {"ZOOKEEPER_SERVER": ["zk1.example.com", "zk2.example.com"]}
          },
          "configurations": {
            "cluster-env": {"cluster_name": "C1", "smokeuser": "ambari-qa", "user_group": "hadoop"},
            "hadoop-env": {"hdfs_user": "hdfs"},
            "core-site": {"hadoop.security.auth_to_local": "RULE:[2:$1@$0](jhs@EXAMPLE.COM)s/.*/mapred/\nDEFAULT"}
          }
        }
    "#};

    fn descriptor() -> RootDescriptor {
        RootDescriptor::from_json_str(DESCRIPTOR).expect("test descriptor is valid")
    }

    fn topology() -> ClusterTopology {
        serde_json::from_str(TOPOLOGY).expect("test topology is valid")
    }

    #[test]
    fn plans_identities_per_host() {
        let descriptor = descriptor();
        let plan = Planner::new(&descriptor)
            .plan(&topology())
            .expect("planning succeeds");

        // spnego and smokeuser on three HDFS hosts, one NameNode and two DataNodes
        assert_eq!(plan.identities.len(), 9);

        let on_nn1 = plan
            .identities_on_host("nn1.example.com")
            .map(|identity| identity.principal.as_str())
            .collect::<Vec<_>>();
        assert_eq!(on_nn1, [
            "HTTP/nn1.example.com@EXAMPLE.COM",
            "ambari-qa-c1@EXAMPLE.COM",
            "nn/nn1.example.com@EXAMPLE.COM",
        ]);

        let namenode = plan
            .identities
            .iter()
            .find(|identity| identity.name == "namenode_nn")
            .expect("namenode_nn is planned");
        assert_eq!(namenode.service, "HDFS");
        assert_eq!(namenode.component.as_deref(), Some("NAMENODE"));
        assert_eq!(namenode.principal_type, Some(PrincipalType::Service));
        assert_eq!(namenode.local_username.as_deref(), Some("hdfs"));
        let keytab = namenode.keytab.as_ref().expect("namenode_nn has a keytab");
        assert_eq!(keytab.file, "/etc/security/keytabs/nn.service.keytab");
        assert_eq!(keytab.owner, FileAccess::new("hdfs", "r"));
        assert!(keytab.cachable);

        let smokeuser = plan
            .identities
            .iter()
            .find(|identity| identity.name == "/smokeuser")
            .expect("smokeuser is planned");
        assert_eq!(smokeuser.component, None);
        assert_eq!(
            smokeuser.keytab.as_ref().map(|k| k.cachable),
            Some(false)
        );

        let spnego = plan
            .identities
            .iter()
            .find(|identity| identity.name == "/spnego")
            .and_then(|identity| identity.keytab.as_ref())
            .expect("spnego has a keytab");
        assert_eq!(spnego.group, FileAccess::new("hadoop", "r"));
    }

    #[test]
    fn plans_configuration_edits() {
        let descriptor = descriptor();
        let plan = Planner::new(&descriptor)
            .plan(&topology())
            .expect("planning succeeds");

        assert_eq!(
            plan.configuration_value("core-site", "hadoop.security.authentication"),
            Some("kerberos")
        );
        assert_eq!(
            plan.configuration_value("hdfs-site", "dfs.block.access.token.enable"),
            Some("true")
        );
        assert_eq!(
            plan.configuration_value("hdfs-site", "dfs.namenode.kerberos.principal"),
            Some("nn/_HOST@EXAMPLE.COM")
        );
        assert_eq!(
            plan.configuration_value("hdfs-site", "dfs.namenode.keytab.file"),
            Some("/etc/security/keytabs/nn.service.keytab")
        );
        assert_eq!(
            plan.configuration_value("hdfs-site", "dfs.web.authentication.kerberos.principal"),
            Some("HTTP/_HOST@EXAMPLE.COM")
        );
        assert_eq!(
            plan.configuration_value("hdfs-site", "dfs.web.authentication.kerberos.keytab"),
            Some("/etc/security/keytabs/spnego.service.keytab")
        );
        assert_eq!(
            plan.configuration_value("zoo.cfg", "zk.connect"),
            Some("zk1.example.com:2181,zk2.example.com:2181")
        );

        assert_eq!(
            plan.configuration_value("core-site", "hadoop.security.auth_to_local"),
            Some(indoc! {r"
                RULE:[1:$1@$0](ambari-qa-c1@EXAMPLE.COM)s/.*/ambari-qa/
                RULE:[2:$1@$0](dn@EXAMPLE.COM)s/.*/hdfs/
                RULE:[2:$1@$0](nn@EXAMPLE.COM)s/.*/hdfs/
                RULE:[2:$1@$0](jhs@EXAMPLE.COM)s/.*/mapred/
                RULE:[1:$1@$0](.*@EXAMPLE.COM)s/@.*//
                DEFAULT"})
        );
    }

    #[test]
    fn when_predicates_use_installed_services() {
        let descriptor = descriptor();
        let mut topology = topology();
        topology.services.insert(
            "HIVE".to_owned(),
            BTreeMap::from([("HIVE_SERVER".to_owned(), vec!["hive1.example.com".to_owned()])]),
        );

        let plan = Planner::new(&descriptor)
            .plan(&topology)
            .expect("planning succeeds");
        assert_eq!(plan.identities_on_host("hive1.example.com").count(), 1);

        topology.context = Some(json!({"services": ["HDFS"]}));
        let plan = Planner::new(&descriptor)
            .plan(&topology)
            .expect("planning succeeds");
        assert_eq!(plan.identities_on_host("hive1.example.com").count(), 0);
    }

    #[test]
    fn circular_variables_fail_the_plan() {
        let descriptor = descriptor()
            .with_property("a", "${b}")
            .with_property("b", "${a}")
            .with_property("keytab_dir", "${a}");

        let error = Planner::new(&descriptor)
            .plan(&topology())
            .expect_err("circular variables must be reported");
        assert!(matches!(error, Error::SubstituteIdentity { .. }));
    }

    #[test]
    fn default_context_lists_installed_services() {
        assert_eq!(
            *topology().predicate_context(),
            json!({"services": ["HDFS", "KAFKA", "ZOOKEEPER"]})
        );
    }
}
