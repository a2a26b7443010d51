//! Generation of Hadoop style `auth_to_local` rules.
//!
//! ```text
//! RULE:[1:$1@$0](ambari-qa-c1@EXAMPLE.COM)s/.*/ambari-qa/
//! RULE:[2:$1@$0](nn@EXAMPLE.COM)s/.*/hdfs/
//! RULE:[1:$1@$0](.*@EXAMPLE.COM)s/@.*//
//! DEFAULT
//! ```
use std::collections::BTreeSet;

use tracing::debug;

use crate::realm::KerberosRealmName;

const RULE_PREFIX: &str = "RULE:";
const DEFAULT_RULE: &str = "DEFAULT";

/// Collects principal to local user mappings and renders them as rules.
#[derive(Clone, Debug)]
pub struct AuthToLocalBuilder {
    default_realm: KerberosRealmName,
    principal_rules: BTreeSet<String>,
    custom_rules: Vec<String>,
}

impl AuthToLocalBuilder {
    pub fn new(default_realm: KerberosRealmName) -> Self {
        Self {
            default_realm,
            principal_rules: BTreeSet::new(),
            custom_rules: Vec::new(),
        }
    }

    /// Adds a rule mapping `principal` (`primary[/instance][@REALM]`) to `local_username`.
    ///
    /// Principals without a realm belong to the default realm. Principals that can't be parsed
    /// and empty user names are ignored.
    pub fn add_rule(&mut self, principal: &str, local_username: &str) -> &mut Self {
        let local_username = local_username.trim();
        let Some((primary, has_instance, realm)) = self.split_principal(principal) else {
            debug!(principal, "ignoring principal that can't be mapped to a local user");
            return self;
        };
        if local_username.is_empty() {
            debug!(principal, "ignoring principal without local user name");
            return self;
        }

        let components = if has_instance { 2 } else { 1 };
        self.principal_rules.insert(format!(
            "{RULE_PREFIX}[{components}:$1@$0]({primary}@{realm})s/.*/{local_username}/"
        ));
        self
    }

    /// Keeps the rules of an existing `auth_to_local` value (one rule per line).
    ///
    /// `DEFAULT` and the default realm rule are dropped since they are always generated, as are
    /// lines which aren't rules.
    pub fn add_rules_from_text(&mut self, existing: &str) -> &mut Self {
        let default_realm_rule = self.default_realm_rule();
        for rule in existing.lines().map(str::trim) {
            if !rule.starts_with(RULE_PREFIX) || rule == default_realm_rule {
                continue;
            }
            if self.principal_rules.contains(rule) || self.custom_rules.iter().any(|r| r == rule) {
                continue;
            }
            self.custom_rules.push(rule.to_owned());
        }
        self
    }

    /// Renders all rules, one per line.
    ///
    /// Principal rules come first (sorted), followed by the preserved rules in their original
    /// order, the catch-all rule for the default realm and finally `DEFAULT`.
    pub fn generate(&self) -> String {
        let mut rules = self
            .principal_rules
            .iter()
            .chain(&self.custom_rules)
            .map(String::as_str)
            .collect::<Vec<_>>();

        let default_realm_rule = self.default_realm_rule();
        rules.push(&default_realm_rule);
        rules.push(DEFAULT_RULE);
        rules.join("\n")
    }

    fn default_realm_rule(&self) -> String {
        format!("{RULE_PREFIX}[1:$1@$0](.*@{realm})s/@.*//", realm = self.default_realm)
    }

    fn split_principal<'a>(&'a self, principal: &'a str) -> Option<(&'a str, bool, &'a str)> {
        let (name, realm) = match principal.trim().rsplit_once('@') {
            Some((name, realm)) if !realm.is_empty() => (name, realm),
            Some(_) => return None,
            None => (principal.trim(), &*self.default_realm),
        };

        let (primary, has_instance) = match name.split_once('/') {
            Some((primary, _instance)) => (primary, true),
            None => (name, false),
        };

        (!primary.is_empty()).then_some((primary, has_instance, realm))
    }
}
