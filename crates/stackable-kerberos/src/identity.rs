use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    codec::Named, keytab::KeytabDescriptor, predicate::Predicate, principal::PrincipalDescriptor,
};

/// A logical Kerberos identity: a principal together with the keytab it is exported to.
///
/// An identity can *reference* another identity elsewhere in the descriptor tree, either through
/// the explicit `reference` field or by using a path (`/spnego`, `../spnego`) as its name. When
/// resolved, the referenced identity acts as the base and the fields declared here are applied
/// on top of it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IdentityDescriptor {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<PrincipalDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keytab: Option<KeytabDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Encoded as nested single-key maps in YAML as well, tagged enums can't pass through the
    /// flattened containers.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_yaml::with::singleton_map_recursive"
    )]
    pub when: Option<Predicate>,
}

impl IdentityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: None,
            principal: None,
            keytab: None,
            password: None,
            when: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_principal(mut self, principal: PrincipalDescriptor) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_keytab(mut self, keytab: KeytabDescriptor) -> Self {
        self.keytab = Some(keytab);
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_when(mut self, when: Predicate) -> Self {
        self.when = Some(when);
        self
    }

    /// The path of the identity this one refers to, if any.
    ///
    /// This is the explicit `reference` if set, otherwise the name if it is written as a path.
    pub fn reference_path(&self) -> Option<&str> {
        match &self.reference {
            Some(reference) if !reference.is_empty() => Some(reference.as_str()),
            _ if self.name.starts_with('/') || self.name.starts_with("../") => {
                Some(self.name.as_str())
            }
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.reference_path().is_some()
    }

    /// Identities without a `when` predicate are always included.
    pub fn should_include(&self, context: &Value) -> bool {
        self.when
            .as_ref()
            .is_none_or(|predicate| predicate.evaluate(context))
    }

    /// Applies every field set in `overlay` on top of `self`. Principal and keytab are merged
    /// field by field if both sides have one.
    pub fn update(&mut self, overlay: &Self) {
        self.name.clone_from(&overlay.name);

        if overlay.reference.is_some() {
            self.reference.clone_from(&overlay.reference);
        }

        if let Some(update) = &overlay.principal {
            self.principal
                .get_or_insert_with(PrincipalDescriptor::default)
                .update(update);
        }

        if let Some(update) = &overlay.keytab {
            self.keytab
                .get_or_insert_with(KeytabDescriptor::default)
                .update(update);
        }

        if overlay.password.is_some() {
            self.password.clone_from(&overlay.password);
        }

        if overlay.when.is_some() {
            self.when.clone_from(&overlay.when);
        }
    }
}

impl Named for IdentityDescriptor {
    fn name(&self) -> &str {
        &self.name
    }
}
