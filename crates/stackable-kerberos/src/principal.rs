use serde::{Deserialize, Serialize};

/// The literal marker inside a principal pattern which is replaced by the (lowercase) hostname of
/// the node the principal is created for.
pub const HOST_MARKER: &str = "_HOST";

/// Distinguishes principals used by a service from principals representing a (headless) user.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PrincipalType {
    Service,
    User,
}

/// Describes the principal of an identity.
///
/// The `value` is a pattern which can contain variables (`${realm}`,
/// `${hadoop-env/hdfs_user}`, ...) and the [`HOST_MARKER`]. All fields are optional so that an
/// identity referencing another one only needs to declare the fields it overrides.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PrincipalDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub principal_type: Option<PrincipalType>,

    /// The `configType/propertyName` that receives the principal value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,

    /// The local OS user this principal is mapped to by the generated auth-to-local rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_username: Option<String>,
}

impl PrincipalDescriptor {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = Some(configuration.into());
        self
    }

    pub fn with_type(mut self, principal_type: PrincipalType) -> Self {
        self.principal_type = Some(principal_type);
        self
    }

    pub fn with_local_username(mut self, local_username: impl Into<String>) -> Self {
        self.local_username = Some(local_username.into());
        self
    }

    /// Overwrites every field that is set in `overlay`.
    pub fn update(&mut self, overlay: &Self) {
        if overlay.value.is_some() {
            self.value.clone_from(&overlay.value);
        }
        if overlay.principal_type.is_some() {
            self.principal_type = overlay.principal_type;
        }
        if overlay.configuration.is_some() {
            self.configuration.clone_from(&overlay.configuration);
        }
        if overlay.local_username.is_some() {
            self.local_username.clone_from(&overlay.local_username);
        }
    }
}
