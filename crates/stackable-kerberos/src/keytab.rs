use serde::{Deserialize, Serialize};

/// Ownership of a keytab file, either the owning user or the owning group.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct FileAccess {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Access mode, usually `r`, `rw` or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
}

impl FileAccess {
    pub fn new(name: impl Into<String>, access: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            access: Some(access.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.access.is_none()
    }

    pub fn update(&mut self, overlay: &Self) {
        if overlay.name.is_some() {
            self.name.clone_from(&overlay.name);
        }
        if overlay.access.is_some() {
            self.access.clone_from(&overlay.access);
        }
    }
}

/// Describes the keytab file an identity's principal is exported to.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeytabDescriptor {
    /// Path pattern of the keytab file, may contain variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(default, skip_serializing_if = "FileAccess::is_empty")]
    pub owner: FileAccess,

    #[serde(default, skip_serializing_if = "FileAccess::is_empty")]
    pub group: FileAccess,

    /// The `configType/propertyName` that receives the keytab path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,

    // Kept optional so an overlay that doesn't mention it leaves the base value alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cachable: Option<bool>,
}

impl KeytabDescriptor {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            ..Default::default()
        }
    }

    pub fn with_owner(mut self, name: impl Into<String>, access: impl Into<String>) -> Self {
        self.owner = FileAccess::new(name, access);
        self
    }

    pub fn with_group(mut self, name: impl Into<String>, access: impl Into<String>) -> Self {
        self.group = FileAccess::new(name, access);
        self
    }

    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = Some(configuration.into());
        self
    }

    pub fn with_cachable(mut self, cachable: bool) -> Self {
        self.cachable = Some(cachable);
        self
    }

    /// Keytabs are cachable unless explicitly declared otherwise.
    pub fn is_cachable(&self) -> bool {
        self.cachable.unwrap_or(true)
    }

    pub fn update(&mut self, overlay: &Self) {
        if overlay.file.is_some() {
            self.file.clone_from(&overlay.file);
        }
        self.owner.update(&overlay.owner);
        self.group.update(&overlay.group);
        if overlay.configuration.is_some() {
            self.configuration.clone_from(&overlay.configuration);
        }
        if overlay.cachable.is_some() {
            self.cachable = overlay.cachable;
        }
    }
}
