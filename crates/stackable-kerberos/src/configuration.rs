use std::{collections::BTreeMap, fmt};

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
};

use crate::codec::Named;

/// A set of configuration properties for one configuration type (for example `core-site`).
///
/// On the wire a configuration is a single-entry map: `{"core-site": {"key": "value"}}`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigurationDescriptor {
    config_type: String,
    properties: BTreeMap<String, String>,
}

impl ConfigurationDescriptor {
    pub fn new(config_type: impl Into<String>) -> Self {
        Self {
            config_type: config_type.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.put_property(name, value);
        self
    }

    pub fn config_type(&self) -> &str {
        &self.config_type
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

    pub fn remove_property(&mut self, name: &str) -> Option<String> {
        self.properties.remove(name)
    }

    /// Merges the properties of `overlay` into `self`, property by property. Values from
    /// `overlay` win. The configuration type is never changed.
    pub fn update(&mut self, overlay: &Self) {
        for (name, value) in &overlay.properties {
            self.properties.insert(name.clone(), value.clone());
        }
    }
}

impl Named for ConfigurationDescriptor {
    fn name(&self) -> &str {
        &self.config_type
    }
}

impl Serialize for ConfigurationDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.config_type, &self.properties)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConfigurationDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ConfigurationVisitor;

        impl<'de> Visitor<'de> for ConfigurationVisitor {
            type Value = ConfigurationDescriptor;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map with a single configuration type as key")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let Some((config_type, properties)) =
                    map.next_entry::<String, BTreeMap<String, String>>()?
                else {
                    return Err(de::Error::missing_field("type"));
                };

                if map.next_key::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(2, &self));
                }

                Ok(ConfigurationDescriptor {
                    config_type,
                    properties,
                })
            }
        }

        deserializer.deserialize_map(ConfigurationVisitor)
    }
}
