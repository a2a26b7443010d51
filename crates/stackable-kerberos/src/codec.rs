//! Symmetric encoding of descriptors to and from generic maps (and JSON/YAML text).
//!
//! Every descriptor type implements [`DescriptorCodec`]. Decoding what was encoded yields a
//! structurally equal descriptor; identity references are kept verbatim and never dereferenced.
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu};

use crate::{
    configuration::ConfigurationDescriptor,
    container::DescriptorContainer,
    identity::IdentityDescriptor,
    keytab::KeytabDescriptor,
    principal::PrincipalDescriptor,
    root::RootDescriptor,
    service::{ComponentDescriptor, ServiceDescriptor},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to encode descriptor"))]
    Encode { source: serde_json::Error },

    #[snafu(display("encoded descriptor is a JSON {kind}, expected a map"))]
    NotAMap { kind: &'static str },

    #[snafu(display("failed to decode descriptor"))]
    Decode { source: serde_json::Error },

    #[snafu(display("failed to parse descriptor from JSON"))]
    ParseJson { source: serde_json::Error },

    #[snafu(display("failed to parse descriptor from YAML"))]
    ParseYaml { source: serde_yaml::Error },

    #[snafu(display("failed to serialize descriptor as JSON"))]
    SerializeJson { source: serde_json::Error },

    #[snafu(display("failed to serialize descriptor as YAML"))]
    SerializeYaml { source: serde_yaml::Error },
}

/// Encode/decode support shared by all descriptor types.
pub trait DescriptorCodec: Serialize + DeserializeOwned {
    /// Encodes `self` into a generic map, using the same keys the descriptor was read from.
    fn to_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self).context(EncodeSnafu)? {
            Value::Object(map) => Ok(map),
            other => NotAMapSnafu {
                kind: value_kind(&other),
            }
            .fail(),
        }
    }

    fn from_map(map: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(map)).context(DecodeSnafu)
    }

    fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).context(ParseJsonSnafu)
    }

    fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).context(ParseYamlSnafu)
    }

    fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context(SerializeJsonSnafu)
    }

    fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context(SerializeYamlSnafu)
    }
}

impl DescriptorCodec for RootDescriptor {}
impl DescriptorCodec for ServiceDescriptor {}
impl DescriptorCodec for ComponentDescriptor {}
impl DescriptorCodec for DescriptorContainer {}
impl DescriptorCodec for IdentityDescriptor {}
impl DescriptorCodec for ConfigurationDescriptor {}
impl DescriptorCodec for PrincipalDescriptor {}
impl DescriptorCodec for KeytabDescriptor {}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Descriptors which are keyed by a name inside their parent.
pub trait Named {
    fn name(&self) -> &str;
}

/// (De)serializes an [`IndexMap`](indexmap::IndexMap) keyed by [`Named::name`] as a plain list.
///
/// A later entry replaces an earlier entry with the same name.
pub(crate) mod named_list {
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Named;

    pub fn serialize<S, T>(map: &IndexMap<String, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<IndexMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Named,
    {
        let items = Vec::<T>::deserialize(deserializer)?;
        let mut map = IndexMap::with_capacity(items.len());
        for item in items {
            map.insert(item.name().to_owned(), item);
        }
        Ok(map)
    }
}

/// Deserializes a list of [`Named`] items, keeping only the last item per name (moved to the
/// position of that last occurrence).
pub(crate) mod unique_list {
    use serde::{Deserialize, Deserializer};

    use super::Named;

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Named,
    {
        let items = Vec::<T>::deserialize(deserializer)?;
        let mut unique: Vec<T> = Vec::with_capacity(items.len());
        for item in items {
            unique.retain(|existing| existing.name() != item.name());
            unique.push(item);
        }
        Ok(unique)
    }
}
