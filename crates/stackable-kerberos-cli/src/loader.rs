//! Locating and reading JSON or YAML input files.
use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;

/// Where the stack descriptor is looked up if none is given on the command line.
pub const DEFAULT_DESCRIPTOR_PATHS: &[&str] = &[
    "/etc/stackable/kerberos/kerberos_descriptor.json",
    "/etc/stackable/kerberos/kerberos_descriptor.yaml",
];

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "failed to locate a required file in any of the following locations: {search_path:?}"
    ))]
    RequiredFileMissing { search_path: Vec<PathBuf> },

    #[snafu(display("unsupported file extension of {path:?}, expected .json, .yaml or .yml"))]
    UnsupportedFormat { path: PathBuf },

    #[snafu(display("failed to read {path:?}"))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse {path:?} as JSON"))]
    ParseJson {
        source: serde_json::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse {path:?} as YAML"))]
    ParseYaml {
        source: serde_yaml::Error,
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum FileFormat {
    Json,
    #[strum(serialize = "yaml", serialize = "yml")]
    Yaml,
}

impl FileFormat {
    /// Determines the format by the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        path.extension()
            .and_then(|extension| extension.to_str())
            .and_then(|extension| extension.to_ascii_lowercase().parse().ok())
            .context(UnsupportedFormatSnafu { path })
    }
}

/// Reads and deserializes `path`, the format is chosen by its extension.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = FileFormat::from_path(path)?;
    let contents = fs::read_to_string(path).context(ReadFileSnafu { path })?;
    debug!(path = %path.display(), ?format, "loading file");

    match format {
        FileFormat::Json => serde_json::from_str(&contents).context(ParseJsonSnafu { path }),
        FileFormat::Yaml => serde_yaml::from_str(&contents).context(ParseYamlSnafu { path }),
    }
}

/// Picks the descriptor file to read.
///
/// An explicitly given `user_provided_path` wins and has to exist. Without one, the first
/// existing entry of `default_paths` is taken.
pub fn resolve_path<'a>(
    user_provided_path: Option<&'a Path>,
    default_paths: &'a [impl AsRef<Path> + 'a],
) -> Result<&'a Path> {
    let candidates: Vec<&Path> = match user_provided_path {
        Some(path) => vec![path],
        None => default_paths.iter().map(AsRef::as_ref).collect(),
    };

    match candidates.iter().copied().find(|candidate| candidate.exists()) {
        Some(found) => {
            debug!(path = %found.display(), "found descriptor file");
            Ok(found)
        }
        None => RequiredFileMissingSnafu {
            search_path: candidates.iter().map(PathBuf::from).collect::<Vec<_>>(),
        }
        .fail(),
    }
}
