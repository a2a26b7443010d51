use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stackable_kerberos::substitution::Function;

use crate::logging::LoggingOptions;

/// Inspect, merge and resolve Kerberos descriptors.
#[derive(Debug, PartialEq, Eq, Parser)]
#[command(name = "kerberos-descriptor", version, about)]
pub struct Cli {
    /// Format of the printed result.
    #[arg(long, short, global = true, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,

    #[command(flatten)]
    pub logging: LoggingOptions,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Command {
    /// Print the effective descriptor, after the overlay has been merged.
    Merge(DescriptorArgs),

    /// Print the identities of a service or component.
    Identities {
        #[command(flatten)]
        descriptor: DescriptorArgs,

        #[arg(long)]
        service: String,

        #[arg(long)]
        component: Option<String>,

        /// Print the identities as declared, without following references.
        #[arg(long, conflicts_with = "context")]
        unresolved: bool,

        /// Only print identities whose `when` predicate holds for the JSON or YAML context in
        /// FILE.
        #[arg(long, value_name = "FILE")]
        context: Option<PathBuf>,
    },

    /// Resolve all principals, keytabs and configuration changes for a cluster.
    Plan {
        #[command(flatten)]
        descriptor: DescriptorArgs,

        /// JSON or YAML file describing the realm, installed components and current
        /// configurations.
        #[arg(long, value_name = "FILE")]
        topology: PathBuf,
    },

    /// Replace the `${group/property}` variables of a template.
    Substitute {
        #[arg(long)]
        template: String,

        /// JSON or YAML file mapping groups to their properties.
        #[arg(long, value_name = "FILE")]
        lookup: PathBuf,

        /// Restrict the functions that may be used in variables, all are enabled by default.
        #[arg(long, value_delimiter = ',', num_args = 0..)]
        functions: Option<Vec<Function>>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Args)]
pub struct DescriptorArgs {
    /// The stack descriptor (JSON or YAML). Searched for in the default locations if not given.
    #[arg(long, env = "KERBEROS_DESCRIPTOR", value_name = "FILE")]
    pub descriptor: Option<PathBuf>,

    /// A descriptor merged on top of the stack descriptor.
    #[arg(long, value_name = "FILE")]
    pub overlay: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}
