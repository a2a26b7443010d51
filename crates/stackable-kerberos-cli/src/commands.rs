use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use snafu::{OptionExt, ResultExt, Snafu};
use stackable_kerberos::{
    ClusterTopology, DescriptorCodec, Planner, RootDescriptor, VariableSubstitutor, codec, plan,
    reference, substitution,
};
use tracing::debug;

use crate::{
    cli::{Command, DescriptorArgs, OutputFormat},
    loader::{self, DEFAULT_DESCRIPTOR_PATHS},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to locate the stack descriptor"))]
    LocateDescriptor { source: loader::Error },

    #[snafu(display("failed to load the stack descriptor"))]
    LoadDescriptor { source: loader::Error },

    #[snafu(display("failed to load the descriptor overlay"))]
    LoadOverlay { source: loader::Error },

    #[snafu(display("failed to load the predicate context"))]
    LoadContext { source: loader::Error },

    #[snafu(display("failed to load the cluster topology"))]
    LoadTopology { source: loader::Error },

    #[snafu(display("failed to load the substitution lookup"))]
    LoadLookup { source: loader::Error },

    #[snafu(display("service {service:?} is not part of the descriptor"))]
    UnknownService { service: String },

    #[snafu(display("component {component:?} is not part of service {service:?}"))]
    UnknownComponent { service: String, component: String },

    #[snafu(display("failed to resolve the identities of {container}"))]
    ResolveIdentities {
        source: reference::Error,
        container: String,
    },

    #[snafu(display("failed to plan the cluster"))]
    Plan { source: plan::Error },

    #[snafu(display("failed to substitute the template"))]
    Substitute { source: substitution::Error },

    #[snafu(display("failed to render the descriptor"))]
    RenderDescriptor { source: codec::Error },

    #[snafu(display("failed to render the result as JSON"))]
    RenderJson { source: serde_json::Error },

    #[snafu(display("failed to render the result as YAML"))]
    RenderYaml { source: serde_yaml::Error },
}

/// Runs `command` and returns what is to be printed.
pub fn run(command: &Command, output: OutputFormat) -> Result<String> {
    match command {
        Command::Merge(args) => {
            let descriptor = load_descriptor(args)?;
            let rendered = match output {
                OutputFormat::Json => descriptor.to_json_string(),
                OutputFormat::Yaml => descriptor.to_yaml_string(),
            };
            rendered.context(RenderDescriptorSnafu)
        }
        Command::Identities {
            descriptor,
            service,
            component,
            unresolved,
            context,
        } => {
            let descriptor = load_descriptor(descriptor)?;
            identities(
                &descriptor,
                service,
                component.as_deref(),
                *unresolved,
                context.as_deref(),
                output,
            )
        }
        Command::Plan {
            descriptor,
            topology,
        } => {
            let descriptor = load_descriptor(descriptor)?;
            let topology: ClusterTopology = loader::load(topology).context(LoadTopologySnafu)?;
            let plan = Planner::new(&descriptor)
                .plan(&topology)
                .context(PlanSnafu)?;
            render(&plan, output)
        }
        Command::Substitute {
            template,
            lookup,
            functions,
        } => {
            let lookup: substitution::Lookup = loader::load(lookup).context(LoadLookupSnafu)?;
            let substitutor = match functions {
                Some(functions) => VariableSubstitutor::new(functions.iter().copied()),
                None => VariableSubstitutor::default(),
            };
            substitutor
                .substitute(template, &lookup)
                .context(SubstituteSnafu)
        }
    }
}

/// Loads the stack descriptor and merges the overlay, if any, on top of it.
fn load_descriptor(args: &DescriptorArgs) -> Result<RootDescriptor> {
    let path = loader::resolve_path(args.descriptor.as_deref(), DEFAULT_DESCRIPTOR_PATHS)
        .context(LocateDescriptorSnafu)?;
    let mut descriptor: RootDescriptor = loader::load(path).context(LoadDescriptorSnafu)?;

    if let Some(overlay_path) = &args.overlay {
        let overlay: RootDescriptor = loader::load(overlay_path).context(LoadOverlaySnafu)?;
        debug!(overlay = %overlay_path.display(), "merging descriptor overlay");
        descriptor.update(&overlay);
    }

    Ok(descriptor)
}

fn identities(
    descriptor: &RootDescriptor,
    service: &str,
    component: Option<&str>,
    unresolved: bool,
    context: Option<&Path>,
    output: OutputFormat,
) -> Result<String> {
    let container = match component {
        Some(component) => {
            descriptor
                .component_ref(service, component)
                .context(UnknownComponentSnafu {
                    service,
                    component,
                })?
        }
        None => descriptor
            .service_ref(service)
            .context(UnknownServiceSnafu { service })?,
    };
    let label = container.to_string();

    let identities = match context {
        Some(context) => {
            let context: Value = loader::load(context).context(LoadContextSnafu)?;
            container
                .active_identities(&context)
                .context(ResolveIdentitiesSnafu { container: &label })?
        }
        None => container
            .identities(!unresolved)
            .context(ResolveIdentitiesSnafu { container: &label })?
            .into_owned(),
    };

    render(&identities, output)
}

fn render(value: &impl Serialize, output: OutputFormat) -> Result<String> {
    match output {
        OutputFormat::Json => serde_json::to_string_pretty(value).context(RenderJsonSnafu),
        OutputFormat::Yaml => serde_yaml::to_string(value).context(RenderYamlSnafu),
    }
}
