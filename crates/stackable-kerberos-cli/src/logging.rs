use std::path::PathBuf;

use snafu::{ResultExt, Snafu};
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter::Directive, layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// The environment variable used to set the console log level filter.
pub const CONSOLE_LOG_LEVEL: &str = "CONSOLE_LOG_LEVEL";
/// The environment variable used to set the rolling file log level filter.
pub const FILE_LOG_LEVEL: &str = "FILE_LOG_LEVEL";
/// The filename suffix used for the rolling file logs.
pub const FILE_LOG_SUFFIX: &str = "tracing-rs.json";

const MAX_LOG_FILES: usize = 6;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to initialize rolling file appender"))]
    InitRollingFileAppender { source: InitError },

    #[snafu(display("failed to install the global tracing subscriber"))]
    SetGlobalDefault {
        source: tracing_subscriber::util::TryInitError,
    },
}

/// Logging related command line arguments.
#[derive(Clone, Debug, Default, PartialEq, Eq, clap::Args)]
pub struct LoggingOptions {
    /// Disable console logs.
    #[arg(long, env, global = true)]
    pub console_log_disabled: bool,

    /// Enable logging to files located in the specified DIRECTORY.
    #[arg(long, env, global = true, value_name = "DIRECTORY")]
    pub file_log_directory: Option<PathBuf>,
}

/// Installs the global subscriber.
///
/// Console logs go to stderr (stdout is reserved for command output) and are filtered by
/// [`CONSOLE_LOG_LEVEL`]. File logs are written as JSON and filtered by [`FILE_LOG_LEVEL`]. Both
/// default to INFO.
pub fn initialize(app_name: &str, options: &LoggingOptions) -> Result<()> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if !options.console_log_disabled {
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter_builder(CONSOLE_LOG_LEVEL, LevelFilter::INFO))
                .boxed(),
        );
    }

    if let Some(directory) = &options.file_log_directory {
        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(app_name)
            .filename_suffix(FILE_LOG_SUFFIX)
            .max_log_files(MAX_LOG_FILES)
            .build(directory)
            .context(InitRollingFileAppenderSnafu)?;

        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file_appender)
                .with_filter(env_filter_builder(FILE_LOG_LEVEL, LevelFilter::INFO))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context(SetGlobalDefaultSnafu)?;

    // Logging is only possible after the subscriber is installed
    match &options.file_log_directory {
        Some(directory) => {
            tracing::debug!(directory = %directory.display(), "file logging enabled");
        }
        None => tracing::debug!("file logging disabled, because no log directory set"),
    }

    Ok(())
}

fn env_filter_builder(env_var: &str, default_directive: impl Into<Directive>) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var(env_var)
        .with_default_directive(default_directive.into())
        .from_env_lossy()
}
