use std::io::Write;

use clap::Parser;
use snafu::{ResultExt, Snafu};

use crate::cli::Cli;

mod cli;
mod commands;
mod loader;
mod logging;

const APP_NAME: &str = "kerberos-descriptor";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitLogging { source: logging::Error },

    #[snafu(display("failed to run {command}"))]
    RunCommand {
        source: commands::Error,
        command: String,
    },

    #[snafu(display("failed to write the result to stdout"))]
    WriteOutput { source: std::io::Error },
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    logging::initialize(APP_NAME, &cli.logging).context(InitLoggingSnafu)?;

    let output = commands::run(&cli.command, cli.output).context(RunCommandSnafu {
        command: cli.command.to_string(),
    })?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", output.trim_end()).context(WriteOutputSnafu)
}
