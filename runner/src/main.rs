mod chunker;
mod config;
mod executors;
mod fs;
mod logging;
mod script;
mod submit;

use clap::Parser;
use config::{Args, BatchConfig};
use executors::ProcessExecutor;
use submit::{SubmitError, SubmitReport};
use tracing::info;
use tracing_unwrap::ResultExt;

/// validate the command line and submit the task list with real processes
fn start(args: Args) -> Result<SubmitReport, SubmitError> {
    let config = BatchConfig::load(args)?;
    let mut executor = ProcessExecutor::new(config.timeout);

    submit::run(&config, &mut executor)
}

fn main() {
    let args = Args::parse();
    logging::init();

    let report = start(args).unwrap_or_log();

    info!(
        scripts = report.scripts.len(),
        submitted = report.submitted,
        "Finished"
    );
}
