use crate::{
    chunker::TaskList,
    config::{BatchConfig, ConfigErrors},
    executors::{execute, Executor, ExecutorError, Invocation},
    fs::mkdirp,
    script::{script_path, ScriptTemplate},
};
use std::{ffi::OsStr, io, path::PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Invalid configuration")]
    Config(#[from] ConfigErrors),
    #[error("Failed to read task list {path:?}")]
    TaskList {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to create script directory {path:?}")]
    ScriptsDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write job script {path:?}")]
    WriteScript {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to submit job script")]
    Executor(#[from] ExecutorError),
}

/// What a run left behind
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmitReport {
    /// one script per chunk, in chunk order
    pub scripts: Vec<PathBuf>,
    /// false for dry runs
    pub submitted: bool,
}

/// Read the configured task list and submit it
pub fn run<E>(config: &BatchConfig, executor: &mut E) -> Result<SubmitReport, SubmitError>
where
    E: Executor + ?Sized,
{
    let tasks = TaskList::read(&config.task_list).map_err(|source| SubmitError::TaskList {
        path: config.task_list.clone(),
        source,
    })?;

    submit(config, &tasks, executor)
}

/// Write, chmod and qsub one script per chunk, stopping at the first failure
///
/// Chunks submitted before a failure stay submitted, later chunks are never written.
#[instrument(skip_all, fields(task_list = ?config.task_list, dry_run = config.dry_run))]
pub fn submit<E>(
    config: &BatchConfig,
    tasks: &TaskList,
    executor: &mut E,
) -> Result<SubmitReport, SubmitError>
where
    E: Executor + ?Sized,
{
    let total = tasks.chunk_count(config.chunk_size);
    let template = ScriptTemplate::from_config(config);

    debug!(
        tasks = tasks.len(),
        chunk_size = config.chunk_size.get(),
        chunks = total,
        output_dir = ?config.output_dir,
        directives = ?template.directives(),
        "Partitioned task list"
    );

    if tasks.is_empty() {
        warn!(task_list = ?config.task_list, "Task list is empty, nothing to submit");
    }

    let scripts_dir = mkdirp([&config.scripts_dir]).map_err(|source| SubmitError::ScriptsDir {
        path: config.scripts_dir.clone(),
        source,
    })?;

    let mut report = SubmitReport {
        scripts: Vec::with_capacity(total),
        submitted: !config.dry_run,
    };

    for chunk in tasks.chunks(config.chunk_size) {
        let script = template
            .write(&scripts_dir, &config.task_list, &chunk)
            .map_err(|source| SubmitError::WriteScript {
                path: script_path(&scripts_dir, &config.task_list, chunk.index),
                source,
            })?;

        execute(
            &mut *executor,
            &Invocation::new("chmod", [OsStr::new("+x"), script.as_os_str()]),
            b"",
            config.dry_run,
        )?;
        execute(
            &mut *executor,
            &Invocation::new("qsub", [&script]),
            b"",
            config.dry_run,
        )?;

        info!(
            script = ?script,
            tasks = chunk.lines.len(),
            "{} chunk {}/{total}",
            if config.dry_run { "Prepared" } else { "Submitted" },
            chunk.index + 1
        );
        report.scripts.push(script);
    }

    info!(chunks = total, dry_run = config.dry_run, "Done with submitting");

    Ok(report)
}

#[cfg(test)]
#[path = "submit_test.rs"]
mod submit_test;
