mod process;
#[cfg(test)]
pub mod recording;

pub use process::ProcessExecutor;

use itertools::Itertools;
use std::{
    ffi::{OsStr, OsString},
    fmt::{self, Display},
    io,
    time::Duration,
};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Returns {code} :: {command}")]
    Failed { code: i32, command: String },
    #[error("Terminated by signal :: {command}")]
    Killed { command: String },
    #[error("Failed to spawn :: {command}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write to stdin :: {command}")]
    Stdin {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to wait for child :: {command}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("Timed out after {timeout:?} :: {command}")]
    Timeout { command: String, timeout: Duration },
}

/// A program and its arguments, displayed as the space joined command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: AsRef<OsStr>,
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        Self {
            program: program.as_ref().to_owned(),
            args: args
                .into_iter()
                .map(|arg| arg.as_ref().to_owned())
                .collect_vec(),
        }
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy())
            .join(" ");

        f.write_str(&line)
    }
}

/// Something that can run an external command to completion
pub trait Executor {
    /// run `invocation` with `input` on its stdin and block until it exits
    ///
    /// Returns the exit code, `None` if the child was terminated by a signal.
    fn spawn(
        &mut self,
        invocation: &Invocation,
        input: &[u8],
    ) -> Result<Option<i32>, ExecutorError>;
}

/// Log and run a command, a non-zero exit is turned into `ExecutorError::Failed`
///
/// With `dry_run` set nothing is spawned, the command is only logged.
pub fn execute<E>(
    executor: &mut E,
    invocation: &Invocation,
    input: &[u8],
    dry_run: bool,
) -> Result<(), ExecutorError>
where
    E: Executor + ?Sized,
{
    debug!("Running: {invocation}");

    if dry_run {
        return Ok(());
    }

    match executor.spawn(invocation, input)? {
        Some(0) => Ok(()),
        Some(code) => Err(ExecutorError::Failed {
            code,
            command: invocation.to_string(),
        }),
        None => Err(ExecutorError::Killed {
            command: invocation.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{execute, recording::RecordingExecutor, ExecutorError, Invocation};

    const NO_ARGS: [&str; 0] = [];

    #[test]
    fn display_joins_program_and_arguments() {
        let invocation = Invocation::new("chmod", ["+x", ".scripts/jobs_0.sh"]);

        assert_eq!(invocation.to_string(), "chmod +x .scripts/jobs_0.sh");
    }

    #[test]
    fn dry_run_does_not_spawn() {
        let mut executor = RecordingExecutor::default();

        execute(&mut executor, &Invocation::new("qsub", ["a.sh"]), b"", true).unwrap();

        assert!(executor.calls.is_empty());
    }

    #[test]
    fn input_is_forwarded() {
        let mut executor = RecordingExecutor::default();

        execute(&mut executor, &Invocation::new("cat", NO_ARGS), b"payload", false).unwrap();

        assert_eq!(executor.calls, ["cat"]);
        assert_eq!(executor.inputs, [b"payload".to_vec()]);
    }

    #[test]
    fn non_zero_exit_carries_code_and_command() {
        let mut executor = RecordingExecutor::default().fail_on("qsub b.sh", 3);

        execute(&mut executor, &Invocation::new("qsub", ["a.sh"]), b"", false).unwrap();
        let error = execute(&mut executor, &Invocation::new("qsub", ["b.sh"]), b"", false)
            .unwrap_err();

        assert!(matches!(
            error,
            ExecutorError::Failed { code: 3, ref command } if command == "qsub b.sh"
        ));
        assert_eq!(error.to_string(), "Returns 3 :: qsub b.sh");
    }
}
