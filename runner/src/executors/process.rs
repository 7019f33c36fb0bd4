use super::{Executor, ExecutorError, Invocation};
use std::{
    io::{self, ErrorKind, Write},
    process::{Command, Stdio},
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Executor spawning real child processes
///
/// Both stdout and stderr of the child end up on our stderr, so that stdout stays clean.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    timeout: Option<Duration>,
}

impl ProcessExecutor {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl Executor for ProcessExecutor {
    fn spawn(
        &mut self,
        invocation: &Invocation,
        input: &[u8],
    ) -> Result<Option<i32>, ExecutorError> {
        let mut child = Command::new(&invocation.program)
            .args(invocation.args.iter())
            .stdin(Stdio::piped())
            .stdout(Stdio::from(io::stderr()))
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                command: invocation.to_string(),
                source,
            })?;

        // fed from its own thread so that the deadline below also covers a child that never
        // reads, dropping stdin closes it and the child sees the end of its input
        let feeder = child.stdin.take().map(|mut stdin| {
            let input = input.to_vec();
            thread::spawn(move || stdin.write_all(&input))
        });

        let waited = match self.timeout {
            Some(timeout) => match child.wait_timeout(timeout) {
                Ok(Some(status)) => Ok(status),
                Ok(None) => {
                    warn!("{invocation} exceeded {timeout:?}, killing it");

                    if let Err(error) = child.kill().and_then(|_| child.wait()) {
                        warn!(error = ?error, "Failed to reap {invocation}");
                    }
                    // the pipe is closed now, a blocked write returns with BrokenPipe
                    if let Some(feeder) = feeder {
                        let _ = feeder.join();
                    }

                    return Err(ExecutorError::Timeout {
                        command: invocation.to_string(),
                        timeout,
                    });
                }
                Err(error) => Err(error),
            },
            None => child.wait(),
        };

        let status = waited.map_err(|source| ExecutorError::Wait {
            command: invocation.to_string(),
            source,
        })?;
        debug!("{invocation} exited with {status}");

        match feeder.map(JoinHandle::join) {
            None | Some(Ok(Ok(()))) => {}
            Some(Ok(Err(error))) if error.kind() == ErrorKind::BrokenPipe => {
                debug!("{invocation} exited before reading all of its input")
            }
            Some(Ok(Err(source))) => {
                return Err(ExecutorError::Stdin {
                    command: invocation.to_string(),
                    source,
                })
            }
            Some(Err(_)) => {
                return Err(ExecutorError::Stdin {
                    command: invocation.to_string(),
                    source: io::Error::new(ErrorKind::Other, "stdin writer panicked"),
                })
            }
        }

        Ok(status.code())
    }
}
