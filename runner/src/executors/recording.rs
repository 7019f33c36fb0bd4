use super::{Executor, ExecutorError, Invocation};
use std::collections::BTreeMap;

/// Test executor that records every command instead of running it
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    pub calls: Vec<String>,
    pub inputs: Vec<Vec<u8>>,
    failures: BTreeMap<String, i32>,
}

impl RecordingExecutor {
    /// report `code` whenever the command line equals `command`
    pub fn fail_on(mut self, command: impl Into<String>, code: i32) -> Self {
        self.failures.insert(command.into(), code);
        self
    }
}

impl Executor for RecordingExecutor {
    fn spawn(
        &mut self,
        invocation: &Invocation,
        input: &[u8],
    ) -> Result<Option<i32>, ExecutorError> {
        let command = invocation.to_string();
        let code = self.failures.get(&command).copied().unwrap_or(0);

        self.calls.push(command);
        self.inputs.push(input.to_vec());

        Ok(Some(code))
    }
}
