use crate::{chunker::Chunk, config::BatchConfig};
use std::{
    fs,
    io::Error,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};
use tracing::debug;

pub const INTERPRETER: &str = "#!/bin/bash";
pub const DIRECTIVE_PREFIX: &str = "#PBS";
/// here-document delimiter around the chunk's tasks
pub const HEREDOC_TOKEN: &str = "TASKS";

/// Everything of a job script that doesn't depend on the chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTemplate {
    processes: NonZeroUsize,
    directives: Vec<String>,
}

impl ScriptTemplate {
    /// resource request, merged output, log directory and environment export, followed by `extra`
    pub fn new(processes: NonZeroUsize, walltime: &str, logs_dir: &Path, extra: &[String]) -> Self {
        let mut directives = vec![
            format!("-l nodes=1:ppn={processes},walltime={walltime}"),
            "-j oe".to_string(),
            format!("-o {}", logs_dir.display()),
            "-V".to_string(),
        ];
        directives.extend(extra.iter().cloned());

        Self {
            processes,
            directives,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(
            config.processes,
            &config.walltime,
            &config.logs_dir,
            &config.directives,
        )
    }

    pub fn directives(&self) -> &[String] {
        &self.directives
    }

    /// script bytes for `tasks`, which are copied verbatim into the here-document
    pub fn render(&self, tasks: &[Vec<u8>]) -> Vec<u8> {
        let mut header = format!("{INTERPRETER}\n");

        for directive in self.directives.iter() {
            header.push_str(&format!("{DIRECTIVE_PREFIX} {directive}\n"));
        }

        header.push_str("cd $PBS_O_WORKDIR\n");
        header.push_str(&format!("parallel -j{} <<{HEREDOC_TOKEN}\n", self.processes));

        let mut script = header.into_bytes();

        for task in tasks {
            script.extend_from_slice(task);
        }
        // an unterminated last task would swallow the delimiter
        if script.last() != Some(&b'\n') {
            script.push(b'\n');
        }

        script.extend_from_slice(HEREDOC_TOKEN.as_bytes());
        script.push(b'\n');

        script
    }

    /// render `chunk` to `<scripts_dir>/<task list name>_<index>.sh`, replacing any previous file
    pub fn write(
        &self,
        scripts_dir: &Path,
        task_list: &Path,
        chunk: &Chunk<'_>,
    ) -> Result<PathBuf, Error> {
        let path = script_path(scripts_dir, task_list, chunk.index);

        fs::write(&path, self.render(chunk.lines))?;
        debug!(path = ?path, tasks = chunk.lines.len(), "Wrote job script");

        Ok(path)
    }
}

pub fn script_path(scripts_dir: &Path, task_list: &Path, index: usize) -> PathBuf {
    let name = task_list
        .file_name()
        .unwrap_or(task_list.as_os_str())
        .to_string_lossy();

    scripts_dir.join(format!("{name}_{index}.sh"))
}
