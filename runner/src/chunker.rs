use itertools::Itertools;
use std::{fs, io::Error, num::NonZeroUsize, path::Path};
use tracing::debug;

/// Ordered shell commands, one per line, terminators included
///
/// Lines are kept as raw bytes, a command is opaque and need not be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskList {
    lines: Vec<Vec<u8>>,
}

/// A contiguous run of tasks submitted as a single job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub index: usize,
    pub lines: &'a [Vec<u8>],
}

impl TaskList {
    pub fn new(lines: Vec<Vec<u8>>) -> Self {
        Self { lines }
    }

    /// read the whole file and split it after every `\n`
    pub fn read(path: &Path) -> Result<Self, Error> {
        let content = fs::read(path)?;
        let lines = content
            .split_inclusive(|byte| *byte == b'\n')
            .map(<[u8]>::to_vec)
            .collect_vec();

        debug!(path = ?path, tasks = lines.len(), "Read task list");

        Ok(Self::new(lines))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// ceil(len / chunk_size)
    pub fn chunk_count(&self, chunk_size: NonZeroUsize) -> usize {
        let size = chunk_size.get();

        self.lines.len() / size + usize::from(self.lines.len() % size != 0)
    }

    /// the `index`-th chunk, `None` past the last one
    pub fn chunk(&self, chunk_size: NonZeroUsize, index: usize) -> Option<Chunk<'_>> {
        let start = index.checked_mul(chunk_size.get())?;

        if start >= self.lines.len() {
            return None;
        }

        let end = start.saturating_add(chunk_size.get()).min(self.lines.len());

        Some(Chunk {
            index,
            lines: &self.lines[start..end],
        })
    }

    /// all chunks in index order
    pub fn chunks(&self, chunk_size: NonZeroUsize) -> impl Iterator<Item = Chunk<'_>> {
        (0..self.chunk_count(chunk_size)).map_while(move |index| self.chunk(chunk_size, index))
    }
}

#[cfg(test)]
#[path = "chunker_test.rs"]
mod chunker_test;
