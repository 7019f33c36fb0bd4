use std::{
    fs::create_dir_all,
    io::{Error, ErrorKind},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Like `mkdir -p`, joins all segments and creates whatever is missing
///
/// An already existing path is not an error, everything else (e.g., permission denied) is passed
/// on to the caller. Returns the joined path.
pub fn mkdirp<I, P>(segments: I) -> Result<PathBuf, Error>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let path = segments
        .into_iter()
        .fold(PathBuf::new(), |path, segment| path.join(segment));

    match create_dir_all(&path) {
        Ok(()) => debug!(path = ?path, "Ensured directory"),
        Err(error) if error.kind() == ErrorKind::AlreadyExists => {
            debug!(path = ?path, "Directory already exists")
        }
        Err(error) => return Err(error),
    }

    Ok(path)
}
