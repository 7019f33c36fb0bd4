use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::Error,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_PROCESSES: i64 = 8;
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_LOGS_DIR: &str = "logs";
pub const SCRIPTS_DIR: &str = ".scripts";

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Chunk size must be a positive integer, got {0}")]
    InvalidChunkSize(i64),
    #[error("Number of processes must be a positive integer, got {0}")]
    InvalidProcesses(i64),
    #[error("Failed to open profile {path:?}")]
    ProfileNotFound {
        path: PathBuf,
        #[source]
        source: Error,
    },
    #[error("Profile {path:?} is malformed")]
    InvalidProfile {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Batch a task list into chunks and submit every chunk as a PBS job
#[derive(Parser, Debug, Clone)]
#[command(
    name = "qsub_batched",
    version,
    after_help = "eg.     qsub_batched jobs 50 03:00:00"
)]
pub struct Args {
    /// Dry run.  No commands are executed, but script files are generated.
    #[arg(short = 'n')]
    pub dry_run: bool,

    /// Number of processes to parallelize over [default: 8]
    #[arg(long, allow_negative_numbers = true)]
    pub processes: Option<i64>,

    /// Path to output folder [default: output]
    #[arg(long = "output_dir")]
    pub output_dir: Option<PathBuf>,

    /// Path to logs folder [default: logs]
    #[arg(long = "logs_dir")]
    pub logs_dir: Option<PathBuf>,

    /// YAML profile providing defaults for the options above
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seconds to wait for chmod/ qsub before killing them
    #[arg(long)]
    pub timeout: Option<u64>,

    /// File with one shell command per line
    pub task_list: PathBuf,

    /// Number of tasks per submitted job
    #[arg(allow_negative_numbers = true)]
    pub chunk_size: i64,

    /// Walltime passed to the scheduler, e.g. 03:00:00
    pub walltime: String,
}

/// Optional site profile, every field falls back to the built-in default
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub processes: Option<i64>,
    pub output_dir: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
    // seconds
    pub timeout: Option<u64>,
    // extra scheduler directives appended after the fixed ones, e.g. "-q batch"
    #[serde(default)]
    pub directives: Vec<String>,
}

impl Profile {
    pub fn load(path: &Path) -> Result<Self, ConfigErrors> {
        let file = File::open(path).map_err(|source| ConfigErrors::ProfileNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        serde_yaml::from_reader(file).map_err(|source| ConfigErrors::InvalidProfile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Validated run configuration
#[derive(Clone, Debug, PartialEq)]
pub struct BatchConfig {
    pub dry_run: bool,
    pub processes: NonZeroUsize,
    pub output_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub timeout: Option<Duration>,
    pub directives: Vec<String>,
    pub task_list: PathBuf,
    pub chunk_size: NonZeroUsize,
    pub walltime: String,
    pub scripts_dir: PathBuf,
}

impl BatchConfig {
    /// load the profile named by `--config` (if any) and merge it with the command line
    pub fn load(args: Args) -> Result<Self, ConfigErrors> {
        let profile = match args.config {
            Some(ref path) => {
                debug!(path = ?path, "Loading profile");
                Profile::load(path)?
            }
            None => Profile::default(),
        };

        Self::merge(args, profile)
    }

    /// command line > profile > built-in defaults
    pub fn merge(args: Args, profile: Profile) -> Result<Self, ConfigErrors> {
        let chunk_size =
            positive(args.chunk_size).ok_or(ConfigErrors::InvalidChunkSize(args.chunk_size))?;

        let processes = args
            .processes
            .or(profile.processes)
            .unwrap_or(DEFAULT_PROCESSES);
        let processes = positive(processes).ok_or(ConfigErrors::InvalidProcesses(processes))?;

        if args.walltime.trim().is_empty() {
            warn!("Walltime is empty, the scheduler will most likely reject the jobs");
        }

        Ok(Self {
            dry_run: args.dry_run,
            processes,
            output_dir: args
                .output_dir
                .or(profile.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            logs_dir: args
                .logs_dir
                .or(profile.logs_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOGS_DIR)),
            timeout: args.timeout.or(profile.timeout).map(Duration::from_secs),
            directives: profile.directives,
            task_list: args.task_list,
            chunk_size,
            walltime: args.walltime,
            scripts_dir: PathBuf::from(SCRIPTS_DIR),
        })
    }
}

fn positive(value: i64) -> Option<NonZeroUsize> {
    usize::try_from(value).ok().and_then(NonZeroUsize::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("qsub_batched").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults_without_profile() {
        let config =
            BatchConfig::merge(parse(&["jobs", "50", "03:00:00"]), Profile::default()).unwrap();

        assert!(!config.dry_run);
        assert_eq!(config.processes.get(), 8);
        assert_eq!(config.chunk_size.get(), 50);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.logs_dir, PathBuf::from("logs"));
        assert_eq!(config.walltime, "03:00:00");
        assert_eq!(config.scripts_dir, PathBuf::from(".scripts"));
        assert_eq!(config.timeout, None);
        assert!(config.directives.is_empty());
    }

    #[test]
    fn flags_are_parsed() {
        let args = parse(&[
            "-n",
            "--processes",
            "4",
            "--logs_dir",
            "/scratch/logs",
            "--output_dir",
            "out",
            "jobs",
            "10",
            "01:00:00",
        ]);

        assert!(args.dry_run);
        assert_eq!(args.processes, Some(4));
        assert_eq!(args.logs_dir, Some(PathBuf::from("/scratch/logs")));
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn wrong_argument_count_is_rejected() {
        let argv = ["qsub_batched", "jobs", "50"];
        assert!(Args::try_parse_from(argv).is_err());

        let argv = ["qsub_batched", "jobs", "50", "03:00:00", "extra"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn non_positive_chunk_size_is_rejected() {
        let args = parse(&["jobs", "0", "03:00:00"]);
        let result = BatchConfig::merge(args.clone(), Profile::default());
        assert!(matches!(result, Err(ConfigErrors::InvalidChunkSize(0))));

        let negative = Args {
            chunk_size: -3,
            ..args
        };
        let result = BatchConfig::merge(negative, Profile::default());
        assert!(matches!(result, Err(ConfigErrors::InvalidChunkSize(-3))));
    }

    #[test]
    fn non_positive_processes_is_rejected() {
        let result = BatchConfig::merge(
            parse(&["--processes", "0", "jobs", "5", "03:00:00"]),
            Profile::default(),
        );

        assert!(matches!(result, Err(ConfigErrors::InvalidProcesses(0))));
    }

    #[test]
    fn command_line_overrides_profile() {
        let profile = Profile {
            processes: Some(16),
            logs_dir: Some(PathBuf::from("pbs_logs")),
            timeout: Some(30),
            directives: vec!["-q batch".to_string()],
            ..Default::default()
        };
        let config = BatchConfig::merge(
            parse(&["--processes", "2", "jobs", "5", "03:00:00"]),
            profile,
        )
        .unwrap();

        assert_eq!(config.processes.get(), 2);
        assert_eq!(config.logs_dir, PathBuf::from("pbs_logs"));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.directives, vec!["-q batch".to_string()]);
    }

    #[test]
    fn profile_is_loaded_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "processes: 12\nlogs_dir: /var/log/pbs\ndirectives:\n  - -q long\n  - -A chem").unwrap();

        let profile = Profile::load(file.path()).unwrap();

        assert_eq!(profile.processes, Some(12));
        assert_eq!(profile.logs_dir, Some(PathBuf::from("/var/log/pbs")));
        assert_eq!(profile.directives, vec!["-q long", "-A chem"]);
    }

    #[test]
    fn profile_from_command_line_is_merged_with_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "processes: 16\nlogs_dir: pbs_logs\ntimeout: 45\ndirectives:\n  - -q batch"
        )
        .unwrap();
        let profile = file.path().to_str().unwrap();

        let args = parse(&["--config", profile, "--processes", "4", "jobs", "50", "03:00:00"]);
        let config = BatchConfig::load(args).unwrap();

        assert_eq!(config.processes.get(), 4);
        assert_eq!(config.logs_dir, PathBuf::from("pbs_logs"));
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.timeout, Some(Duration::from_secs(45)));
        assert_eq!(config.directives, vec!["-q batch".to_string()]);
        assert_eq!(config.chunk_size.get(), 50);
    }

    #[test]
    fn missing_profile_from_command_line_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("site.yaml");

        let args = parse(&["--config", missing.to_str().unwrap(), "jobs", "50", "03:00:00"]);

        assert!(matches!(
            BatchConfig::load(args),
            Err(ConfigErrors::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn unknown_profile_fields_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threads: 12").unwrap();

        assert!(matches!(
            Profile::load(file.path()),
            Err(ConfigErrors::InvalidProfile { .. })
        ));
    }

    #[test]
    fn missing_profile_is_reported() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            Profile::load(&dir.path().join("missing.yaml")),
            Err(ConfigErrors::ProfileNotFound { .. })
        ));
    }
}
