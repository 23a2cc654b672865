#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `cli` implements the thin command-line front-end for the `dirsync`
//! workspace. It recognises the supported switches (`--mode`, `--sync-meta`,
//! `--force-copy`, `--interval`, `--log-level`, `--log-file`, plus the usual
//! `--help`/`--version`), validates the two directory operands, and delegates
//! the actual work to [`engine::Syncer`].
//!
//! # Design
//!
//! The crate exposes [`run`] as the primary entry point. The function accepts
//! an iterator of arguments together with handles for standard output and
//! error, so tests can drive it without spawning a process. Per-action events
//! and the run summary are rendered to standard output through a
//! [`logging::WriterSink`]; diagnostics go through `tracing`, written to
//! standard error or to `--log-file` when given.
//!
//! With `--interval SECONDS` the tool keeps mirroring: it reruns the
//! synchronization after sleeping for the given number of seconds, forever,
//! stopping only on a fatal engine error.
//!
//! # Invariants
//!
//! - `run` never panics; unexpected failures surface as non-zero exit codes.
//! - Exit code `0` means the destination converged with no per-item
//!   failures, `23` means the run completed but some items failed, and `1`
//!   means argument validation or the run itself failed outright.
//!
//! # Errors
//!
//! Argument and validation problems are written to standard error with exit
//! code `1`. Per-item synchronization failures are already reported by the
//! engine through the event sink; the CLI only folds them into the exit code.
//!
//! # Examples
//!
//! ```
//! use cli::run;
//!
//! let mut stdout = Vec::new();
//! let mut stderr = Vec::new();
//! let exit_code = run(["dirsync", "--help"], &mut stdout, &mut stderr);
//!
//! assert_eq!(exit_code, 0);
//! assert!(!stdout.is_empty());
//! assert!(stderr.is_empty());
//! ```

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, Command, value_parser};
use engine::{SyncMode, SyncSettings, Syncer};
use logging::WriterSink;
use tracing_subscriber::EnvFilter;

/// Exit code for a run that completed with per-item failures.
const PARTIAL_EXIT_CODE: i32 = 23;

/// Builds the `clap` command used for parsing.
fn clap_command() -> Command {
    Command::new("dirsync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("One-way directory mirroring: makes DEST match SOURCE.")
        .arg(
            Arg::new("source")
                .value_name("SOURCE")
                .help("Directory to mirror from; never modified.")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("dest")
                .value_name("DEST")
                .help("Directory to mirror into; created when missing.")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .short('m')
                .value_name("MODE")
                .help("Comparison fidelity: 'quick' trusts size and mtime, 'full' adds a content check.")
                .value_parser(["quick", "full"])
                .default_value("full"),
        )
        .arg(
            Arg::new("sync-meta")
                .long("sync-meta")
                .help("Also refresh timestamps and permissions of otherwise unchanged items.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("force-copy")
                .long("force-copy")
                .help("Temporarily widen destination permissions when an update would be forbidden.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .value_name("SECONDS")
                .help("Keep mirroring: rerun after sleeping SECONDS between passes.")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Diagnostic verbosity for the log output.")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("FILE")
                .help("Append diagnostics to FILE instead of standard error.")
                .value_parser(value_parser!(PathBuf)),
        )
}

/// Parsed and validated invocation.
struct ParsedArgs {
    settings: SyncSettings,
    interval: Option<u64>,
    log_level: String,
    log_file: Option<PathBuf>,
}

fn parse_args<I, S>(arguments: I) -> Result<ParsedArgs, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let matches = clap_command().try_get_matches_from(arguments)?;

    let source = matches
        .get_one::<PathBuf>("source")
        .cloned()
        .unwrap_or_default();
    let dest = matches
        .get_one::<PathBuf>("dest")
        .cloned()
        .unwrap_or_default();
    let mode = matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("full")
        .parse::<SyncMode>()
        .unwrap_or_default();

    let source = validate_roots(&source, &dest)?;

    let settings = SyncSettings::builder(source, dest)
        .mode(mode)
        .sync_meta(matches.get_flag("sync-meta"))
        .force_copy(matches.get_flag("force-copy"))
        .build();

    Ok(ParsedArgs {
        settings,
        interval: matches.get_one::<u64>("interval").copied(),
        log_level: matches
            .get_one::<String>("log-level")
            .cloned()
            .unwrap_or_else(|| String::from("info")),
        log_file: matches.get_one::<PathBuf>("log-file").cloned(),
    })
}

/// Checks the directory operands and returns the canonicalized source.
///
/// The destination may be missing (it will be created), but an existing
/// destination must be a directory, and it must not be the source itself or
/// live inside it; mirroring into a subdirectory of the source would feed
/// the mirror back into the walk.
fn validate_roots(source: &Path, dest: &Path) -> Result<PathBuf, clap::Error> {
    let source = source.canonicalize().map_err(|error| {
        usage_error(format!(
            "source '{}' is not an accessible directory: {error}",
            source.display()
        ))
    })?;
    if !source.is_dir() {
        return Err(usage_error(format!(
            "source '{}' is not a directory",
            source.display()
        )));
    }

    if let Ok(dest) = dest.canonicalize() {
        if !dest.is_dir() {
            return Err(usage_error(format!(
                "destination '{}' exists and is not a directory",
                dest.display()
            )));
        }
        if dest.starts_with(&source) {
            return Err(usage_error(format!(
                "destination '{}' must not be the source or live inside it",
                dest.display()
            )));
        }
    }

    Ok(source)
}

fn usage_error(message: String) -> clap::Error {
    clap_command().error(ErrorKind::ValueValidation, message)
}

/// Installs the diagnostic subscriber for this process.
///
/// A second call is a no-op so `run` stays reusable within one process.
fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|error| format!("invalid log level '{level}': {error}"))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let already_installed = match log_file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|error| {
                    format!("cannot open log file '{}': {error}", path.display())
                })?;
            builder
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .try_init()
        }
        None => builder.with_writer(io::stderr).try_init(),
    };
    // try_init fails when a subscriber is already set; keep the existing one.
    drop(already_installed);
    Ok(())
}

/// Runs the CLI using the provided argument iterator and output handles.
///
/// The function returns the process exit code that should be used by the
/// caller: `0` for a clean run, [`PARTIAL_EXIT_CODE`] when items failed, `1`
/// for argument or fatal errors.
pub fn run<I, S, Out, Err>(arguments: I, stdout: &mut Out, stderr: &mut Err) -> i32
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
    Out: Write,
    Err: Write,
{
    let parsed = match parse_args(arguments) {
        Ok(parsed) => parsed,
        Err(error) => {
            return match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = write!(stdout, "{error}");
                    0
                }
                _ => {
                    let _ = write!(stderr, "{error}");
                    1
                }
            };
        }
    };

    if let Err(message) = init_tracing(&parsed.log_level, parsed.log_file.as_deref()) {
        let _ = writeln!(stderr, "dirsync: {message}");
        return 1;
    }

    match parsed.interval {
        None => sync_once(&parsed.settings, stdout, stderr),
        Some(seconds) => loop {
            let code = sync_once(&parsed.settings, stdout, stderr);
            if code == 1 {
                return code;
            }
            thread::sleep(Duration::from_secs(seconds));
        },
    }
}

fn sync_once<Out, Err>(settings: &SyncSettings, stdout: &mut Out, stderr: &mut Err) -> i32
where
    Out: Write,
    Err: Write,
{
    let sink = WriterSink::new(&mut *stdout);
    match Syncer::new(settings).run(&sink) {
        Ok(report) if report.is_clean() => 0,
        Ok(_) => PARTIAL_EXIT_CODE,
        Err(error) => {
            tracing::error!(%error, "synchronization aborted");
            let _ = writeln!(stderr, "dirsync: {error}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn run_with_args<I, S>(args: I) -> (i32, String, String)
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString> + Clone,
    {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run(args, &mut stdout, &mut stderr);
        (
            code,
            String::from_utf8(stdout).expect("stdout utf8"),
            String::from_utf8(stderr).expect("stderr utf8"),
        )
    }

    #[test]
    fn help_prints_to_stdout_and_exits_zero() {
        let (code, stdout, stderr) = run_with_args(["dirsync", "--help"]);
        assert_eq!(code, 0);
        assert!(stdout.contains("--force-copy"));
        assert!(stderr.is_empty());
    }

    #[test]
    fn missing_operands_fail_with_usage() {
        let (code, stdout, stderr) = run_with_args(["dirsync"]);
        assert_eq!(code, 1);
        assert!(stdout.is_empty());
        assert!(stderr.contains("SOURCE"));
    }

    #[test]
    fn nonexistent_source_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("absent");
        let dest = temp.path().join("dst");
        let (code, _, stderr) = run_with_args([
            OsString::from("dirsync"),
            missing.into_os_string(),
            dest.into_os_string(),
        ]);
        assert_eq!(code, 1);
        assert!(stderr.contains("not an accessible directory"));
    }

    #[test]
    fn existing_file_destination_is_rejected_and_kept() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let dst = temp.path().join("not-a-dir");
        fs::create_dir_all(&src).expect("mkdir");
        fs::write(&dst, b"precious").expect("write");

        let (code, _, stderr) = run_with_args([
            OsString::from("dirsync"),
            src.into_os_string(),
            dst.clone().into_os_string(),
        ]);
        assert_eq!(code, 1);
        assert!(stderr.contains("not a directory"));
        assert_eq!(fs::read(&dst).expect("read"), b"precious");
    }

    #[test]
    fn destination_inside_source_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("inner")).expect("mkdir");
        let (code, _, stderr) = run_with_args([
            OsString::from("dirsync"),
            src.clone().into_os_string(),
            src.join("inner").into_os_string(),
        ]);
        assert_eq!(code, 1);
        assert!(stderr.contains("must not be the source"));
    }

    #[test]
    fn invalid_mode_is_rejected_by_the_parser() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(&src).expect("mkdir");
        let (code, _, stderr) = run_with_args([
            OsString::from("dirsync"),
            OsString::from("--mode=fast"),
            src.into_os_string(),
            dst.into_os_string(),
        ]);
        assert_eq!(code, 1);
        assert!(stderr.contains("fast"));
    }

    #[test]
    fn successful_run_reports_actions_and_summary() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(&src).expect("mkdir");
        fs::write(src.join("a.txt"), b"content").expect("write");

        let (code, stdout, _) = run_with_args([
            OsString::from("dirsync"),
            src.clone().into_os_string(),
            dst.clone().into_os_string(),
        ]);
        assert_eq!(code, 0);
        assert!(stdout.contains("create 'a.txt'"));
        assert!(stdout.contains("sync finished:"));
        assert_eq!(fs::read(dst.join("a.txt")).expect("read"), b"content");
    }

    #[cfg(unix)]
    #[test]
    fn per_item_failures_yield_the_partial_exit_code() {
        use std::os::unix::fs::PermissionsExt;

        if rustix::process::geteuid().as_raw() == 0 {
            return;
        }

        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(&src).expect("mkdir");
        fs::create_dir_all(&dst).expect("mkdir");
        fs::write(src.join("a.txt"), b"fresh stuff").expect("write");
        fs::write(dst.join("a.txt"), b"stale").expect("write");
        fs::set_permissions(dst.join("a.txt"), fs::Permissions::from_mode(0o444))
            .expect("chmod");

        let (code, stdout, _) = run_with_args([
            OsString::from("dirsync"),
            src.into_os_string(),
            dst.into_os_string(),
        ]);
        assert_eq!(code, PARTIAL_EXIT_CODE);
        assert!(stdout.contains("failed"));
    }
}
