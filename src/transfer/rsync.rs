// src/transfer/rsync.rs

//! rsync transport
//!
//! Runs `rsync --files-from=<list>` against an `rsync://` source. The tool
//! paces itself with `--bwlimit`; `--safe-links` keeps symlinked pool
//! directories from pointing outside the mirror.

use super::{Transfer, TransferOutcome, TransferRequest};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// How often the child is polled for exit while watching for cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Exit codes that mean "some files were not transferred"
const PARTIAL_TRANSFER: i32 = 23;
const VANISHED_SOURCE: i32 = 24;

/// Stderr lines kept for error messages
const STDERR_TAIL: usize = 5;

/// Transfer backend that shells out to `rsync`
#[derive(Debug, Clone)]
pub struct RsyncTransfer {
    program: PathBuf,
}

impl RsyncTransfer {
    /// Locate `rsync` on `PATH`
    pub fn new() -> Result<Self> {
        let program = which::which("rsync")
            .map_err(|e| Error::ToolNotFound(format!("rsync: {e}")))?;
        Ok(Self { program })
    }

    /// Use a specific rsync binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for `request`
    pub fn arguments(request: &TransferRequest<'_>) -> Vec<OsString> {
        let source = format!("{}/", request.source_root.as_str().trim_end_matches('/'));
        let mut dest = request.dest_root.as_os_str().to_os_string();
        dest.push("/");

        let mut files_from = OsString::from("--files-from=");
        files_from.push(request.list_file.as_os_str());

        vec![
            OsString::from("--no-motd"),
            OsString::from("-rltH"),
            OsString::from("--safe-links"),
            OsString::from(format!("--bwlimit={}", request.bandwidth_limit_kbs)),
            files_from,
            OsString::from("--out-format=%n"),
            OsString::from(source),
            dest,
        ]
    }
}

impl Transfer for RsyncTransfer {
    fn name(&self) -> &'static str {
        "rsync"
    }

    fn fetch(&self, request: &TransferRequest<'_>, cancel: &CancelToken) -> Result<TransferOutcome> {
        let args = Self::arguments(request);
        debug!("Running {} {:?}", self.program.display(), args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::TransferError(format!("failed to start {}: {e}", self.program.display()))
            })?;

        let stdout = spawn_line_reader(child.stdout.take());
        let stderr = spawn_line_reader(child.stderr.take());

        let status = loop {
            if cancel.is_cancelled() {
                warn!("Stopping rsync for {}", request.source_root);
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Cancelled);
            }
            match child.wait_timeout(POLL_INTERVAL)? {
                Some(status) => break status,
                None => continue,
            }
        };

        let transferred = join_lines(stdout);
        let errors = join_lines(stderr);
        interpret_exit(status, &transferred, &errors, request.dest_root)
    }
}

fn spawn_line_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> Option<JoinHandle<Vec<String>>> {
    pipe.map(|pipe| {
        thread::spawn(move || {
            BufReader::new(pipe)
                .lines()
                .map_while(|line| line.ok())
                .collect()
        })
    })
}

fn join_lines(handle: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Map rsync's exit status to an outcome
fn interpret_exit(
    status: ExitStatus,
    transferred: &[String],
    errors: &[String],
    dest_root: &Path,
) -> Result<TransferOutcome> {
    let fetched = transferred
        .iter()
        .filter(|line| !line.is_empty() && !line.ends_with('/'))
        .count();

    match status.code() {
        Some(0) => Ok(TransferOutcome {
            fetched,
            ..Default::default()
        }),
        Some(code @ (PARTIAL_TRANSFER | VANISHED_SOURCE)) => {
            let missing: Vec<String> = errors.iter().filter_map(|l| missing_path(l)).collect();
            debug!(
                "rsync into {} exited {} with {} missing paths",
                dest_root.display(),
                code,
                missing.len()
            );
            Ok(TransferOutcome {
                fetched,
                unchanged: 0,
                missing,
            })
        }
        Some(code) => Err(Error::TransferError(format!(
            "rsync exited with code {code}: {}",
            tail(errors)
        ))),
        None => Err(Error::TransferError(format!(
            "rsync terminated by signal: {}",
            tail(errors)
        ))),
    }
}

/// Path named in a `link_stat "<path>" failed` diagnostic
fn missing_path(line: &str) -> Option<String> {
    let rest = line.split_once("link_stat \"")?.1;
    let (path, tail) = rest.split_once('"')?;
    tail.contains("failed").then(|| path.to_string())
}

fn tail(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(STDERR_TAIL);
    let joined = lines[start..].join("; ");
    if joined.is_empty() {
        "no diagnostics".to_string()
    } else {
        joined
    }
}
