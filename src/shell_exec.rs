//! Subprocess execution with output capture and timeouts
//!
//! Every external command in branchwise goes through [`run`] (or [`execute`] for
//! git). Commands are spawned argv-style, never through a shell, so a name that
//! slipped past validation still cannot inject anything.
//!
//! ```text
//! $ git merge-base refs/heads/feature refs/heads/main [repo]
//! [exec-trace] context=repo cmd="git merge-base ..." dur=3.1ms exit=0
//! ```
//!
//! ## Output capture
//!
//! stdout and stderr are drained by two reader threads that append complete
//! lines to one shared buffer. Lines from the same stream keep their order;
//! lines from different streams interleave in arrival order.
//!
//! ## Timeouts
//!
//! The child is placed in its own process group (Unix). When the deadline
//! passes, the whole group is killed with `SIGKILL`, so helpers spawned by git
//! (ssh for a fetch, a pager, an alias shell) die with it. The caller gets the
//! timeout sentinel (`exit_code == -1`, `timed_out == true`). Partial output is
//! discarded.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use shell_escape::escape;
use wait_timeout::ChildExt;

/// Deadline applied when the caller doesn't pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Exit code reported for a timed-out or unspawnable command.
pub const SENTINEL_EXIT_CODE: i32 = -1;

const GIT: &str = "git";

/// Minimum time granted to the readers to flush after the child exits.
const READER_GRACE: Duration = Duration::from_millis(100);

/// Outcome of one subprocess invocation.
///
/// A non-zero `exit_code` is data for the caller, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    /// Combined stdout and stderr, one line per `\n`.
    pub output: String,
    /// Set only on the timeout path.
    pub timed_out: bool,
}

impl CommandResult {
    /// True when the process ran to completion with exit code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Output lines with surrounding whitespace removed, blank lines skipped.
    pub fn non_empty_lines(&self) -> impl Iterator<Item = &str> {
        self.output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }

    fn timeout_sentinel(timeout: Duration) -> Self {
        Self {
            exit_code: SENTINEL_EXIT_CODE,
            output: format!(
                "command timed out after {}s and was terminated",
                timeout.as_secs_f64()
            ),
            timed_out: true,
        }
    }

    fn failed_to_start(program: &str, error: &std::io::Error) -> Self {
        Self {
            exit_code: SENTINEL_EXIT_CODE,
            output: format!("failed to start {program}: {error}"),
            timed_out: false,
        }
    }
}

/// Run git with `args` in `working_dir`.
pub fn execute(args: &[&str], working_dir: &Path, timeout: Duration) -> CommandResult {
    run(GIT, args, working_dir, timeout, None)
}

/// Run `program` with timing and debug logging.
///
/// The `context` parameter is typically the repository name for git commands.
pub fn run(
    program: &str,
    args: &[&str],
    working_dir: &Path,
    timeout: Duration,
    context: Option<&str>,
) -> CommandResult {
    let cmd_str = format_command(program, args);

    match context {
        Some(ctx) => log::debug!("$ {} [{}]", cmd_str, ctx),
        None => log::debug!("$ {}", cmd_str),
    }

    let t0 = Instant::now();
    let result = spawn_and_wait(program, args, working_dir, timeout);
    let duration_ms = t0.elapsed().as_secs_f64() * 1000.0;

    let outcome = if result.timed_out {
        "timeout".to_string()
    } else {
        format!("exit={}", result.exit_code)
    };
    match context {
        Some(ctx) => log::debug!(
            "[exec-trace] context={} cmd=\"{}\" dur={:.1}ms {}",
            ctx,
            cmd_str,
            duration_ms,
            outcome
        ),
        None => log::debug!(
            "[exec-trace] cmd=\"{}\" dur={:.1}ms {}",
            cmd_str,
            duration_ms,
            outcome
        ),
    }

    result
}

fn format_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .map(|part| escape(part.into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn spawn_and_wait(
    program: &str,
    args: &[&str],
    working_dir: &Path,
    timeout: Duration,
) -> CommandResult {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Never block on a credential prompt; fail instead.
        .env("GIT_TERMINAL_PROMPT", "0")
        // Read-only queries must not take optional locks (e.g. index refresh).
        .env("GIT_OPTIONAL_LOCKS", "0");

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group so the timeout path can signal the whole tree.
        cmd.process_group(0);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return CommandResult::failed_to_start(program, &e),
    };

    let deadline = Instant::now() + timeout;
    let buffer = Arc::new(Mutex::new(String::new()));
    let (done_tx, done_rx) = mpsc::channel();
    let mut readers = 0;

    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, Arc::clone(&buffer), done_tx.clone());
        readers += 1;
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, Arc::clone(&buffer), done_tx.clone());
        readers += 1;
    }
    drop(done_tx);

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            terminate_tree(&mut child);
            return CommandResult::timeout_sentinel(timeout);
        }
        Err(e) => {
            terminate_tree(&mut child);
            return CommandResult {
                exit_code: SENTINEL_EXIT_CODE,
                output: format!("failed to wait for {program}: {e}"),
                timed_out: false,
            };
        }
    };

    // The child exited, but a descendant may still hold the pipes open. Wait for
    // the readers only as long as the original deadline allows.
    for _ in 0..readers {
        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(READER_GRACE);
        if done_rx.recv_timeout(remaining).is_err() {
            log::debug!("  ! output pipes still open after {program} exited; killing its group");
            terminate_tree(&mut child);
            break;
        }
    }

    let output = std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner));

    CommandResult {
        exit_code: exit_code(status),
        output,
        timed_out: false,
    }
}

/// Drain `stream` line by line into `sink`, then signal `done`.
fn spawn_reader<R>(stream: R, sink: Arc<Mutex<String>>, done: mpsc::Sender<()>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&raw);
                    // Git uses \r for progress updates; keep only the final state.
                    let text = text.trim_end_matches(['\n', '\r']);
                    let text = text.rsplit('\r').next().unwrap_or_default();
                    let mut buf = sink.lock().unwrap_or_else(PoisonError::into_inner);
                    buf.push_str(text);
                    buf.push('\n');
                }
            }
        }
        let _ = done.send(());
    });
}

/// Map an exit status to an integer, using 128 + signal for signal deaths.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    if let Some(sig) = std::os::unix::process::ExitStatusExt::signal(&status) {
        return 128 + sig;
    }
    SENTINEL_EXIT_CODE
}

/// Kill the child and every process in its group, then reap it.
#[cfg(unix)]
fn terminate_tree(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = Pid::from_raw(child.id() as i32);
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => log::debug!("  ! killpg({}) failed: {}", pgid, e),
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(not(unix))]
fn terminate_tree(child: &mut Child) {
    let pid = child.id().to_string();
    let _ = Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    let _ = child.kill();
    let _ = child.wait();
}
