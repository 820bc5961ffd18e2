//! Privilege escalation for sysfs writes
//!
//! Every mutating operation becomes a single [`WriteOp`] handed to an
//! [`Escalator`] exactly once. The production escalators run `pkexec`,
//! `sudo` or `doas` as a child process; [`DirectEscalator`] writes in-process
//! for callers that already run as root.
//!
//! The child is polled rather than waited on so that a [`CancelToken`] can
//! kill it while an authorization dialog is still open.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::config::EscalationTool;
use crate::constants::escalation;
use crate::error::LaptopctlError;

/// One logical privileged change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// The same value written to every target, in order
    Tee { value: String, targets: Vec<PathBuf> },
    /// Distinct values written to distinct files, in order; stops at the first failure
    Script { writes: Vec<(PathBuf, String)> },
}

impl WriteOp {
    pub fn targets(&self) -> Vec<&Path> {
        match self {
            WriteOp::Tee { targets, .. } => targets.iter().map(PathBuf::as_path).collect(),
            WriteOp::Script { writes } => writes.iter().map(|(p, _)| p.as_path()).collect(),
        }
    }

    /// POSIX shell rendering of the write sequence
    pub fn shell_script(&self) -> String {
        let lines: Vec<String> = match self {
            WriteOp::Tee { value, targets } => targets
                .iter()
                .map(|t| render_write(t, value))
                .collect(),
            WriteOp::Script { writes } => writes.iter().map(|(p, v)| render_write(p, v)).collect(),
        };
        lines.join(" && ")
    }

    /// Perform the writes with the current process's privileges
    pub fn apply_direct(&self) -> io::Result<()> {
        match self {
            WriteOp::Tee { value, targets } => {
                for target in targets {
                    write_attr(target, value)?;
                }
            }
            WriteOp::Script { writes } => {
                for (path, value) in writes {
                    write_attr(path, value)?;
                }
            }
        }
        Ok(())
    }
}

fn write_attr(path: &Path, value: &str) -> io::Result<()> {
    let mut file = fs::OpenOptions::new().write(true).truncate(true).open(path)?;
    file.write_all(format!("{value}\n").as_bytes())
}

fn render_write(path: &Path, value: &str) -> String {
    format!(
        "printf '%s\\n' {} > {}",
        shell_quote(value),
        shell_quote(&path.to_string_lossy())
    )
}

/// Single-quote a word for `sh -c`
pub fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Shared flag used to abort an in-flight escalation
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Raw result of one escalation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationOutcome {
    Success,
    Failed { code: Option<i32>, stderr: String },
    ToolMissing(String),
    Cancelled,
}

/// Runs a [`WriteOp`] with elevated privileges
#[cfg_attr(test, mockall::automock)]
pub trait Escalator: Send + Sync {
    fn run(&self, op: &WriteOp, cancel: &CancelToken) -> EscalationOutcome;
}

/// Escalates through an external tool (`pkexec`, `sudo`, `doas`)
#[derive(Debug, Clone)]
pub struct CommandEscalator {
    program: String,
    options: Vec<String>,
}

impl CommandEscalator {
    /// `program` is run as `program <options...> tee <targets...>` or
    /// `program <options...> sh -c <script>`. `options` comes from the
    /// `escalation_args` setting.
    pub fn new(program: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            program: program.into(),
            options,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn is_pkexec(&self) -> bool {
        Path::new(&self.program)
            .file_name()
            .is_some_and(|name| name == "pkexec")
    }

    fn command_for(&self, op: &WriteOp) -> (Command, Option<String>) {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.options);
        let stdin = match op {
            WriteOp::Tee { value, targets } => {
                cmd.arg("tee").args(targets);
                Some(format!("{value}\n"))
            }
            WriteOp::Script { .. } => {
                cmd.args(["sh", "-c"]).arg(op.shell_script());
                None
            }
        };
        (cmd, stdin)
    }
}

impl Escalator for CommandEscalator {
    fn run(&self, op: &WriteOp, cancel: &CancelToken) -> EscalationOutcome {
        if !program_on_path(&self.program) {
            return EscalationOutcome::ToolMissing(self.program.clone());
        }

        if cancel.is_cancelled() {
            debug!(program = %self.program, "Escalation cancelled before spawn");
            return EscalationOutcome::Cancelled;
        }

        let (mut cmd, payload) = self.command_for(op);
        cmd.stdin(if payload.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!(program = %self.program, targets = ?op.targets(), "Spawning escalation");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return EscalationOutcome::ToolMissing(self.program.clone())
            }
            Err(e) => {
                return EscalationOutcome::Failed {
                    code: None,
                    stderr: format!("failed to spawn {}: {e}", self.program),
                }
            }
        };

        if let (Some(payload), Some(mut stdin)) = (payload, child.stdin.take()) {
            // Payload is far below the pipe buffer, so this cannot block on the child
            if let Err(e) = stdin.write_all(payload.as_bytes()) {
                debug!(error = %e, "Escalation child closed stdin early");
            }
        }

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        let status = loop {
            if cancel.is_cancelled() {
                warn!(program = %self.program, "Cancelling escalation");
                let _ = child.kill();
                let _ = child.wait();
                return EscalationOutcome::Cancelled;
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(escalation::CHILD_POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return EscalationOutcome::Failed {
                        code: None,
                        stderr: format!("failed to wait for {}: {e}", self.program),
                    };
                }
            }
        };

        let stderr = stderr_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if status.success() {
            EscalationOutcome::Success
        } else if !self.is_pkexec()
            && matches!(
                status.code(),
                Some(escalation::COMMAND_NOT_EXECUTABLE) | Some(escalation::COMMAND_NOT_FOUND)
            )
        {
            // sudo and doas pass through the shell convention for the inner command
            let inner = match op {
                WriteOp::Tee { .. } => "tee",
                WriteOp::Script { .. } => "sh",
            };
            EscalationOutcome::ToolMissing(format!("{inner} (via {})", self.program))
        } else {
            EscalationOutcome::Failed {
                code: status.code(),
                stderr: stderr.trim().to_string(),
            }
        }
    }
}

/// Writes in-process; fails with permission errors unless running as root
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectEscalator;

impl Escalator for DirectEscalator {
    fn run(&self, op: &WriteOp, cancel: &CancelToken) -> EscalationOutcome {
        if cancel.is_cancelled() {
            return EscalationOutcome::Cancelled;
        }
        match op.apply_direct() {
            Ok(()) => EscalationOutcome::Success,
            Err(e) => EscalationOutcome::Failed {
                code: None,
                stderr: e.to_string(),
            },
        }
    }
}

pub fn escalator_for(tool: EscalationTool, options: &[String]) -> Arc<dyn Escalator> {
    match tool {
        EscalationTool::Direct => Arc::new(DirectEscalator),
        EscalationTool::Pkexec | EscalationTool::Sudo | EscalationTool::Doas => {
            Arc::new(CommandEscalator::new(tool.as_str(), options.to_vec()))
        }
    }
}

pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

/// True if `program` resolves to an executable file
pub fn program_on_path(program: &str) -> bool {
    if program.contains('/') {
        return is_executable(Path::new(program));
    }
    let path = env::var_os("PATH").unwrap_or_else(|| OsString::from("/usr/bin:/bin"));
    env::split_paths(&path).any(|dir| is_executable(&dir.join(program)))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Map a failed escalation to an error.
///
/// pkexec exits 126 when the dialog is dismissed and 127 when authorization
/// fails or no agent is available. [`CommandEscalator`] only reports these
/// codes as failures for pkexec; under sudo and doas they mean the inner
/// command is missing and surface as [`EscalationOutcome::ToolMissing`].
pub fn classify_failure(code: Option<i32>, stderr: &str) -> LaptopctlError {
    if matches!(
        code,
        Some(escalation::PKEXEC_NOT_AUTHORIZED) | Some(escalation::PKEXEC_AUTH_FAILED)
    ) {
        return LaptopctlError::PermissionDenied(describe(code, stderr));
    }
    let lower = stderr.to_ascii_lowercase();
    let denied = [
        "not authorized",
        "authorization",
        "authentication",
        "permission denied",
        "incorrect password",
        "operation not permitted",
    ]
    .iter()
    .any(|needle| lower.contains(needle));
    if denied {
        LaptopctlError::PermissionDenied(describe(code, stderr))
    } else {
        LaptopctlError::PrivilegeEscalation(describe(code, stderr))
    }
}

fn describe(code: Option<i32>, stderr: &str) -> String {
    let status = code
        .map(|c| format!("exit status {c}"))
        .unwrap_or_else(|| "no exit status".to_string());
    if stderr.is_empty() {
        status
    } else {
        format!("{status}: {stderr}")
    }
}
