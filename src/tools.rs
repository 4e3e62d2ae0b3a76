//! External tool invocation.
//!
//! Every stage talks to the outside world through a [`ToolRunner`]. The
//! system runner spawns real processes and waits for them; tests substitute
//! runners that fabricate the files a tool would have written.

use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

/// A fully described command line for one external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Logical tool name, used in errors and metrics.
    pub tool: &'static str,
    pub program: String,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(tool: &'static str, program: impl Into<String>) -> Self {
        Self {
            tool,
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Arguments as lossy strings, for logs and assertions.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Result of a tool that was started and ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success,
    Failed { code: Option<i32>, stderr: String },
}

pub trait ToolRunner: Send + Sync {
    /// Run the invocation to completion.
    ///
    /// Returns `Err` only when the program could not be started; a non-zero
    /// exit is reported as [`ToolOutcome::Failed`]. The pipeline turns a start
    /// failure into [`RecompressError::ToolNotFound`] for the calling stage.
    ///
    /// [`RecompressError::ToolNotFound`]: crate::error::RecompressError::ToolNotFound
    fn run(&self, invocation: &ToolInvocation) -> io::Result<ToolOutcome>;
}

/// Spawns real processes and blocks until each exits.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &ToolInvocation) -> io::Result<ToolOutcome> {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        debug!(
            tool = invocation.tool,
            cwd = ?invocation.cwd,
            command = %invocation,
            "Running external tool"
        );

        let output = command.output()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(tool = invocation.tool, "{}", stdout.trim_end());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();

        if output.status.success() {
            if !stderr.is_empty() {
                debug!(tool = invocation.tool, "{stderr}");
            }
            Ok(ToolOutcome::Success)
        } else {
            if !stderr.is_empty() {
                warn!(tool = invocation.tool, "{stderr}");
            }
            Ok(ToolOutcome::Failed {
                code: output.status.code(),
                stderr,
            })
        }
    }
}

/// Human-readable cause for a program that failed to start.
pub fn start_failure_reason(program: &str, err: &io::Error) -> String {
    match err.kind() {
        // Bare names are looked up on PATH; anything with a separator is used as given.
        io::ErrorKind::NotFound if Path::new(program).components().count() > 1 => {
            format!("'{program}' not found")
        }
        io::ErrorKind::NotFound => format!("'{program}' not found on PATH"),
        io::ErrorKind::PermissionDenied => format!("'{program}' is not executable"),
        _ => err.to_string(),
    }
}
