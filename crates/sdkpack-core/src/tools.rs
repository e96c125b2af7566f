//! External tool invocation.
//!
//! Every phase of the pipeline is a blocking call to an external program:
//! `gclient`, `git`, `gn`, `ninja` or a freshly built test binary. Stages
//! describe those calls as [`ToolCommand`] values and hand them to a
//! [`ToolRunner`], which keeps process spawning in one place:
//!
//! - [`SystemRunner`] spawns real processes and waits for them
//! - [`DryRunRunner`] logs the command line and reports success
//!
//! The exit code is the only success signal. Output from the tools is
//! inherited by the orchestrator's stdout/stderr unless a command asks for
//! it to be captured or discarded.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::types::PipelineError;

/// A single external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    /// Environment added to the child process only.
    pub envs: Vec<(OsString, OsString)>,
    /// Discard the child's stdout instead of inheriting it.
    pub discard_stdout: bool,
}

impl ToolCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            discard_stdout: false,
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

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.envs
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn discard_stdout(mut self) -> Self {
        self.discard_stdout = true;
        self
    }

    /// Program name as a lossy UTF-8 string, for logs and matching.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Exit status of a finished tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl ToolStatus {
    pub const SUCCESS: ToolStatus = ToolStatus { code: Some(0) };

    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Runs external tools on behalf of the pipeline stages.
pub trait ToolRunner {
    /// Runs the command to completion and returns its exit status.
    ///
    /// A non-zero exit is not an error; only a failure to start the
    /// process is.
    fn run(&self, cmd: &ToolCommand) -> Result<ToolStatus, PipelineError>;

    /// Runs the command and returns its trimmed stdout.
    ///
    /// A non-zero exit is an error here: callers need the output.
    fn capture(&self, cmd: &ToolCommand) -> Result<String, PipelineError>;
}

/// Spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, cmd: &ToolCommand) -> Result<ToolStatus, PipelineError> {
        debug!(command = %cmd, cwd = ?cmd.cwd, "running");
        let mut command = cmd.to_command();
        if cmd.discard_stdout {
            command.stdout(Stdio::null());
        }
        let status = command.status().map_err(|e| {
            PipelineError::Tool(format!(
                "Failed to start {}.\n\n\
                 Error: {}\n\n\
                 Ensure the tool is installed and available on PATH.",
                cmd.program_name(),
                e
            ))
        })?;
        Ok(ToolStatus {
            code: status.code(),
        })
    }

    fn capture(&self, cmd: &ToolCommand) -> Result<String, PipelineError> {
        debug!(command = %cmd, cwd = ?cmd.cwd, "capturing");
        let output = cmd.to_command().output().map_err(|e| {
            PipelineError::Tool(format!(
                "Failed to start {}.\n\n\
                 Error: {}\n\n\
                 Ensure the tool is installed and available on PATH.",
                cmd.program_name(),
                e
            ))
        })?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Tool(format!(
                "{} failed.\n\n\
                 Exit status: {}\n\n\
                 Stdout:\n{}\n\n\
                 Stderr:\n{}",
                cmd, output.status, stdout, stderr
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Logs commands instead of running them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunRunner;

impl ToolRunner for DryRunRunner {
    fn run(&self, cmd: &ToolCommand) -> Result<ToolStatus, PipelineError> {
        info!("[dry-run] would run: {}", cmd);
        Ok(ToolStatus::SUCCESS)
    }

    fn capture(&self, cmd: &ToolCommand) -> Result<String, PipelineError> {
        info!("[dry-run] would capture: {}", cmd);
        Ok(String::new())
    }
}
