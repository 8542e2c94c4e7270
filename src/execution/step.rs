//! Steps executed by the sequencer

use std::fmt;
use std::path::{Path, PathBuf};

/// How a program's standard output is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Bound to the plugin's own stdout/stderr
    Streamed,
    /// Buffered for parsing; stderr stays bound to the plugin's stderr
    Captured,
}

/// One program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStep {
    pub program: String,
    pub args: Vec<String>,
    /// Overrides the context's working directory when set
    pub dir: Option<PathBuf>,
    pub output: OutputMode,
}

impl CommandStep {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            output: OutputMode::Streamed,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn captured(mut self) -> Self {
        self.output = OutputMode::Captured;
        self
    }

    /// Directory the step runs in, given the shared base directory
    pub fn resolve_dir(&self, base: &Path) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| base.to_path_buf())
    }

    /// Command line as echoed before execution
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// A file written as part of the sequence
#[derive(Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub path: PathBuf,
    pub contents: Vec<u8>,
    pub mode: u32,
}

impl fmt::Debug for FileWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWrite")
            .field("path", &self.path)
            .field("len", &self.contents.len())
            .field("mode", &format_args!("{:o}", self.mode))
            .finish()
    }
}

/// Unit of work executed by the sequencer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Program(CommandStep),
    /// Recursive delete; relative paths resolve against the working directory
    RemoveDir(PathBuf),
    WriteFile(FileWrite),
}

impl Step {
    /// Short description used in traces and errors
    pub fn describe(&self) -> String {
        match self {
            Step::Program(cmd) => cmd.command_line(),
            Step::RemoveDir(path) => format!("rm -rf {}", path.display()),
            Step::WriteFile(write) => format!("write {}", write.path.display()),
        }
    }

    /// Whether the step is echoed as `$ <command>` when not sensitive
    pub fn is_traced(&self) -> bool {
        !matches!(self, Step::WriteFile(_))
    }
}

impl From<CommandStep> for Step {
    fn from(cmd: CommandStep) -> Self {
        Step::Program(cmd)
    }
}

/// Result of executing one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Failed(String),
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed)
    }
}
