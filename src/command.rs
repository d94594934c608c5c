use crate::env::Environment;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Exit codes only describe launched programs and never drive the interpreter loop;
/// see [`LoopSignal`] for that.
pub type ExitCode = i32;

/// Outcome of one dispatched command: keep reading lines or stop the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    Continue,
    Exit,
}

/// Object-safe trait for any command the registry can produce.
pub trait ExecutableCommand {
    /// Executes the command.
    ///
    /// Regular output goes to `stdout`, error reports to `stderr`. The returned error is
    /// reserved for failures of the streams themselves; command failures are reported
    /// by the command and answered with [`LoopSignal::Continue`].
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<LoopSignal>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Name the factory answers to.
    fn name(&self) -> &'static str;

    /// Attempt to create a command instance for the provided name and arguments.
    ///
    /// `args` excludes the command name itself.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}
