use crate::command::{CommandFactory, ExecutableCommand, LoopSignal};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context, Result, anyhow, bail};
use nix::unistd::{getpid, getppid};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are executed directly in-process without spawning a child process, and they
/// never see the process launcher.
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "pwd" or "cd".
    fn name() -> &'static str;

    /// Builds the command from the tokens following its name. Tokens a builtin has no
    /// use for are ignored.
    fn from_args(args: &[&str]) -> Self;

    /// Executes the command using the provided output stream and environment.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<LoopSignal>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<LoopSignal> {
        match <T as BuiltinCommand>::execute(*self, stdout, env) {
            Ok(signal) => Ok(signal),
            Err(e) => {
                tracing::debug!(builtin = T::name(), error = %e, "builtin failed");
                writeln!(stderr, "{e:#}")?;
                Ok(LoopSignal::Continue)
            }
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(Box::new(T::from_args(args)))
        } else {
            None
        }
    }
}

/// The builtin registry, in lookup order.
pub(crate) fn registry() -> Vec<Box<dyn CommandFactory>> {
    vec![
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Pid>::default()),
        Box::new(Factory::<Ppid>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Set>::default()),
        Box::new(Factory::<Get>::default()),
    ]
}

fn owned(args: &[&str], index: usize) -> Option<String> {
    args.get(index).map(|arg| (*arg).to_owned())
}

/// Stop the interpreter. Arguments are ignored.
pub struct Exit;

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn from_args(_args: &[&str]) -> Self {
        Self
    }

    fn execute(self, _stdout: &mut dyn Write, _env: &mut Environment) -> Result<LoopSignal> {
        Ok(LoopSignal::Exit)
    }
}

/// Print the interpreter's process id as `[<pid>]`.
pub struct Pid;

impl BuiltinCommand for Pid {
    fn name() -> &'static str {
        "pid"
    }

    fn from_args(_args: &[&str]) -> Self {
        Self
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<LoopSignal> {
        writeln!(stdout, "[{}]", getpid())?;
        Ok(LoopSignal::Continue)
    }
}

/// Print the parent process id as `[<ppid>]`.
pub struct Ppid;

impl BuiltinCommand for Ppid {
    fn name() -> &'static str {
        "ppid"
    }

    fn from_args(_args: &[&str]) -> Self {
        Self
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<LoopSignal> {
        writeln!(stdout, "[{}]", getppid())?;
        Ok(LoopSignal::Continue)
    }
}

/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn from_args(args: &[&str]) -> Self {
        Self {
            target: owned(args, 0),
        }
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<LoopSignal> {
        let target = match self.target {
            Some(t) => PathBuf::from(t),
            None => match env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => bail!("Failed to change the working directory: HOME not set"),
            },
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir).with_context(|| {
            format!("Failed to change the working directory to {}", new_dir.display())
        })?;

        env::set_current_dir(&canonical).with_context(|| {
            format!("Failed to change the working directory to {}", canonical.display())
        })?;
        env.current_dir = canonical;
        Ok(LoopSignal::Continue)
    }
}

/// Print the current working directory to standard output.
pub struct Pwd;

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn from_args(_args: &[&str]) -> Self {
        Self
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<LoopSignal> {
        let cwd = env::current_dir().context("Failed to return current working directory")?;
        writeln!(stdout, "{}", cwd.display())?;
        Ok(LoopSignal::Continue)
    }
}

/// Set a variable to a value, or unset it when no value is given.
pub struct Set {
    pub name: Option<String>,
    pub value: Option<String>,
}

impl BuiltinCommand for Set {
    fn name() -> &'static str {
        "set"
    }

    fn from_args(args: &[&str]) -> Self {
        Self {
            name: owned(args, 0),
            value: owned(args, 1),
        }
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<LoopSignal> {
        let name = self
            .name
            .ok_or_else(|| anyhow!("Failed to set environment variable: missing name"))?;
        match self.value {
            Some(value) => env
                .set_var(name.as_str(), value)
                .with_context(|| format!("Failed to set environment variable {name}"))?,
            None => env
                .remove_var(&name)
                .with_context(|| format!("Failed to delete environment variable {name}"))?,
        }
        Ok(LoopSignal::Continue)
    }
}

/// Print the value of a variable.
pub struct Get {
    pub name: Option<String>,
}

impl BuiltinCommand for Get {
    fn name() -> &'static str {
        "get"
    }

    fn from_args(args: &[&str]) -> Self {
        Self {
            name: owned(args, 0),
        }
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<LoopSignal> {
        let name = self.name.ok_or_else(|| {
            anyhow!("Failed to retrieve the value of environment variable: missing name")
        })?;
        let value = env.get_var(&name).ok_or_else(|| {
            anyhow!("Failed to retrieve the value of environment variable {name}: not set")
        })?;
        writeln!(stdout, "{}", value.to_string_lossy())?;
        Ok(LoopSignal::Continue)
    }
}
