//! Launching of commands that are not builtins.
//!
//! A launch resolves the command through `PATH`, spawns it through a [`ProcessBackend`]
//! and, unless the command line ends with a lone `&`, blocks until the child exits or
//! stops. Background children are remembered by pid and collected by [`Launcher::reap`]
//! without ever blocking.

use crate::command::{ExitCode, LoopSignal};
use crate::env::Environment;
use anyhow::Result;
use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fmt;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

const BACKGROUND_MARKER: &str = "&";

/// How a waited-for child changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    /// Terminated normally with this exit code.
    Exited(ExitCode),
    /// Terminated by this signal number.
    Signaled(i32),
    /// Stopped by this signal number; the child still exists.
    Stopped(i32),
}

impl fmt::Display for ChildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildStatus::Exited(code) => write!(f, "EXIT {code}"),
            ChildStatus::Signaled(signal) => write!(f, "SIGNAL {signal}"),
            ChildStatus::Stopped(signal) => write!(f, "STOPPED {signal}"),
        }
    }
}

/// Creates and waits for child processes.
pub trait ProcessBackend {
    /// Starts `program` with `argv0` as its name and `args` after it, inside `env`.
    /// Returns the child's pid.
    fn spawn(
        &mut self,
        program: &Path,
        argv0: &str,
        args: &[&str],
        env: &Environment,
    ) -> io::Result<u32>;

    /// Blocks until the child terminates or stops.
    fn wait(&mut self, pid: u32) -> io::Result<ChildStatus>;

    /// Returns the child's status if it has terminated, `None` if it is still running.
    fn try_wait(&mut self, pid: u32) -> io::Result<Option<ChildStatus>>;
}

/// [`ProcessBackend`] backed by real operating system processes.
#[derive(Debug, Default)]
pub struct OsProcesses;

impl ProcessBackend for OsProcesses {
    fn spawn(
        &mut self,
        program: &Path,
        argv0: &str,
        args: &[&str],
        env: &Environment,
    ) -> io::Result<u32> {
        // The std handle is dropped right away; the child is waited for by pid.
        let child = Command::new(program)
            .arg0(argv0)
            .args(args)
            .env_clear()
            .envs(&env.vars)
            .current_dir(&env.current_dir)
            .spawn()?;
        Ok(child.id())
    }

    fn wait(&mut self, pid: u32) -> io::Result<ChildStatus> {
        let pid = to_pid(pid)?;
        loop {
            match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                Ok(status) => {
                    if let Some(status) = child_status(status) {
                        return Ok(status);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(errno.into()),
            }
        }
    }

    fn try_wait(&mut self, pid: u32) -> io::Result<Option<ChildStatus>> {
        match waitpid(to_pid(pid)?, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(Errno::EINTR) => Ok(None),
            Ok(status) => Ok(child_status(status)),
            Err(errno) => Err(errno.into()),
        }
    }
}

fn to_pid(pid: u32) -> io::Result<Pid> {
    i32::try_from(pid)
        .map(Pid::from_raw)
        .map_err(io::Error::other)
}

fn child_status(status: WaitStatus) -> Option<ChildStatus> {
    match status {
        WaitStatus::Exited(_, code) => Some(ChildStatus::Exited(code)),
        WaitStatus::Signaled(_, signal, _) => Some(ChildStatus::Signaled(signal as i32)),
        WaitStatus::Stopped(_, signal) => Some(ChildStatus::Stopped(signal as i32)),
        _ => None,
    }
}

/// Splits a trailing `&` off the argument list.
///
/// Only a list with at least one token before the `&` counts as a background launch; a
/// lone `&` stays a command name.
pub fn split_background<'a, 'b>(tokens: &'a [&'b str]) -> (&'a [&'b str], bool) {
    match tokens.split_last() {
        Some((&last, rest)) if last == BACKGROUND_MARKER && !rest.is_empty() => (rest, true),
        _ => (tokens, false),
    }
}

/// Runs external commands and keeps track of the ones left running in the background.
pub struct Launcher<P> {
    processes: P,
    background: BTreeSet<u32>,
}

impl<P: ProcessBackend> Launcher<P> {
    pub fn new(processes: P) -> Self {
        Self {
            processes,
            background: BTreeSet::new(),
        }
    }

    /// The backend the launcher spawns through.
    pub fn processes(&self) -> &P {
        &self.processes
    }

    #[cfg(test)]
    pub(crate) fn processes_mut(&mut self) -> &mut P {
        &mut self.processes
    }

    /// Pids of background children that have not been reaped yet.
    pub fn background(&self) -> impl Iterator<Item = u32> + '_ {
        self.background.iter().copied()
    }

    /// Launches `tokens[0]` with the remaining tokens as arguments.
    ///
    /// Prints `[<pid>]` once the child exists and, for foreground launches, the child's
    /// final status. Every failure is reported to `stderr`; the result is always
    /// [`LoopSignal::Continue`] unless the streams themselves fail.
    pub fn launch(
        &mut self,
        tokens: &[&str],
        env: &Environment,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<LoopSignal> {
        let (argv, background) = split_background(tokens);
        let Some((&name, args)) = argv.split_first() else {
            return Ok(LoopSignal::Continue);
        };

        let search_paths = env.get_var("PATH").unwrap_or_default();
        let Some(program) = find_command_path(search_paths, Path::new(name)) else {
            warn!(command = name, "command not found");
            writeln!(stderr, "Failed to execute child process: {name}: command not found")?;
            return Ok(LoopSignal::Continue);
        };

        stdout.flush()?;
        let pid = match self.processes.spawn(&program, name, args, env) {
            Ok(pid) => pid,
            Err(e) => {
                warn!(command = name, error = %e, "spawn failed");
                writeln!(stderr, "Failed to execute child process: {name}: {e}")?;
                return Ok(LoopSignal::Continue);
            }
        };
        debug!(pid, command = name, background, "spawned");
        writeln!(stdout, "[{pid}]")?;

        if background {
            self.background.insert(pid);
            return Ok(LoopSignal::Continue);
        }

        stdout.flush()?;
        match self.processes.wait(pid) {
            Ok(status) => {
                writeln!(stdout, "[{pid}] {status}")?;
                if let ChildStatus::Stopped(_) = status {
                    self.background.insert(pid);
                }
            }
            Err(e) => {
                warn!(pid, error = %e, "wait failed");
                writeln!(stderr, "Failed to wait for child process {pid}: {e}")?;
            }
        }
        Ok(LoopSignal::Continue)
    }

    /// Collects every background child that has terminated, printing `[<pid>] <status>`
    /// for each. Never blocks.
    pub fn reap(&mut self, stdout: &mut dyn Write) -> Result<()> {
        let mut finished = Vec::new();
        for &pid in &self.background {
            match self.processes.try_wait(pid) {
                Ok(None) | Ok(Some(ChildStatus::Stopped(_))) => {}
                Ok(Some(status)) => finished.push((pid, Some(status))),
                Err(e) => {
                    debug!(pid, error = %e, "forgetting unknown child");
                    finished.push((pid, None));
                }
            }
        }

        for (pid, status) in finished {
            self.background.remove(&pid);
            if let Some(status) = status {
                debug!(pid, %status, "reaped");
                writeln!(stdout, "[{pid}] {status}")?;
            }
        }
        Ok(())
    }
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it is a file.
/// - Relative with multiple components (e.g., `bin/sh`) or `./`-prefixed: returns it if
///   it is a file.
/// - Single path component (no separators): search each directory in `search_paths` (PATH)
///   and return the first executable match, skipping files without an execute bit.
/// - Empty path or empty `search_paths` for a bare name: returns `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => None,
        (Some(x), None) if !path.starts_with(".") => {
            find_in_path(search_paths, x.as_os_str()).map(Cow::Owned)
        }
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    if search_paths.is_empty() {
        return None;
    }
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.is_file() { Some(path) } else { None }
}

#[cfg(test)]
pub(crate) mod scripted {
    use super::{ChildStatus, ProcessBackend};
    use crate::env::Environment;
    use std::collections::{HashMap, HashSet};
    use std::io;
    use std::path::Path;

    /// In-memory [`ProcessBackend`] that records what it is asked to do.
    ///
    /// Pids are handed out from 1000 upwards. A child counts as running until
    /// [`ScriptedProcesses::finish`] gives it a status; `wait` on a child that was never
    /// finished reports `EXIT 0`.
    #[derive(Debug)]
    pub(crate) struct ScriptedProcesses {
        next_pid: u32,
        finished: HashMap<u32, ChildStatus>,
        lost: HashSet<u32>,
        pub(crate) spawned: Vec<Vec<String>>,
        pub(crate) waited: Vec<u32>,
        pub(crate) fail_spawn: bool,
    }

    impl Default for ScriptedProcesses {
        fn default() -> Self {
            Self {
                next_pid: 1000,
                finished: HashMap::new(),
                lost: HashSet::new(),
                spawned: Vec::new(),
                waited: Vec::new(),
                fail_spawn: false,
            }
        }
    }

    impl ScriptedProcesses {
        pub(crate) fn finish(&mut self, pid: u32, status: ChildStatus) {
            self.finished.insert(pid, status);
        }

        /// Makes every later wait on `pid` fail the way `waitpid` does for a pid that is
        /// not a child.
        pub(crate) fn lose(&mut self, pid: u32) {
            self.lost.insert(pid);
        }
    }

    impl ProcessBackend for ScriptedProcesses {
        fn spawn(
            &mut self,
            _program: &Path,
            argv0: &str,
            args: &[&str],
            _env: &Environment,
        ) -> io::Result<u32> {
            if self.fail_spawn {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            let mut argv = vec![argv0.to_owned()];
            argv.extend(args.iter().map(|arg| (*arg).to_owned()));
            self.spawned.push(argv);
            let pid = self.next_pid;
            self.next_pid += 1;
            Ok(pid)
        }

        fn wait(&mut self, pid: u32) -> io::Result<ChildStatus> {
            self.waited.push(pid);
            Ok(self
                .finished
                .remove(&pid)
                .unwrap_or(ChildStatus::Exited(0)))
        }

        fn try_wait(&mut self, pid: u32) -> io::Result<Option<ChildStatus>> {
            if self.lost.contains(&pid) {
                return Err(nix::errno::Errno::ECHILD.into());
            }
            Ok(self.finished.remove(&pid))
        }
    }
}
