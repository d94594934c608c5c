use crate::builtin;
use crate::command::{CommandFactory, LoopSignal};
use crate::env::Environment;
use crate::external::{Launcher, OsProcesses, ProcessBackend};
use crate::io_adapters::LineSource;
use crate::lexer;
use anyhow::Result;
use std::io::Write;
use tracing::{debug, info, warn};

/// Prompt text used when none is configured.
pub const DEFAULT_PROMPT: &str = "308sh";

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports builtins defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The read-parse-dispatch-execute loop and the state it carries between lines.
///
/// Each line is reaped-for, read, tokenized and routed either to a builtin or to the
/// [`Launcher`]. Only the [`Environment`], the working directory and the set of pending
/// background children outlive a single line.
///
/// Example
/// ```
/// use shell308::{Interpreter, LoopSignal, MemWriter};
/// let (out, handle) = MemWriter::with_handle();
/// let mut sh = Interpreter::new("demo").with_output(out, Vec::new());
/// assert_eq!(sh.dispatch("set GREETING hi"), LoopSignal::Continue);
/// assert_eq!(sh.dispatch("get GREETING"), LoopSignal::Continue);
/// assert_eq!(sh.dispatch("exit"), LoopSignal::Exit);
/// assert_eq!(handle.borrow().as_slice(), b"hi\n");
/// ```
pub struct Interpreter<P = OsProcesses> {
    prompt: String,
    env: Environment,
    builtins: Vec<Box<dyn CommandFactory>>,
    launcher: Launcher<P>,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
}

impl Interpreter<OsProcesses> {
    /// An interpreter launching real processes, writing to the process's stdout/stderr.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self::with_processes(prompt, OsProcesses)
    }
}

impl<P: ProcessBackend> Interpreter<P> {
    /// An interpreter launching commands through `processes`.
    pub fn with_processes(prompt: impl Into<String>, processes: P) -> Self {
        Self {
            prompt: prompt.into(),
            env: Environment::new(),
            builtins: builtin::registry(),
            launcher: Launcher::new(processes),
            stdout: Box::new(std::io::stdout()),
            stderr: Box::new(std::io::stderr()),
        }
    }

    /// Replaces the environment captured from the process.
    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Redirects the interpreter's own output. Launched children keep inheriting the
    /// process's streams.
    pub fn with_output(
        mut self,
        stdout: impl Write + 'static,
        stderr: impl Write + 'static,
    ) -> Self {
        self.stdout = Box::new(stdout);
        self.stderr = Box::new(stderr);
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn launcher(&self) -> &Launcher<P> {
        &self.launcher
    }

    /// The prompt as shown before each read: `<prompt>> `.
    pub fn prompt(&self) -> String {
        format!("{}> ", self.prompt)
    }

    /// Runs lines from `input` until `exit` or end of input.
    pub fn repl(&mut self, input: &mut dyn LineSource) {
        info!(prompt = %self.prompt, "interpreter started");
        while self.step(input) == LoopSignal::Continue {}
        info!("interpreter stopped");
    }

    /// One loop iteration: reap, read, dispatch.
    pub fn step(&mut self, input: &mut dyn LineSource) -> LoopSignal {
        if let Err(e) = self.launcher.reap(&mut self.stdout) {
            warn!(error = %e, "failed to report reaped children");
        }

        let line = match input.read_line(&self.prompt()) {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("end of input");
                return LoopSignal::Exit;
            }
            Err(e) => {
                warn!(error = %e, "read failed");
                if let Err(e) = writeln!(self.stderr, "Failed to read input: {e:#}") {
                    warn!(error = %e, "failed to report read error");
                }
                return LoopSignal::Exit;
            }
        };

        self.dispatch(&line)
    }

    /// Tokenizes `line` and routes it to a builtin or the launcher.
    pub fn dispatch(&mut self, line: &str) -> LoopSignal {
        let signal = match self.route(line) {
            Ok(signal) => signal,
            Err(e) => {
                warn!(error = %e, "output failed");
                LoopSignal::Continue
            }
        };
        if let Err(e) = self.stdout.flush() {
            warn!(error = %e, "flush failed");
        }
        signal
    }

    fn route(&mut self, line: &str) -> Result<LoopSignal> {
        let tokens = lexer::split_into_tokens(line);
        let Some((&name, args)) = tokens.split_first() else {
            writeln!(self.stdout, "Command is empty.")?;
            return Ok(LoopSignal::Continue);
        };

        for factory in &self.builtins {
            if let Some(cmd) = factory.try_create(name, args) {
                debug!(builtin = name, "dispatching builtin");
                return cmd.execute(&mut self.stdout, &mut self.stderr, &mut self.env);
            }
        }

        debug!(command = name, "dispatching external command");
        self.launcher
            .launch(&tokens, &self.env, &mut self.stdout, &mut self.stderr)
    }
}
