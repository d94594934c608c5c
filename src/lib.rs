//! A small interactive command interpreter.
//!
//! Each input line is split on spaces into a command and its arguments. The command is
//! then either handled in-process by one of seven builtins (`exit`, `pid`, `ppid`, `cd`,
//! `pwd`, `set`, `get`) or resolved through `PATH` and launched as a child process. A
//! trailing `&` launches it in the background; such children are reaped, without
//! blocking, before each new prompt.
//!
//! The main entry point is [`Interpreter`]. Its loop reads from any [`LineSource`] and
//! launches through any [`ProcessBackend`], which keeps it testable without a terminal
//! or real processes.

mod builtin;
pub mod command;
pub mod env;
pub mod external;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod logging;

pub use command::{ExitCode, LoopSignal};
pub use external::{ChildStatus, Launcher, OsProcesses, ProcessBackend};
pub use interpreter::{DEFAULT_PROMPT, Interpreter};
pub use io_adapters::{LineSource, MemWriter, ScriptedInput, Terminal};
