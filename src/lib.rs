//! A small interactive shell built around job control.
//!
//! Every external program runs as a job in its own process group. Foreground
//! jobs borrow the controlling terminal and are waited for; background jobs
//! run on until they are brought to the foreground with `fg`, continued with
//! `bg`, or reaped when they finish.
//!
//! The pieces, leaf first:
//! - [`JobTable`] records each job's pid, name and [`JobState`].
//! - [`ExternalCommand`] forks and execs a program as a new process group.
//! - [`Terminal`] moves the terminal's foreground group between the shell and
//!   a job, with SIGTTOU held off by a [`SignalMaskGuard`] while reclaiming.
//! - [`wait`] turns child state changes into table updates.
//! - [`JobControl`] ties these together behind the operations the
//!   [`Interpreter`] dispatches to.

mod builtin;
pub mod config;
mod control;
mod error;
mod interpreter;
mod job;
mod launcher;
pub mod lexer;
mod terminal;
pub mod wait;

pub use builtin::{Flow, QUIT_STATUS};
pub use control::{JobControl, Launched};
pub use error::{Result, ShellError};
pub use interpreter::{DEFAULT_PROMPT, Interpreter};
pub use job::{Job, JobState, JobTable};
pub use launcher::{EXEC_FAILURE_STATUS, ExternalCommand};
pub use terminal::{SignalMaskGuard, Terminal};
pub use wait::{ChildEvent, ChildEvents, Transition, WaitOutcome, Waitpid};
