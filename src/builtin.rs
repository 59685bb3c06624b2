use crate::control::JobControl;
use crate::error::ShellError;
use crate::wait::{ChildEvents, WaitOutcome};
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use nix::unistd::Pid;
use std::io::Write;
use tracing::warn;

/// Status the shell exits with after `quit`, `exit` or end-of-input.
pub const QUIT_STATUS: i32 = 1;

/// What the prompt loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(i32),
}

/// Built-in commands known to the shell at compile time.
///
/// Arguments are parsed with [`argh`]; the command runs in-process against the
/// shell's [`JobControl`].
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "jobs" or "fg".
    fn name() -> &'static str;

    /// Line printed instead of argh's message when the arguments do not parse.
    fn usage() -> Option<&'static str> {
        None
    }

    fn execute<E: ChildEvents>(
        self,
        jobs: &mut JobControl<E>,
        stdout: &mut dyn Write,
    ) -> Result<Flow>;
}

fn run<T: BuiltinCommand, E: ChildEvents>(
    args: &[&str],
    jobs: &mut JobControl<E>,
    stdout: &mut dyn Write,
) -> Result<Flow> {
    match T::from_args(&[T::name()], args) {
        Ok(cmd) => cmd.execute(jobs, stdout),
        Err(EarlyExit { output, status }) => {
            match T::usage() {
                Some(usage) if status.is_err() => writeln!(stdout, "{usage}")?,
                _ => writeln!(stdout, "{}", output.trim_end())?,
            }
            Ok(Flow::Continue)
        }
    }
}

/// Run `name` if it is a built-in. Returns `None` for anything else.
pub fn try_builtin<E: ChildEvents>(
    name: &str,
    args: &[&str],
    jobs: &mut JobControl<E>,
    stdout: &mut dyn Write,
) -> Option<Result<Flow>> {
    let result = match name {
        n if n == Jobs::name() => run::<Jobs, E>(args, jobs, stdout),
        n if n == Bg::name() => run::<Bg, E>(args, jobs, stdout),
        n if n == Fg::name() => run::<Fg, E>(args, jobs, stdout),
        n if n == Quit::name() => run::<Quit, E>(args, jobs, stdout),
        n if n == Exit::name() => run::<Exit, E>(args, jobs, stdout),
        _ => return None,
    };
    Some(result)
}

/// Accept only a positive decimal process id.
fn parse_pid(arg: Option<&str>) -> Option<Pid> {
    match arg?.parse::<i32>() {
        Ok(raw) if raw > 0 => Some(Pid::from_raw(raw)),
        _ => None,
    }
}

fn refresh<E: ChildEvents>(jobs: &mut JobControl<E>) {
    if let Err(e) = jobs.reap() {
        warn!(error = %e, "could not collect child status");
    }
}

/// Print the line shown when a foreground job gives the terminal back by stopping.
pub(crate) fn report_outcome<E: ChildEvents>(
    jobs: &JobControl<E>,
    pid: Pid,
    outcome: WaitOutcome,
    stdout: &mut dyn Write,
) -> Result<()> {
    if outcome == WaitOutcome::Stopped {
        if let Some(job) = jobs.table().get(pid) {
            writeln!(stdout, "\n{job}")?;
        }
    }
    Ok(())
}

#[derive(FromArgs)]
/// List tracked jobs as pid, name and state.
pub struct Jobs {}

impl BuiltinCommand for Jobs {
    fn name() -> &'static str {
        "jobs"
    }

    fn execute<E: ChildEvents>(
        self,
        jobs: &mut JobControl<E>,
        stdout: &mut dyn Write,
    ) -> Result<Flow> {
        refresh(jobs);
        let list = jobs.list_jobs();
        if list.is_empty() {
            writeln!(stdout, "no jobs")?;
        }
        for job in list {
            writeln!(stdout, "{job}")?;
        }
        Ok(Flow::Continue)
    }
}

#[derive(FromArgs)]
/// Continue a stopped job in the background.
pub struct Bg {
    #[argh(positional)]
    /// process id of a tracked job.
    pub pid: Option<String>,
}

impl BuiltinCommand for Bg {
    fn name() -> &'static str {
        "bg"
    }

    fn usage() -> Option<&'static str> {
        Some("Usage: bg <pid>")
    }

    fn execute<E: ChildEvents>(
        self,
        jobs: &mut JobControl<E>,
        stdout: &mut dyn Write,
    ) -> Result<Flow> {
        let Some(pid) = parse_pid(self.pid.as_deref()) else {
            writeln!(stdout, "{}", Self::usage().unwrap_or_default())?;
            return Ok(Flow::Continue);
        };
        refresh(jobs);
        match jobs.resume_background(pid) {
            Ok(()) => {}
            Err(e @ ShellError::NoSuchJob(_)) => writeln!(stdout, "{e}")?,
            Err(e) => return Err(e.into()),
        }
        Ok(Flow::Continue)
    }
}

#[derive(FromArgs)]
/// Bring a job to the foreground, continue it and wait for it.
pub struct Fg {
    #[argh(positional)]
    /// process id of a tracked job.
    pub pid: Option<String>,
}

impl BuiltinCommand for Fg {
    fn name() -> &'static str {
        "fg"
    }

    fn usage() -> Option<&'static str> {
        Some("Usage: fg <pid>")
    }

    fn execute<E: ChildEvents>(
        self,
        jobs: &mut JobControl<E>,
        stdout: &mut dyn Write,
    ) -> Result<Flow> {
        let Some(pid) = parse_pid(self.pid.as_deref()) else {
            writeln!(stdout, "{}", Self::usage().unwrap_or_default())?;
            return Ok(Flow::Continue);
        };
        refresh(jobs);
        match jobs.resume_foreground(pid) {
            Ok(outcome) => report_outcome(jobs, pid, outcome, stdout)?,
            Err(e @ ShellError::NoSuchJob(_)) => writeln!(stdout, "{e}")?,
            Err(e) => return Err(e.into()),
        }
        Ok(Flow::Continue)
    }
}

#[derive(FromArgs)]
/// Kill all jobs and leave the shell.
pub struct Quit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Quit {
    fn name() -> &'static str {
        "quit"
    }

    fn execute<E: ChildEvents>(
        self,
        jobs: &mut JobControl<E>,
        _stdout: &mut dyn Write,
    ) -> Result<Flow> {
        jobs.terminate_all();
        Ok(Flow::Exit(QUIT_STATUS))
    }
}

#[derive(FromArgs)]
/// Kill all jobs and leave the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute<E: ChildEvents>(
        self,
        jobs: &mut JobControl<E>,
        stdout: &mut dyn Write,
    ) -> Result<Flow> {
        Quit { _args: self._args }.execute(jobs, stdout)
    }
}
