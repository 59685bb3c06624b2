use crate::builtin::{self, Flow, QUIT_STATUS};
use crate::control::JobControl;
use crate::error::ShellError;
use crate::lexer;
use crate::terminal::Terminal;
use crate::wait::{ChildEvents, Waitpid};
use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::Write;
use tracing::{debug, info, warn};

/// Interactive command interpreter with job control.
///
/// Each line is either a built-in (`jobs`, `bg`, `fg`, `quit`, `exit`) or an
/// external program started as a job. Example
/// ```no_run
/// use job_shell::{Interpreter, Terminal};
/// let mut sh = Interpreter::new(Terminal::attach());
/// let status = sh.repl().unwrap();
/// std::process::exit(status);
/// ```
pub struct Interpreter<E = Waitpid> {
    jobs: JobControl<E>,
    prompt: String,
}

pub const DEFAULT_PROMPT: &str = "[jobsh]: ";

impl Interpreter<Waitpid> {
    pub fn new(terminal: Terminal) -> Self {
        Self::with_control(JobControl::new(terminal))
    }
}

impl<E: ChildEvents> Interpreter<E> {
    pub fn with_control(jobs: JobControl<E>) -> Self {
        Self {
            jobs,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn jobs(&self) -> &JobControl<E> {
        &self.jobs
    }

    /// Execute one input line, writing user-facing messages to `stdout`.
    pub fn execute_line(&mut self, line: &str, stdout: &mut dyn Write) -> anyhow::Result<Flow> {
        let command = lexer::split_into_words(line);
        let Some(name) = command.name() else {
            return Ok(Flow::Continue);
        };
        let args: Vec<&str> = command.args().iter().map(String::as_str).collect();

        if let Some(result) = builtin::try_builtin(name, &args, &mut self.jobs, stdout) {
            return result;
        }

        debug!(name, ?args, background = command.background, "launching");
        let launched = match self.jobs.launch(name, &args, command.background) {
            Ok(launched) => launched,
            // The job did start; only collecting its status went wrong.
            Err(e @ ShellError::Wait(_)) => return Err(e.into()),
            Err(e) => return Err(anyhow::Error::new(e).context(format!("{name}: launch failed"))),
        };
        if let Some(outcome) = launched.outcome {
            builtin::report_outcome(&self.jobs, launched.pid, outcome, stdout)?;
        }
        Ok(Flow::Continue)
    }

    /// Leave the shell: kill every remaining job.
    pub fn shutdown(&mut self) -> i32 {
        self.jobs.terminate_all();
        QUIT_STATUS
    }

    /// Read-Eval-Print Loop over the controlling terminal.
    ///
    /// Returns the status the process should exit with.
    pub fn repl(&mut self) -> anyhow::Result<i32> {
        let mut rl = DefaultEditor::new().context("failed to initialise line editor")?;
        let mut stdout = std::io::stdout();

        loop {
            if let Err(e) = self.jobs.reap() {
                warn!(error = %e, "could not collect child status");
            }
            match rl.readline(&self.prompt) {
                Ok(line) => match self.execute_line(&line, &mut stdout) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Exit(status)) => return Ok(status),
                    Err(e) => {
                        writeln!(stdout, "{e:#}")?;
                    }
                },
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => {
                    info!("end of input");
                    return Ok(self.shutdown());
                }
                Err(err) => {
                    self.shutdown();
                    return Err(err).context("failed to read line");
                }
            }
            stdout.flush()?;
        }
    }
}
