//! The shell's job-control state and the operations the dispatcher calls.

use crate::error::{Result, ShellError};
use crate::job::{Job, JobState, JobTable};
use crate::launcher::ExternalCommand;
use crate::terminal::Terminal;
use crate::wait::{self, ChildEvents, WaitOutcome, Waitpid};
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

/// Result of [`JobControl::launch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Launched {
    pub pid: Pid,
    /// `None` for background jobs, which are not waited for.
    pub outcome: Option<WaitOutcome>,
}

/// Owns the job table, the terminal arbiter and the child-event source.
///
/// Everything runs on the shell's single thread; the only place it blocks is
/// the wait loop entered for foreground jobs.
pub struct JobControl<E = Waitpid> {
    table: JobTable,
    terminal: Terminal,
    events: E,
}

impl JobControl<Waitpid> {
    pub fn new(terminal: Terminal) -> Self {
        Self::with_events(terminal, Waitpid)
    }
}

impl<E: ChildEvents> JobControl<E> {
    pub fn with_events(terminal: Terminal, events: E) -> Self {
        Self {
            table: JobTable::new(),
            terminal,
            events,
        }
    }

    pub fn table(&self) -> &JobTable {
        &self.table
    }

    /// Start `name` with `args` as a new job.
    ///
    /// Background jobs return immediately. Foreground jobs get the terminal
    /// and are waited for until they stop or end.
    pub fn launch<S: AsRef<str>>(
        &mut self,
        name: &str,
        args: &[S],
        background: bool,
    ) -> Result<Launched> {
        let command = ExternalCommand::new(name, args)?;
        let pid = command.spawn()?;
        self.table.insert(pid, command.name(), JobState::Running);
        if background {
            return Ok(Launched { pid, outcome: None });
        }
        if let Err(e) = self.terminal.set_foreground(pid) {
            // The child may already be gone; the wait below still reaps it.
            warn!(%pid, error = %e, "could not give terminal to new job");
        }
        let outcome = self.wait_foreground(pid)?;
        Ok(Launched {
            pid,
            outcome: Some(outcome),
        })
    }

    /// Snapshot of the tracked jobs, in launch order.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.table.list().cloned().collect()
    }

    /// Drop finished jobs and apply pending stop/continue notifications.
    pub fn reap(&mut self) -> Result<usize> {
        wait::reap_pending(&mut self.table, &mut self.events)
    }

    /// `bg`: continue a tracked job without waiting for it.
    pub fn resume_background(&mut self, pid: Pid) -> Result<()> {
        if !self.table.contains(pid) {
            return Err(ShellError::NoSuchJob(pid));
        }
        self.continue_job(pid)?;
        info!(%pid, "job resumed in background");
        Ok(())
    }

    /// `fg`: give a tracked job the terminal, continue it and wait for it.
    ///
    /// Nothing is signalled when the job is untracked or the terminal cannot be
    /// handed over.
    pub fn resume_foreground(&mut self, pid: Pid) -> Result<WaitOutcome> {
        if !self.table.contains(pid) {
            return Err(ShellError::NoSuchJob(pid));
        }
        self.terminal.set_foreground(pid)?;
        if let Err(e) = self.continue_job(pid) {
            self.reclaim_terminal();
            return Err(e);
        }
        info!(%pid, "job resumed in foreground");
        self.wait_foreground(pid)
    }

    /// Kill every tracked job in table order, dropping each one as it is signalled.
    pub fn terminate_all(&mut self) {
        while let Some(pid) = self.table.first().map(|job| job.pid) {
            match killpg(pid, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => warn!(%pid, error = %e, "failed to kill job"),
            }
            self.table.remove(pid);
        }
        debug!("all jobs terminated");
    }

    fn continue_job(&mut self, pid: Pid) -> Result<()> {
        killpg(pid, Signal::SIGCONT).map_err(|e| match e {
            Errno::ESRCH => ShellError::NoSuchJob(pid),
            e => ShellError::Signal(pid, e),
        })?;
        self.table.update_state(pid, JobState::Running);
        Ok(())
    }

    /// Run the wait loop for a job that holds the terminal, then take the terminal back.
    fn wait_foreground(&mut self, pid: Pid) -> Result<WaitOutcome> {
        let outcome = wait::wait_for(&mut self.table, &mut self.events, pid);
        self.reclaim_terminal();
        outcome
    }

    fn reclaim_terminal(&self) {
        if let Err(e) = self.terminal.reclaim() {
            warn!(error = %e, "could not reclaim terminal");
        }
    }
}
