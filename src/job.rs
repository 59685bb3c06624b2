//! Job records and the table the shell keeps them in.

use nix::unistd::Pid;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Lifecycle state of a tracked job.
///
/// There is no "exited" state: a job that exits or is killed leaves the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running => f.write_str("Running"),
            JobState::Stopped => f.write_str("Stopped"),
        }
    }
}

/// One external process launched by the shell.
///
/// The process is the leader of its own process group, so `pid` doubles as
/// the group id used for terminal transfer and signal delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub pid: Pid,
    /// Executable name as it was typed, without arguments.
    pub name: String,
    pub state: JobState,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.pid, self.name, self.state)
    }
}

/// Ordered collection of jobs keyed by process id.
///
/// Insertion order is kept for display; lookups by pid go through an index.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    index: HashMap<Pid, usize>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job.
    ///
    /// A record already holding `pid` is stale (the kernel only hands a pid out
    /// again after the old process was reaped), so it is dropped and the new
    /// job is appended at the end.
    pub fn insert(&mut self, pid: Pid, name: impl Into<String>, state: JobState) {
        if let Some(old) = self.remove(pid) {
            warn!(%pid, stale = %old.name, "replacing job record for reused pid");
        }
        let job = Job {
            pid,
            name: name.into(),
            state,
        };
        debug!(%pid, name = %job.name, %state, "job added");
        self.index.insert(pid, self.jobs.len());
        self.jobs.push(job);
    }

    /// Set the state of the job with `pid`.
    ///
    /// Returns the previous state, or `None` if no such job is tracked.
    pub fn update_state(&mut self, pid: Pid, state: JobState) -> Option<JobState> {
        let Some(&i) = self.index.get(&pid) else {
            warn!(%pid, %state, "state update for untracked pid ignored");
            return None;
        };
        let job = &mut self.jobs[i];
        let previous = std::mem::replace(&mut job.state, state);
        if previous != state {
            debug!(%pid, from = %previous, to = %state, "job state changed");
        }
        Some(previous)
    }

    /// Remove the job with `pid`, keeping the relative order of the rest.
    pub fn remove(&mut self, pid: Pid) -> Option<Job> {
        let i = self.index.remove(&pid)?;
        let job = self.jobs.remove(i);
        for moved in &self.jobs[i..] {
            if let Some(slot) = self.index.get_mut(&moved.pid) {
                *slot -= 1;
            }
        }
        debug!(%pid, name = %job.name, "job removed");
        Some(job)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.index.contains_key(&pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&Job> {
        self.index.get(&pid).map(|&i| &self.jobs[i])
    }

    /// The oldest tracked job.
    pub fn first(&self) -> Option<&Job> {
        self.jobs.first()
    }

    /// Jobs in insertion order.
    pub fn list(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    fn pids(table: &JobTable) -> Vec<i32> {
        table.list().map(|j| j.pid.as_raw()).collect()
    }

    #[test]
    fn insert_keeps_launch_order() {
        let mut table = JobTable::new();
        table.insert(pid(30), "sleep", JobState::Running);
        table.insert(pid(10), "yes", JobState::Running);
        table.insert(pid(20), "cat", JobState::Stopped);

        assert_eq!(pids(&table), vec![30, 10, 20]);
        assert_eq!(table.list().count(), 3);
        assert_eq!(table.get(pid(20)).unwrap().state, JobState::Stopped);
    }

    #[test]
    fn reinserting_pid_overwrites_stale_record() {
        let mut table = JobTable::new();
        table.insert(pid(1), "a", JobState::Running);
        table.insert(pid(2), "b", JobState::Stopped);
        table.insert(pid(1), "c", JobState::Running);

        assert_eq!(table.list().count(), 2);
        assert_eq!(pids(&table), vec![2, 1]);
        assert_eq!(table.get(pid(1)).unwrap().name, "c");
    }

    #[test]
    fn update_state_reports_previous() {
        let mut table = JobTable::new();
        table.insert(pid(7), "sleep", JobState::Running);

        assert_eq!(table.update_state(pid(7), JobState::Stopped), Some(JobState::Running));
        assert_eq!(table.get(pid(7)).unwrap().state, JobState::Stopped);
    }

    #[test]
    fn update_state_on_missing_pid_is_noop() {
        let mut table = JobTable::new();
        table.insert(pid(7), "sleep", JobState::Running);

        assert_eq!(table.update_state(pid(8), JobState::Stopped), None);
        assert_eq!(table.get(pid(7)).unwrap().state, JobState::Running);
    }

    #[test]
    fn remove_preserves_order_and_index() {
        let mut table = JobTable::new();
        for raw in [5, 6, 7, 8] {
            table.insert(pid(raw), "sleep", JobState::Running);
        }

        let removed = table.remove(pid(6)).unwrap();
        assert_eq!(removed.pid, pid(6));
        assert_eq!(pids(&table), vec![5, 7, 8]);
        assert!(!table.contains(pid(6)));

        // Index entries after the removed slot must still resolve.
        table.update_state(pid(8), JobState::Stopped);
        assert_eq!(table.get(pid(8)).unwrap().state, JobState::Stopped);
        assert_eq!(table.get(pid(7)).unwrap().pid, pid(7));
    }

    #[test]
    fn remove_missing_pid_returns_none() {
        let mut table = JobTable::new();
        table.insert(pid(5), "sleep", JobState::Running);

        assert!(table.remove(pid(9)).is_none());
        assert_eq!(table.list().count(), 1);
    }

    #[test]
    fn job_display_is_tab_separated() {
        let job = Job {
            pid: pid(4242),
            name: "sleep".to_string(),
            state: JobState::Running,
        };
        assert_eq!(job.to_string(), "4242\tsleep\tRunning");
    }
}
