//! Wait loop and status reconciliation.
//!
//! Child state changes are consumed through [`ChildEvents`] and folded into the
//! [`JobTable`]. [`wait_for`] blocks until the job of interest stops or ends;
//! [`reap_pending`] drains whatever is already queued without blocking.

use crate::error::{Result, ShellError};
use crate::job::{JobState, JobTable};
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::{debug, info, trace};

/// What happened to a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stopped(Signal),
    Continued,
    Exited(i32),
    Signaled(Signal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildEvent {
    pub pid: Pid,
    pub transition: Transition,
}

impl ChildEvent {
    fn from_status(status: WaitStatus) -> Option<Self> {
        let (pid, transition) = match status {
            WaitStatus::Stopped(pid, signal) => (pid, Transition::Stopped(signal)),
            WaitStatus::Continued(pid) => (pid, Transition::Continued),
            WaitStatus::Exited(pid, code) => (pid, Transition::Exited(code)),
            WaitStatus::Signaled(pid, signal, _) => (pid, Transition::Signaled(signal)),
            _ => return None,
        };
        Some(Self { pid, transition })
    }
}

/// How the job of interest left the wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Stopped,
    Exited(i32),
    Signaled(Signal),
}

/// Source of child state-change notifications.
pub trait ChildEvents {
    /// Block until any child changes state.
    fn next_event(&mut self) -> std::result::Result<ChildEvent, Errno>;

    /// Return an already pending change, or `None` if nothing is queued.
    fn poll_event(&mut self) -> std::result::Result<Option<ChildEvent>, Errno>;
}

/// [`ChildEvents`] backed by `waitpid(-1, ..)` on the real children of this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct Waitpid;

impl Waitpid {
    const FLAGS: WaitPidFlag = WaitPidFlag::WUNTRACED.union(WaitPidFlag::WCONTINUED);
}

impl ChildEvents for Waitpid {
    fn next_event(&mut self) -> std::result::Result<ChildEvent, Errno> {
        loop {
            let status = waitpid(None, Some(Self::FLAGS))?;
            match ChildEvent::from_status(status) {
                Some(event) => return Ok(event),
                None => trace!(?status, "ignoring wait status"),
            }
        }
    }

    fn poll_event(&mut self) -> std::result::Result<Option<ChildEvent>, Errno> {
        loop {
            match waitpid(None, Some(Self::FLAGS | WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => return Ok(None),
                Ok(status) => {
                    if let Some(event) = ChildEvent::from_status(status) {
                        return Ok(Some(event));
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Fold one event into the table.
///
/// Terminated children are dropped whether or not they are in the foreground.
pub fn apply(table: &mut JobTable, event: ChildEvent) {
    let ChildEvent { pid, transition } = event;
    match transition {
        Transition::Stopped(signal) => {
            info!(%pid, ?signal, "job stopped");
            table.update_state(pid, JobState::Stopped);
        }
        Transition::Continued => {
            debug!(%pid, "job continued");
            table.update_state(pid, JobState::Running);
        }
        Transition::Exited(code) => {
            info!(%pid, code, "job exited");
            table.remove(pid);
        }
        Transition::Signaled(signal) => {
            info!(%pid, ?signal, "job terminated by signal");
            table.remove(pid);
        }
    }
}

/// Block until `target` stops, exits or is killed.
///
/// Events for other children are applied to the table and the loop keeps
/// going; a `Continued` event for `target` does not end the wait.
pub fn wait_for<E: ChildEvents>(
    table: &mut JobTable,
    events: &mut E,
    target: Pid,
) -> Result<WaitOutcome> {
    debug!(%target, "waiting for job");
    loop {
        let event = match events.next_event() {
            Ok(event) => event,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(ShellError::Wait(e)),
        };
        apply(table, event);
        if event.pid != target {
            continue;
        }
        let outcome = match event.transition {
            Transition::Continued => continue,
            Transition::Stopped(_) => WaitOutcome::Stopped,
            Transition::Exited(code) => WaitOutcome::Exited(code),
            Transition::Signaled(signal) => WaitOutcome::Signaled(signal),
        };
        debug!(%target, ?outcome, "wait finished");
        return Ok(outcome);
    }
}

/// Apply every pending event without blocking. Returns how many were applied.
pub fn reap_pending<E: ChildEvents>(table: &mut JobTable, events: &mut E) -> Result<usize> {
    let mut applied = 0;
    while let Some(event) = events.poll_event().map_err(ShellError::Wait)? {
        apply(table, event);
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed list of events; runs dry with `ECHILD` like a shell with no children.
    #[derive(Debug, Default)]
    pub(crate) struct Scripted {
        pub(crate) events: VecDeque<ChildEvent>,
    }

    impl Scripted {
        pub(crate) fn new(events: impl IntoIterator<Item = (i32, Transition)>) -> Self {
            Self {
                events: events
                    .into_iter()
                    .map(|(raw, transition)| ChildEvent {
                        pid: Pid::from_raw(raw),
                        transition,
                    })
                    .collect(),
            }
        }
    }

    impl ChildEvents for Scripted {
        fn next_event(&mut self) -> std::result::Result<ChildEvent, Errno> {
            self.events.pop_front().ok_or(Errno::ECHILD)
        }

        fn poll_event(&mut self) -> std::result::Result<Option<ChildEvent>, Errno> {
            Ok(self.events.pop_front())
        }
    }

    fn pid(raw: i32) -> Pid {
        Pid::from_raw(raw)
    }

    fn table_with(jobs: &[i32]) -> JobTable {
        let mut table = JobTable::new();
        for &raw in jobs {
            table.insert(pid(raw), "sleep", JobState::Running);
        }
        table
    }

    #[test]
    fn stop_of_target_ends_wait_and_keeps_job() {
        let mut table = table_with(&[10]);
        let mut events = Scripted::new([(10, Transition::Stopped(Signal::SIGTSTP))]);

        let outcome = wait_for(&mut table, &mut events, pid(10)).unwrap();

        assert_eq!(outcome, WaitOutcome::Stopped);
        assert_eq!(table.get(pid(10)).unwrap().state, JobState::Stopped);
    }

    #[test]
    fn continued_target_keeps_waiting() {
        let mut table = table_with(&[10]);
        let mut events = Scripted::new([
            (10, Transition::Continued),
            (10, Transition::Exited(0)),
        ]);

        let outcome = wait_for(&mut table, &mut events, pid(10)).unwrap();

        assert_eq!(outcome, WaitOutcome::Exited(0));
        assert!(events.events.is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn background_exit_is_reaped_while_waiting() {
        let mut table = table_with(&[5, 10, 6]);
        let mut events = Scripted::new([
            (5, Transition::Exited(1)),
            (6, Transition::Signaled(Signal::SIGKILL)),
            (10, Transition::Signaled(Signal::SIGINT)),
        ]);

        let outcome = wait_for(&mut table, &mut events, pid(10)).unwrap();

        assert_eq!(outcome, WaitOutcome::Signaled(Signal::SIGINT));
        assert!(table.is_empty());
    }

    #[test]
    fn background_stop_does_not_end_wait() {
        let mut table = table_with(&[5, 10]);
        let mut events = Scripted::new([
            (5, Transition::Stopped(Signal::SIGTTIN)),
            (10, Transition::Exited(0)),
        ]);

        wait_for(&mut table, &mut events, pid(10)).unwrap();

        assert_eq!(table.get(pid(5)).unwrap().state, JobState::Stopped);
        assert!(!table.contains(pid(10)));
    }

    #[test]
    fn no_children_surfaces_wait_error() {
        let mut table = table_with(&[10]);
        let mut events = Scripted::default();

        let err = wait_for(&mut table, &mut events, pid(10)).unwrap_err();

        assert!(matches!(err, ShellError::Wait(Errno::ECHILD)));
        assert!(table.contains(pid(10)));
    }

    #[test]
    fn reap_pending_applies_everything_queued() {
        let mut table = table_with(&[1, 2, 3]);
        table.update_state(pid(3), JobState::Stopped);
        let mut events = Scripted::new([
            (1, Transition::Exited(0)),
            (3, Transition::Continued),
        ]);

        assert_eq!(reap_pending(&mut table, &mut events).unwrap(), 2);

        let left: Vec<_> = table.list().map(|j| (j.pid.as_raw(), j.state)).collect();
        assert_eq!(left, vec![(2, JobState::Running), (3, JobState::Running)]);
    }

    #[test]
    fn event_from_wait_status() {
        let p = pid(42);
        assert_eq!(
            ChildEvent::from_status(WaitStatus::Exited(p, 3)),
            Some(ChildEvent { pid: p, transition: Transition::Exited(3) })
        );
        assert_eq!(
            ChildEvent::from_status(WaitStatus::Continued(p)),
            Some(ChildEvent { pid: p, transition: Transition::Continued })
        );
        assert_eq!(ChildEvent::from_status(WaitStatus::StillAlive), None);
    }
}
