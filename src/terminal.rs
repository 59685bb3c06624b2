//! Terminal control: who owns the controlling terminal's foreground group.

use crate::error::{Result, ShellError};
use nix::sys::signal::{SigSet, SigmaskHow, Signal, sigprocmask};
use nix::unistd::{Pid, getpgrp, tcsetpgrp};
use std::io::IsTerminal;
use tracing::{debug, warn};

/// Blocks a set of signals for as long as the guard lives.
///
/// The previous mask is not restored wholesale: only the signals this guard
/// blocked are unblocked again when it is dropped.
#[must_use = "the signals are unblocked as soon as the guard is dropped"]
pub struct SignalMaskGuard {
    set: SigSet,
}

impl SignalMaskGuard {
    pub fn block(signals: &[Signal]) -> Result<Self> {
        let mut set = SigSet::empty();
        for &signal in signals {
            set.add(signal);
        }
        sigprocmask(SigmaskHow::SIG_BLOCK, Some(&set), None).map_err(ShellError::Terminal)?;
        Ok(Self { set })
    }
}

impl Drop for SignalMaskGuard {
    fn drop(&mut self) {
        if let Err(e) = sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&self.set), None) {
            warn!(error = %e, "failed to unblock signals");
        }
    }
}

/// Arbiter for the controlling terminal's foreground process group.
///
/// A detached arbiter (standard input is not a terminal) turns every transfer
/// into a no-op so the shell can run from a pipe.
#[derive(Debug, Clone)]
pub struct Terminal {
    shell_pgid: Pid,
    attached: bool,
}

impl Terminal {
    /// Attach to standard input if it is a terminal, otherwise run detached.
    pub fn attach() -> Self {
        let attached = std::io::stdin().is_terminal();
        let shell_pgid = getpgrp();
        debug!(%shell_pgid, attached, "terminal arbiter initialised");
        Self {
            shell_pgid,
            attached,
        }
    }

    pub fn detached() -> Self {
        Self {
            shell_pgid: getpgrp(),
            attached: false,
        }
    }

    /// Hand the terminal to the process group `pgid`.
    ///
    /// Fails when the group does not exist (or is in another session); the
    /// caller must then treat the job as missing.
    pub fn set_foreground(&self, pgid: Pid) -> Result<()> {
        if !self.attached {
            return Ok(());
        }
        tcsetpgrp(std::io::stdin(), pgid).map_err(|e| {
            debug!(%pgid, error = %e, "tcsetpgrp failed");
            ShellError::NoSuchJob(pgid)
        })?;
        debug!(%pgid, "terminal handed to job");
        Ok(())
    }

    /// Take the terminal back for the shell's own process group.
    ///
    /// The shell is in a background group at this point, so the transfer would
    /// raise SIGTTOU against it; the signal is blocked for exactly this call.
    pub fn reclaim(&self) -> Result<()> {
        if !self.attached {
            return Ok(());
        }
        let _mask = SignalMaskGuard::block(&[Signal::SIGTTOU])?;
        tcsetpgrp(std::io::stdin(), self.shell_pgid).map_err(ShellError::Terminal)?;
        debug!(shell_pgid = %self.shell_pgid, "terminal reclaimed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked_now(signal: Signal) -> bool {
        let mut current = SigSet::empty();
        sigprocmask(SigmaskHow::SIG_BLOCK, None, Some(&mut current)).unwrap();
        current.contains(signal)
    }

    #[test]
    fn mask_guard_blocks_only_while_alive() {
        assert!(!blocked_now(Signal::SIGTTOU));
        {
            let _guard = SignalMaskGuard::block(&[Signal::SIGTTOU]).unwrap();
            assert!(blocked_now(Signal::SIGTTOU));
        }
        assert!(!blocked_now(Signal::SIGTTOU));
    }

    #[test]
    fn mask_guard_released_on_early_return() {
        fn bail() -> std::result::Result<(), ()> {
            let _guard = SignalMaskGuard::block(&[Signal::SIGTTOU]).map_err(|_| ())?;
            Err(())
        }
        assert!(bail().is_err());
        assert!(!blocked_now(Signal::SIGTTOU));
    }

    #[test]
    fn detached_terminal_transfers_are_noops() {
        let terminal = Terminal::detached();
        assert!(!terminal.attached);
        assert!(terminal.set_foreground(Pid::from_raw(999_999)).is_ok());
        assert!(terminal.reclaim().is_ok());
        assert_eq!(terminal.shell_pgid, getpgrp());
    }
}
