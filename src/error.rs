use nix::errno::Errno;
use nix::unistd::Pid;
use thiserror::Error;

/// Errors produced by the job-control core.
///
/// Errors about a particular job (`NoSuchJob`, `Signal`) are reported to the user
/// and leave the shell running. `Wait` means the shell itself could not observe
/// its children; the dispatcher surfaces it instead of crashing.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("job: {0} does not exist")]
    NoSuchJob(Pid),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("unable to fork: {0}")]
    Fork(#[source] Errno),

    #[error("cannot signal job {0}: {1}")]
    Signal(Pid, #[source] Errno),

    #[error("wait for children failed: {0}")]
    Wait(#[source] Errno),

    #[error("terminal control failed: {0}")]
    Terminal(#[source] Errno),
}

pub type Result<T> = std::result::Result<T, ShellError>;
