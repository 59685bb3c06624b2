//! Starting external programs in their own process groups.

use crate::error::{Result, ShellError};
use nix::errno::Errno;
use nix::libc::{self, c_char};
use nix::unistd::{ForkResult, Pid, fork, setpgid, write};
use std::ffi::CString;
use std::os::fd::BorrowedFd;
use tracing::{debug, info};

/// Exit status of a child whose program image could not be replaced.
pub const EXEC_FAILURE_STATUS: i32 = 127;

/// A program name plus its arguments, ready to hand to `execvp`.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    name: String,
    argv: Vec<CString>,
}

impl ExternalCommand {
    /// Build the argument vector. `argv[0]` is the program name as typed.
    pub fn new<S: AsRef<str>>(name: &str, args: &[S]) -> Result<Self> {
        if name.is_empty() {
            return Err(ShellError::InvalidArgument("empty command".into()));
        }
        let argv = std::iter::once(name)
            .chain(args.iter().map(AsRef::as_ref))
            .map(|arg| {
                CString::new(arg).map_err(|_| {
                    ShellError::InvalidArgument(format!("{name}: argument contains a NUL byte"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: name.to_string(),
            argv,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Null-terminated pointer array over `argv`, valid while `self` is borrowed.
    fn exec_pointers(&self) -> Vec<*const c_char> {
        self.argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect()
    }

    /// Fork a child that becomes leader of a new process group and execs the program.
    ///
    /// Exec failures are the child's problem: it reports on stderr and exits
    /// with [`EXEC_FAILURE_STATUS`], which the parent later sees as an ordinary exit.
    pub fn spawn(&self) -> Result<Pid> {
        let argv = self.exec_pointers();
        let prefix = format!("{}: ", self.name).into_bytes();
        // SAFETY: the child neither allocates nor takes locks. It only calls
        // setpgid, execvp, write and _exit on buffers built above.
        match unsafe { fork() }.map_err(ShellError::Fork)? {
            ForkResult::Child => exec_child(&argv, &prefix),
            ForkResult::Parent { child } => {
                // The child does the same; whichever runs first wins, so later
                // terminal transfers never see the child in the shell's group.
                match setpgid(child, child) {
                    Ok(()) => {}
                    // Already exec'd (EACCES) or already gone (ESRCH): the child's own call applied.
                    Err(Errno::EACCES | Errno::ESRCH) => {
                        debug!(pid = %child, "setpgid raced with child")
                    }
                    Err(e) => debug!(pid = %child, error = %e, "setpgid failed in parent"),
                }
                info!(pid = %child, name = %self.name, "launched");
                Ok(child)
            }
        }
    }
}

/// Runs in the forked child: async-signal-safe calls only.
fn exec_child(argv: &[*const c_char], prefix: &[u8]) -> ! {
    let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
    // SAFETY: `argv` is a null-terminated array of pointers into live CStrings.
    unsafe { libc::execvp(argv[0], argv.as_ptr()) };
    let reason = Errno::last().desc();
    // SAFETY: descriptor 2 stays open for the rest of this process.
    let stderr = unsafe { BorrowedFd::borrow_raw(libc::STDERR_FILENO) };
    for part in [prefix, reason.as_bytes(), b"\n"] {
        let _ = write(stderr, part);
    }
    // SAFETY: terminates the forked child without running destructors.
    unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
}
