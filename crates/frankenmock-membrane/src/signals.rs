//! Fatal-signal traps.
//!
//! While a [`SignalTraps`] guard is alive, illegal instruction, floating point
//! exception, segmentation fault, bus error and bad system call are routed to
//! a handler that unwinds to the current thread's recovery boundary. Threads
//! without an armed boundary get the default disposition back and the signal
//! re-raised, so a crash outside a test still crashes.
//!
//! Dispositions are process-wide. Guards are reference counted: the first one
//! saves the previous actions, the last one to drop restores them.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::io;
use std::ptr;

use libc::c_int;
use parking_lot::Mutex;

use crate::boundary::{self, Interrupt};

/// Signals redirected into the recovery boundary.
pub const TRAPPED_SIGNALS: &[c_int] = &[
    libc::SIGILL,
    libc::SIGFPE,
    libc::SIGSEGV,
    libc::SIGBUS,
    libc::SIGSYS,
];

/// Short name for a signal number.
#[must_use]
pub fn signal_name(sig: c_int) -> &'static str {
    match sig {
        libc::SIGILL => "SIGILL",
        libc::SIGFPE => "SIGFPE",
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGBUS => "SIGBUS",
        libc::SIGSYS => "SIGSYS",
        libc::SIGABRT => "SIGABRT",
        _ => "signal",
    }
}

struct TrapTable {
    users: usize,
    previous: Vec<(c_int, libc::sigaction)>,
}

static TRAPS: Mutex<TrapTable> = parking_lot::const_mutex(TrapTable {
    users: 0,
    previous: Vec::new(),
});

extern "C-unwind" fn on_fatal_signal(sig: c_int, _info: *mut libc::siginfo_t, _ctx: *mut c_void) {
    if boundary::is_armed() {
        boundary::trigger(Interrupt::Signal(sig));
    }
    // SAFETY: async-signal-safe calls restoring the default action.
    unsafe {
        libc::signal(sig, libc::SIG_DFL);
        libc::raise(sig);
    }
}

fn handler_address() -> libc::sighandler_t {
    let handler: extern "C-unwind" fn(c_int, *mut libc::siginfo_t, *mut c_void) = on_fatal_signal;
    handler as *const () as libc::sighandler_t
}

fn restore_actions(previous: &[(c_int, libc::sigaction)]) {
    for (sig, old) in previous {
        // SAFETY: `old` was filled in by a successful sigaction call.
        unsafe {
            libc::sigaction(*sig, old, ptr::null_mut());
        }
    }
}

/// Guard that keeps the fatal-signal handlers installed.
#[derive(Debug)]
pub struct SignalTraps {
    _private: (),
}

impl SignalTraps {
    pub fn install() -> io::Result<Self> {
        let mut table = TRAPS.lock();
        if table.users == 0 {
            let mut previous = Vec::with_capacity(TRAPPED_SIGNALS.len());
            for &sig in TRAPPED_SIGNALS {
                // SAFETY: zeroed sigaction is a valid "no flags, empty mask"
                // starting point; every field we rely on is set below.
                let mut act = unsafe { std::mem::zeroed::<libc::sigaction>() };
                act.sa_sigaction = handler_address();
                act.sa_flags = libc::SA_SIGINFO | libc::SA_NODEFER;
                let mut old = unsafe { std::mem::zeroed::<libc::sigaction>() };
                // SAFETY: both pointers reference live, properly aligned structs.
                let rc = unsafe {
                    libc::sigemptyset(&mut act.sa_mask);
                    libc::sigaction(sig, &act, &mut old)
                };
                if rc != 0 {
                    let err = io::Error::last_os_error();
                    restore_actions(&previous);
                    return Err(err);
                }
                previous.push((sig, old));
            }
            table.previous = previous;
        }
        table.users += 1;
        Ok(Self { _private: () })
    }

    /// True while any guard in the process is alive.
    #[must_use]
    pub fn installed() -> bool {
        TRAPS.lock().users > 0
    }
}

impl Drop for SignalTraps {
    fn drop(&mut self) {
        let mut table = TRAPS.lock();
        table.users = table.users.saturating_sub(1);
        if table.users == 0 {
            let previous = std::mem::take(&mut table.previous);
            restore_actions(&previous);
        }
    }
}

/// Saved per-thread signal mask.
#[derive(Clone, Copy)]
pub struct SignalMask {
    set: libc::sigset_t,
}

impl std::fmt::Debug for SignalMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalMask").finish_non_exhaustive()
    }
}

impl SignalMask {
    #[must_use]
    pub fn current() -> Option<Self> {
        // SAFETY: sigset_t is plain data; pthread_sigmask fills it.
        let mut set = unsafe { std::mem::zeroed::<libc::sigset_t>() };
        let rc = unsafe { libc::pthread_sigmask(libc::SIG_SETMASK, ptr::null(), &mut set) };
        (rc == 0).then_some(Self { set })
    }

    pub fn restore(&self) {
        // SAFETY: `set` came from a successful pthread_sigmask query.
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.set, ptr::null_mut());
        }
    }
}
