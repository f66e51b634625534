//! Runtime configuration.
//!
//! Three environment variables steer the isolation runtime:
//! - `FRANKENMOCK_SIGNALS`: `trap` (default) installs handlers for fatal
//!   signals around every test; `off` leaves the process dispositions alone so
//!   a crash reaches the debugger. Resolved once and cached.
//! - `FRANKENMOCK_ABORT_ON_FAIL`: `1|true|yes|on` flushes the failure text and
//!   aborts the process at the first failure instead of recovering. Read on
//!   every failure so a debugger session can flip it mid-run.
//! - `FRANKENMOCK_LOG_PATH`: JSONL destination used by the group runner.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};

pub const ENV_SIGNALS: &str = "FRANKENMOCK_SIGNALS";
pub const ENV_ABORT_ON_FAIL: &str = "FRANKENMOCK_ABORT_ON_FAIL";
pub const ENV_LOG_PATH: &str = "FRANKENMOCK_LOG_PATH";

/// Whether fatal signals are trapped during a test.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalMode {
    #[default]
    Trap,
    Off,
}

impl SignalMode {
    /// Parse from string (case-insensitive). Unknown values trap.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" | "disabled" | "0" | "false" => Self::Off,
            _ => Self::Trap,
        }
    }

    #[must_use]
    pub const fn traps_enabled(self) -> bool {
        matches!(self, Self::Trap)
    }
}

// 0=unresolved, 1=Trap, 2=Off, 255=resolving.
static CACHED_SIGNALS: AtomicU8 = AtomicU8::new(0);

const MODE_UNRESOLVED: u8 = 0;
const MODE_TRAP: u8 = 1;
const MODE_OFF: u8 = 2;
const MODE_RESOLVING: u8 = 255;

fn mode_to_u8(mode: SignalMode) -> u8 {
    match mode {
        SignalMode::Trap => MODE_TRAP,
        SignalMode::Off => MODE_OFF,
    }
}

fn u8_to_mode(v: u8) -> SignalMode {
    match v {
        MODE_OFF => SignalMode::Off,
        _ => SignalMode::Trap,
    }
}

/// Configured signal mode (reads the env var on first call, caches thereafter).
#[must_use]
pub fn signal_mode() -> SignalMode {
    let cached = CACHED_SIGNALS.load(Ordering::Relaxed);
    if cached != MODE_UNRESOLVED && cached != MODE_RESOLVING {
        return u8_to_mode(cached);
    }
    if cached == MODE_RESOLVING {
        return SignalMode::Trap;
    }

    if CACHED_SIGNALS
        .compare_exchange(
            MODE_UNRESOLVED,
            MODE_RESOLVING,
            Ordering::SeqCst,
            Ordering::Relaxed,
        )
        .is_err()
    {
        let v = CACHED_SIGNALS.load(Ordering::Relaxed);
        return if v != MODE_UNRESOLVED && v != MODE_RESOLVING {
            u8_to_mode(v)
        } else {
            SignalMode::Trap
        };
    }

    let mode = std::env::var(ENV_SIGNALS)
        .map(|v| SignalMode::from_str_loose(&v))
        .unwrap_or_default();
    CACHED_SIGNALS.store(mode_to_u8(mode), Ordering::Release);
    mode
}

/// Override the cached signal mode for the rest of the process.
pub fn set_signal_mode(mode: SignalMode) {
    CACHED_SIGNALS.store(mode_to_u8(mode), Ordering::Release);
}

// 0=follow env, 1=forced off, 2=forced on.
static ABORT_OVERRIDE: AtomicU8 = AtomicU8::new(0);

const ABORT_FROM_ENV: u8 = 0;
const ABORT_FORCED_OFF: u8 = 1;
const ABORT_FORCED_ON: u8 = 2;

/// Truthy env flag parser.
#[must_use]
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Force abort-on-failure on or off; `None` returns control to the env var.
pub fn set_abort_on_failure(forced: Option<bool>) {
    let v = match forced {
        None => ABORT_FROM_ENV,
        Some(false) => ABORT_FORCED_OFF,
        Some(true) => ABORT_FORCED_ON,
    };
    ABORT_OVERRIDE.store(v, Ordering::Release);
}

/// Whether a failure should terminate the process. Not cached.
#[must_use]
pub fn abort_on_failure() -> bool {
    resolve_abort(ABORT_OVERRIDE.load(Ordering::Acquire), || {
        std::env::var(ENV_ABORT_ON_FAIL).ok()
    })
}

fn resolve_abort(state: u8, env: impl FnOnce() -> Option<String>) -> bool {
    match state {
        ABORT_FORCED_OFF => false,
        ABORT_FORCED_ON => true,
        _ => env().is_some_and(|v| parse_flag(&v)),
    }
}

/// Snapshot of every knob, taken by the runner at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub signals: SignalMode,
    pub abort_on_failure: bool,
    pub log_path: Option<PathBuf>,
}

impl RuntimeConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            signals: signal_mode(),
            abort_on_failure: abort_on_failure(),
            log_path: std::env::var_os(ENV_LOG_PATH)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_signal_modes() {
        assert_eq!(SignalMode::from_str_loose("trap"), SignalMode::Trap);
        assert_eq!(SignalMode::from_str_loose("OFF"), SignalMode::Off);
        assert_eq!(SignalMode::from_str_loose("disabled"), SignalMode::Off);
        assert_eq!(SignalMode::from_str_loose("bogus"), SignalMode::Trap);
        assert!(SignalMode::default().traps_enabled());
    }

    #[test]
    fn parse_truthy_flags() {
        for raw in ["1", "true", "YES", " on "] {
            assert!(parse_flag(raw), "{raw}");
        }
        for raw in ["", "0", "no", "off", "2"] {
            assert!(!parse_flag(raw), "{raw}");
        }
    }

    #[test]
    fn resolving_state_returns_trap() {
        let previous = CACHED_SIGNALS.swap(MODE_RESOLVING, Ordering::SeqCst);
        assert_eq!(signal_mode(), SignalMode::Trap);
        CACHED_SIGNALS.store(previous, Ordering::SeqCst);
    }

    #[test]
    fn mode_cache_encoding() {
        for mode in [SignalMode::Trap, SignalMode::Off] {
            assert_eq!(u8_to_mode(mode_to_u8(mode)), mode);
        }
        assert_eq!(u8_to_mode(MODE_UNRESOLVED), SignalMode::Trap);
    }

    #[test]
    fn abort_override_wins_over_env() {
        let on = || Some("1".to_string());
        assert!(resolve_abort(ABORT_FROM_ENV, on));
        assert!(!resolve_abort(ABORT_FORCED_OFF, on));
        assert!(resolve_abort(ABORT_FORCED_ON, || None));
        assert!(!resolve_abort(ABORT_FROM_ENV, || None));
    }
}
