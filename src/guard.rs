//! Last-resort release of session resources when the process is told to stop
//!
//! Sessions release their private copy in [`ExcelReader::close`](crate::ExcelReader::close)
//! or when dropped, which also covers panics that unwind. Neither runs when
//! the process is interrupted (Ctrl-C in a test run) or terminated, so every
//! open session also registers a cleanup action here.
//!
//! Registered actions run:
//! - on `SIGINT`, `SIGTERM` or `SIGHUP` (Unix), after which the signal's
//!   default action proceeds and the process ends as it would have without
//!   the handler (see [`install_signal_handler`]),
//! - when a caller invokes [`release_all`], typically right before
//!   `std::process::exit`.
//!
//! Each action runs at most once. `SIGKILL` and `panic = "abort"` cannot be
//! covered.

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

type Cleanup = Box<dyn FnOnce() + Send>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);
static REGISTRY: Lazy<Mutex<HashMap<u64, Cleanup>>> = Lazy::new(|| Mutex::new(HashMap::new()));
static SIGNAL_HANDLER: OnceCell<bool> = OnceCell::new();

/// Handle to one registered cleanup action.
///
/// Dropping the handle deregisters the action without running it.
#[derive(Debug)]
pub struct ResourceGuard {
    id: u64,
}

impl ResourceGuard {
    /// Register `cleanup` to run when the process is told to stop
    pub fn register(cleanup: impl FnOnce() + Send + 'static) -> Self {
        install_signal_handler();

        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        REGISTRY.lock().insert(id, Box::new(cleanup));
        log::trace!("registered resource guard {}", id);

        ResourceGuard { id }
    }

    /// Registry key of this guard
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the action is still pending
    pub fn is_registered(&self) -> bool {
        REGISTRY.lock().contains_key(&self.id)
    }

    /// Remove the action without running it
    pub fn deregister(&self) {
        if REGISTRY.lock().remove(&self.id).is_some() {
            log::trace!("deregistered resource guard {}", self.id);
        }
    }

    /// Run the action now, if it has not run yet
    pub fn run(&self) {
        let cleanup = REGISTRY.lock().remove(&self.id);
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.deregister();
    }
}

/// Run every pending cleanup action and return how many ran.
pub fn release_all() -> usize {
    let pending: Vec<(u64, Cleanup)> = REGISTRY.lock().drain().collect();
    let count = pending.len();

    // run outside the lock; actions may touch the registry
    for (id, cleanup) in pending {
        log::debug!("running resource guard {}", id);
        cleanup();
    }

    count
}

/// Start the thread that runs [`release_all`] on `SIGINT`, `SIGTERM` and `SIGHUP`.
///
/// Installed by the first [`ResourceGuard::register`]; later calls only
/// report the outcome of the first one. Handlers the application installed
/// itself keep running. Returns `false` where the handler is unavailable
/// (non-Unix targets, or registration failed).
pub fn install_signal_handler() -> bool {
    *SIGNAL_HANDLER.get_or_init(|| match spawn_signal_thread() {
        Ok(()) => true,
        Err(e) => {
            log::warn!("cleanup on termination signals unavailable: {}", e);
            false
        }
    })
}

#[cfg(unix)]
fn spawn_signal_thread() -> std::io::Result<()> {
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use signal_hook::low_level;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    std::thread::Builder::new()
        .name("sheetrows-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                let released = release_all();
                log::debug!("signal {} released {} session(s)", signal, released);
                if let Err(e) = low_level::emulate_default_handler(signal) {
                    log::warn!("cannot re-raise signal {}: {}", signal, e);
                    low_level::exit(128 + signal);
                }
            }
        })?;
    Ok(())
}

#[cfg(not(unix))]
fn spawn_signal_thread() -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "termination signals are only handled on Unix",
    ))
}
