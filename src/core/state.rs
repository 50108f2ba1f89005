//! Process run state.
//!
//! Two flags:
//! - `CONNECTED`: a scene is attached to the host
//! - `SHUTDOWN`: Ctrl+C received

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A scene is attached to the host
static CONNECTED: AtomicBool = AtomicBool::new(false);

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// A long-running command registered for graceful shutdown
static ARMED: AtomicBool = AtomicBool::new(false);

/// Wakes async waiters on shutdown
static SHUTDOWN_NOTIFY: LazyLock<Notify> = LazyLock::new(Notify::new);

// =============================================================================
// CONNECTED state
// =============================================================================

pub fn is_connected() -> bool {
    CONNECTED.load(Ordering::SeqCst)
}

pub fn set_connected(connected: bool) {
    CONNECTED.store(connected, Ordering::SeqCst);
}

// =============================================================================
// SHUTDOWN state
// =============================================================================

/// Setup the global Ctrl+C handler. Call once at program start
///
/// - Before `arm_shutdown()`: exits right away, nothing to tear down
/// - After `arm_shutdown()`: sets the flag and wakes `wait_for_shutdown()`
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        if ARMED.load(Ordering::SeqCst) {
            crate::log!("host"; "shutting down...");
            SHUTDOWN_NOTIFY.notify_waiters();
        } else {
            std::process::exit(0);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Switch Ctrl+C from exiting to graceful shutdown.
pub fn arm_shutdown() {
    ARMED.store(true, Ordering::SeqCst);
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Resolve once shutdown has been requested.
pub async fn wait_for_shutdown() {
    loop {
        // Register before checking so a signal in between is not lost
        let notified = SHUTDOWN_NOTIFY.notified();
        if is_shutdown() {
            return;
        }
        notified.await;
    }
}

// =============================================================================
// Tests
// =============================================================================
