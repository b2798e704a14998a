//! Run state shared by the main loop and the host termination handler.
//!
//! ```text
//! Stopped --begin--> Running --request_stop / request_close--> Stopping
//!    ^                  ^                                          |
//!    |                  +---------------cancel_stop----------------+
//!    +-----------------------complete_teardown--------------------+
//! ```
//!
//! A terminator blocked in [`EngineLifecycle::request_close_and_wait`] returns
//! only once `complete_teardown` has run after its request. The wait is on a
//! teardown counter checked under the same mutex the main loop updates, so the
//! order in which the two sides arrive does not matter.
//!
//! A close requested while `Stopped` is kept pending, and the next `begin`
//! goes straight to `Stopping`.

use crate::error::lock_or_recover;
use std::sync::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Stopped,
    Running,
    Stopping,
}

#[derive(Debug)]
struct LifecycleState {
    phase: LifecyclePhase,
    close_requested: bool,
    /// Completed teardowns since creation
    teardowns: u64,
}

#[derive(Debug)]
pub struct EngineLifecycle {
    state: Mutex<LifecycleState>,
    changed: Condvar,
}

impl Default for EngineLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineLifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState {
                phase: LifecyclePhase::Stopped,
                close_requested: false,
                teardowns: 0,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.lock().phase
    }

    pub fn is_running(&self) -> bool {
        self.phase() == LifecyclePhase::Running
    }

    /// Whether the host asked to close and the request has not been vetoed
    pub fn close_requested(&self) -> bool {
        self.lock().close_requested
    }

    /// Leave `Stopped`. Returns false if the lifecycle was not `Stopped`.
    ///
    /// Enters `Stopping` instead of `Running` when a close is pending.
    pub fn begin(&self) -> bool {
        let mut state = self.lock();
        if state.phase != LifecyclePhase::Stopped {
            log::warn!("Lifecycle: begin called while {:?}", state.phase);
            return false;
        }
        if state.close_requested {
            state.phase = LifecyclePhase::Stopping;
            log::info!("Lifecycle: close pending, Stopped -> Stopping");
        } else {
            state.phase = LifecyclePhase::Running;
            log::debug!("Lifecycle: Stopped -> Running");
        }
        self.changed.notify_all();
        true
    }

    /// Ask the main loop to wind down. No effect unless `Running`.
    pub fn request_stop(&self) {
        let mut state = self.lock();
        if state.phase == LifecyclePhase::Running {
            state.phase = LifecyclePhase::Stopping;
            log::debug!("Lifecycle: Running -> Stopping");
            self.changed.notify_all();
        }
    }

    /// Return to `Running` after the application vetoed shutdown.
    ///
    /// A terminator already waiting keeps waiting for a later teardown.
    pub fn cancel_stop(&self) {
        let mut state = self.lock();
        if state.phase == LifecyclePhase::Stopping {
            state.phase = LifecyclePhase::Running;
            state.close_requested = false;
            log::info!("Lifecycle: shutdown vetoed, Stopping -> Running");
            self.changed.notify_all();
        }
    }

    /// Called by the main loop after audio teardown has finished.
    pub fn complete_teardown(&self) {
        let mut state = self.lock();
        state.phase = LifecyclePhase::Stopped;
        state.close_requested = false;
        state.teardowns += 1;
        log::debug!("Lifecycle: teardown complete, -> Stopped");
        self.changed.notify_all();
    }

    /// Host termination hook: request shutdown, then block until the main loop
    /// has completed its teardown.
    ///
    /// Returns immediately if nothing is running; the request then stays
    /// pending for the next [`begin`](Self::begin).
    pub fn request_close_and_wait(&self) {
        let mut state = self.lock();
        if state.phase == LifecyclePhase::Stopped {
            state.close_requested = true;
            log::info!("Lifecycle: close requested while stopped, kept pending");
            return;
        }

        state.close_requested = true;
        if state.phase == LifecyclePhase::Running {
            state.phase = LifecyclePhase::Stopping;
        }
        let target = state.teardowns + 1;
        log::info!("Lifecycle: close requested, waiting for teardown");
        self.changed.notify_all();

        while state.teardowns < target {
            state = self.changed.wait(state).unwrap_or_else(|e| {
                log::warn!("Lifecycle mutex poisoned while waiting; continuing");
                e.into_inner()
            });
        }
        log::info!("Lifecycle: teardown observed, releasing terminator");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LifecycleState> {
        lock_or_recover(&self.state, "Lifecycle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn wait_for_phase(lifecycle: &EngineLifecycle, phase: LifecyclePhase) {
        for _ in 0..200 {
            if lifecycle.phase() == phase {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("lifecycle never reached {:?}", phase);
    }

    #[test]
    fn test_transitions() {
        let lifecycle = EngineLifecycle::new();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Stopped);
        assert!(lifecycle.begin());
        assert!(!lifecycle.begin());
        lifecycle.request_stop();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Stopping);
        lifecycle.cancel_stop();
        assert!(lifecycle.is_running());
        lifecycle.request_stop();
        lifecycle.complete_teardown();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Stopped);
    }

    #[test]
    fn test_close_before_teardown_blocks_until_done() {
        let lifecycle = Arc::new(EngineLifecycle::new());
        lifecycle.begin();

        let terminator = {
            let lifecycle = lifecycle.clone();
            thread::spawn(move || lifecycle.request_close_and_wait())
        };

        wait_for_phase(&lifecycle, LifecyclePhase::Stopping);
        assert!(lifecycle.close_requested());
        thread::sleep(Duration::from_millis(20));
        assert!(!terminator.is_finished());

        lifecycle.complete_teardown();
        terminator.join().unwrap();
    }

    #[test]
    fn test_close_after_teardown_returns_immediately() {
        let lifecycle = EngineLifecycle::new();
        lifecycle.begin();
        lifecycle.request_stop();
        lifecycle.complete_teardown();

        lifecycle.request_close_and_wait();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Stopped);
    }

    #[test]
    fn test_close_before_begin_is_kept_pending() {
        let lifecycle = EngineLifecycle::new();
        lifecycle.request_close_and_wait();
        assert!(lifecycle.close_requested());

        assert!(lifecycle.begin());
        assert_eq!(lifecycle.phase(), LifecyclePhase::Stopping);

        lifecycle.cancel_stop();
        assert!(!lifecycle.close_requested());
        lifecycle.request_stop();
        lifecycle.complete_teardown();

        assert!(lifecycle.begin());
        assert_eq!(lifecycle.phase(), LifecyclePhase::Running);
    }

    #[test]
    fn test_veto_keeps_terminator_waiting() {
        let lifecycle = Arc::new(EngineLifecycle::new());
        lifecycle.begin();

        let terminator = {
            let lifecycle = lifecycle.clone();
            thread::spawn(move || lifecycle.request_close_and_wait())
        };

        wait_for_phase(&lifecycle, LifecyclePhase::Stopping);
        lifecycle.cancel_stop();
        thread::sleep(Duration::from_millis(20));
        assert!(!terminator.is_finished());

        lifecycle.request_stop();
        lifecycle.complete_teardown();
        terminator.join().unwrap();
    }
}
