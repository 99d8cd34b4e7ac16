//! Single active operation per pipeline
//!
//! Each pipeline owns one `OperationSlot`. Starting while another run is in
//! flight is rejected with `AppError::Busy`; `cancel()` terminates whatever
//! process the running operation has attached.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::error::{AppError, AppResult};
use crate::core::process::ProcessHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum OperationState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Default)]
struct SlotInner {
    state: OperationState,
    cancel_requested: bool,
    handle: Option<ProcessHandle>,
}

#[derive(Debug, Clone)]
pub struct OperationSlot {
    name: &'static str,
    inner: Arc<Mutex<SlotInner>>,
}

impl OperationSlot {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(SlotInner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> OperationState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == OperationState::Running
    }

    /// Moves the slot to Running, or fails with `Busy`.
    pub fn begin(&self) -> AppResult<OperationGuard> {
        let mut inner = self.lock();
        if inner.state == OperationState::Running {
            log::warn!("{} rejected: an operation is already running", self.name);
            return Err(AppError::Busy);
        }
        inner.state = OperationState::Running;
        inner.cancel_requested = false;
        inner.handle = None;
        Ok(OperationGuard {
            slot: self.clone(),
            finished: false,
        })
    }

    /// Requests cancellation of the running operation. Idempotent.
    /// Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        let handle = {
            let mut inner = self.lock();
            if inner.state != OperationState::Running {
                return false;
            }
            inner.cancel_requested = true;
            inner.handle.clone()
        };
        log::info!("{} cancellation requested", self.name);
        if let Some(handle) = handle {
            handle.terminate();
        }
        true
    }
}

/// Proof that the owner holds the Running slot. Dropping it unfinished
/// (the future was dropped) leaves the slot Cancelled.
#[derive(Debug)]
pub struct OperationGuard {
    slot: OperationSlot,
    finished: bool,
}

impl OperationGuard {
    /// Registers the current child. If cancel already arrived it is terminated at once.
    pub fn attach(&self, handle: ProcessHandle) {
        let cancel_now = {
            let mut inner = self.slot.lock();
            inner.handle = Some(handle.clone());
            inner.cancel_requested
        };
        if cancel_now {
            handle.terminate();
        }
    }

    pub fn detach(&self) {
        self.slot.lock().handle = None;
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.slot.lock().cancel_requested
    }

    /// Records the terminal state matching `result`.
    pub fn finish<T>(mut self, result: &AppResult<T>) {
        let state = match result {
            Ok(_) => OperationState::Completed,
            Err(e) if e.is_cancelled() => OperationState::Cancelled,
            Err(_) => OperationState::Failed,
        };
        self.settle(state);
    }

    fn settle(&mut self, state: OperationState) {
        let mut inner = self.slot.lock();
        inner.state = state;
        inner.handle = None;
        self.finished = true;
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.settle(OperationState::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn begin_rejects_while_running() {
        let slot = OperationSlot::new("test");
        let guard = slot.begin().unwrap();
        assert_eq!(slot.state(), OperationState::Running);
        assert!(matches!(slot.begin(), Err(AppError::Busy)));

        guard.finish(&Ok::<_, AppError>(()));
        assert_eq!(slot.state(), OperationState::Completed);
        assert!(slot.begin().is_ok());
    }

    #[test]
    fn finish_maps_errors_to_terminal_states() {
        let slot = OperationSlot::new("test");

        slot.begin().unwrap().finish(&Err::<(), _>(AppError::Cancelled));
        assert_eq!(slot.state(), OperationState::Cancelled);

        slot.begin()
            .unwrap()
            .finish(&Err::<(), _>(AppError::Validation("bad".into())));
        assert_eq!(slot.state(), OperationState::Failed);
    }

    #[test]
    fn cancel_when_idle_is_a_noop() {
        let slot = OperationSlot::new("test");
        assert!(!slot.cancel());
        assert!(!slot.cancel());

        let guard = slot.begin().unwrap();
        assert!(!guard.is_cancel_requested());
    }

    #[test]
    fn cancel_sets_flag_and_is_idempotent() {
        let slot = OperationSlot::new("test");
        let guard = slot.begin().unwrap();
        assert!(slot.cancel());
        assert!(slot.cancel());
        assert!(guard.is_cancel_requested());
    }

    #[test]
    fn dropped_guard_leaves_slot_cancelled() {
        let slot = OperationSlot::new("test");
        {
            let _guard = slot.begin().unwrap();
        }
        assert_eq!(slot.state(), OperationState::Cancelled);
        assert!(!slot.is_running());
    }

    #[test]
    fn state_display_is_snake_case() {
        assert_eq!(OperationState::Running.to_string(), "running");
    }
}
