//! Re-entrancy guard shared by both sync directions.
//!
//! A pass writes to one side, which notifies synchronously and would run the
//! opposite pipeline. While a [`SyncPass`] is alive the guard reports
//! [`SyncState::Syncing`] and [`ReentrancyGuard::try_enter`] returns `None`,
//! so that nested notification is dropped rather than bounced back.

use std::cell::Cell;
use std::rc::Rc;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Shared flag; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuard {
    syncing: Rc<Cell<bool>>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        if self.syncing.get() {
            SyncState::Syncing
        } else {
            SyncState::Idle
        }
    }

    /// Starts a pass, or returns `None` if one is already running.
    #[must_use]
    pub fn try_enter(&self) -> Option<SyncPass> {
        if self.syncing.replace(true) {
            return None;
        }
        Some(SyncPass {
            syncing: Rc::clone(&self.syncing),
        })
    }
}

/// An in-flight pass. Dropping it returns the guard to idle, on early
/// returns and unwinding included.
#[derive(Debug)]
pub struct SyncPass {
    syncing: Rc<Cell<bool>>,
}

impl Drop for SyncPass {
    fn drop(&mut self) {
        self.syncing.set(false);
    }
}
