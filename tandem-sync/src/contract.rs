//! The store and form contracts the sync controller drives.
//!
//! Implement [`Store`] and [`FormHandle`] over whatever state container and
//! form library the host uses. Everything runs on one thread: listeners are
//! invoked synchronously from inside the mutation that caused them, and must
//! not be held across threads.

use std::fmt;

use tandem_core::{FieldPath, FormOptions, Value};

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle for a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wraps the adapter's unsubscribe action.
    pub fn new(unsubscribe: impl FnOnce() + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription with nothing to release.
    pub fn empty() -> Self {
        Self { unsubscribe: None }
    }

    /// Unsubscribes now instead of at drop.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Store change listener, called with `(new, previous)` snapshots.
pub type StoreListener<S> = Box<dyn Fn(&S, &S)>;

/// Form change listener, called with the form's full values.
pub type WatchListener = Box<dyn Fn(&Value)>;

/// An external application store.
///
/// Writes go through a caller-supplied setter rather than this trait, so
/// the store only has to expose reads and change notification.
pub trait Store {
    type State: 'static;

    /// Current state snapshot.
    fn get_state(&self) -> Self::State;

    /// Registers `listener` for every subsequent mutation.
    fn subscribe(&self, listener: StoreListener<Self::State>) -> Subscription;
}

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

/// Flags for [`FormHandle::set_value`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetValueOptions {
    pub should_dirty: bool,
    pub should_touch: bool,
    pub should_validate: bool,
}

impl SetValueOptions {
    /// What the controller uses: mark dirty and touched, leave validation to
    /// the end of the pass.
    pub const SYNCED: Self = Self {
        should_dirty: true,
        should_touch: true,
        should_validate: false,
    };
}

/// Flags for [`FormHandle::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetOptions {
    pub keep_dirty: bool,
    pub keep_touched: bool,
    pub keep_errors: bool,
    pub keep_submitted: bool,
}

impl ResetOptions {
    /// Replace the values, keep every piece of interaction state.
    pub const KEEP_STATE: Self = Self {
        keep_dirty: true,
        keep_touched: true,
        keep_errors: true,
        keep_submitted: true,
    };
}

/// Which fields to validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    All,
    Fields(Vec<FieldPath>),
}

/// A live form-state instance.
pub trait FormHandle {
    /// Current values of every field.
    fn values(&self) -> Value;

    /// Sets one field.
    fn set_value(
        &self,
        path: &FieldPath,
        value: Value,
        options: SetValueOptions,
    ) -> Result<(), SyncError>;

    /// Replaces all values at once.
    fn reset(&self, values: Value, options: ResetOptions) -> Result<(), SyncError>;

    /// Runs validation for `target`; `true` when the validated fields pass.
    fn trigger(&self, target: Trigger) -> bool;

    /// Whether the form has been submitted at least once.
    fn is_submitted(&self) -> bool;

    /// Registers `listener` for every value change.
    fn watch(&self, listener: WatchListener) -> Subscription;
}

/// A form that can be constructed from [`FormOptions`].
pub trait BuildForm: FormHandle + Sized {
    fn build(options: &FormOptions) -> Self;
}
