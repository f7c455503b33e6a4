//! Bidirectional sync controller.
//!
//! ## Pipelines
//!
//! - **Form → store**: on every form change, merge the form values over the
//!   currently selected store slice (`{...slice, ...values}`) and hand the
//!   result to the store setter.
//! - **Store → form**: on every store change, diff the newly selected slice
//!   against the diff base, set each changed field (dirty + touched), or
//!   reset the whole form when the root itself changed, then validate.
//!
//! Both pipelines share one [`ReentrancyGuard`]. A pass that writes to the
//! opposite side triggers that side's notification synchronously; the guard
//! is held at that point, so the notification is counted as suppressed and
//! dropped.
//!
//! ## Validation
//!
//! After all differences of a pass are applied, validation runs when
//! [`ValidationModes::should_validate`] allows it: the whole form after a
//! reset, otherwise exactly the changed paths. A pass with no differences
//! validates nothing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;

use tandem_core::{diff, merge_shallow, FieldPath, ValidationModes, Value};

use crate::contract::{FormHandle, ResetOptions, SetValueOptions, Store, Subscription, Trigger};
use crate::error::SyncError;
use crate::guard::{ReentrancyGuard, SyncState};

// ---------------------------------------------------------------------------
// Options and reports
// ---------------------------------------------------------------------------

/// What the store → form pipeline diffs the new slice against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiffBase {
    /// The form's current values. Robust to skipped intermediate snapshots.
    #[default]
    FormValues,
    /// The slice selected from the previous store snapshot.
    PreviousSnapshot,
}

/// Controller configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub modes: ValidationModes,
    pub diff_base: DiffBase,
}

impl SyncOptions {
    pub fn with_modes(mut self, modes: ValidationModes) -> Self {
        self.modes = modes;
        self
    }

    pub fn with_diff_base(mut self, diff_base: DiffBase) -> Self {
        self.diff_base = diff_base;
        self
    }
}

/// Validation performed at the end of a store → form pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    #[default]
    Skipped,
    WholeForm,
    ChangedFields,
}

/// Outcome of one store → form pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    /// Fields set individually, in diff order.
    pub applied: Vec<FieldPath>,
    /// Whether the pass reset the whole form.
    pub reset: bool,
    pub validation: Validation,
}

impl PassReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty() && !self.reset
    }
}

/// Pass counters kept by a [`SyncController`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Completed form → store passes.
    pub form_to_store: u64,
    /// Completed store → form passes, no-op passes included.
    pub store_to_form: u64,
    /// Notifications dropped because a pass was already running.
    pub suppressed: u64,
    /// Passes that ended with an adapter error.
    pub failed: u64,
}

// ---------------------------------------------------------------------------
// Store → form pass
// ---------------------------------------------------------------------------

/// Applies the differences between `selected` and `base` to `form`.
///
/// A root difference resets the form with the new value, keeping dirty,
/// touched, error and submitted state, and ends per-field application. On
/// error the fields applied so far stay applied and validation is skipped.
pub fn apply_store_changes<F: FormHandle + ?Sized>(
    form: &F,
    selected: &Value,
    base: &Value,
    modes: ValidationModes,
) -> Result<PassReport, SyncError> {
    let mut report = PassReport::default();

    for difference in diff(selected, base) {
        if difference.is_root() {
            form.reset(difference.value, ResetOptions::KEEP_STATE)?;
            report.reset = true;
            break;
        }
        form.set_value(&difference.path, difference.value, SetValueOptions::SYNCED)?;
        report.applied.push(difference.path);
    }

    if modes.should_validate(form.is_submitted()) {
        if report.reset {
            form.trigger(Trigger::All);
            report.validation = Validation::WholeForm;
        } else if !report.applied.is_empty() {
            form.trigger(Trigger::Fields(report.applied.clone()));
            report.validation = Validation::ChangedFields;
        }
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

type StoreSetter = Rc<dyn Fn(Value)>;
type StoreSelector<S> = Rc<dyn Fn(&S) -> Value>;

/// Latest caller-supplied handlers. Long-lived listeners read through this
/// cell so reconfiguration never requires resubscribing.
struct Handlers<S> {
    setter: StoreSetter,
    selector: StoreSelector<S>,
    options: SyncOptions,
}

/// Most recent error of a failed pass, until the host takes it.
type LastError = Rc<RefCell<Option<SyncError>>>;

/// Live wiring between a store and a form.
///
/// Dropping the controller unsubscribes from both sides.
pub struct SyncController<S: 'static> {
    handlers: Rc<RefCell<Handlers<S>>>,
    guard: ReentrancyGuard,
    stats: Rc<Cell<SyncStats>>,
    last_error: LastError,
    subscriptions: Vec<Subscription>,
}

/// Wires bidirectional sync between `store` and `form`.
///
/// `selector` picks the slice of store state the form mirrors; `setter`
/// writes a merged slice back. The listeners hold weak references, so a
/// dropped store or form makes its side inert instead of being kept alive.
pub fn sync<St, F>(
    store: &Rc<St>,
    setter: impl Fn(Value) + 'static,
    selector: impl Fn(&St::State) -> Value + 'static,
    form: &Rc<F>,
    options: SyncOptions,
) -> SyncController<St::State>
where
    St: Store + 'static,
    F: FormHandle + 'static,
{
    let handlers = Rc::new(RefCell::new(Handlers {
        setter: Rc::new(setter) as StoreSetter,
        selector: Rc::new(selector) as StoreSelector<St::State>,
        options,
    }));
    let guard = ReentrancyGuard::new();
    let stats = Rc::new(Cell::new(SyncStats::default()));
    let last_error = LastError::default();

    let form_sub = form.watch(Box::new(form_to_store_listener(
        Rc::downgrade(store),
        Rc::clone(&handlers),
        guard.clone(),
        Rc::clone(&stats),
    )));
    let store_sub = store.subscribe(Box::new(store_to_form_listener(
        Rc::downgrade(form),
        Rc::clone(&handlers),
        guard.clone(),
        Rc::clone(&stats),
        Rc::clone(&last_error),
    )));

    tracing::info!(
        "sync wired (mode={}, reValidateMode={}, diff base={:?})",
        options.modes.mode,
        options.modes.re_validate_mode,
        options.diff_base
    );

    SyncController {
        handlers,
        guard,
        stats,
        last_error,
        subscriptions: vec![form_sub, store_sub],
    }
}

fn form_to_store_listener<St: Store + 'static>(
    store: Weak<St>,
    handlers: Rc<RefCell<Handlers<St::State>>>,
    guard: ReentrancyGuard,
    stats: Rc<Cell<SyncStats>>,
) -> impl Fn(&Value) + 'static {
    move |values: &Value| {
        let Some(_pass) = guard.try_enter() else {
            bump(&stats, |s| s.suppressed += 1);
            tracing::debug!("form change suppressed: sync pass in progress");
            return;
        };
        let Some(store) = store.upgrade() else {
            tracing::debug!("form change ignored: store dropped");
            return;
        };
        let (setter, selector) = {
            let h = handlers.borrow();
            (Rc::clone(&h.setter), Rc::clone(&h.selector))
        };

        let slice = selector(&store.get_state());
        setter(merge_shallow(slice, values.clone()));

        bump(&stats, |s| s.form_to_store += 1);
        tracing::debug!("form → store pass complete");
    }
}

fn store_to_form_listener<S: 'static, F: FormHandle + 'static>(
    form: Weak<F>,
    handlers: Rc<RefCell<Handlers<S>>>,
    guard: ReentrancyGuard,
    stats: Rc<Cell<SyncStats>>,
    last_error: LastError,
) -> impl Fn(&S, &S) + 'static {
    move |state: &S, previous: &S| {
        let Some(_pass) = guard.try_enter() else {
            bump(&stats, |s| s.suppressed += 1);
            tracing::debug!("store change suppressed: sync pass in progress");
            return;
        };
        let Some(form) = form.upgrade() else {
            tracing::debug!("store change ignored: form dropped");
            return;
        };
        let (selector, options) = {
            let h = handlers.borrow();
            (Rc::clone(&h.selector), h.options)
        };

        let selected = selector(state);
        let base = match options.diff_base {
            DiffBase::FormValues => form.values(),
            DiffBase::PreviousSnapshot => selector(previous),
        };

        match apply_store_changes(&*form, &selected, &base, options.modes) {
            Ok(report) => {
                bump(&stats, |s| s.store_to_form += 1);
                if !report.is_noop() {
                    tracing::debug!(
                        "store → form pass: {} field(s), reset={}, validation={:?}",
                        report.applied.len(),
                        report.reset,
                        report.validation
                    );
                }
            }
            Err(err) => {
                bump(&stats, |s| s.failed += 1);
                tracing::error!("store → form pass failed: {err}");
                *last_error.borrow_mut() = Some(err);
            }
        }
    }
}

fn bump(stats: &Cell<SyncStats>, f: impl FnOnce(&mut SyncStats)) {
    let mut current = stats.get();
    f(&mut current);
    stats.set(current);
}

impl<S: 'static> SyncController<S> {
    pub fn state(&self) -> SyncState {
        self.guard.state()
    }

    pub fn stats(&self) -> SyncStats {
        self.stats.get()
    }

    pub fn options(&self) -> SyncOptions {
        self.handlers.borrow().options
    }

    /// Takes the error of the most recent failed pass, if any.
    ///
    /// Passes run inside store notifications and cannot return errors to
    /// the caller that mutated the store; hosts poll this instead.
    pub fn take_last_error(&self) -> Option<SyncError> {
        self.last_error.borrow_mut().take()
    }

    /// Replaces the store setter used by later passes.
    pub fn set_store_setter(&self, setter: impl Fn(Value) + 'static) {
        self.handlers.borrow_mut().setter = Rc::new(setter);
    }

    /// Replaces the store selector used by later passes.
    pub fn set_store_selector(&self, selector: impl Fn(&S) -> Value + 'static) {
        self.handlers.borrow_mut().selector = Rc::new(selector);
    }

    pub fn set_options(&self, options: SyncOptions) {
        self.handlers.borrow_mut().options = options;
    }

    pub fn set_modes(&self, modes: ValidationModes) {
        self.handlers.borrow_mut().options.modes = modes;
    }

    /// Unsubscribes from both sides.
    pub fn teardown(self) {
        drop(self);
    }
}

impl<S: 'static> Drop for SyncController<S> {
    fn drop(&mut self) {
        self.subscriptions.clear();
        let stats = self.stats.get();
        tracing::info!(
            "sync torn down ({} form→store, {} store→form, {} suppressed, {} failed)",
            stats.form_to_store,
            stats.store_to_form,
            stats.suppressed,
            stats.failed
        );
    }
}

impl<S: 'static> fmt::Debug for SyncController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncController")
            .field("state", &self.state())
            .field("options", &self.options())
            .field("stats", &self.stats())
            .field("last_error", &self.last_error.borrow())
            .finish()
    }
}
