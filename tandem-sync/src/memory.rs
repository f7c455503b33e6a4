//! In-memory [`Store`] and [`FormHandle`] implementations.
//!
//! [`MemoryStore`] is a version-tracked state cell; [`MemoryForm`] keeps
//! values plus the interaction state a form library tracks (dirty, touched,
//! errors, submitted). Hosts without a UI framework can sync against them
//! directly. Both are single-threaded and share through `Rc`.
//!
//! Listeners are notified in registration order, after the write has been
//! committed and with no internal borrow held, so a listener may read back
//! from the store or form that notified it.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use tandem_core::{merge_shallow, FieldPath, FormOptions, Value, ValidationModes};

use crate::contract::{
    BuildForm, FormHandle, ResetOptions, SetValueOptions, Store, StoreListener, Subscription,
    Trigger, WatchListener,
};
use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Listener registry
// ---------------------------------------------------------------------------

struct Listeners<L: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Rc<L>)>,
}

impl<L: ?Sized + 'static> Listeners<L> {
    fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            next_id: 0,
            entries: Vec::new(),
        }))
    }

    fn register(registry: &Rc<RefCell<Self>>, listener: Rc<L>) -> Subscription {
        let id = {
            let mut inner = registry.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push((id, listener));
            id
        };
        let weak = Rc::downgrade(registry);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                registry.borrow_mut().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Listeners registered right now, detached from the registry borrow.
    fn snapshot(registry: &RefCell<Self>) -> Vec<Rc<L>> {
        registry
            .borrow()
            .entries
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect()
    }

    fn len(registry: &RefCell<Self>) -> usize {
        registry.borrow().entries.len()
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// A state cell that notifies subscribers with `(new, previous)` on every
/// write, including writes of an equal value.
pub struct MemoryStore<S> {
    state: RefCell<S>,
    version: Cell<u64>,
    listeners: Rc<RefCell<Listeners<dyn Fn(&S, &S)>>>,
}

impl<S: Clone + 'static> MemoryStore<S> {
    pub fn new(initial: S) -> Self {
        Self {
            state: RefCell::new(initial),
            version: Cell::new(0),
            listeners: Listeners::new(),
        }
    }

    /// Replaces the state and notifies subscribers.
    pub fn set_state(&self, next: S) {
        let previous = self.state.replace(next.clone());
        self.version.set(self.version.get() + 1);
        for listener in Listeners::snapshot(&self.listeners) {
            listener(&next, &previous);
        }
    }

    /// Derives the next state from the current one.
    pub fn update(&self, f: impl FnOnce(&S) -> S) {
        let next = f(&self.state.borrow());
        self.set_state(next);
    }

    /// Number of writes since construction.
    pub fn version(&self) -> u64 {
        self.version.get()
    }

    pub fn subscriber_count(&self) -> usize {
        Listeners::len(&self.listeners)
    }
}

impl MemoryStore<Value> {
    /// Shallow-merges `partial` into a record state, replacing it outright
    /// when either side is not a record.
    pub fn merge(&self, partial: Value) {
        self.update(move |state| merge_shallow(state.clone(), partial));
    }
}

impl<S: Clone + 'static> Store for MemoryStore<S> {
    type State = S;

    fn get_state(&self) -> S {
        self.state.borrow().clone()
    }

    fn subscribe(&self, listener: StoreListener<S>) -> Subscription {
        Listeners::register(&self.listeners, Rc::from(listener))
    }
}

impl<S: fmt::Debug> fmt::Debug for MemoryStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("state", &self.state.borrow())
            .field("version", &self.version.get())
            .field("subscribers", &self.listeners.borrow().entries.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// MemoryForm
// ---------------------------------------------------------------------------

/// Field validation rule: an error message for an invalid value.
pub type Validator = Box<dyn Fn(&FieldPath, &Value) -> Option<String>>;

#[derive(Debug, Default)]
struct FormState {
    values: Value,
    defaults: Value,
    dirty: BTreeSet<FieldPath>,
    touched: BTreeSet<FieldPath>,
    errors: BTreeMap<FieldPath, String>,
    submitted: bool,
    writes: u64,
}

/// Form state held in memory.
///
/// Validation rules are whatever [`MemoryForm::set_validator`] installs;
/// without one every field is valid.
pub struct MemoryForm {
    state: RefCell<FormState>,
    modes: ValidationModes,
    validator: RefCell<Option<Validator>>,
    watchers: Rc<RefCell<Listeners<dyn Fn(&Value)>>>,
}

impl MemoryForm {
    /// Starts from `options.default_values`, or an empty record.
    pub fn new(options: &FormOptions) -> Self {
        let defaults = options.default_values.clone().unwrap_or_else(Value::object);
        Self {
            state: RefCell::new(FormState {
                values: defaults.clone(),
                defaults,
                ..FormState::default()
            }),
            modes: options.modes(),
            validator: RefCell::new(None),
            watchers: Listeners::new(),
        }
    }

    pub fn set_validator(&self, validator: impl Fn(&FieldPath, &Value) -> Option<String> + 'static) {
        *self.validator.borrow_mut() = Some(Box::new(validator));
    }

    /// Modes this form was configured with.
    pub fn modes(&self) -> ValidationModes {
        self.modes
    }

    pub fn value(&self, path: &FieldPath) -> Option<Value> {
        self.state.borrow().values.get_path(path).cloned()
    }

    pub fn default_values(&self) -> Value {
        self.state.borrow().defaults.clone()
    }

    pub fn is_dirty(&self, path: &FieldPath) -> bool {
        self.state.borrow().dirty.contains(path)
    }

    pub fn is_touched(&self, path: &FieldPath) -> bool {
        self.state.borrow().touched.contains(path)
    }

    pub fn dirty_fields(&self) -> Vec<FieldPath> {
        self.state.borrow().dirty.iter().cloned().collect()
    }

    pub fn error(&self, path: &FieldPath) -> Option<String> {
        self.state.borrow().errors.get(path).cloned()
    }

    pub fn errors(&self) -> BTreeMap<FieldPath, String> {
        self.state.borrow().errors.clone()
    }

    pub fn is_valid(&self) -> bool {
        self.state.borrow().errors.is_empty()
    }

    /// Number of value writes (`set_value` and `reset`) since construction.
    pub fn write_count(&self) -> u64 {
        self.state.borrow().writes
    }

    pub fn watcher_count(&self) -> usize {
        Listeners::len(&self.watchers)
    }

    /// Marks the form submitted and validates every field.
    pub fn handle_submit(&self) -> bool {
        self.state.borrow_mut().submitted = true;
        self.trigger(Trigger::All)
    }

    fn notify(&self) {
        let values = self.values();
        for watcher in Listeners::snapshot(&self.watchers) {
            watcher(&values);
        }
    }
}

impl FormHandle for MemoryForm {
    fn values(&self) -> Value {
        self.state.borrow().values.clone()
    }

    fn set_value(
        &self,
        path: &FieldPath,
        value: Value,
        options: SetValueOptions,
    ) -> Result<(), SyncError> {
        {
            let mut state = self.state.borrow_mut();
            let FormState {
                values,
                defaults,
                dirty,
                touched,
                writes,
                ..
            } = &mut *state;

            values.set_path(path, value)?;
            *writes += 1;
            if options.should_dirty {
                if values.get_path(path) == defaults.get_path(path) {
                    dirty.remove(path);
                } else {
                    dirty.insert(path.clone());
                }
            }
            if options.should_touch {
                touched.insert(path.clone());
            }
        }

        if options.should_validate {
            self.trigger(Trigger::Fields(vec![path.clone()]));
        }
        self.notify();
        Ok(())
    }

    fn reset(&self, values: Value, options: ResetOptions) -> Result<(), SyncError> {
        {
            let mut state = self.state.borrow_mut();
            state.defaults = values.clone();
            state.values = values;
            state.writes += 1;
            if !options.keep_dirty {
                state.dirty.clear();
            }
            if !options.keep_touched {
                state.touched.clear();
            }
            if !options.keep_errors {
                state.errors.clear();
            }
            if !options.keep_submitted {
                state.submitted = false;
            }
        }
        self.notify();
        Ok(())
    }

    fn trigger(&self, target: Trigger) -> bool {
        let checks: Vec<(FieldPath, Value)> = {
            let state = self.state.borrow();
            let paths = match target {
                Trigger::All => state.values.leaf_paths(),
                Trigger::Fields(paths) => paths,
            };
            paths
                .into_iter()
                .map(|path| {
                    let value = state.values.get_path(&path).cloned().unwrap_or_default();
                    (path, value)
                })
                .collect()
        };

        let outcomes: Vec<(FieldPath, Option<String>)> = {
            let validator = self.validator.borrow();
            checks
                .into_iter()
                .map(|(path, value)| {
                    let error = validator.as_ref().and_then(|rule| rule(&path, &value));
                    (path, error)
                })
                .collect()
        };

        let mut state = self.state.borrow_mut();
        let mut valid = true;
        for (path, error) in outcomes {
            match error {
                Some(message) => {
                    valid = false;
                    state.errors.insert(path, message);
                }
                None => {
                    state.errors.remove(&path);
                }
            }
        }
        valid
    }

    fn is_submitted(&self) -> bool {
        self.state.borrow().submitted
    }

    fn watch(&self, listener: WatchListener) -> Subscription {
        Listeners::register(&self.watchers, Rc::from(listener))
    }
}

impl BuildForm for MemoryForm {
    fn build(options: &FormOptions) -> Self {
        Self::new(options)
    }
}

impl fmt::Debug for MemoryForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryForm")
            .field("state", &self.state.borrow())
            .field("modes", &self.modes)
            .field("watchers", &self.watchers.borrow().entries.len())
            .finish()
    }
}
