//! End-to-end sync between a `MemoryStore` and a `MemoryForm`.
//!
//! The store holds a counter, a field array and an action; the form mirrors
//! the data members. Every test asserts write counts on the opposite side
//! so an echo or oscillation shows up as an extra write.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;
use tandem_core::{FieldPath, FormOptions, Record, ValidationMode, ValidationModes, Value};
use tandem_sync::{
    create_synced_form, sync, DiffBase, FormHandle, MemoryForm, MemoryStore, ResetOptions,
    SetValueOptions, Store, Subscription, SyncController, SyncError, SyncOptions, SyncState,
    SyncedForm, Trigger, WatchListener,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn path(s: &str) -> FieldPath {
    s.parse().expect("path")
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn counter_state() -> Value {
    let mut state = Value::from(json!({"count": 0, "arr": [{"foo": "foo-0"}]}));
    state
        .as_object_mut()
        .expect("record")
        .insert("inc".into(), Value::callable(|_| Value::Null));
    state
}

fn merging_setter(store: &Rc<MemoryStore<Value>>) -> impl Fn(Value) + 'static {
    let store = Rc::downgrade(store);
    move |slice: Value| {
        if let Some(store) = store.upgrade() {
            store.merge(slice);
        }
    }
}

struct Harness {
    store: Rc<MemoryStore<Value>>,
    form: Rc<MemoryForm>,
    controller: SyncController<Value>,
    validated: Rc<RefCell<Vec<String>>>,
}

impl Harness {
    fn new(options: FormOptions) -> Self {
        init_logging();
        let store = Rc::new(MemoryStore::new(counter_state()));
        let synced: SyncedForm<MemoryForm, Value> = create_synced_form(
            &store,
            merging_setter(&store),
            |state: &Value| state.clone(),
            options,
        );

        let validated = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&validated);
        synced.set_validator(move |path, _| {
            sink.borrow_mut().push(path.to_string());
            None
        });

        let (form, controller) = synced.into_parts();
        Self {
            store,
            form,
            controller,
            validated,
        }
    }

    fn store_value(&self, key: &str) -> Option<Value> {
        self.store.get_state().get(key).cloned()
    }

    fn take_validated(&self) -> Vec<String> {
        std::mem::take(&mut *self.validated.borrow_mut())
    }
}

fn count_watch_notifications(form: &MemoryForm) -> (Rc<Cell<u32>>, Subscription) {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let sub = form.watch(Box::new(move |_: &Value| counter.set(counter.get() + 1)));
    (calls, sub)
}

// ---------------------------------------------------------------------------
// Form → store
// ---------------------------------------------------------------------------

#[test]
fn form_edit_reaches_store_exactly_once() {
    let h = Harness::new(FormOptions::default());

    h.form
        .set_value(&path("count"), Value::from(5i64), SetValueOptions::SYNCED)
        .expect("edit");

    assert_eq!(h.store_value("count"), Some(Value::from(5i64)));
    assert_eq!(h.store.version(), 1, "one store write per edit");
    assert_eq!(h.form.write_count(), 1, "store write must not echo into the form");

    let stats = h.controller.stats();
    assert_eq!(stats.form_to_store, 1);
    assert_eq!(stats.store_to_form, 0);
    assert_eq!(stats.suppressed, 1);
    assert_eq!(h.controller.state(), SyncState::Idle);
}

#[test]
fn form_edit_keeps_store_only_members() {
    let h = Harness::new(FormOptions::default());

    h.form
        .set_value(&path("arr.0.foo"), Value::from("edited"), SetValueOptions::SYNCED)
        .expect("edit");

    assert!(h.store_value("inc").is_some_and(|v| v.is_callable()));
    assert_eq!(
        h.store_value("arr").map(|v| v.to_json()),
        Some(json!([{"foo": "edited"}]))
    );
}

#[test]
fn form_reset_reaches_store_once() {
    let h = Harness::new(FormOptions::default());

    h.form
        .reset(
            Value::from(json!({"count": 10, "arr": [{"foo": "b"}]})),
            ResetOptions::default(),
        )
        .expect("reset");

    assert_eq!(
        h.store.get_state().to_json(),
        json!({"count": 10, "arr": [{"foo": "b"}]})
    );
    assert!(h.store_value("inc").is_some_and(|v| v.is_callable()));
    assert_eq!(h.store.version(), 1, "one store write per reset");
    assert_eq!(h.form.write_count(), 1);

    let stats = h.controller.stats();
    assert_eq!(stats.form_to_store, 1);
    assert_eq!(stats.store_to_form, 0);
    assert_eq!(stats.suppressed, 1);
}

#[test]
fn field_reset_to_default_reaches_store() {
    let h = Harness::new(FormOptions::default());
    let count = path("count");

    h.form
        .set_value(&count, Value::from(5i64), SetValueOptions::SYNCED)
        .expect("edit");
    let default = h.form.default_values().get_path(&count).cloned().unwrap_or_default();
    h.form
        .set_value(&count, default, SetValueOptions::SYNCED)
        .expect("reset field");

    assert_eq!(h.store_value("count"), Some(Value::from(0i64)));
    assert!(!h.form.is_dirty(&count));
    assert_eq!(h.store.version(), 2);
    assert_eq!(h.form.write_count(), 2);
}

#[test]
fn form_array_removal_replaces_store_array() {
    let h = Harness::new(FormOptions::default());
    h.store
        .merge(Value::from(json!({"arr": [{"foo": "a"}, {"foo": "b"}]})));
    assert_eq!(h.form.write_count(), 1);

    h.form
        .set_value(
            &path("arr"),
            Value::from(json!([{"foo": "b"}])),
            SetValueOptions::SYNCED,
        )
        .expect("remove");

    assert_eq!(
        h.store_value("arr").map(|v| v.to_json()),
        Some(json!([{"foo": "b"}]))
    );
    assert_eq!(h.store.version(), 2);
    assert_eq!(h.form.write_count(), 2, "store write must not bounce back");
    assert_eq!(h.form.values().to_json(), json!({"count": 0, "arr": [{"foo": "b"}]}));

    let stats = h.controller.stats();
    assert_eq!(stats.form_to_store, 1);
    assert_eq!(stats.store_to_form, 1);
    assert_eq!(stats.suppressed, 2);
}

// ---------------------------------------------------------------------------
// Store → form
// ---------------------------------------------------------------------------

#[test]
fn store_change_reaches_form_without_echo() {
    let h = Harness::new(FormOptions::default());

    h.store.merge(Value::from(json!({"count": 5})));

    assert_eq!(h.form.value(&path("count")), Some(Value::from(5i64)));
    assert!(h.form.is_dirty(&path("count")));
    assert!(h.form.is_touched(&path("count")));
    assert_eq!(h.form.write_count(), 1);
    assert_eq!(h.store.version(), 1, "form write must not echo into the store");
    assert!(h.take_validated().is_empty(), "onSubmit mode defers validation");

    let stats = h.controller.stats();
    assert_eq!(stats.store_to_form, 1);
    assert_eq!(stats.form_to_store, 0);
    assert_eq!(stats.suppressed, 1);
}

#[test]
fn store_change_validates_exactly_the_changed_paths() {
    let h = Harness::new(FormOptions::default().with_mode(ValidationMode::OnChange));

    h.store
        .merge(Value::from(json!({"count": 7, "arr": [{"foo": "bar"}]})));

    assert_eq!(h.take_validated(), vec!["arr.0.foo", "count"]);
    assert_eq!(h.form.write_count(), 2);
    assert_eq!(h.form.values().to_json(), json!({"count": 7, "arr": [{"foo": "bar"}]}));
}

#[test]
fn submitted_form_revalidates_changed_paths() {
    let h = Harness::new(FormOptions::default());
    h.form.handle_submit();
    assert_eq!(h.take_validated(), vec!["arr.0.foo", "count"]);

    h.store.merge(Value::from(json!({"count": 1})));

    assert_eq!(h.take_validated(), vec!["count"]);
}

#[test]
fn submitted_form_with_on_submit_revalidation_waits() {
    let h = Harness::new(
        FormOptions::default()
            .with_mode(ValidationMode::OnChange)
            .with_re_validate_mode(ValidationMode::OnSubmit),
    );
    h.form.handle_submit();
    h.take_validated();

    h.store.merge(Value::from(json!({"count": 1})));

    assert!(h.take_validated().is_empty());
    assert_eq!(h.form.value(&path("count")), Some(Value::from(1i64)));
}

#[test]
fn identical_store_write_touches_nothing() {
    let h = Harness::new(FormOptions::default().with_mode(ValidationMode::All));
    let (renders, _sub) = count_watch_notifications(&h.form);

    h.store.set_state(h.store.get_state());

    assert_eq!(h.form.write_count(), 0);
    assert_eq!(renders.get(), 0);
    assert!(h.take_validated().is_empty());
    assert_eq!(h.controller.stats().store_to_form, 1);
}

#[test]
fn float_store_value_equal_to_form_integer_touches_nothing() {
    let h = Harness::new(FormOptions::default().with_mode(ValidationMode::OnChange));

    h.store.merge(Value::from(json!({"count": 0.0})));

    assert_eq!(h.form.write_count(), 0);
    assert!(!h.form.is_dirty(&path("count")));
    assert!(h.take_validated().is_empty());
}

#[test]
fn array_append_in_store_replaces_field_array() {
    let h = Harness::new(FormOptions::default());

    h.store.merge(Value::from(
        json!({"arr": [{"foo": "foo-0"}, {"foo": "foo-1"}]}),
    ));

    assert_eq!(
        h.form.value(&path("arr")).map(|v| v.to_json()),
        Some(json!([{"foo": "foo-0"}, {"foo": "foo-1"}]))
    );
    assert!(h.form.is_dirty(&path("arr")));
    assert_eq!(h.form.write_count(), 1, "length change is one whole-array write");
}

// ---------------------------------------------------------------------------
// Whole-structure replacement
// ---------------------------------------------------------------------------

fn items_harness(options: FormOptions) -> (Rc<MemoryStore<Value>>, SyncedForm<MemoryForm, Value>) {
    init_logging();
    let store = Rc::new(MemoryStore::new(Value::from(json!({"items": ["a"]}))));
    let weak = Rc::downgrade(&store);
    let setter = move |items: Value| {
        if let Some(store) = weak.upgrade() {
            let mut patch = Record::new();
            patch.insert("items".into(), items);
            store.merge(Value::Object(patch));
        }
    };
    let selector = |state: &Value| state.get("items").cloned().unwrap_or_default();
    let synced = create_synced_form(&store, setter, selector, options);
    (store, synced)
}

#[test]
fn root_change_resets_form_and_keeps_interaction_state() {
    let (store, form) = items_harness(FormOptions::default());
    let validated = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&validated);
    form.set_validator(move |path, value| {
        sink.borrow_mut().push(path.to_string());
        match value.as_str() {
            Some(s) if s.len() < 3 => Some("too short".into()),
            _ => None,
        }
    });

    form.set_value(&path("0"), Value::from("ab"), SetValueOptions::SYNCED)
        .expect("edit");
    assert_eq!(store.get_state().to_json(), json!({"items": ["ab"]}));
    assert!(!form.trigger(Trigger::All));
    validated.borrow_mut().clear();

    store.merge(Value::from(json!({"items": ["ab", "cd"]})));

    assert_eq!(form.values().to_json(), json!(["ab", "cd"]));
    assert_eq!(form.default_values().to_json(), json!(["ab", "cd"]));
    assert!(form.is_dirty(&path("0")));
    assert!(form.is_touched(&path("0")));
    assert_eq!(form.error(&path("0")).as_deref(), Some("too short"));
    assert_eq!(form.write_count(), 2, "one edit plus one reset");
    assert!(validated.borrow().is_empty());
    assert_eq!(store.version(), 2);
}

#[test]
fn root_change_revalidates_whole_form() {
    let (store, form) = items_harness(FormOptions::default().with_mode(ValidationMode::OnChange));
    let validated = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&validated);
    form.set_validator(move |path, _| {
        sink.borrow_mut().push(path.to_string());
        None
    });

    store.merge(Value::from(json!({"items": ["a", "b", "c"]})));

    assert_eq!(*validated.borrow(), vec!["0", "1", "2"]);
    assert_eq!(form.write_count(), 1);
}

// ---------------------------------------------------------------------------
// Lifecycle and reconfiguration
// ---------------------------------------------------------------------------

#[test]
fn teardown_stops_both_directions() {
    let h = Harness::new(FormOptions::default());
    assert_eq!(h.store.subscriber_count(), 1);
    assert_eq!(h.form.watcher_count(), 1);

    let Harness {
        store,
        form,
        controller,
        ..
    } = h;
    controller.teardown();

    assert_eq!(store.subscriber_count(), 0);
    assert_eq!(form.watcher_count(), 0);

    store.merge(Value::from(json!({"count": 9})));
    assert_eq!(form.value(&path("count")), Some(Value::from(0i64)));

    form.set_value(&path("count"), Value::from(3i64), SetValueOptions::SYNCED)
        .expect("edit");
    assert_eq!(store.get_state().get("count"), Some(&Value::from(9i64)));
    assert_eq!(store.version(), 1);
}

#[test]
fn reconfiguration_applies_without_resubscribing() {
    let h = Harness::new(FormOptions::default());

    h.controller.set_store_selector(|state: &Value| {
        let mut slice = Record::new();
        slice.insert("count".into(), state.get("count").cloned().unwrap_or_default());
        Value::Object(slice)
    });
    h.controller.set_modes(ValidationModes::new(
        ValidationMode::OnChange,
        ValidationMode::OnChange,
    ));
    assert_eq!(h.store.subscriber_count(), 1);

    h.store
        .merge(Value::from(json!({"count": 4, "arr": [{"foo": "ignored"}]})));

    assert_eq!(h.form.value(&path("count")), Some(Value::from(4i64)));
    assert_eq!(
        h.form.value(&path("arr.0.foo")),
        Some(Value::from("foo-0")),
        "arr is outside the new selector"
    );
    assert_eq!(h.take_validated(), vec!["count"]);
}

#[test]
fn replaced_setter_receives_form_edits() {
    let h = Harness::new(FormOptions::default());
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    h.controller
        .set_store_setter(move |slice: Value| sink.borrow_mut().push(slice.to_json()));

    h.form
        .set_value(&path("count"), Value::from(2i64), SetValueOptions::SYNCED)
        .expect("edit");

    assert_eq!(
        *received.borrow(),
        vec![json!({"count": 2, "arr": [{"foo": "foo-0"}]})]
    );
    assert_eq!(h.store.version(), 0);
}

// ---------------------------------------------------------------------------
// Diff base
// ---------------------------------------------------------------------------

fn wire_with_base(base: DiffBase) -> (Rc<MemoryStore<Value>>, Rc<MemoryForm>, SyncController<Value>) {
    init_logging();
    let store = Rc::new(MemoryStore::new(Value::from(json!({"count": 0, "name": "a"}))));
    let form = Rc::new(MemoryForm::new(
        &FormOptions::default().with_default_values(Value::from(json!({"count": 100, "name": "a"}))),
    ));
    let controller = sync(
        &store,
        merging_setter(&store),
        |state: &Value| state.clone(),
        &form,
        SyncOptions::default().with_diff_base(base),
    );
    (store, form, controller)
}

#[test]
fn form_values_base_catches_up_on_every_divergent_field() {
    let (store, form, _controller) = wire_with_base(DiffBase::FormValues);

    store.merge(Value::from(json!({"name": "b"})));

    assert_eq!(form.values().to_json(), json!({"count": 0, "name": "b"}));
}

#[test]
fn previous_snapshot_base_applies_only_the_store_delta() {
    let (store, form, _controller) = wire_with_base(DiffBase::PreviousSnapshot);

    store.merge(Value::from(json!({"name": "b"})));

    assert_eq!(form.values().to_json(), json!({"count": 100, "name": "b"}));
}

// ---------------------------------------------------------------------------
// Adapter failures
// ---------------------------------------------------------------------------

/// A form whose programmatic writes are refused.
struct ReadOnlyForm(MemoryForm);

impl FormHandle for ReadOnlyForm {
    fn values(&self) -> Value {
        self.0.values()
    }

    fn set_value(
        &self,
        _path: &FieldPath,
        _value: Value,
        _options: SetValueOptions,
    ) -> Result<(), SyncError> {
        Err(SyncError::adapter("form", "read-only"))
    }

    fn reset(&self, _values: Value, _options: ResetOptions) -> Result<(), SyncError> {
        Err(SyncError::adapter("form", "read-only"))
    }

    fn trigger(&self, target: Trigger) -> bool {
        self.0.trigger(target)
    }

    fn is_submitted(&self) -> bool {
        self.0.is_submitted()
    }

    fn watch(&self, listener: WatchListener) -> Subscription {
        self.0.watch(listener)
    }
}

#[test]
fn failed_pass_is_counted_and_releases_the_guard() {
    init_logging();
    let store = Rc::new(MemoryStore::new(counter_state()));
    let form = Rc::new(ReadOnlyForm(MemoryForm::new(
        &FormOptions::default().with_default_values(Value::from(json!({"count": 0}))),
    )));
    let controller = sync(
        &store,
        merging_setter(&store),
        |state: &Value| state.clone(),
        &form,
        SyncOptions::default(),
    );

    store.merge(Value::from(json!({"count": 1})));
    assert_eq!(controller.stats().failed, 1);
    assert_eq!(controller.state(), SyncState::Idle);

    let err = controller.take_last_error();
    assert!(
        matches!(err, Some(SyncError::Adapter { target: "form", .. })),
        "got: {err:?}"
    );
    assert!(controller.take_last_error().is_none());

    // The inner form still accepts direct edits; they must flow to the store.
    form.0
        .set_value(&path("count"), Value::from(8i64), SetValueOptions::SYNCED)
        .expect("edit");
    assert_eq!(store.get_state().get("count"), Some(&Value::from(8i64)));
    assert_eq!(controller.stats().form_to_store, 1);
}
