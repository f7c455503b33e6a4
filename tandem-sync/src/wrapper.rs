//! Form construction seeded from the store.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use tandem_core::{sanitize, FormOptions, Value};

use crate::contract::{BuildForm, Store};
use crate::controller::{sync, SyncController, SyncOptions};

/// A form built by [`create_synced_form`], together with the controller
/// that keeps it in sync. Dereferences to the form.
pub struct SyncedForm<F, S: 'static> {
    form: Rc<F>,
    controller: SyncController<S>,
}

impl<F, S: 'static> SyncedForm<F, S> {
    /// Shared handle to the form, for UI bindings that need ownership.
    pub fn form(&self) -> &Rc<F> {
        &self.form
    }

    pub fn controller(&self) -> &SyncController<S> {
        &self.controller
    }

    /// Splits into the form and the controller. Sync stays active for as
    /// long as the controller is kept alive.
    pub fn into_parts(self) -> (Rc<F>, SyncController<S>) {
        (self.form, self.controller)
    }
}

impl<F, S: 'static> Deref for SyncedForm<F, S> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.form
    }
}

impl<F: fmt::Debug, S: 'static> fmt::Debug for SyncedForm<F, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncedForm")
            .field("form", &self.form)
            .field("controller", &self.controller)
            .finish()
    }
}

/// Builds a form whose defaults come from the store, then wires sync.
///
/// Unless `options` already carries default values, the defaults are the
/// selected slice of the current store state with callables stripped.
/// Validation modes are taken from `options`, falling back to
/// `onSubmit` / `onChange`.
pub fn create_synced_form<St, F>(
    store: &Rc<St>,
    setter: impl Fn(Value) + 'static,
    selector: impl Fn(&St::State) -> Value + 'static,
    mut options: FormOptions,
) -> SyncedForm<F, St::State>
where
    St: Store + 'static,
    F: BuildForm + 'static,
{
    if options.default_values.is_none() {
        options.default_values = Some(sanitize(&selector(&store.get_state())));
    }

    let form = Rc::new(F::build(&options));
    let sync_options = SyncOptions::default().with_modes(options.modes());
    let controller = sync(store, setter, selector, &form, sync_options);

    SyncedForm { form, controller }
}
