//! # tandem-sync
//!
//! Bidirectional synchronisation between an application store and a form.
//!
//! Call [`sync`] to wire an existing form to a store, or
//! [`create_synced_form`] to build the form from the store's current state
//! and wire it in one step. Both return handles that unsubscribe from both
//! sides when dropped.

pub mod contract;
pub mod controller;
pub mod error;
pub mod guard;
pub mod memory;
pub mod wrapper;

pub use contract::{
    BuildForm, FormHandle, ResetOptions, SetValueOptions, Store, StoreListener, Subscription,
    Trigger, WatchListener,
};
pub use controller::{
    apply_store_changes, sync, DiffBase, PassReport, SyncController, SyncOptions, SyncStats,
    Validation,
};
pub use error::SyncError;
pub use guard::{ReentrancyGuard, SyncPass, SyncState};
pub use memory::{MemoryForm, MemoryStore};
pub use wrapper::{create_synced_form, SyncedForm};
