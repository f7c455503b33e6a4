//! Tandem core library: snapshot values, field paths, structural diff.
//!
//! Public API surface:
//! - [`value`]: [`Value`] snapshots and path access
//! - [`path`]: [`FieldPath`] locators
//! - [`diff`]: leaf-level differences between two snapshots
//! - [`sanitize`]: callable-free deep copies
//! - [`mode`]: validation modes and form options
//! - [`error`]: [`PathError`], [`ModeError`], [`ConfigError`]

pub mod diff;
pub mod error;
pub mod mode;
pub mod path;
pub mod sanitize;
pub mod value;

pub use diff::{apply, diff, diff_at, Difference};
pub use error::{ConfigError, ModeError, PathError};
pub use mode::{FormOptions, ValidationMode, ValidationModes};
pub use path::{FieldPath, Segment};
pub use sanitize::sanitize;
pub use value::{merge_shallow, Callable, Record, Value};
