//! Validation modes and declarative form options.
//!
//! Mode names follow the host form library: `onSubmit`, `onChange`,
//! `onBlur`, `onTouched`, `all`. They are accepted verbatim by serde,
//! [`FromStr`] and [`fmt::Display`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ModeError};
use crate::value::Value;

/// When the form validates a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    #[default]
    OnSubmit,
    OnChange,
    OnBlur,
    OnTouched,
    All,
}

impl ValidationMode {
    pub const ALL: [ValidationMode; 5] = [
        ValidationMode::OnSubmit,
        ValidationMode::OnChange,
        ValidationMode::OnBlur,
        ValidationMode::OnTouched,
        ValidationMode::All,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationMode::OnSubmit => "onSubmit",
            ValidationMode::OnChange => "onChange",
            ValidationMode::OnBlur => "onBlur",
            ValidationMode::OnTouched => "onTouched",
            ValidationMode::All => "all",
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationMode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValidationMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ModeError::Unknown(s.to_owned()))
    }
}

/// The pair of modes that decides whether a synced change is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationModes {
    /// Policy before the first submit.
    pub mode: ValidationMode,
    /// Policy once the form has been submitted.
    pub re_validate_mode: ValidationMode,
}

impl Default for ValidationModes {
    fn default() -> Self {
        Self {
            mode: ValidationMode::OnSubmit,
            re_validate_mode: ValidationMode::OnChange,
        }
    }
}

impl ValidationModes {
    pub fn new(mode: ValidationMode, re_validate_mode: ValidationMode) -> Self {
        Self {
            mode,
            re_validate_mode,
        }
    }

    /// Whether a programmatic change should be validated right away.
    ///
    /// Before submit this follows `mode`, after submit `re_validate_mode`;
    /// either way `onSubmit` means "wait for the next submit".
    pub fn should_validate(&self, submitted: bool) -> bool {
        if submitted {
            self.re_validate_mode != ValidationMode::OnSubmit
        } else {
            self.mode != ValidationMode::OnSubmit
        }
    }
}

/// Options used to construct a form.
///
/// Loads from JSON with the host library's key names:
///
/// ```
/// use tandem_core::{FormOptions, ValidationMode};
///
/// let options = FormOptions::from_json(r#"{"mode": "onChange", "defaultValues": {"count": 0}}"#)
///     .expect("valid options");
/// assert_eq!(options.modes().mode, ValidationMode::OnChange);
/// assert_eq!(options.modes().re_validate_mode, ValidationMode::OnChange);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_values: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ValidationMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub re_validate_mode: Option<ValidationMode>,
}

impl FormOptions {
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn with_default_values(mut self, values: Value) -> Self {
        self.default_values = Some(values);
        self
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_re_validate_mode(mut self, mode: ValidationMode) -> Self {
        self.re_validate_mode = Some(mode);
        self
    }

    /// Modes with unset entries filled from [`ValidationModes::default`].
    pub fn modes(&self) -> ValidationModes {
        let defaults = ValidationModes::default();
        ValidationModes {
            mode: self.mode.unwrap_or(defaults.mode),
            re_validate_mode: self.re_validate_mode.unwrap_or(defaults.re_validate_mode),
        }
    }
}
