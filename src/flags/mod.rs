//! Typed flag settings.
//!
//! Flags are persisted as JSON strings holding the *input* shape. Reading
//! never fails: anything that does not decode and validate falls back to the
//! key's default. Some keys carry a derived helper built from the input
//! ([`ProgressMapper`], [`ColorMapper`]); only the input is ever serialized.

pub mod color;
pub mod progress;
pub mod types;

pub use color::ColorMapper;
pub use progress::ProgressMapper;
pub use types::{
    ColorCoding, ColorPair, ColorStop, MonthViewType, NumberCombine, ProgressBounds, Validate,
};

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors from strict flag decoding
#[derive(Error, Debug)]
pub enum FlagError {
    #[error("Unknown flag: {0}")]
    UnknownKey(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid flag value: {0}")]
    Invalid(String),
}

/// The closed set of flag keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlagKey {
    Favorite,
    NoteEnabled,
    MonthViewType,
    NumberCombine,
    NumberProgressBounds,
    NumberColorCoding,
    BooleanCheckedColor,
    BooleanUncheckedColor,
}

impl FlagKey {
    pub const ALL: [FlagKey; 8] = [
        FlagKey::Favorite,
        FlagKey::NoteEnabled,
        FlagKey::MonthViewType,
        FlagKey::NumberCombine,
        FlagKey::NumberProgressBounds,
        FlagKey::NumberColorCoding,
        FlagKey::BooleanCheckedColor,
        FlagKey::BooleanUncheckedColor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagKey::Favorite => "favorite",
            FlagKey::NoteEnabled => "note-enabled",
            FlagKey::MonthViewType => "month-view-type",
            FlagKey::NumberCombine => "number-combine",
            FlagKey::NumberProgressBounds => "number-progress-bounds",
            FlagKey::NumberColorCoding => "number-color-coding",
            FlagKey::BooleanCheckedColor => "boolean-checked-color",
            FlagKey::BooleanUncheckedColor => "boolean-unchecked-color",
        }
    }
}

impl fmt::Display for FlagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagKey {
    type Err = FlagError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        FlagKey::ALL
            .into_iter()
            .find(|key| key.as_str() == name)
            .ok_or_else(|| FlagError::UnknownKey(name.to_string()))
    }
}

/// A decoded flag value, with derived helpers where the key has one
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Favorite(bool),
    NoteEnabled(bool),
    MonthViewType(MonthViewType),
    NumberCombine(NumberCombine),
    NumberProgressBounds(ProgressMapper),
    NumberColorCoding(ColorMapper),
    BooleanCheckedColor(ColorPair),
    BooleanUncheckedColor(ColorPair),
}

impl FlagValue {
    pub fn key(&self) -> FlagKey {
        match self {
            FlagValue::Favorite(_) => FlagKey::Favorite,
            FlagValue::NoteEnabled(_) => FlagKey::NoteEnabled,
            FlagValue::MonthViewType(_) => FlagKey::MonthViewType,
            FlagValue::NumberCombine(_) => FlagKey::NumberCombine,
            FlagValue::NumberProgressBounds(_) => FlagKey::NumberProgressBounds,
            FlagValue::NumberColorCoding(_) => FlagKey::NumberColorCoding,
            FlagValue::BooleanCheckedColor(_) => FlagKey::BooleanCheckedColor,
            FlagValue::BooleanUncheckedColor(_) => FlagKey::BooleanUncheckedColor,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Favorite(value) | FlagValue::NoteEnabled(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_month_view(&self) -> Option<MonthViewType> {
        match self {
            FlagValue::MonthViewType(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_combine(&self) -> Option<NumberCombine> {
        match self {
            FlagValue::NumberCombine(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_progress(&self) -> Option<&ProgressMapper> {
        match self {
            FlagValue::NumberProgressBounds(mapper) => Some(mapper),
            _ => None,
        }
    }

    pub fn as_color_coding(&self) -> Option<&ColorMapper> {
        match self {
            FlagValue::NumberColorCoding(mapper) => Some(mapper),
            _ => None,
        }
    }

    pub fn as_color_pair(&self) -> Option<&ColorPair> {
        match self {
            FlagValue::BooleanCheckedColor(pair) | FlagValue::BooleanUncheckedColor(pair) => {
                Some(pair)
            }
            _ => None,
        }
    }
}

/// Default value of `key`.
pub fn default_for(key: FlagKey) -> FlagValue {
    match key {
        FlagKey::Favorite => FlagValue::Favorite(false),
        FlagKey::NoteEnabled => FlagValue::NoteEnabled(true),
        FlagKey::MonthViewType => FlagValue::MonthViewType(MonthViewType::default()),
        FlagKey::NumberCombine => FlagValue::NumberCombine(NumberCombine::default()),
        FlagKey::NumberProgressBounds => {
            FlagValue::NumberProgressBounds(ProgressMapper::new(ProgressBounds::default()))
        }
        FlagKey::NumberColorCoding => {
            FlagValue::NumberColorCoding(ColorMapper::new(ColorCoding::default()))
        }
        FlagKey::BooleanCheckedColor => FlagValue::BooleanCheckedColor(ColorPair::checked()),
        FlagKey::BooleanUncheckedColor => FlagValue::BooleanUncheckedColor(ColorPair::neutral()),
    }
}

/// Decode `raw` for `key`, falling back to the default on any failure.
pub fn parse(raw: &str, key: FlagKey) -> FlagValue {
    match parse_strict(raw, key) {
        Ok(value) => value,
        Err(err) => {
            debug!(flag = %key, "using default flag value: {}", err);
            default_for(key)
        }
    }
}

/// Decode and validate `raw` for `key`.
pub fn parse_strict(raw: &str, key: FlagKey) -> Result<FlagValue, FlagError> {
    let value = match key {
        FlagKey::Favorite => FlagValue::Favorite(decode(raw)?),
        FlagKey::NoteEnabled => FlagValue::NoteEnabled(decode(raw)?),
        FlagKey::MonthViewType => FlagValue::MonthViewType(decode(raw)?),
        FlagKey::NumberCombine => FlagValue::NumberCombine(decode(raw)?),
        FlagKey::NumberProgressBounds => {
            FlagValue::NumberProgressBounds(ProgressMapper::new(decode(raw)?))
        }
        FlagKey::NumberColorCoding => FlagValue::NumberColorCoding(ColorMapper::new(decode(raw)?)),
        FlagKey::BooleanCheckedColor => FlagValue::BooleanCheckedColor(decode(raw)?),
        FlagKey::BooleanUncheckedColor => FlagValue::BooleanUncheckedColor(decode(raw)?),
    };
    Ok(value)
}

/// JSON of the input shape of `value`.
pub fn serialize(value: &FlagValue) -> Result<String, FlagError> {
    let raw = match value {
        FlagValue::Favorite(flag) | FlagValue::NoteEnabled(flag) => encode(flag)?,
        FlagValue::MonthViewType(view) => encode(view)?,
        FlagValue::NumberCombine(combine) => encode(combine)?,
        FlagValue::NumberProgressBounds(mapper) => encode(mapper.bounds())?,
        FlagValue::NumberColorCoding(mapper) => encode(mapper.coding())?,
        FlagValue::BooleanCheckedColor(pair) | FlagValue::BooleanUncheckedColor(pair) => {
            encode(pair)?
        }
    };
    Ok(raw)
}

fn decode<T: DeserializeOwned + Validate>(raw: &str) -> Result<T, FlagError> {
    let value: T = serde_json::from_str(raw)?;
    value.validate().map_err(FlagError::Invalid)?;
    Ok(value)
}

fn encode<T: Serialize + Validate>(value: &T) -> Result<String, FlagError> {
    value.validate().map_err(FlagError::Invalid)?;
    Ok(serde_json::to_string(value)?)
}
