//! Input shapes of the flag values, as persisted

use serde::{Deserialize, Serialize};

/// Checks a decoded input beyond what serde enforces.
pub trait Validate {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl Validate for bool {}

/// A light/dark color variant pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPair {
    pub lighter: String,
    pub darker: String,
}

impl ColorPair {
    pub fn new(lighter: &str, darker: &str) -> Self {
        Self {
            lighter: lighter.to_string(),
            darker: darker.to_string(),
        }
    }

    /// Shown where no color applies
    pub fn neutral() -> Self {
        Self::new("#e5e7eb", "#374151")
    }

    pub fn checked() -> Self {
        Self::new("#86efac", "#15803d")
    }
}

impl Validate for ColorPair {
    fn validate(&self) -> Result<(), String> {
        for color in [&self.lighter, &self.darker] {
            if !is_hex_color(color) {
                return Err(format!("not a #rrggbb color: {}", color));
            }
        }
        Ok(())
    }
}

pub(crate) fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonthViewType {
    #[default]
    Calendar,
    List,
}

impl Validate for MonthViewType {}

/// How several values on one day collapse into one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberCombine {
    #[default]
    Sum,
    Last,
    Average,
}

impl NumberCombine {
    /// Combine `values`, given in chronological order.
    pub fn combine(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match self {
            NumberCombine::Sum => Some(values.iter().sum()),
            NumberCombine::Last => values.last().copied(),
            NumberCombine::Average => Some(values.iter().sum::<f64>() / values.len() as f64),
        }
    }
}

impl Validate for NumberCombine {}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressBounds {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Validate for ProgressBounds {
    fn validate(&self) -> Result<(), String> {
        for bound in [self.min, self.max].into_iter().flatten() {
            if !bound.is_finite() {
                return Err(format!("bound is not finite: {}", bound));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min >= max {
                return Err(format!("min {} is not below max {}", min, max));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub value: f64,
    pub color: ColorPair,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColorCoding {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub stops: Vec<ColorStop>,
}

impl Validate for ColorCoding {
    fn validate(&self) -> Result<(), String> {
        for stop in &self.stops {
            if !stop.value.is_finite() {
                return Err(format!("stop value is not finite: {}", stop.value));
            }
            stop.color.validate()?;
        }
        Ok(())
    }
}
