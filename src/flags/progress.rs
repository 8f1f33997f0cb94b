use super::types::ProgressBounds;

/// Maps a value onto a 0..=100 progress percentage
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressMapper {
    bounds: ProgressBounds,
}

impl ProgressMapper {
    pub fn new(bounds: ProgressBounds) -> Self {
        Self { bounds }
    }

    /// The persisted input.
    pub fn bounds(&self) -> &ProgressBounds {
        &self.bounds
    }

    pub fn is_active(&self) -> bool {
        self.bounds.enabled && self.bounds.min.is_some() && self.bounds.max.is_some()
    }

    /// Percentage of `value` between the bounds, clamped.
    ///
    /// `None` unless enabled with both bounds set.
    pub fn map(&self, value: f64) -> Option<f64> {
        if !self.bounds.enabled {
            return None;
        }
        let (min, max) = (self.bounds.min?, self.bounds.max?);
        if max == min {
            return None;
        }
        let percent = (value - min) / (max - min) * 100.0;
        Some(percent.clamp(0.0, 100.0))
    }
}
