use serde::{Deserialize, Serialize};

/// Value bounds of one plotted dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisOptions {
    /// `[min, max]` in data units.
    pub range: [f32; 2],
    /// Draw the axis from `max` to `min` instead.
    #[serde(default)]
    pub flip_direction: bool,
}

impl AxisOptions {
    pub fn new(min: f32, max: f32) -> Self {
        Self {
            range: [min, max],
            flip_direction: false,
        }
    }

    pub fn flipped(mut self) -> Self {
        self.flip_direction = !self.flip_direction;
        self
    }

    /// The range in drawing order, reversed when the axis is flipped.
    pub fn oriented_range(&self) -> [f32; 2] {
        let [min, max] = self.range;
        if self.flip_direction {
            [max, min]
        } else {
            [min, max]
        }
    }

    /// True when the range cannot produce a usable projection.
    pub fn is_degenerate(&self) -> bool {
        let [min, max] = self.range;
        !min.is_finite() || !max.is_finite() || min == max
    }
}

impl Default for AxisOptions {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}
