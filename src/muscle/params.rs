use serde::{Deserialize, Serialize};

/// Rest knob names in `rest_heights` order.
pub const REST_HEIGHT_NAMES: [&str; 4] = ["restHeightO", "restHeightOv", "restHeightIv", "restHeightI"];
/// Rest knob names in `rest_widths` order.
pub const REST_WIDTH_NAMES: [&str; 2] = ["restWidthOv", "restWidthIv"];

const REST_KNOB_DEFAULT: f64 = 1.0;
const REST_KNOB_MIN: f64 = 0.0;

/// User-facing knobs of a muscle. Everything except the attachments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuscleParams {
    pub calculate_volume: bool,
    /// Local `(span, up, out)` displacement of the origin volume station.
    pub origin_offset: [f64; 3],
    /// Local displacement of the insertion volume station. Z is mirrored.
    pub insertion_offset: [f64; 3],
    pub origin_lock: bool,
    pub insertion_lock: bool,
    /// `[origin, originVolume, insertionVolume, insertion]`
    pub rest_heights: [f64; 4],
    /// `[originVolume, insertionVolume]`
    pub rest_widths: [f64; 2],
}

impl Default for MuscleParams {
    fn default() -> Self {
        Self {
            calculate_volume: false,
            origin_offset: [0.0; 3],
            insertion_offset: [0.0; 3],
            origin_lock: false,
            insertion_lock: false,
            rest_heights: [REST_KNOB_DEFAULT; 4],
            rest_widths: [REST_KNOB_DEFAULT; 2],
        }
    }
}

impl MuscleParams {
    #[must_use]
    pub const fn with_volume(mut self, calculate_volume: bool) -> Self {
        self.calculate_volume = calculate_volume;
        self
    }

    #[must_use]
    pub const fn with_origin_offset(mut self, offset: [f64; 3]) -> Self {
        self.origin_offset = offset;
        self
    }

    #[must_use]
    pub const fn with_insertion_offset(mut self, offset: [f64; 3]) -> Self {
        self.insertion_offset = offset;
        self
    }

    #[must_use]
    pub const fn with_locks(mut self, origin_lock: bool, insertion_lock: bool) -> Self {
        self.origin_lock = origin_lock;
        self.insertion_lock = insertion_lock;
        self
    }

    #[must_use]
    pub const fn with_rest_heights(mut self, heights: [f64; 4]) -> Self {
        self.rest_heights = heights;
        self
    }

    #[must_use]
    pub const fn with_rest_widths(mut self, widths: [f64; 2]) -> Self {
        self.rest_widths = widths;
        self
    }

    /// `[originLock, insertionLock]` as host integers.
    #[must_use]
    pub const fn locks(&self) -> [i32; 2] {
        [self.origin_lock as i32, self.insertion_lock as i32]
    }

    /// Host attribute names whose value differs between `self` and `other`.
    #[must_use]
    pub fn changed_attributes(&self, other: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.calculate_volume != other.calculate_volume {
            changed.push("calculateVolume");
        }
        if self.origin_offset != other.origin_offset {
            changed.push("originVectorPt");
        }
        if self.insertion_offset != other.insertion_offset {
            changed.push("insertionVectorPt");
        }
        if self.origin_lock != other.origin_lock {
            changed.push("originVectorLock");
        }
        if self.insertion_lock != other.insertion_lock {
            changed.push("insertionVectorLock");
        }
        for (i, name) in REST_HEIGHT_NAMES.into_iter().enumerate() {
            if self.rest_heights[i].to_bits() != other.rest_heights[i].to_bits() {
                changed.push(name);
            }
        }
        for (i, name) in REST_WIDTH_NAMES.into_iter().enumerate() {
            if self.rest_widths[i].to_bits() != other.rest_widths[i].to_bits() {
                changed.push(name);
            }
        }
        changed
    }

    /// Clamps rest knobs to their minimum and replaces non-finite offsets and
    /// knobs with their defaults. Each adjustment produces a warning.
    #[must_use]
    pub fn sanitized(&self) -> (Self, Vec<String>) {
        let mut params = *self;
        let mut warnings = Vec::new();

        for (value, name) in params.rest_heights.iter_mut().zip(REST_HEIGHT_NAMES) {
            sanitize_knob(value, name, &mut warnings);
        }
        for (value, name) in params.rest_widths.iter_mut().zip(REST_WIDTH_NAMES) {
            sanitize_knob(value, name, &mut warnings);
        }

        for (offset, name) in [
            (&mut params.origin_offset, "originVectorPt"),
            (&mut params.insertion_offset, "insertionVectorPt"),
        ] {
            if offset.iter().any(|c| !c.is_finite()) {
                *offset = [0.0; 3];
                warnings.push(format!("{name} is not finite; using zero offset"));
            }
        }

        for warning in &warnings {
            log::warn!("{warning}");
        }
        (params, warnings)
    }
}

fn sanitize_knob(value: &mut f64, name: &str, warnings: &mut Vec<String>) {
    if !value.is_finite() {
        warnings.push(format!("{name} is not finite; using {REST_KNOB_DEFAULT}"));
        *value = REST_KNOB_DEFAULT;
    } else if *value < REST_KNOB_MIN {
        warnings.push(format!("{name} = {value} is below {REST_KNOB_MIN}; clamped"));
        *value = REST_KNOB_MIN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_host_attributes() {
        let params = MuscleParams::default();
        assert!(!params.calculate_volume);
        assert_eq!(params.rest_heights, [1.0; 4]);
        assert_eq!(params.rest_widths, [1.0; 2]);
        assert_eq!(params.locks(), [0, 0]);
    }

    #[test]
    fn negative_knobs_are_clamped_with_warnings() {
        let params = MuscleParams::default()
            .with_rest_heights([1.0, -0.5, 2.0, f64::NAN])
            .with_rest_widths([-3.0, 0.25]);
        let (clean, warnings) = params.sanitized();

        assert_eq!(clean.rest_heights, [1.0, 0.0, 2.0, 1.0]);
        assert_eq!(clean.rest_widths, [0.0, 0.25]);
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("restHeightOv"));
    }

    #[test]
    fn changed_attributes_use_host_names() {
        let base = MuscleParams::default();
        let edited = base
            .with_locks(true, false)
            .with_rest_widths([1.0, 2.0])
            .with_insertion_offset([0.0, 0.0, 1.0]);
        assert_eq!(
            base.changed_attributes(&edited),
            vec!["insertionVectorPt", "originVectorLock", "restWidthIv"]
        );
        assert!(base.changed_attributes(&base).is_empty());
    }

    #[test]
    fn non_finite_offsets_fall_back_to_zero() {
        let params = MuscleParams::default().with_origin_offset([f64::INFINITY, 0.0, 1.0]);
        let (clean, warnings) = params.sanitized();
        assert_eq!(clean.origin_offset, [0.0; 3]);
        assert_eq!(warnings.len(), 1);
    }
}
