use crate::error::{CalError, Result};
use crate::fit::calibration::check_points;

// ---------------------------------------------------------------------------
// Calibration point lists
// ---------------------------------------------------------------------------

/// Two independently edited lists paired by index: fitted pixel positions and
/// reference values. They may differ in length while being built; the
/// pairing is only checked when a model is fit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationPoints {
    pixels: Vec<f64>,
    references: Vec<f64>,
}

impl CalibrationPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pixels(&self) -> &[f64] {
        &self.pixels
    }

    pub fn references(&self) -> &[f64] {
        &self.references
    }

    pub fn push_pixel(&mut self, pixel: f64) {
        self.pixels.push(pixel);
    }

    pub fn push_reference(&mut self, value: f64) {
        self.references.push(value);
    }

    pub fn remove_pixel(&mut self, index: usize) -> Result<f64> {
        remove_at(&mut self.pixels, index, "pixel")
    }

    pub fn remove_reference(&mut self, index: usize) -> Result<f64> {
        remove_at(&mut self.references, index, "reference")
    }

    pub fn clear_pixels(&mut self) {
        self.pixels.clear();
    }

    pub fn clear_references(&mut self) {
        self.references.clear();
    }

    /// Ready for fitting: equal lengths, at least two pairs.
    pub fn check_paired(&self) -> Result<()> {
        check_points(&self.pixels, &self.references)
    }

    /// Display strings for the pixel list.
    pub fn pixel_labels(&self) -> Vec<String> {
        self.pixels.iter().map(|p| format!("{p:.3}")).collect()
    }

    /// Display strings for the reference list.
    pub fn reference_labels(&self) -> Vec<String> {
        self.references.iter().map(|r| r.to_string()).collect()
    }
}

fn remove_at(list: &mut Vec<f64>, index: usize, name: &'static str) -> Result<f64> {
    if index >= list.len() {
        return Err(CalError::IndexOutOfRange {
            list: name,
            index,
            len: list.len(),
        });
    }
    Ok(list.remove(index))
}
