use std::fmt;

use crate::error::{CalError, Result};

// ---------------------------------------------------------------------------
// Spectrum – one loaded detector trace
// ---------------------------------------------------------------------------

/// A single spectrometer trace indexed by detector pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Pixel axis (x), strictly increasing.
    pub x: Vec<f64>,
    /// Intensity axis (y) – same length as `x`.
    pub y: Vec<f64>,
}

impl Spectrum {
    /// Build from explicit pixel and intensity columns. Values must be
    /// finite and pixels strictly increasing.
    pub fn from_columns(x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if x.is_empty() {
            return Err(CalError::EmptyData);
        }
        if x.len() != y.len() {
            return Err(CalError::InvalidValue(format!(
                "pixel column has {} values but intensity has {}",
                x.len(),
                y.len()
            )));
        }
        check_finite("pixel", &x)?;
        check_finite("intensity", &y)?;
        if let Some(i) = x.windows(2).position(|w| w[1] <= w[0]) {
            return Err(CalError::InvalidValue(format!(
                "pixel axis must be strictly increasing (index {}: {} then {})",
                i + 1,
                x[i],
                x[i + 1]
            )));
        }
        Ok(Spectrum { x, y })
    }

    /// Build from intensities alone; pixels become `0..N-1`.
    pub fn from_intensities(y: Vec<f64>) -> Result<Self> {
        if y.is_empty() {
            return Err(CalError::EmptyData);
        }
        check_finite("intensity", &y)?;
        let x = (0..y.len()).map(|i| i as f64).collect();
        Ok(Spectrum { x, y })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// First and last pixel values.
    pub fn extent(&self) -> (f64, f64) {
        if self.is_empty() {
            return (0.0, 0.0);
        }
        (self.x[0], self.x[self.len() - 1])
    }

    /// Points with `low <= x < high`.
    pub fn windowed(&self, window: SelectionWindow) -> (Vec<f64>, Vec<f64>) {
        self.x
            .iter()
            .zip(&self.y)
            .filter(|&(&x, _)| x >= window.low && x < window.high)
            .map(|(&x, &y)| (x, y))
            .unzip()
    }
}

fn check_finite(name: &str, values: &[f64]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(CalError::InvalidValue(format!(
            "{name} value at index {i} is {}",
            values[i]
        ))),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// SelectionWindow – the pixel range handed to the peak fitter
// ---------------------------------------------------------------------------

/// A closed-open pixel range. Always stored with `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionWindow {
    pub low: f64,
    pub high: f64,
}

impl SelectionWindow {
    /// Bounds may come in either order; they are swapped if reversed.
    pub fn new(a: f64, b: f64) -> Self {
        SelectionWindow {
            low: a.min(b),
            high: a.max(b),
        }
    }

    /// Window of `width` centered on the middle of the spectrum's pixel axis.
    pub fn centered_on(spectrum: &Spectrum, width: f64) -> Self {
        let (first, last) = spectrum.extent();
        let mid = 0.5 * (first + last);
        SelectionWindow::new(mid - 0.5 * width, mid + 0.5 * width)
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.low + self.high)
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

impl fmt::Display for SelectionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}, {:.3})", self.low, self.high)
    }
}

// ---------------------------------------------------------------------------
// ReferenceEntry – one line of a reference catalog
// ---------------------------------------------------------------------------

/// A named reference line, e.g. `Ne I 585.249` or `cyclohexane 801.3`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEntry {
    pub label: String,
    pub value: f64,
}

impl ReferenceEntry {
    /// Parse `"<label><whitespace><value>"`. The value is the last
    /// whitespace-separated token, so labels may themselves contain spaces.
    pub fn parse(line: &str, line_no: usize) -> Result<Self> {
        let line = line.trim_end();
        let (label, value) = line
            .trim_start()
            .rsplit_once(char::is_whitespace)
            .ok_or_else(|| CalError::format(line_no, format!("expected '<label> <value>', got '{line}'")))?;
        let value = value
            .parse::<f64>()
            .map_err(|_| CalError::format(line_no, format!("'{value}' is not a number")))?;
        let label = label.trim_end();
        if label.is_empty() {
            return Err(CalError::format(line_no, "missing label"));
        }
        Ok(ReferenceEntry {
            label: label.to_string(),
            value,
        })
    }
}

impl fmt::Display for ReferenceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.label, self.value)
    }
}
