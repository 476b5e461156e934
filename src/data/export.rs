use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Calibration file naming
// ---------------------------------------------------------------------------

/// The four calibration files written next to the loaded spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Nanometer,
    Wavenumber,
    ElectronVolt,
    FitReport,
}

impl ExportKind {
    pub const ALL: [ExportKind; 4] = [
        ExportKind::Nanometer,
        ExportKind::Wavenumber,
        ExportKind::ElectronVolt,
        ExportKind::FitReport,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            ExportKind::Nanometer => "_nm.cal",
            ExportKind::Wavenumber => "_wavenumber.cal",
            ExportKind::ElectronVolt => "_eV.cal",
            ExportKind::FitReport => "_fit.cal",
        }
    }
}

impl std::str::FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nm" | "nanometer" => Ok(ExportKind::Nanometer),
            "wavenumber" | "cm-1" => Ok(ExportKind::Wavenumber),
            "ev" => Ok(ExportKind::ElectronVolt),
            "fit" | "report" => Ok(ExportKind::FitReport),
            other => Err(format!("unknown export kind '{other}' (nm, wavenumber, ev, fit)")),
        }
    }
}

/// `dir/lamp.txt` + `_nm.cal` → `dir/lamp_nm.cal`.
pub fn export_path(spectrum_path: &Path, kind: ExportKind) -> PathBuf {
    let stem = spectrum_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    spectrum_path.with_file_name(format!("{stem}{}", kind.suffix()))
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Format like C's `%.4e`: four decimals, signed exponent of at least two digits.
pub fn format_sci(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let raw = format!("{value:.4e}");
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => raw,
    }
}

/// One value per line.
pub fn render_column(values: &[f64]) -> String {
    let mut out = String::with_capacity(values.len() * 12);
    for &v in values {
        let _ = writeln!(out, "{}", format_sci(v));
    }
    out
}

pub fn write_column(path: &Path, values: &[f64]) -> Result<()> {
    std::fs::write(path, render_column(values))?;
    Ok(())
}

pub fn write_report(path: &Path, report: &str) -> Result<()> {
    std::fs::write(path, report)?;
    Ok(())
}
