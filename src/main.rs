//! spectro-cal: calibrate a spectrometer pixel axis from a lamp spectrum.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;

use spectro_cal::data::export::ExportKind;
use spectro_cal::ui::console::{LogSink, PresetPaths};
use spectro_cal::{CalibrationApp, CalibrationConfig, CalibrationMode, CalibrationSession, PeakShape};

#[derive(Parser)]
#[command(
    name = "spectro-cal",
    version,
    about = "Fit lamp peaks, build a pixel calibration and export calibrated axes"
)]
struct Cli {
    /// Spectrum file: `intensity` or `pixel intensity` per line (.csv for comma-separated)
    spectrum: PathBuf,

    /// Reference catalog: `<label> <value>` per line
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Peak to fit, as LOW:HIGH=REF; REF is a value or a catalog label
    #[arg(short, long = "peak", value_name = "LOW:HIGH=REF", value_parser = PeakSpec::from_str)]
    peaks: Vec<PeakSpec>,

    /// Calibration model: linear (wavelength) or shift (Raman shift, cm⁻¹)
    #[arg(short, long, default_value = "linear")]
    mode: CalibrationMode,

    /// Peak shape; defaults to the configured one
    #[arg(short, long)]
    shape: Option<PeakShape>,

    /// Laser wavelength in nm
    #[arg(short, long)]
    laser: Option<f64>,

    /// Files to write: nm, wavenumber, ev, fit (repeat or comma-separate)
    #[arg(short, long, value_delimiter = ',', default_value = "nm,wavenumber,ev,fit")]
    export: Vec<ExportKind>,

    /// Write exports here instead of next to the spectrum
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the calibration report to stdout
    #[arg(long, default_value_t = false)]
    report: bool,
}

/// Reference side of a `--peak` argument.
#[derive(Debug, Clone, PartialEq)]
enum Reference {
    Value(f64),
    Label(String),
}

#[derive(Debug, Clone, PartialEq)]
struct PeakSpec {
    low: f64,
    high: f64,
    reference: Reference,
}

impl FromStr for PeakSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (range, reference) = s
            .split_once('=')
            .ok_or_else(|| format!("expected LOW:HIGH=REF, got '{s}'"))?;
        let (low, high) = range
            .split_once(':')
            .ok_or_else(|| format!("expected LOW:HIGH before '=', got '{range}'"))?;
        let bound = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| format!("'{v}' is not a number"))
        };
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(format!("missing reference after '=' in '{s}'"));
        }
        let reference = match reference.parse::<f64>() {
            Ok(v) => Reference::Value(v),
            Err(_) => Reference::Label(reference.to_string()),
        };
        Ok(PeakSpec {
            low: bound(low)?,
            high: bound(high)?,
            reference,
        })
    }
}

fn load_config(cli: &Cli) -> Result<CalibrationConfig> {
    let mut config = match &cli.config {
        Some(path) => CalibrationConfig::from_path(path)?,
        None => CalibrationConfig::default(),
    };
    if let Some(nm) = cli.laser {
        config.laser_wavelength_nm = nm;
    }
    if let Some(shape) = cli.shape {
        config.peak_shape = shape;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    log::info!("spectro-cal v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let mut prompt = PresetPaths::new().with_open("spectrum", &cli.spectrum);
    if let Some(catalog) = &cli.catalog {
        prompt = prompt.with_open("catalog", catalog);
    }
    if let Some(dir) = &cli.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
        prompt = prompt.with_output_dir(dir);
    }

    let mut app = CalibrationApp::new(CalibrationSession::new(config), LogSink::default(), prompt);

    app.open_spectrum().context("could not load the spectrum")?;
    if cli.catalog.is_some() {
        app.open_catalog().context("could not load the catalog")?;
    }

    for peak in &cli.peaks {
        app.set_window(peak.low, peak.high);
        app.fit_peak(None)
            .with_context(|| format!("peak fit in [{}, {}) failed", peak.low, peak.high))?;
        app.accept_peak().context("could not record the peak")?;
        let recorded = match &peak.reference {
            Reference::Value(v) => app.add_reference(*v),
            Reference::Label(label) => app.add_catalog_reference_by_label(label).map(|_| ()),
        };
        recorded.context("could not record the reference")?;
    }

    app.calibrate(cli.mode).context("calibration failed")?;
    if cli.report {
        if let Some(report) = app.session.calibration_report() {
            println!("{report}");
        }
    }

    let written = app.export_all(&cli.export).context("export failed")?;
    log::info!("wrote {} calibration file(s)", written.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_spec_with_value() {
        let peak: PeakSpec = "480:544=585.249".parse().unwrap();
        assert_eq!(
            peak,
            PeakSpec {
                low: 480.0,
                high: 544.0,
                reference: Reference::Value(585.249),
            }
        );
        let anti_stokes: PeakSpec = "10:20=-219".parse().unwrap();
        assert_eq!(anti_stokes.reference, Reference::Value(-219.0));
    }

    #[test]
    fn test_peak_spec_with_label() {
        let peak: PeakSpec = "137:167=Ne I 585".parse().unwrap();
        assert_eq!(peak.reference, Reference::Label("Ne I 585".to_string()));
    }

    #[test]
    fn test_peak_spec_errors() {
        assert!("480:544".parse::<PeakSpec>().is_err());
        assert!("480-544=1".parse::<PeakSpec>().is_err());
        assert!("a:544=1".parse::<PeakSpec>().is_err());
        assert!("480:544= ".parse::<PeakSpec>().is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "spectro-cal",
            "lamp.txt",
            "--peak",
            "480:544=600",
            "-p",
            "100:140=Ne 640",
            "--mode",
            "shift",
            "--export",
            "nm,fit",
        ])
        .unwrap();
        assert_eq!(cli.peaks.len(), 2);
        assert_eq!(cli.mode, CalibrationMode::Shift);
        assert_eq!(cli.export, vec![ExportKind::Nanometer, ExportKind::FitReport]);
        assert!(cli.shape.is_none());
    }
}
