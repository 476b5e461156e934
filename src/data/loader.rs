use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use super::model::{ReferenceEntry, Spectrum};
use crate::error::CalError;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a spectrum from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`      – comma-separated, no header
/// * anything else – whitespace-delimited text (`#` starts a comment)
///
/// Either way a row holds `intensity` or `pixel intensity`.
pub fn load_spectrum_file(path: &Path) -> Result<Spectrum> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let spectrum = match ext.as_str() {
        "csv" => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening {}", path.display()))?;
            parse_spectrum_csv(file)
        }
        _ => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            parse_spectrum_text(&text)
        }
    }
    .with_context(|| format!("loading spectrum {}", path.display()))?;

    log::debug!("{}: {} points", path.display(), spectrum.len());
    Ok(spectrum)
}

/// Load a reference catalog (`<label> <value>` per line).
pub fn load_catalog_file(path: &Path) -> Result<Vec<ReferenceEntry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    let entries =
        parse_catalog(&text).with_context(|| format!("parsing catalog {}", path.display()))?;
    log::debug!("{}: {} reference entries", path.display(), entries.len());
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Whitespace text
// ---------------------------------------------------------------------------

pub fn parse_spectrum_text(text: &str) -> Result<Spectrum, CalError> {
    let mut rows = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let values = content
            .split_whitespace()
            .map(|tok| parse_number(tok, line_no))
            .collect::<Result<Vec<f64>, CalError>>()?;
        rows.push((line_no, values));
    }
    rows_to_spectrum(rows)
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

pub fn parse_spectrum_csv<R: Read>(input: R) -> Result<Spectrum, CalError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            let line = e.position().map(|p| p.line() as usize).unwrap_or(i + 1);
            CalError::format(line, e.to_string())
        })?;
        let line_no = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(i + 1);
        if record.iter().all(str::is_empty) {
            continue;
        }
        let values = record
            .iter()
            .map(|tok| parse_number(tok, line_no))
            .collect::<Result<Vec<f64>, CalError>>()?;
        rows.push((line_no, values));
    }
    rows_to_spectrum(rows)
}

// ---------------------------------------------------------------------------
// Reference catalog
// ---------------------------------------------------------------------------

/// Parse catalog text. Blank lines are skipped; every other line must be
/// `<label><whitespace><value>`.
pub fn parse_catalog(text: &str) -> Result<Vec<ReferenceEntry>, CalError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| ReferenceEntry::parse(line, i + 1))
        .collect()
}

// -- helpers --

/// Only finite numbers: `nan`/`inf` parse as `f64` but are not data.
fn parse_number(tok: &str, line: usize) -> Result<f64, CalError> {
    match tok.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(CalError::format(line, format!("'{tok}' is not a finite number"))),
        Err(_) => Err(CalError::format(line, format!("'{tok}' is not a number"))),
    }
}

/// Turn parsed rows into a spectrum. All rows must have the column count of
/// the first row, which must be 1 (intensity) or 2 (pixel, intensity).
fn rows_to_spectrum(rows: Vec<(usize, Vec<f64>)>) -> Result<Spectrum, CalError> {
    let (first_line, first) = rows.first().ok_or(CalError::EmptyData)?;
    let columns = first.len();
    if columns != 1 && columns != 2 {
        return Err(CalError::format(
            *first_line,
            format!("expected 1 or 2 columns, found {columns}"),
        ));
    }
    if let Some((line, row)) = rows.iter().find(|(_, row)| row.len() != columns) {
        return Err(CalError::format(
            *line,
            format!("expected {columns} columns, found {}", row.len()),
        ));
    }

    if columns == 2 {
        if let Some(pair) = rows.windows(2).find(|pair| pair[1].1[0] <= pair[0].1[0]) {
            let ((_, prev), (line, row)) = (&pair[0], &pair[1]);
            return Err(CalError::format(
                *line,
                format!("pixel axis must be strictly increasing ({} then {})", prev[0], row[0]),
            ));
        }
    }

    if columns == 1 {
        Spectrum::from_intensities(rows.into_iter().map(|(_, row)| row[0]).collect())
    } else {
        let (x, y) = rows.into_iter().map(|(_, row)| (row[0], row[1])).unzip();
        Spectrum::from_columns(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_column_text() {
        let sp = parse_spectrum_text("10 1.5\n11 2.5\n12\t3.5\n").unwrap();
        assert_eq!(sp.x, vec![10.0, 11.0, 12.0]);
        assert_eq!(sp.y, vec![1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_one_column_text_gets_implicit_pixels() {
        let sp = parse_spectrum_text("# counts\n5\n6\n\n7\n8\n").unwrap();
        assert_eq!(sp.x, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(sp.y, vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_ragged_rows_fail_with_line_number() {
        let err = parse_spectrum_text("1 2\n3 4\n5\n").unwrap_err();
        assert!(matches!(err, CalError::InputFormat { line: 3, .. }), "{err:?}");
    }

    #[test]
    fn test_non_numeric_fails() {
        let err = parse_spectrum_text("1 2\n3 x\n").unwrap_err();
        assert!(matches!(err, CalError::InputFormat { line: 2, .. }));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let err = parse_spectrum_text("0 1\nnan 2\n2 3\n").unwrap_err();
        assert!(matches!(err, CalError::InputFormat { line: 2, .. }), "{err:?}");
        let err = parse_spectrum_text("0 1\ninf 2\n").unwrap_err();
        assert!(matches!(err, CalError::InputFormat { line: 2, .. }), "{err:?}");
        let err = parse_spectrum_text("4\n-infinity\n").unwrap_err();
        assert!(matches!(err, CalError::InputFormat { line: 2, .. }), "{err:?}");
        let err = parse_spectrum_csv("0,1\n1,NaN\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CalError::InputFormat { line: 2, .. }), "{err:?}");
    }

    #[test]
    fn test_decreasing_pixel_reports_file_line() {
        let err = parse_spectrum_text("# hdr\n1 1\n\n0 2\n").unwrap_err();
        assert!(matches!(err, CalError::InputFormat { line: 4, .. }), "{err:?}");
        let err = parse_spectrum_text("1 1\n# repeated pixel\n1 2\n").unwrap_err();
        assert!(matches!(err, CalError::InputFormat { line: 3, .. }), "{err:?}");
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(parse_spectrum_text(""), Err(CalError::EmptyData)));
        assert!(matches!(parse_spectrum_text("# nothing\n\n"), Err(CalError::EmptyData)));
    }

    #[test]
    fn test_three_columns_rejected() {
        assert!(matches!(
            parse_spectrum_text("1 2 3\n"),
            Err(CalError::InputFormat { line: 1, .. })
        ));
    }

    #[test]
    fn test_csv() {
        let sp = parse_spectrum_csv("100, 4.0\n101, 5.0\n102, 6.0\n".as_bytes()).unwrap();
        assert_eq!(sp.x, vec![100.0, 101.0, 102.0]);
        assert_eq!(sp.y, vec![4.0, 5.0, 6.0]);

        let err = parse_spectrum_csv("1,2\n3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CalError::InputFormat { line: 2, .. }), "{err:?}");
    }

    #[test]
    fn test_catalog() {
        let entries = parse_catalog("Ne 585.249\n\nNe 640.225\r\nsulfur anti-Stokes -219.1\n").unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].value, 640.225);
        assert_eq!(entries[2].label, "sulfur anti-Stokes");
        assert_eq!(entries[2].value, -219.1);

        let err = parse_catalog("Ne 585.249\nbroken\n").unwrap_err();
        assert!(matches!(err, CalError::InputFormat { line: 2, .. }));
    }

    #[test]
    fn test_load_file_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("lamp.txt");
        std::fs::write(&txt, "3.0\n4.0\n").unwrap();
        assert_eq!(load_spectrum_file(&txt).unwrap().len(), 2);

        let csv = dir.path().join("lamp.CSV");
        std::fs::write(&csv, "0,3.0\n1,4.0\n2,5.0\n").unwrap();
        assert_eq!(load_spectrum_file(&csv).unwrap().len(), 3);

        let bad = dir.path().join("bad.txt");
        std::fs::write(&bad, "1 2\n3\n").unwrap();
        let err = load_spectrum_file(&bad).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CalError>(),
            Some(CalError::InputFormat { line: 2, .. })
        ));
    }
}
