/// Data layer: core types, loading, and calibration export.
///
/// Architecture:
/// ```text
///  .txt / .dat / .csv          catalog .txt
///        │                          │
///        ▼                          ▼
///   ┌──────────┐             ┌──────────────┐
///   │  loader   │  parse →   │ReferenceEntry│
///   └──────────┘             └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ Spectrum  │  pixel axis + intensities, SelectionWindow
///   └──────────┘
///        │   (fit + calibrate elsewhere)
///        ▼
///   ┌──────────┐
///   │  export   │  _nm.cal / _wavenumber.cal / _eV.cal / _fit.cal
///   └──────────┘
/// ```

pub mod export;
pub mod loader;
pub mod model;
