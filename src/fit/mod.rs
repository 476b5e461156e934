/// Fitting layer: the least-squares solver and the two model families built on it.
///
/// ```text
///   windowed spectrum ──► peak ──► PeakFit.center ─┐
///                          │                        │ (points)
///                          ▼                        ▼
///                         lm  ◄──────────────── calibration ──► CalibrationModel
/// ```

pub mod calibration;
pub mod lm;
pub mod peak;
