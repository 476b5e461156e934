//! Writes a synthetic neon-lamp spectrum and its reference line catalog.
//!
//! Usage: `generate_sample [OUTPUT_DIR]` (defaults to the current directory).

use std::fmt::Write as _;
use std::path::PathBuf;

/// Neon emission lines (nm) between 570 and 672 nm, with relative strengths.
const NEON_LINES: [(f64, f64); 14] = [
    (585.249, 900.0),
    (588.190, 350.0),
    (594.483, 520.0),
    (597.553, 160.0),
    (603.000, 140.0),
    (607.434, 310.0),
    (609.616, 420.0),
    (614.306, 640.0),
    (616.359, 260.0),
    (621.728, 180.0),
    (626.650, 470.0),
    (633.443, 610.0),
    (640.225, 980.0),
    (650.653, 720.0),
];

/// Dispersion used to place the lines on the detector: λ = SLOPE·px + INTERCEPT.
const SLOPE_NM_PER_PIXEL: f64 = 0.1;
const INTERCEPT_NM: f64 = 570.0;

const PIXELS: usize = 1024;
const LINE_SIGMA_PIXELS: f64 = 2.5;
const BASELINE: f64 = 50.0;
const NOISE: f64 = 1.5;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn pixel_of(wavelength_nm: f64) -> f64 {
    (wavelength_nm - INTERCEPT_NM) / SLOPE_NM_PER_PIXEL
}

fn generate_spectrum(rng: &mut SimpleRng) -> Vec<f64> {
    (0..PIXELS)
        .map(|px| {
            let x = px as f64;
            let signal: f64 = NEON_LINES
                .iter()
                .map(|&(nm, amp)| gaussian(x, pixel_of(nm), LINE_SIGMA_PIXELS, amp))
                .sum();
            BASELINE + signal + rng.gauss(0.0, NOISE)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir).expect("Failed to create output directory");

    let mut rng = SimpleRng::new(42);
    let intensities = generate_spectrum(&mut rng);

    let mut spectrum = String::from("# pixel intensity\n");
    for (px, y) in intensities.iter().enumerate() {
        let _ = writeln!(spectrum, "{px} {y:.3}");
    }
    let spectrum_path = out_dir.join("neon_lamp.txt");
    std::fs::write(&spectrum_path, spectrum).expect("Failed to write spectrum");

    let mut catalog = String::new();
    for &(nm, _) in &NEON_LINES {
        let _ = writeln!(catalog, "Ne I {nm:.0} {nm:.3}");
    }
    let catalog_path = out_dir.join("neon_lines.txt");
    std::fs::write(&catalog_path, catalog).expect("Failed to write catalog");

    println!(
        "Wrote {PIXELS}-pixel spectrum to {} and {} reference lines to {}",
        spectrum_path.display(),
        NEON_LINES.len(),
        catalog_path.display()
    );
    println!(
        "Try: spectro-cal {} --catalog {} --peak {:.0}:{:.0}=\"Ne I 585\" --peak {:.0}:{:.0}=\"Ne I 640\" --peak {:.0}:{:.0}=\"Ne I 651\"",
        spectrum_path.display(),
        catalog_path.display(),
        pixel_of(585.249) - 15.0,
        pixel_of(585.249) + 15.0,
        pixel_of(640.225) - 15.0,
        pixel_of(640.225) + 15.0,
        pixel_of(650.653) - 15.0,
        pixel_of(650.653) + 15.0,
    );
}
