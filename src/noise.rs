use rand::Rng;

/// Default peak-to-peak noise for holds (±0.25 around the nominal value)
pub const DEFAULT_MAX_NOISE: f64 = 0.5;

/// Perturbs a pressure reading with uniform noise
///
/// Returns `pressure + (U(0,1) - 0.5) * max_noise`. A pressure of exactly
/// zero is returned unchanged so a depressurized line stays flat.
///
/// # Examples
/// ```
/// use pressure_graph::noise::add_noise;
///
/// let mut rng = rand::thread_rng();
/// assert_eq!(add_noise(&mut rng, 0.0, 0.5), 0.0);
/// let noisy = add_noise(&mut rng, 50.0, 0.5);
/// assert!((noisy - 50.0).abs() <= 0.25);
/// ```
pub fn add_noise<R: Rng + ?Sized>(rng: &mut R, pressure: f64, max_noise: f64) -> f64 {
    if pressure == 0.0 {
        return pressure;
    }
    pressure + (rng.gen_range(0.0..1.0) - 0.5) * max_noise
}

/// Uniform noise in `[-amplitude, amplitude)`
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, amplitude: f64) -> f64 {
    (rng.gen_range(0.0..1.0) - 0.5) * 2.0 * amplitude
}

/// Negative pressure is never emitted
pub fn clamp_pressure(pressure: f64) -> f64 {
    pressure.max(0.0)
}
