//! Log-normal transaction amounts.

use std::f64::consts::PI;

use super::stream::{DeterministicStream, Lane};

/// Smallest amount ever emitted (one cent).
pub const MIN_AMOUNT: f64 = 0.01;

/// Largest amount a job may be able to emit. Cent rounding is exact below it.
pub const MAX_AMOUNT: f64 = 1e13;

/// Bound on `|standard_normal|`: its uniforms are never below 2^-53.
pub const MAX_ABS_Z: f64 = 8.6;

/// Standard normal draw for a row via Box-Muller on two keyed uniforms.
pub fn standard_normal(stream: &DeterministicStream, index: u64) -> f64 {
    let (u1, u2) = stream.uniform_pair(index, Lane::Amount);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Draw `exp(mu + sigma * z)` for a row, unrounded. Always > 0.
pub fn sample_raw(stream: &DeterministicStream, index: u64, mu: f64, sigma: f64) -> f64 {
    (mu + sigma * standard_normal(stream, index)).exp()
}

/// Round to cents, never below one cent, so amounts stay strictly positive.
pub fn to_cents(amount: f64) -> f64 {
    ((amount * 100.0).round() / 100.0).max(MIN_AMOUNT)
}

/// `sample(seed, index, mu, sigma)`: the amount for a row, in currency units rounded to cents.
pub fn sample(seed: u64, index: u64, mu: f64, sigma: f64) -> f64 {
    to_cents(sample_raw(&DeterministicStream::new(seed), index, mu, sigma))
}

/// Largest amount `exp(mu + sigma * z) * multiplier` can reach for any row.
pub fn amount_ceiling(mu: f64, sigma: f64, multiplier: f64) -> f64 {
    (mu + MAX_ABS_Z * sigma).exp() * multiplier
}

/// Whether every amount drawn with these parameters stays at or under `MAX_AMOUNT`.
pub fn amounts_bounded(mu: f64, sigma: f64, multiplier: f64) -> bool {
    amount_ceiling(mu, sigma, multiplier) <= MAX_AMOUNT
}

/// Mean and variance of the log-normal law with parameters `mu`, `sigma`.
pub fn lognormal_moments(mu: f64, sigma: f64) -> (f64, f64) {
    let s2 = sigma * sigma;
    let mean = (mu + s2 / 2.0).exp();
    let variance = (s2.exp() - 1.0) * (2.0 * mu + s2).exp();
    (mean, variance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amounts_strictly_positive() {
        for i in 0..10_000 {
            // Very negative mu pushes raw draws well under a cent
            assert!(sample(3, i, -10.0, 2.0) > 0.0);
            assert!(sample(3, i, 3.0, 1.0) > 0.0);
        }
    }

    #[test]
    fn test_sample_is_reproducible() {
        assert_eq!(sample(11, 500, 3.5, 1.1), sample(11, 500, 3.5, 1.1));
        assert_ne!(sample(11, 500, 3.5, 1.1), sample(12, 500, 3.5, 1.1));
    }

    #[test]
    fn test_standard_normal_moments() {
        let stream = DeterministicStream::new(77);
        let n = 100_000;
        let draws: Vec<f64> = (0..n).map(|i| standard_normal(&stream, i)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.02, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.03, "variance {}", var);
    }

    #[test]
    fn test_lognormal_converges() {
        let (mu, sigma) = (3.0, 0.5);
        let stream = DeterministicStream::new(1234);
        let n = 100_000;
        let draws: Vec<f64> = (0..n).map(|i| sample_raw(&stream, i, mu, sigma)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;

        let (expected_mean, expected_var) = lognormal_moments(mu, sigma);
        let mean_err = (mean - expected_mean).abs() / expected_mean;
        let var_err = (var - expected_var).abs() / expected_var;
        assert!(mean_err < 0.02, "mean {} vs {}", mean, expected_mean);
        assert!(var_err < 0.10, "variance {} vs {}", var, expected_var);
    }

    #[test]
    fn test_max_abs_z_covers_extreme_uniform() {
        let smallest = 1.0 / (1u64 << 53) as f64;
        assert!((-2.0 * smallest.ln()).sqrt() <= MAX_ABS_Z);
    }

    #[test]
    fn test_amount_bounds() {
        assert!(amounts_bounded(3.5, 1.1, 8.0));
        assert!(!amounts_bounded(800.0, 1.0, 1.0));
        assert!(!amounts_bounded(f64::MAX, 1.0, 1.0));
        // Fine on its own, too large once spiked
        assert!(amounts_bounded(20.0, 1.1, 1.0));
        assert!(!amounts_bounded(20.0, 1.1, 8.0));
    }

    #[test]
    fn test_bounded_parameters_give_finite_amounts() {
        let (mu, sigma) = (20.0, 1.1);
        assert!(amounts_bounded(mu, sigma, 1.0));
        for i in 0..10_000 {
            let amount = sample(5, i, mu, sigma);
            assert!(amount.is_finite() && amount <= MAX_AMOUNT);
        }
    }

    #[test]
    fn test_to_cents() {
        assert_eq!(to_cents(12.345_6), 12.35);
        assert_eq!(to_cents(0.000_1), MIN_AMOUNT);
    }
}
