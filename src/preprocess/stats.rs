//! Small numeric helpers shared by the imputer and the pruner.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample variance (ddof = 1), `None` with fewer than two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Median; averages the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Error function, Abramowitz & Stegun 7.1.26 (|error| < 1.5e-7).
pub fn erf(x: f64) -> f64 {
    let a1 = 0.254_829_592;
    let a2 = -0.284_496_736;
    let a3 = 1.421_413_741;
    let a4 = -1.453_152_027;
    let a5 = 1.061_405_429;
    let p = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

pub fn normal_cdf(x: f64, mu: f64, sigma: f64) -> f64 {
    0.5 * (1.0 + erf((x - mu) / (sigma * std::f64::consts::SQRT_2)))
}

/// Outcome of a one-sample Kolmogorov–Smirnov test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// Two-sided KS test of `values` against N(`mu`, `sigma`).
///
/// Returns `None` for an empty sample or a non-positive `sigma`.
pub fn ks_test_normal(values: &[f64], mu: f64, sigma: f64) -> Option<KsResult> {
    if values.is_empty() || sigma <= 0.0 || !sigma.is_finite() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;

    let mut d: f64 = 0.0;
    for (i, &x) in sorted.iter().enumerate() {
        let cdf = normal_cdf(x, mu, sigma);
        let d_plus = (i as f64 + 1.0) / n - cdf;
        let d_minus = cdf - i as f64 / n;
        d = d.max(d_plus).max(d_minus);
    }

    Some(KsResult {
        statistic: d,
        p_value: kolmogorov_p_value(d, sorted.len()),
    })
}

/// Asymptotic p-value for statistic `d` with Stephens' small-sample correction.
pub fn kolmogorov_p_value(d: f64, n: usize) -> f64 {
    if n == 0 {
        return 1.0;
    }
    let sqrt_n = (n as f64).sqrt();
    let lambda = (sqrt_n + 0.12 + 0.11 / sqrt_n) * d;
    if lambda < 1e-3 {
        return 1.0;
    }

    let mut sum = 0.0;
    for j in 1..=100 {
        let j = j as f64;
        let term = (-2.0 * j * j * lambda * lambda).exp();
        sum += if j as u64 % 2 == 1 { term } else { -term };
        if term < 1e-12 {
            break;
        }
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

/// Pearson correlation; `None` when either side is constant or lengths differ.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= f64::EPSILON || syy <= f64::EPSILON {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_median_variance() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(mean(&v), Some(2.5));
        assert_eq!(median(&v), Some(2.5));
        assert_eq!(median(&[5.0, 1.0, 3.0]), Some(3.0));
        let var = sample_variance(&v).unwrap();
        assert!((var - 1.666_666_666).abs() < 1e-6);
        assert_eq!(sample_variance(&[1.0]), None);
    }

    #[test]
    fn test_normal_cdf() {
        assert!((normal_cdf(0.0, 0.0, 1.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.96, 0.0, 1.0) - 0.975).abs() < 1e-3);
        assert!((normal_cdf(-1.0, 0.0, 1.0) - 0.158_655).abs() < 1e-4);
    }

    #[test]
    fn test_kolmogorov_p_value_bounds() {
        assert_eq!(kolmogorov_p_value(0.0, 50), 1.0);
        // Large deviation on a large sample is decisively non-normal
        assert!(kolmogorov_p_value(0.3, 400) < 1e-6);
        // Moderate statistic on a small sample is not
        assert!(kolmogorov_p_value(0.1, 20) > 0.5);
    }

    #[test]
    fn test_ks_rejects_two_clusters() {
        // Two tight clusters far apart look nothing like a single normal
        let mut values = vec![0.0; 100];
        values.extend(vec![10.0; 100]);
        let mu = mean(&values).unwrap();
        let sigma = sample_std(&values).unwrap();
        let res = ks_test_normal(&values, mu, sigma).unwrap();
        assert!(res.p_value < 0.05);
        assert!(ks_test_normal(&values, mu, 0.0).is_none());
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        let z = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &z).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]), None);
    }
}
