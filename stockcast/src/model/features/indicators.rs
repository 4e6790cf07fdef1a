//! Technical indicator series used by the feature engine.
//!
//! # Conventions
//! - Inputs are plain slices ordered **oldest → newest**.
//! - Every function returns a series of the same length as its input, with
//!   `NaN` where the window is not yet satisfiable. Nothing reads ahead of
//!   the current index.
//! - A window containing `NaN` produces `NaN` (the row is later dropped).

pub mod ma;
pub mod momentum;
pub mod volatility;
pub mod volume;

/// Apply `f` over every full trailing window of `x`.
pub fn rolling_apply<F>(x: &[f64], window: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = vec![f64::NAN; x.len()];
    if window == 0 || x.len() < window {
        return out;
    }
    for end in window..=x.len() {
        let slice = &x[end - window..end];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[end - 1] = f(slice);
    }
    out
}

pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Standard deviation with `ddof` delta degrees of freedom (0 = population, 1 = sample).
pub fn std_dev(x: &[f64], ddof: usize) -> f64 {
    if x.len() <= ddof {
        return f64::NAN;
    }
    let m = mean(x);
    let ss: f64 = x.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (x.len() - ddof) as f64).sqrt()
}

pub fn rolling_mean(x: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(x, window, mean)
}

pub fn rolling_std(x: &[f64], window: usize, ddof: usize) -> Vec<f64> {
    rolling_apply(x, window, |w| std_dev(w, ddof))
}

pub fn rolling_max(x: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(x, window, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

pub fn rolling_min(x: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(x, window, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

/// Recursive exponential average (`y = (1-α)·y + α·x`), seeded with the first
/// non-NaN value and reported once `min_periods` observations were seen.
pub fn ewm(x: &[f64], alpha: f64, min_periods: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; x.len()];
    let mut state: Option<f64> = None;
    let mut seen = 0usize;
    for (i, &v) in x.iter().enumerate() {
        if !v.is_nan() {
            state = Some(match state {
                None => v,
                Some(prev) => prev * (1.0 - alpha) + v * alpha,
            });
            seen += 1;
        }
        if seen >= min_periods.max(1) {
            if let Some(s) = state {
                out[i] = s;
            }
        }
    }
    out
}

/// `x[i] / x[i - lag]`, NaN for the first `lag` entries.
pub fn ratio_to_lag(x: &[f64], lag: usize) -> Vec<f64> {
    (0..x.len())
        .map(|i| if i >= lag { x[i] / x[i - lag] } else { f64::NAN })
        .collect()
}

/// Percent change versus the previous value.
pub fn pct_change(x: &[f64]) -> Vec<f64> {
    ratio_to_lag(x, 1).into_iter().map(|r| r - 1.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_rolling_mean_warmup() {
        let s = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(s[0].is_nan() && s[1].is_nan());
        assert!(approx(s[2], 2.0));
        assert!(approx(s[3], 3.0));
    }

    #[test]
    fn test_rolling_skips_nan_windows() {
        let s = rolling_mean(&[f64::NAN, 2.0, 3.0, 4.0], 2);
        assert!(s[1].is_nan());
        assert!(approx(s[2], 2.5));
    }

    #[test]
    fn test_std_ddof() {
        let x = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx(std_dev(&x, 0), 2.0));
        assert!(approx(std_dev(&x, 1), (32.0f64 / 7.0).sqrt()));
    }

    #[test]
    fn test_ewm_seeded_with_first_value() {
        let s = ewm(&[f64::NAN, 10.0, 20.0, 20.0], 0.5, 2);
        assert!(s[0].is_nan());
        assert!(s[1].is_nan());
        assert!(approx(s[2], 15.0));
        assert!(approx(s[3], 17.5));
    }

    #[test]
    fn test_pct_change() {
        let s = pct_change(&[100.0, 110.0, 99.0]);
        assert!(s[0].is_nan());
        assert!(approx(s[1], 0.1));
        assert!(approx(s[2], -0.1));
    }
}
