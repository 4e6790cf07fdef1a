//! Volatility indicators: Bollinger bands and Wilder ATR.

use super::{rolling_mean, rolling_std};

pub const BOLLINGER_WINDOW: usize = 20;
pub const BOLLINGER_DEV: f64 = 2.0;
pub const ATR_WINDOW: usize = 14;

#[derive(Debug, Clone)]
pub struct Bollinger {
    pub high: Vec<f64>,
    pub low: Vec<f64>,
}

/// mean ± 2 population std over 20 closes
pub fn bollinger(closes: &[f64]) -> Bollinger {
    let mid = rolling_mean(closes, BOLLINGER_WINDOW);
    let dev = rolling_std(closes, BOLLINGER_WINDOW, 0);
    let high = mid
        .iter()
        .zip(&dev)
        .map(|(m, d)| m + BOLLINGER_DEV * d)
        .collect();
    let low = mid
        .iter()
        .zip(&dev)
        .map(|(m, d)| m - BOLLINGER_DEV * d)
        .collect();
    Bollinger { high, low }
}

/// Wilder average true range. Entries before the first full window are 0,
/// the first full window is the plain mean of true range.
pub fn atr(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = close.len();
    let mut out = vec![0.0; n];
    if n < ATR_WINDOW {
        return out;
    }

    let true_range: Vec<f64> = (0..n)
        .map(|i| {
            let hl = high[i] - low[i];
            if i == 0 {
                hl
            } else {
                let prev = close[i - 1];
                hl.max((high[i] - prev).abs()).max((low[i] - prev).abs())
            }
        })
        .collect();

    let w = ATR_WINDOW as f64;
    out[ATR_WINDOW - 1] = true_range[..ATR_WINDOW].iter().sum::<f64>() / w;
    for i in ATR_WINDOW..n {
        out[i] = (out[i - 1] * (w - 1.0) + true_range[i]) / w;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bollinger_uses_population_std() {
        let closes: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 9.0 } else { 11.0 }).collect();
        let b = bollinger(&closes);
        // 평균 10, 모표준편차 1
        assert!((b.high[19] - 12.0).abs() < 1e-9);
        assert!((b.low[19] - 8.0).abs() < 1e-9);
        assert!(b.high[18].is_nan());
    }

    #[test]
    fn test_atr_constant_range() {
        let close = vec![10.0; 20];
        let high = vec![11.0; 20];
        let low = vec![9.0; 20];
        let a = atr(&high, &low, &close);
        assert_eq!(a[12], 0.0);
        assert!((a[13] - 2.0).abs() < 1e-12);
        assert!((a[19] - 2.0).abs() < 1e-12);
    }
}
