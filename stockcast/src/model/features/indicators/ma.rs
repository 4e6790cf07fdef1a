//! Trend indicators: moving averages, MACD, CCI.

use super::{ewm, mean, rolling_apply, rolling_mean};

pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const CCI_WINDOW: usize = 20;
pub const CCI_CONSTANT: f64 = 0.015;

/// Simple moving average series.
pub fn sma(closes: &[f64], window: usize) -> Vec<f64> {
    rolling_mean(closes, window)
}

/// Exponential moving average with K = 2/(n+1), seeded with the first close
/// and undefined until `window` observations.
pub fn ema(closes: &[f64], window: usize) -> Vec<f64> {
    let alpha = 2.0 / (window as f64 + 1.0);
    ewm(closes, alpha, window)
}

#[derive(Debug, Clone)]
pub struct Macd {
    /// ema_fast - ema_slow
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    /// line - signal
    pub histogram: Vec<f64>,
}

pub fn macd(closes: &[f64]) -> Macd {
    let fast = ema(closes, MACD_FAST);
    let slow = ema(closes, MACD_SLOW);
    let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema(&line, MACD_SIGNAL);
    let histogram = line.iter().zip(&signal).map(|(l, s)| l - s).collect();
    Macd {
        line,
        signal,
        histogram,
    }
}

/// Commodity Channel Index on typical price, mean absolute deviation in the denominator.
pub fn cci(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let typical: Vec<f64> = high
        .iter()
        .zip(low)
        .zip(close)
        .map(|((h, l), c)| (h + l + c) / 3.0)
        .collect();
    let sma_tp = rolling_mean(&typical, CCI_WINDOW);
    let mad = rolling_apply(&typical, CCI_WINDOW, |w| {
        let m = mean(w);
        w.iter().map(|v| (v - m).abs()).sum::<f64>() / w.len() as f64
    });
    typical
        .iter()
        .zip(sma_tp.iter().zip(&mad))
        .map(|(tp, (m, d))| (tp - m) / (CCI_CONSTANT * d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ema_warmup_and_seed() {
        let closes: Vec<f64> = (1..=30).map(|v| v as f64).collect();
        let e = ema(&closes, 12);
        assert!(e[10].is_nan());
        assert!(e[11].is_finite());

        // adjust=False 재귀식을 직접 계산한 값과 일치
        let alpha = 2.0 / 13.0;
        let mut expected = closes[0];
        for c in &closes[1..12] {
            expected = expected * (1.0 - alpha) + c * alpha;
        }
        assert!((e[11] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_macd_signal_warmup_is_33() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin()).collect();
        let m = macd(&closes);
        assert!(m.line[24].is_nan());
        assert!(m.line[25].is_finite());
        assert!(m.signal[32].is_nan());
        assert!(m.signal[33].is_finite());
        assert!((m.histogram[40] - (m.line[40] - m.signal[40])).abs() < 1e-12);
    }

    #[test]
    fn test_cci_constant_series_is_undefined() {
        let flat = vec![10.0; 25];
        let c = cci(&flat, &flat, &flat);
        assert!(!c[24].is_finite());
    }
}
