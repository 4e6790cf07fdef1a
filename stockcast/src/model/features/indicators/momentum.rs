//! Momentum oscillators: RSI, stochastic, Williams %R.

use super::{ewm, rolling_max, rolling_mean, rolling_min};

pub const RSI_WINDOW: usize = 14;
pub const STOCH_WINDOW: usize = 14;
pub const STOCH_SMOOTH: usize = 3;
pub const WILLIAMS_WINDOW: usize = 14;

/// Wilder RSI (α = 1/n). 100 when the average loss is zero.
pub fn rsi(closes: &[f64], window: usize) -> Vec<f64> {
    let mut up = vec![0.0; closes.len()];
    let mut down = vec![0.0; closes.len()];
    for i in 1..closes.len() {
        let diff = closes[i] - closes[i - 1];
        if diff > 0.0 {
            up[i] = diff;
        } else if diff < 0.0 {
            down[i] = -diff;
        }
    }

    let alpha = 1.0 / window as f64;
    let avg_up = ewm(&up, alpha, window);
    let avg_down = ewm(&down, alpha, window);

    avg_up
        .iter()
        .zip(&avg_down)
        .map(|(u, d)| {
            if *d == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + u / d)
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Stochastic {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn stochastic(high: &[f64], low: &[f64], close: &[f64]) -> Stochastic {
    let lowest = rolling_min(low, STOCH_WINDOW);
    let highest = rolling_max(high, STOCH_WINDOW);
    let k: Vec<f64> = close
        .iter()
        .zip(lowest.iter().zip(&highest))
        .map(|(c, (lo, hi))| 100.0 * (c - lo) / (hi - lo))
        .collect();
    let d = rolling_mean(&k, STOCH_SMOOTH);
    Stochastic { k, d }
}

pub fn williams_r(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let highest = rolling_max(high, WILLIAMS_WINDOW);
    let lowest = rolling_min(low, WILLIAMS_WINDOW);
    close
        .iter()
        .zip(highest.iter().zip(&lowest))
        .map(|(c, (hi, lo))| -100.0 * (hi - c) / (hi - lo))
        .collect()
}
