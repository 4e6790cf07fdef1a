/// On-balance volume. A bar adds its volume unless its close is below the
/// previous close; the first bar counts as an addition.
pub fn obv(close: &[f64], volume: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    close
        .iter()
        .zip(volume)
        .enumerate()
        .map(|(i, (c, v))| {
            if i > 0 && *c < close[i - 1] {
                total -= v;
            } else {
                total += v;
            }
            total
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obv_direction() {
        let close = [10.0, 11.0, 10.5, 10.5];
        let volume = [100.0, 50.0, 30.0, 20.0];
        assert_eq!(obv(&close, &volume), vec![100.0, 150.0, 120.0, 140.0]);
    }
}
