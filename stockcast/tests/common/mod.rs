#![allow(dead_code)]

use chrono::{Datelike, Duration, NaiveDate};
use stockcast::utility::config::Config;
use stockcast::utility::types::DailyBar;

pub fn first_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 3).unwrap()
}

/// 평일만 포함하는 합성 일봉. phase로 종목마다 모양을 다르게 한다
pub fn weekday_bars(n: usize, phase: f64) -> Vec<DailyBar> {
    weekday_bars_from(first_day(), n, |t| {
        100.0 + t * 0.15 + (t * 0.29 + phase).sin() * 4.0
    })
}

pub fn weekday_bars_from(start: NaiveDate, n: usize, close_at: impl Fn(f64) -> f64) -> Vec<DailyBar> {
    let mut bars = Vec::with_capacity(n);
    let mut date = start;
    let mut i = 0;
    while bars.len() < n {
        if date.weekday().num_days_from_monday() < 5 {
            let t = i as f64;
            let close = close_at(t);
            let open = close - (t * 0.13).cos() * 0.8;
            let high = open.max(close) + 1.0 + (t * 0.05).sin().abs();
            let low = open.min(close) - 1.0 - (t * 0.07).cos().abs();
            let volume = 2_000_000.0 + (t * 0.21).sin() * 300_000.0;
            bars.push(DailyBar::new(date, open, high, low, close, volume));
            i += 1;
        }
        date += Duration::days(1);
    }
    bars
}

/// 테스트용 작은 모델 설정
pub fn tiny_config(symbols: &[&str], artifact_dir: &str, last_day: NaiveDate) -> Config {
    let mut config = Config::default();
    config.model.hidden_size = 8;
    config.model.num_layers = 1;
    config.model.dropout = 0.1;
    config.model.sequence_length = 10;
    config.training.symbols = symbols.iter().map(|s| s.to_string()).collect();
    config.training.start_date = first_day();
    config.training.end_date = last_day;
    config.training.batch_size = 32;
    config.training.max_epochs = 2;
    config.artifacts.dir = artifact_dir.to_string();
    config
}
