use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 일봉 한 개
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl DailyBar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// DB 저장용 YYYYMMDD 정수
    pub fn date_key(&self) -> i64 {
        date_to_key(self.date)
    }
}

pub fn date_to_key(date: NaiveDate) -> i64 {
    date.format("%Y%m%d")
        .to_string()
        .parse::<i64>()
        .unwrap_or_default()
}

/// YYYYMMDD 정수를 날짜로 변환
pub fn key_to_date(key: i64) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&key.to_string(), "%Y%m%d").ok()
}

/// 날짜 오름차순 + 중복 날짜 없음 여부
pub fn is_strictly_ascending(bars: &[DailyBar]) -> bool {
    bars.windows(2).all(|w| w[0].date < w[1].date)
}
