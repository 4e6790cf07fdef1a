pub mod indicators;

use chrono::{Datelike, NaiveDate};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::utility::errors::{StockcastError, StockcastResult};
use crate::utility::policy::MIN_FEATURE_BARS;
use crate::utility::types::bar::{is_strictly_ascending, DailyBar};

use indicators::ma::{self, MACD_SIGNAL, MACD_SLOW};
use indicators::{momentum, pct_change, ratio_to_lag, rolling_std, volatility, volume};

/// 모델 입력 특징 컬럼 (이 순서가 곧 스키마)
pub const FEATURE_COLUMNS: [&str; 39] = [
    "open",
    "high",
    "low",
    "volume",
    "returns",
    "log_returns",
    "high_low_ratio",
    "open_close_ratio",
    "volume_change",
    "price_volume",
    "sma_5",
    "sma_10",
    "sma_20",
    "sma_30",
    "ema_12",
    "ema_26",
    "macd",
    "macd_signal",
    "rsi",
    "bb_high",
    "bb_low",
    "bb_width",
    "stoch_k",
    "stoch_d",
    "atr",
    "cci",
    "williams_r",
    "obv",
    "price_position",
    "volatility_5",
    "volatility_10",
    "volatility_20",
    "momentum_5",
    "momentum_10",
    "momentum_20",
    "gap",
    "day_of_week",
    "month",
    "quarter",
];

/// 정상 데이터 기준 앞부분에서 버려지는 행 수 (MACD 시그널 선이 가장 늦게 정의됨)
pub const WARMUP_ROWS: usize = (MACD_SLOW - 1) + (MACD_SIGNAL - 1);

/// 순서가 있는 특징 컬럼 이름 목록. 아티팩트에 저장되고 추론 때마다 비교된다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::standard()
    }
}

impl FeatureSchema {
    pub fn standard() -> Self {
        Self {
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// 알고 있는 컬럼 이름으로만 구성된 스키마 생성
    pub fn from_columns(columns: Vec<String>) -> StockcastResult<Self> {
        if columns.is_empty() {
            return Err(StockcastError::artifact_mismatch(
                "feature_columns",
                "빈 특징 스키마",
            ));
        }
        for column in &columns {
            if !FEATURE_COLUMNS.contains(&column.as_str()) {
                return Err(StockcastError::artifact_mismatch(
                    "feature_columns",
                    format!("알 수 없는 특징: {}", column),
                ));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// 이름과 순서가 정확히 같아야 함
    pub fn ensure_matches(&self, expected: &FeatureSchema) -> StockcastResult<()> {
        if self.columns.len() != expected.columns.len() {
            return Err(StockcastError::artifact_mismatch(
                "feature_columns",
                format!(
                    "특징 개수 불일치: {} != {}",
                    self.columns.len(),
                    expected.columns.len()
                ),
            ));
        }
        if let Some((i, (got, want))) = self
            .columns
            .iter()
            .zip(&expected.columns)
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            return Err(StockcastError::artifact_mismatch(
                "feature_columns",
                format!("{}번째 특징 불일치: {} != {}", i, got, want),
            ));
        }
        Ok(())
    }
}

/// 한 종목의 특징 테이블 (날짜 오름차순, 결측 없음)
#[derive(Debug, Clone)]
pub struct FeatureTable {
    symbol: String,
    schema: FeatureSchema,
    dates: Vec<NaiveDate>,
    features: Array2<f64>,
    close: Array1<f64>,
}

impl FeatureTable {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// (행 × 특징) 행렬
    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    /// 학습 타깃으로 쓰이는 원본 종가
    pub fn close(&self) -> &Array1<f64> {
        &self.close
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close.last().copied()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// 컬럼 이름별 계산에 필요한 원본/중간 시계열
struct SeriesBundle {
    dates: Vec<NaiveDate>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
    returns: Vec<f64>,
    macd: ma::Macd,
    bollinger: volatility::Bollinger,
    stochastic: momentum::Stochastic,
}

impl SeriesBundle {
    fn new(bars: &[DailyBar]) -> Self {
        let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
        Self {
            dates: bars.iter().map(|b| b.date).collect(),
            open: bars.iter().map(|b| b.open).collect(),
            high: bars.iter().map(|b| b.high).collect(),
            low: bars.iter().map(|b| b.low).collect(),
            volume: bars.iter().map(|b| b.volume).collect(),
            returns: pct_change(&close),
            macd: ma::macd(&close),
            bollinger: volatility::bollinger(&close),
            stochastic: momentum::stochastic(
                &bars.iter().map(|b| b.high).collect::<Vec<_>>(),
                &bars.iter().map(|b| b.low).collect::<Vec<_>>(),
                &close,
            ),
            close,
        }
    }

    fn zip_map(a: &[f64], b: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
        a.iter().zip(b).map(|(x, y)| f(*x, *y)).collect()
    }

    fn calendar(&self, f: impl Fn(&NaiveDate) -> u32) -> Vec<f64> {
        self.dates.iter().map(|d| f(d) as f64).collect()
    }

    /// 컬럼 이름으로 특징 시계열 계산
    fn column(&self, name: &str) -> Option<Vec<f64>> {
        let column = match name {
            "open" => self.open.clone(),
            "high" => self.high.clone(),
            "low" => self.low.clone(),
            "volume" => self.volume.clone(),
            "returns" => self.returns.clone(),
            "log_returns" => ratio_to_lag(&self.close, 1)
                .into_iter()
                .map(f64::ln)
                .collect(),
            "high_low_ratio" => Self::zip_map(&self.high, &self.low, |h, l| h / l),
            "open_close_ratio" => Self::zip_map(&self.open, &self.close, |o, c| o / c),
            "volume_change" => pct_change(&self.volume),
            "price_volume" => Self::zip_map(&self.close, &self.volume, |c, v| c * v),

            "sma_5" => ma::sma(&self.close, 5),
            "sma_10" => ma::sma(&self.close, 10),
            "sma_20" => ma::sma(&self.close, 20),
            "sma_30" => ma::sma(&self.close, 30),
            "ema_12" => ma::ema(&self.close, 12),
            "ema_26" => ma::ema(&self.close, 26),
            "macd" => self.macd.histogram.clone(),
            "macd_signal" => self.macd.signal.clone(),
            "rsi" => momentum::rsi(&self.close, momentum::RSI_WINDOW),

            "bb_high" => self.bollinger.high.clone(),
            "bb_low" => self.bollinger.low.clone(),
            "bb_width" => Self::zip_map(&self.bollinger.high, &self.bollinger.low, |h, l| h - l),
            "stoch_k" => self.stochastic.k.clone(),
            "stoch_d" => self.stochastic.d.clone(),
            "atr" => volatility::atr(&self.high, &self.low, &self.close),
            "cci" => ma::cci(&self.high, &self.low, &self.close),
            "williams_r" => momentum::williams_r(&self.high, &self.low, &self.close),
            "obv" => volume::obv(&self.close, &self.volume),

            "price_position" => self
                .close
                .iter()
                .zip(self.high.iter().zip(&self.low))
                .map(|(c, (h, l))| (c - l) / (h - l))
                .collect(),
            "volatility_5" => rolling_std(&self.returns, 5, 1),
            "volatility_10" => rolling_std(&self.returns, 10, 1),
            "volatility_20" => rolling_std(&self.returns, 20, 1),
            "momentum_5" => ratio_to_lag(&self.close, 5),
            "momentum_10" => ratio_to_lag(&self.close, 10),
            "momentum_20" => ratio_to_lag(&self.close, 20),
            "gap" => (0..self.close.len())
                .map(|i| {
                    if i == 0 {
                        f64::NAN
                    } else {
                        (self.open[i] - self.close[i - 1]) / self.close[i - 1]
                    }
                })
                .collect(),

            "day_of_week" => self.calendar(|d| d.weekday().num_days_from_monday()),
            "month" => self.calendar(|d| d.month()),
            "quarter" => self.calendar(|d| (d.month() - 1) / 3 + 1),

            _ => return None,
        };
        Some(column)
    }
}

/// 일봉 → 특징 테이블 변환기
#[derive(Debug, Clone, Default)]
pub struct FeatureEngine {
    schema: FeatureSchema,
}

impl FeatureEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// 특징 계산. 결측/무한값이 하나라도 있는 행은 통째로 제거한다.
    pub fn engineer(&self, symbol: &str, bars: &[DailyBar]) -> StockcastResult<FeatureTable> {
        if bars.len() < MIN_FEATURE_BARS {
            return Err(StockcastError::feature_insufficient(
                symbol,
                format!(
                    "특징 계산에 최소 {}개 봉이 필요하지만 {}개뿐입니다",
                    MIN_FEATURE_BARS,
                    bars.len()
                ),
            ));
        }
        if !is_strictly_ascending(bars) {
            return Err(StockcastError::validation(
                "bars",
                format!("{} 일봉이 날짜 오름차순이 아니거나 중복 날짜가 있습니다", symbol),
            ));
        }

        let series = SeriesBundle::new(bars);
        let mut columns = Vec::with_capacity(self.schema.len());
        for name in self.schema.columns() {
            let column = series.column(name).ok_or_else(|| {
                StockcastError::artifact_mismatch(
                    "feature_columns",
                    format!("알 수 없는 특징: {}", name),
                )
            })?;
            columns.push(column);
        }

        let keep: Vec<usize> = (0..bars.len())
            .filter(|&i| {
                series.close[i].is_finite() && columns.iter().all(|c| c[i].is_finite())
            })
            .collect();

        let mut features = Array2::<f64>::zeros((keep.len(), columns.len()));
        for (row, &i) in keep.iter().enumerate() {
            for (col, values) in columns.iter().enumerate() {
                features[[row, col]] = values[i];
            }
        }

        let dropped_after_warmup = keep
            .first()
            .map(|&first| (first..bars.len()).count() - keep.len())
            .unwrap_or(0);
        if dropped_after_warmup > 0 {
            warn!(
                "⚠️ [FeatureEngine::engineer] {} 워밍업 이후 결측 행 {}개 제거",
                symbol, dropped_after_warmup
            );
        }

        debug!(
            "🔍 [FeatureEngine::engineer] {} 일봉 {}개 → 특징 행 {}개 ({}개 컬럼)",
            symbol,
            bars.len(),
            keep.len(),
            columns.len()
        );

        Ok(FeatureTable {
            symbol: symbol.to_string(),
            schema: self.schema.clone(),
            dates: keep.iter().map(|&i| series.dates[i]).collect(),
            close: keep.iter().map(|&i| series.close[i]).collect(),
            features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    /// 주말을 건너뛰는 합성 일봉
    fn synthetic_bars(n: usize) -> Vec<DailyBar> {
        let mut bars = Vec::with_capacity(n);
        let mut date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let mut i = 0;
        while bars.len() < n {
            if date.weekday().num_days_from_monday() < 5 {
                let t = i as f64;
                let close = 100.0 + t * 0.2 + (t * 0.37).sin() * 3.0;
                let open = close - (t * 0.11).cos();
                let high = open.max(close) + 1.0 + (t * 0.05).sin().abs();
                let low = open.min(close) - 1.0 - (t * 0.07).cos().abs();
                let volume = 1_000_000.0 + (t * 0.23).sin() * 200_000.0;
                bars.push(DailyBar::new(date, open, high, low, close, volume));
                i += 1;
            }
            date += Duration::days(1);
        }
        bars
    }

    #[test]
    fn test_schema_is_39_columns_without_close() {
        let schema = FeatureSchema::standard();
        assert_eq!(schema.len(), 39);
        assert!(!schema.columns().iter().any(|c| c == "close"));
        assert_eq!(WARMUP_ROWS, 33);
    }

    #[test]
    fn test_engineer_drops_exactly_warmup_rows() {
        let bars = synthetic_bars(100);
        let table = FeatureEngine::new().engineer("TEST", &bars).unwrap();

        assert_eq!(table.len(), 100 - WARMUP_ROWS);
        assert_eq!(table.features().ncols(), 39);
        assert!(table.features().iter().all(|v| v.is_finite()));
        assert_eq!(table.dates()[0], bars[WARMUP_ROWS].date);
        assert_eq!(table.last_close(), Some(bars[99].close));
    }

    #[test]
    fn test_engineer_is_deterministic() {
        let bars = synthetic_bars(120);
        let engine = FeatureEngine::new();
        let a = engine.engineer("TEST", &bars).unwrap();
        let b = engine.engineer("TEST", &bars).unwrap();
        assert_eq!(a.schema(), b.schema());
        assert_eq!(a.features(), b.features());
    }

    #[test]
    fn test_no_look_ahead() {
        let bars = synthetic_bars(120);
        let engine = FeatureEngine::new();
        let full = engine.engineer("TEST", &bars).unwrap();
        let prefix = engine.engineer("TEST", &bars[..90]).unwrap();

        // 앞부분 행은 미래 봉이 추가되어도 변하지 않음
        for row in 0..prefix.len() {
            for col in 0..prefix.features().ncols() {
                let a = prefix.features()[[row, col]];
                let b = full.features()[[row, col]];
                assert!((a - b).abs() <= 1e-9 * a.abs().max(1.0), "row {} col {}", row, col);
            }
        }
    }

    #[test]
    fn test_too_few_bars() {
        let bars = synthetic_bars(49);
        let err = FeatureEngine::new().engineer("TEST", &bars).unwrap_err();
        assert!(matches!(err, StockcastError::FeatureInsufficient { .. }));
    }

    #[test]
    fn test_zero_range_day_is_dropped() {
        let mut bars = synthetic_bars(100);
        let b = &mut bars[80];
        b.high = b.close;
        b.low = b.close;
        b.open = b.close;
        let table = FeatureEngine::new().engineer("TEST", &bars).unwrap();
        assert_eq!(table.len(), 100 - WARMUP_ROWS - 1);
        assert!(!table.dates().contains(&bars[80].date));
    }

    #[test]
    fn test_calendar_columns() {
        let bars = synthetic_bars(60);
        let table = FeatureEngine::new().engineer("TEST", &bars).unwrap();
        let dow = FEATURE_COLUMNS.iter().position(|c| *c == "day_of_week").unwrap();
        let quarter = FEATURE_COLUMNS.iter().position(|c| *c == "quarter").unwrap();
        for (row, date) in table.dates().iter().enumerate() {
            assert_eq!(
                table.features()[[row, dow]],
                date.weekday().num_days_from_monday() as f64
            );
            assert!((1.0..=4.0).contains(&table.features()[[row, quarter]]));
        }
    }

    #[test]
    fn test_schema_mismatch_detected() {
        let standard = FeatureSchema::standard();
        let mut cols = standard.columns().to_vec();
        cols.swap(0, 1);
        let swapped = FeatureSchema::from_columns(cols).unwrap();
        assert!(swapped.ensure_matches(&standard).is_err());
        assert!(standard.ensure_matches(&FeatureSchema::standard()).is_ok());
        assert!(FeatureSchema::from_columns(vec!["close".to_string()]).is_err());
    }
}
