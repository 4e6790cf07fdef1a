use serde::{Deserialize, Serialize};

use crate::utility::errors::{ErrorKind, StockcastError};

fn default_days_ahead() -> u32 {
    1
}

/// 단일 종목 예측 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub symbol: String,
    #[serde(default = "default_days_ahead")]
    pub days_ahead: u32,
}

impl PredictionRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            days_ahead: default_days_ahead(),
        }
    }

    /// 종목 코드는 대문자로 정규화해서 사용
    pub fn normalized_symbol(&self) -> String {
        normalize_symbol(&self.symbol)
    }
}

/// 여러 종목 예측 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPredictionRequest {
    pub symbols: Vec<String>,
    #[serde(default = "default_days_ahead")]
    pub days_ahead: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInfoRequest {
    pub symbol: String,
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// 예측 성공 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub symbol: String,
    pub current_price: f64,
    pub predicted_price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub prediction_date: String,
    /// 요청 값을 그대로 돌려줌 (모델은 항상 다음 거래일 종가를 예측)
    pub days_ahead: u32,
    pub signal: Signal,
}

/// 예측 변화율 기반 매매 신호
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    StrongBuy,
    Buy,
    Hold,
    Sell,
}

impl Signal {
    pub fn from_change_percent(change_percent: f64) -> Self {
        if change_percent > 2.0 {
            Signal::StrongBuy
        } else if change_percent > 0.0 {
            Signal::Buy
        } else if change_percent > -2.0 {
            Signal::Hold
        } else {
            Signal::Sell
        }
    }
}

/// 종목 기본 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub symbol: String,
    pub current_price: f64,
    pub volume: f64,
    pub high_52w: f64,
    pub low_52w: f64,
    pub data_points: usize,
    pub last_update: String,
}

/// 호출자에게 돌려주는 구조화된 실패 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub symbol: String,
    pub error: String,
    pub kind: ErrorKind,
}

impl FailureReport {
    pub fn from_error(symbol: impl Into<String>, error: &StockcastError) -> Self {
        Self {
            symbol: symbol.into(),
            error: error.to_string(),
            kind: error.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PredictionOutcome {
    Success(Prediction),
    Failure(FailureReport),
}

impl PredictionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PredictionOutcome::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StockInfoOutcome {
    Success(StockInfo),
    Failure(FailureReport),
}

/// 배치 예측 결과 (부분 실패 허용)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPredictionReport {
    pub predictions: Vec<PredictionOutcome>,
    pub total_symbols: usize,
    pub successful_predictions: usize,
    pub failed_predictions: usize,
}

impl BatchPredictionReport {
    pub fn from_outcomes(predictions: Vec<PredictionOutcome>) -> Self {
        let successful_predictions = predictions.iter().filter(|p| p.is_success()).count();
        let total_symbols = predictions.len();
        Self {
            failed_predictions: total_symbols - successful_predictions,
            successful_predictions,
            total_symbols,
            predictions,
        }
    }
}
