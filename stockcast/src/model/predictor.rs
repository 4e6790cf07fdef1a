use candle_core::Device;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::model::artifact::{ModelArtifact, ModelConfigFile};
use crate::model::features::{FeatureEngine, FeatureSchema};
use crate::model::sequencer::make_last_window;
use crate::utility::apis::MarketDataApi;
use crate::utility::config::DataConfig;
use crate::utility::errors::{StockcastError, StockcastResult};
use crate::utility::types::prediction::normalize_symbol;
use crate::utility::types::{
    BatchPredictionReport, BatchPredictionRequest, DailyBar, FailureReport, Prediction,
    PredictionOutcome, PredictionRequest, Signal, StockInfo, StockInfoOutcome,
};

const PREDICTION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f64,
    pub sequence_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingInfo {
    pub training_date: String,
    pub total_samples: usize,
    pub feature_columns: FeatureSchema,
}

/// 로드된 모델 상세 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_config: ModelConfigFile,
    pub device: String,
    pub model_parameters: ModelParameters,
    pub training_info: TrainingInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedSymbols {
    pub symbols: Vec<String>,
    pub total_symbols: usize,
    pub note: String,
}

/// 종가 예측기. 로드 후에는 읽기 전용이라 여러 스레드에서 공유 가능
pub struct Predictor {
    artifact: ModelArtifact,
    api: Arc<dyn MarketDataApi>,
    engine: FeatureEngine,
    device: Device,
    lookback_days: i64,
    min_fetch_bars: usize,
}

impl Predictor {
    /// 아티팩트 디렉터리에서 예측기 생성
    pub fn load(
        artifact_dir: &Path,
        api: Arc<dyn MarketDataApi>,
        data_config: &DataConfig,
    ) -> StockcastResult<Self> {
        let device = Device::Cpu;
        let artifact = ModelArtifact::load(artifact_dir, &device)?;
        Ok(Self::from_artifact(artifact, api, data_config, device))
    }

    pub fn from_artifact(
        artifact: ModelArtifact,
        api: Arc<dyn MarketDataApi>,
        data_config: &DataConfig,
        device: Device,
    ) -> Self {
        Self {
            artifact,
            api,
            engine: FeatureEngine::new(),
            device,
            lookback_days: data_config.lookback_days,
            min_fetch_bars: data_config.min_fetch_bars,
        }
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// 요청 시각 기준 lookback 구간 조회. 최소 봉 개수 미달이면 DataUnavailable
    fn fetch_recent(&self, symbol: &str, as_of: NaiveDate) -> StockcastResult<Vec<DailyBar>> {
        let start = as_of - Duration::days(self.lookback_days);
        let bars = self.api.fetch(symbol, start, as_of).map_err(|e| match e {
            StockcastError::DataUnavailable { .. } => e,
            other => StockcastError::data_unavailable(symbol, format!("시세 조회 실패: {}", other)),
        })?;

        if bars.len() < self.min_fetch_bars {
            return Err(StockcastError::data_unavailable(
                symbol,
                format!(
                    "{}~{} 구간 일봉 {}개 (최소 {}개 필요)",
                    start,
                    as_of,
                    bars.len(),
                    self.min_fetch_bars
                ),
            ));
        }
        Ok(bars)
    }

    /// 현재 시각 기준 다음 거래일 종가 예측
    pub fn predict(&self, symbol: &str, days_ahead: u32) -> StockcastResult<Prediction> {
        self.predict_at(symbol, days_ahead, Local::now().naive_local())
    }

    pub fn predict_at(
        &self,
        symbol: &str,
        days_ahead: u32,
        as_of: NaiveDateTime,
    ) -> StockcastResult<Prediction> {
        let symbol = normalize_symbol(symbol);
        let bars = self.fetch_recent(&symbol, as_of.date())?;

        let table = self.engine.engineer(&symbol, &bars)?;
        table.schema().ensure_matches(self.artifact.schema())?;

        let sequence_length = self.artifact.sequence_length();
        if table.len() < sequence_length {
            return Err(StockcastError::feature_insufficient(
                &symbol,
                format!(
                    "특징 행 {}개 < 시퀀스 길이 {}",
                    table.len(),
                    sequence_length
                ),
            ));
        }

        let scalers = self.artifact.scalers();
        let scaled = scalers.transform(table.features())?;
        let window = make_last_window(&symbol, &scaled, sequence_length)?;
        let scaled_prediction = self.artifact.model().predict(&window)?;
        let predicted_price = scalers.inverse_transform_price(scaled_prediction as f64);

        let current_price = table
            .last_close()
            .ok_or_else(|| StockcastError::feature_insufficient(&symbol, "빈 특징 테이블"))?;
        let change = predicted_price - current_price;

        debug!(
            "🔮 [Predictor::predict] {} 현재가 {:.4} → 예측가 {:.4} (봉 {}개, 특징 행 {}개)",
            symbol,
            current_price,
            predicted_price,
            bars.len(),
            table.len()
        );

        let change_percent = change / current_price * 100.0;
        Ok(Prediction {
            symbol,
            current_price,
            predicted_price,
            change,
            change_percent,
            prediction_date: as_of.format(PREDICTION_DATE_FORMAT).to_string(),
            days_ahead,
            signal: Signal::from_change_percent(change_percent),
        })
    }

    /// 복구 가능한 오류는 구조화된 실패 결과로, 나머지는 그대로 전파
    pub fn predict_outcome_at(
        &self,
        request: &PredictionRequest,
        as_of: NaiveDateTime,
    ) -> StockcastResult<PredictionOutcome> {
        let symbol = request.normalized_symbol();
        let result = self.predict_at(&symbol, request.days_ahead, as_of);
        outcome_from_result(symbol, result)
    }

    pub fn predict_outcome(&self, request: &PredictionRequest) -> StockcastResult<PredictionOutcome> {
        self.predict_outcome_at(request, Local::now().naive_local())
    }

    /// 종목별 데이터 실패는 결과에 담고 계속 진행. 모델/아티팩트 오류는 배치 중단
    pub fn predict_batch_at(
        &self,
        request: &BatchPredictionRequest,
        as_of: NaiveDateTime,
    ) -> StockcastResult<BatchPredictionReport> {
        let mut outcomes = Vec::with_capacity(request.symbols.len());
        for symbol in &request.symbols {
            let single = PredictionRequest {
                symbol: symbol.clone(),
                days_ahead: request.days_ahead,
            };
            outcomes.push(self.predict_outcome_at(&single, as_of)?);
        }

        let report = BatchPredictionReport::from_outcomes(outcomes);
        info!(
            "📊 [Predictor::predict_batch] 전체 {}개 중 성공 {}개, 실패 {}개",
            report.total_symbols, report.successful_predictions, report.failed_predictions
        );
        Ok(report)
    }

    pub fn predict_batch(
        &self,
        request: &BatchPredictionRequest,
    ) -> StockcastResult<BatchPredictionReport> {
        self.predict_batch_at(request, Local::now().naive_local())
    }

    /// 조회된 일봉만으로 계산한 종목 기본 정보. 최소 봉 개수 규칙은 예측과 같다
    pub fn info_at(&self, symbol: &str, as_of: NaiveDate) -> StockcastResult<StockInfo> {
        let symbol = normalize_symbol(symbol);
        let bars = self.fetch_recent(&symbol, as_of)?;

        let last = bars
            .last()
            .ok_or_else(|| StockcastError::data_unavailable(&symbol, "조회된 일봉이 없습니다"))?;

        Ok(StockInfo {
            current_price: last.close,
            volume: last.volume,
            high_52w: bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
            low_52w: bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
            data_points: bars.len(),
            last_update: last.date.format("%Y-%m-%d").to_string(),
            symbol,
        })
    }

    pub fn info(&self, symbol: &str) -> StockcastResult<StockInfo> {
        self.info_at(symbol, Local::now().date_naive())
    }

    pub fn info_outcome(&self, symbol: &str) -> StockInfoOutcome {
        match self.info(symbol) {
            Ok(info) => StockInfoOutcome::Success(info),
            Err(e) => StockInfoOutcome::Failure(FailureReport::from_error(normalize_symbol(symbol), &e)),
        }
    }

    pub fn model_info(&self) -> ModelInfo {
        let config = self.artifact.config();
        ModelInfo {
            model_config: config.clone(),
            device: format!("{:?}", self.device),
            model_parameters: ModelParameters {
                input_size: config.input_size,
                hidden_size: config.hidden_size,
                num_layers: config.num_layers,
                dropout: config.dropout,
                sequence_length: config.sequence_length,
            },
            training_info: TrainingInfo {
                training_date: config.training_date.clone(),
                total_samples: config.total_samples,
                feature_columns: config.feature_columns.clone(),
            },
        }
    }

    pub fn supported_symbols(&self) -> SupportedSymbols {
        let symbols = self.artifact.symbols().to_vec();
        SupportedSymbols {
            total_symbols: symbols.len(),
            symbols,
            note: "학습에 사용된 종목에서 가장 잘 동작하지만 다른 종목도 예측할 수 있습니다"
                .to_string(),
        }
    }
}

fn outcome_from_result(
    symbol: String,
    result: StockcastResult<Prediction>,
) -> StockcastResult<PredictionOutcome> {
    match result {
        Ok(prediction) => Ok(PredictionOutcome::Success(prediction)),
        Err(e) if e.is_recoverable() => {
            error!("❌ [Predictor::predict] {} 예측 실패: {}", symbol, e);
            Ok(PredictionOutcome::Failure(FailureReport::from_error(symbol, &e)))
        }
        Err(e) => {
            error!("❌ [Predictor::predict] {} 치명적 오류로 중단: {}", symbol, e);
            Err(e)
        }
    }
}
