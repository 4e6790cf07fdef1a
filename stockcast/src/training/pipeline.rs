use candle_core::Device;
use chrono::Local;
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::model::artifact::{save_artifact, ModelConfigFile};
use crate::model::features::{FeatureEngine, FeatureTable};
use crate::model::network::{NetworkConfig, SequenceModel};
use crate::model::scaler::ScalerState;
use crate::model::sequencer::{make_sequences, SequenceSet};
use crate::training::trainer::{Trainer, TrainerConfig, TrainingReport};
use crate::utility::apis::MarketDataApi;
use crate::utility::config::Config;
use crate::utility::errors::{StockcastError, StockcastResult};
use crate::utility::types::prediction::normalize_symbol;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// 학습 실행 결과 요약
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub symbols_used: Vec<String>,
    pub skipped: Vec<SkippedSymbol>,
    pub total_samples: usize,
    pub train_samples: usize,
    pub val_samples: usize,
    pub artifact_dir: String,
    pub report: TrainingReport,
}

/// 오프라인 학습: 조회 → 특징 → 스케일러 → 시퀀스 → 학습 → 아티팩트 저장
pub struct TrainingPipeline {
    config: Config,
    api: Arc<dyn MarketDataApi>,
    engine: FeatureEngine,
    show_progress: bool,
}

impl TrainingPipeline {
    pub fn new(config: Config, api: Arc<dyn MarketDataApi>) -> Self {
        Self {
            config,
            api,
            engine: FeatureEngine::new(),
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn run(&self) -> StockcastResult<TrainingSummary> {
        let training = &self.config.training;
        info!(
            "🚀 [TrainingPipeline::run] 학습 파이프라인 시작 - 종목 {}개, 기간 {} ~ {}",
            training.symbols.len(),
            training.start_date,
            training.end_date
        );

        let (tables, skipped) = self.collect_tables();
        if tables.is_empty() {
            return Err(StockcastError::data_unavailable(
                training.symbols.join(","),
                "학습에 사용할 수 있는 종목 데이터가 없습니다",
            ));
        }
        let symbols_used: Vec<String> = tables.iter().map(|t| t.symbol().to_string()).collect();

        let scalers = fit_pooled_scalers(&tables)?;
        let sequence_length = self.config.model.sequence_length;
        let mut sets = Vec::with_capacity(tables.len());
        for table in &tables {
            let scaled = scalers.transform(table.features())?;
            let targets = scalers.transform_targets(table.close());
            let set = make_sequences(&scaled, &targets, sequence_length)?;
            if set.is_empty() {
                warn!(
                    "⚠️ [TrainingPipeline::run] {} 특징 행 {}개로는 시퀀스를 만들 수 없어 제외",
                    table.symbol(),
                    table.len()
                );
                continue;
            }
            sets.push(set);
        }
        if sets.is_empty() {
            return Err(StockcastError::feature_insufficient(
                symbols_used.join(","),
                format!("길이 {} 시퀀스를 만들 수 있는 종목이 없습니다", sequence_length),
            ));
        }

        let all = SequenceSet::concat(&sets)?;
        let (train_set, val_set) = all.shuffle_split(training.validation_split, training.seed);
        info!(
            "📊 [TrainingPipeline::run] 시퀀스 {}개 (학습 {}개, 검증 {}개), 특징 {}개",
            all.len(),
            train_set.len(),
            val_set.len(),
            all.n_features()
        );

        let network = NetworkConfig {
            input_size: self.engine.schema().len(),
            hidden_size: self.config.model.hidden_size,
            num_layers: self.config.model.num_layers,
            dropout: self.config.model.dropout,
        };
        let device = Device::Cpu;
        let (mut varmap, model) = SequenceModel::init(network.clone(), &device)?;

        let mut trainer_config = TrainerConfig::from(training);
        trainer_config.show_progress = self.show_progress;
        let artifact_dir: PathBuf = self.config.artifacts.dir_path();
        let report =
            Trainer::new(trainer_config).train(&model, &mut varmap, &train_set, &val_set, &artifact_dir)?;

        let model_config = ModelConfigFile {
            input_size: network.input_size,
            hidden_size: network.hidden_size,
            num_layers: network.num_layers,
            dropout: network.dropout,
            sequence_length,
            feature_columns: self.engine.schema().clone(),
            symbols: symbols_used.clone(),
            training_date: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            total_samples: all.len(),
        };
        save_artifact(&artifact_dir, &varmap, &model_config, &scalers)?;

        info!(
            "✅ [TrainingPipeline::run] 학습 완료 - 최적 에포크 {}, val {:.6}, 제외 종목 {}개",
            report.best_epoch,
            report.best_val_loss,
            skipped.len()
        );

        Ok(TrainingSummary {
            symbols_used,
            skipped,
            total_samples: all.len(),
            train_samples: train_set.len(),
            val_samples: val_set.len(),
            artifact_dir: artifact_dir.display().to_string(),
            report,
        })
    }

    /// 종목별로 순서대로 조회하고 특징 테이블을 만든다. 실패한 종목은 건너뛴다
    fn collect_tables(&self) -> (Vec<FeatureTable>, Vec<SkippedSymbol>) {
        let training = &self.config.training;
        let min_bars = self.config.data.min_fetch_bars;
        let mut tables = Vec::new();
        let mut skipped = Vec::new();

        for raw in &training.symbols {
            let symbol = normalize_symbol(raw);
            let result = self
                .api
                .fetch(&symbol, training.start_date, training.end_date)
                .and_then(|bars| {
                    if bars.len() < min_bars {
                        return Err(StockcastError::data_unavailable(
                            &symbol,
                            format!("일봉 {}개 (최소 {}개 필요)", bars.len(), min_bars),
                        ));
                    }
                    self.engine.engineer(&symbol, &bars)
                });

            match result {
                Ok(table) => {
                    info!(
                        "📥 [TrainingPipeline::collect] {} 특징 행 {}개",
                        symbol,
                        table.len()
                    );
                    tables.push(table);
                }
                Err(e) => {
                    warn!("⚠️ [TrainingPipeline::collect] {} 건너뜀: {}", symbol, e);
                    skipped.push(SkippedSymbol {
                        symbol,
                        reason: e.to_string(),
                    });
                }
            }
        }
        (tables, skipped)
    }
}

/// 모든 종목의 특징/종가를 모아서 스케일러를 한 번만 맞춘다
fn fit_pooled_scalers(tables: &[FeatureTable]) -> StockcastResult<ScalerState> {
    let features: Vec<_> = tables.iter().map(|t| t.features().view()).collect();
    let closes: Vec<_> = tables.iter().map(|t| t.close().view()).collect();
    let pooled_features: Array2<f64> = concatenate(Axis(0), &features)?;
    let pooled_closes: Array1<f64> = concatenate(Axis(0), &closes)?;
    ScalerState::fit(&pooled_features, &pooled_closes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utility::apis::MemoryApi;
    use crate::utility::types::DailyBar;
    use chrono::NaiveDate;

    fn short_bars(n: usize) -> Vec<DailyBar> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                DailyBar::new(
                    start + chrono::Duration::days(i as i64),
                    close - 0.5,
                    close + 1.0,
                    close - 1.0,
                    close,
                    1_000.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_no_usable_symbol_is_data_unavailable() {
        let api = MemoryApi::new().with_symbol("SHORT", short_bars(40));
        let mut config = Config::default();
        config.training.symbols = vec!["short".to_string(), "MISSING".to_string()];
        config.training.start_date = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        config.training.end_date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();

        let dir = tempfile::tempdir().unwrap();
        config.artifacts.dir = dir.path().display().to_string();

        let pipeline = TrainingPipeline::new(config, Arc::new(api)).with_progress(false);
        let (tables, skipped) = pipeline.collect_tables();
        assert!(tables.is_empty());
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].symbol, "SHORT");

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, StockcastError::DataUnavailable { .. }));
    }
}
