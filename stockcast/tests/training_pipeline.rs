mod common;

use chrono::NaiveDateTime;
use std::path::Path;
use std::sync::Arc;
use stockcast::model::artifact::{MODEL_CONFIG_FILE, PREPROCESSING_FILE, WEIGHTS_FILE};
use stockcast::model::{FeatureSchema, Predictor, PredictorHandle};
use stockcast::training::trainer::{CHECKPOINT_FILE, CHECKPOINT_META_FILE, CHECKPOINT_OPTIMIZER_FILE};
use stockcast::training::{StopReason, TrainingPipeline, TrainingSummary};
use stockcast::utility::apis::MemoryApi;
use stockcast::utility::config::DataConfig;
use stockcast::utility::errors::{ErrorKind, StockcastError};
use stockcast::utility::types::{BatchPredictionRequest, PredictionOutcome, PredictionRequest, Signal};

use common::{tiny_config, weekday_bars};

const BARS: usize = 300;

struct Fixture {
    _dir: tempfile::TempDir,
    artifact_dir: std::path::PathBuf,
    api: Arc<MemoryApi>,
    summary: TrainingSummary,
    as_of: NaiveDateTime,
}

fn train_fixture() -> Fixture {
    let aaa = weekday_bars(BARS, 0.0);
    let bbb = weekday_bars(BARS, 1.3);
    let last_day = aaa[BARS - 1].date;
    // 같은 날짜에 끝나는 40봉 종목
    let short: Vec<_> = weekday_bars(BARS, 2.1).into_iter().skip(BARS - 40).collect();

    let api = Arc::new(
        MemoryApi::new()
            .with_symbol("AAA", aaa)
            .with_symbol("BBB", bbb)
            .with_symbol("SHORT", short),
    );

    let dir = tempfile::tempdir().unwrap();
    let artifact_dir = dir.path().join("artifacts");
    let config = tiny_config(
        &["aaa", "BBB", "SHORT", "MISSING"],
        artifact_dir.to_str().unwrap(),
        last_day,
    );
    config.validate().unwrap();

    let summary = TrainingPipeline::new(config, api.clone())
        .with_progress(false)
        .run()
        .unwrap();

    Fixture {
        _dir: dir,
        artifact_dir,
        api,
        summary,
        as_of: last_day.and_hms_opt(16, 0, 0).unwrap(),
    }
}

fn load_predictor(dir: &Path, api: Arc<MemoryApi>) -> Predictor {
    Predictor::load(dir, api, &DataConfig::default()).unwrap()
}

#[test]
fn test_train_then_predict_end_to_end() {
    let fx = train_fixture();

    // 사용 종목과 제외 종목
    assert_eq!(fx.summary.symbols_used, vec!["AAA", "BBB"]);
    let skipped: Vec<_> = fx.summary.skipped.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(skipped, vec!["SHORT", "MISSING"]);

    // 종목당 (300 - 33) - 10 시퀀스
    assert_eq!(fx.summary.total_samples, 2 * (BARS - 33 - 10));
    assert_eq!(fx.summary.train_samples + fx.summary.val_samples, fx.summary.total_samples);

    let report = &fx.summary.report;
    assert!(report.epochs_run <= 2);
    assert_eq!(report.stop_reason, StopReason::MaxEpochs);
    assert!(report.best_val_loss.is_finite());

    for file in [
        WEIGHTS_FILE,
        PREPROCESSING_FILE,
        MODEL_CONFIG_FILE,
        CHECKPOINT_FILE,
        CHECKPOINT_OPTIMIZER_FILE,
        CHECKPOINT_META_FILE,
    ] {
        assert!(fx.artifact_dir.join(file).exists(), "missing {}", file);
    }

    let predictor = load_predictor(&fx.artifact_dir, fx.api.clone());
    let prediction = predictor.predict_at("aaa", 1, fx.as_of).unwrap();

    assert_eq!(prediction.symbol, "AAA");
    assert_eq!(prediction.days_ahead, 1);
    assert!(prediction.predicted_price.is_finite());
    assert_eq!(prediction.prediction_date, "2023-02-24 16:00:00");
    assert!((prediction.change - (prediction.predicted_price - prediction.current_price)).abs() < 1e-9);
    assert!(
        (prediction.change_percent - prediction.change / prediction.current_price * 100.0).abs()
            < 1e-9
    );

    let last_close = weekday_bars(BARS, 0.0)[BARS - 1].close;
    assert_eq!(prediction.current_price, last_close);

    // 신호는 변화율에서 결정되고 JSON에도 포함
    assert_eq!(prediction.signal, Signal::from_change_percent(prediction.change_percent));
    let json = serde_json::to_value(&prediction).unwrap();
    assert_eq!(json["signal"], serde_json::to_value(prediction.signal).unwrap());

    // 모델 정보
    let info = predictor.model_info();
    assert_eq!(info.model_parameters.sequence_length, 10);
    assert_eq!(info.model_parameters.input_size, 39);
    assert_eq!(info.training_info.total_samples, fx.summary.total_samples);
    assert_eq!(info.training_info.feature_columns, FeatureSchema::standard());

    let supported = predictor.supported_symbols();
    assert_eq!(supported.symbols, vec!["AAA", "BBB"]);
    assert_eq!(supported.total_symbols, 2);
}

#[test]
fn test_repeated_predictions_are_bit_identical() {
    let fx = train_fixture();
    let predictor = load_predictor(&fx.artifact_dir, fx.api.clone());

    let a = predictor.predict_at("BBB", 1, fx.as_of).unwrap();
    let b = predictor.predict_at("BBB", 1, fx.as_of).unwrap();
    assert_eq!(a.predicted_price.to_bits(), b.predicted_price.to_bits());

    // 다시 로드한 예측기도 같은 값
    let reloaded = load_predictor(&fx.artifact_dir, fx.api.clone());
    let c = reloaded.predict_at("BBB", 1, fx.as_of).unwrap();
    assert_eq!(a.predicted_price.to_bits(), c.predicted_price.to_bits());
}

#[test]
fn test_batch_reports_partial_failure() {
    let fx = train_fixture();
    let predictor = load_predictor(&fx.artifact_dir, fx.api.clone());

    let request = BatchPredictionRequest {
        symbols: vec!["AAA".to_string(), "short".to_string()],
        days_ahead: 1,
    };
    let report = predictor.predict_batch_at(&request, fx.as_of).unwrap();

    assert_eq!(report.total_symbols, 2);
    assert_eq!(report.successful_predictions, 1);
    assert_eq!(report.failed_predictions, 1);
    assert!(report.predictions[0].is_success());
    match &report.predictions[1] {
        PredictionOutcome::Failure(failure) => {
            assert_eq!(failure.symbol, "SHORT");
            assert_eq!(failure.kind, ErrorKind::DataUnavailable);
        }
        other => panic!("expected failure, got {:?}", other),
    }

    // 실패 결과도 status 태그가 붙은 JSON으로 직렬화
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["predictions"][1]["status"], "failure");
    assert_eq!(json["predictions"][1]["kind"], "data_unavailable");

    let single = predictor
        .predict_outcome_at(&PredictionRequest::new("UNKNOWN"), fx.as_of)
        .unwrap();
    assert!(!single.is_success());
}

#[test]
fn test_stock_info_uses_fetched_window() {
    let fx = train_fixture();
    let predictor = load_predictor(&fx.artifact_dir, fx.api.clone());

    let info = predictor.info_at("aaa", fx.as_of.date()).unwrap();
    assert_eq!(info.symbol, "AAA");
    assert_eq!(info.last_update, "2023-02-24");
    assert!(info.high_52w >= info.current_price);
    assert!(info.low_52w <= info.current_price);
    assert!(info.data_points >= 100);
}

#[test]
fn test_stock_info_requires_minimum_bars() {
    let fx = train_fixture();
    let predictor = load_predictor(&fx.artifact_dir, fx.api.clone());

    // 40봉 종목은 예측과 마찬가지로 정보 조회도 거부
    let err = predictor.info_at("short", fx.as_of.date()).unwrap_err();
    assert!(matches!(err, StockcastError::DataUnavailable { ref symbol, .. } if symbol == "SHORT"));
    assert_eq!(err.kind(), ErrorKind::DataUnavailable);
}

#[test]
fn test_handle_keeps_serving_after_failed_reload() {
    let fx = train_fixture();
    let handle = PredictorHandle::new();
    let data_config = DataConfig::default();

    handle.load(&fx.artifact_dir, fx.api.clone(), &data_config).unwrap();
    let before = handle.current().unwrap().model_info();
    assert!(handle.health().model_loaded);

    let empty = tempfile::tempdir().unwrap();
    assert!(handle.load(empty.path(), fx.api.clone(), &data_config).is_err());

    assert!(handle.is_loaded());
    let after = handle.current().unwrap();
    assert_eq!(after.model_info(), before);
    assert!(after.predict_at("AAA", 1, fx.as_of).is_ok());
}
