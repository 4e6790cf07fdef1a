use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use stockcast::{
    init_tracing,
    model::PredictorHandle,
    training::TrainingPipeline,
    utility::apis::{DbApi, MarketDataApi},
    utility::config::Config,
    utility::errors::{StockcastError, StockcastResult},
    utility::types::{BatchPredictionRequest, PredictionRequest, StockInfoRequest},
};
use tracing::info;

#[derive(Parser)]
#[command(name = "stockcast")]
#[command(about = "LSTM 기반 다음 거래일 종가 예측기")]
struct Args {
    /// 설정 파일 경로 (기본값: config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 설정된 종목으로 모델을 학습하고 아티팩트를 저장
    Train {
        /// 진행률 표시 끄기
        #[arg(long)]
        quiet: bool,
    },
    /// 한 종목의 다음 거래일 종가 예측
    Predict {
        symbol: String,
        #[arg(long, default_value_t = 1)]
        days_ahead: u32,
    },
    /// 여러 종목 일괄 예측 (종목별 데이터 실패는 결과에 포함)
    Batch {
        #[arg(required = true)]
        symbols: Vec<String>,
        #[arg(long, default_value_t = 1)]
        days_ahead: u32,
    },
    /// 종목 기본 정보
    Info { symbol: String },
    /// 로드된 모델 정보
    ModelInfo,
    /// 학습에 사용된 종목 목록
    Symbols,
    /// 모델 로드 상태
    Health,
}

fn main() -> StockcastResult<()> {
    let args = Args::parse();

    let config = Config::load_from_file(&args.config)?;
    init_tracing(&config.logging.level)
        .map_err(|e| StockcastError::general(format!("로그 시스템 초기화 실패: {}", e)))?;

    info!("🚀 stockcast 시작!");
    info!("📁 설정 파일: {}", args.config);

    let api: Arc<dyn MarketDataApi> = Arc::new(DbApi::open(&config.data.daily_db_path)?);
    info!("💾 일봉 DB 경로: {}", config.data.daily_db_path);

    if let Command::Train { quiet } = args.command {
        let summary = TrainingPipeline::new(config, api)
            .with_progress(!quiet)
            .run()?;
        return print_json(&summary);
    }

    let handle = PredictorHandle::new();
    let artifact_dir = config.artifacts.dir_path();
    // health는 모델이 없어도 응답
    let loaded = handle.load(&artifact_dir, api, &config.data);
    if let Command::Health = args.command {
        return print_json(&handle.health());
    }
    loaded?;
    let predictor = handle.current()?;

    match args.command {
        Command::Predict { symbol, days_ahead } => {
            let request = PredictionRequest { symbol, days_ahead };
            print_json(&predictor.predict_outcome(&request)?)
        }
        Command::Batch {
            symbols,
            days_ahead,
        } => {
            let request = BatchPredictionRequest {
                symbols,
                days_ahead,
            };
            print_json(&predictor.predict_batch(&request)?)
        }
        Command::Info { symbol } => {
            let request = StockInfoRequest { symbol };
            print_json(&predictor.info_outcome(&request.symbol))
        }
        Command::ModelInfo => print_json(&predictor.model_info()),
        Command::Symbols => print_json(&predictor.supported_symbols()),
        Command::Train { .. } | Command::Health => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> StockcastResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
