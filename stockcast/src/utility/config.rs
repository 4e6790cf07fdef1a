use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::features::WARMUP_ROWS;
use crate::utility::policy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("설정 파일을 찾을 수 없습니다: {0}")]
    FileNotFound(String),
    #[error("설정 파일 읽기 오류: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("설정 파일 파싱 오류: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("설정 직렬화 오류: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("설정 유효성 검증 실패: {0}")]
    ValidationError(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    /// 일봉 DB 경로 (종목별 테이블)
    pub daily_db_path: String,
    /// 추론 시 조회 기간 (달력 기준 일수)
    pub lookback_days: i64,
    /// 종목을 사용하기 위한 최소 봉 개수 (학습/추론 공통)
    pub min_fetch_bars: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            daily_db_path: "data/daily.db".to_string(),
            lookback_days: policy::LOOKBACK_CALENDAR_DAYS,
            min_fetch_bars: policy::MIN_FETCH_BARS,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f64,
    pub sequence_length: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            hidden_size: 64,
            num_layers: 2,
            dropout: 0.2,
            sequence_length: policy::DEFAULT_SEQUENCE_LENGTH,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TrainingConfig {
    pub symbols: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub max_epochs: usize,
    /// 검증 손실이 개선되지 않을 때 조기 종료까지 기다리는 epoch 수
    pub early_stopping_patience: usize,
    /// 학습률 감소까지 기다리는 epoch 수
    pub lr_patience: usize,
    pub lr_factor: f64,
    pub min_learning_rate: f64,
    pub grad_clip_norm: f64,
    pub validation_split: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            symbols: policy::DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            start_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            batch_size: 128,
            learning_rate: 0.001,
            weight_decay: 1e-4,
            max_epochs: 15,
            early_stopping_patience: 8,
            lr_patience: 10,
            lr_factor: 0.5,
            min_learning_rate: 0.0,
            grad_clip_norm: 1.0,
            validation_split: 0.2,
            seed: policy::DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// 가중치/전처리/설정 파일이 함께 저장되는 디렉터리
    pub dir: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: "artifacts".to_string(),
        }
    }
}

impl ArtifactsConfig {
    pub fn dir_path(&self) -> PathBuf {
        PathBuf::from(&self.dir)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// 지정된 파일에서 설정을 로드
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Err(ConfigError::FileNotFound(format!(
                "{}가 없습니다. config.example.toml을 복사해서 config.toml을 만들고 설정을 채워주세요.",
                path
            )));
        }

        let content = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;

        // 환경 변수로 오버라이드
        config.apply_env_overrides();

        // 설정 유효성 검증
        config.validate()?;

        Ok(config)
    }

    /// 환경 변수로 설정을 오버라이드
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("STOCKCAST_DAILY_DB_PATH") {
            self.data.daily_db_path = path;
        }
        if let Ok(dir) = std::env::var("STOCKCAST_ARTIFACT_DIR") {
            self.artifacts.dir = dir;
        }

        // 로그 레벨
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// 설정 유효성 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 모델 구조 검증
        if self.model.hidden_size < 2 {
            return Err(ConfigError::ValidationError(
                "hidden_size는 2 이상이어야 합니다".to_string(),
            ));
        }
        if self.model.num_layers == 0 {
            return Err(ConfigError::ValidationError(
                "num_layers는 1 이상이어야 합니다".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.model.dropout) {
            return Err(ConfigError::ValidationError(
                "dropout은 0 이상 1 미만이어야 합니다".to_string(),
            ));
        }
        if self.model.sequence_length == 0 {
            return Err(ConfigError::ValidationError(
                "sequence_length는 1 이상이어야 합니다".to_string(),
            ));
        }

        // 최소 조회 봉 개수로 시퀀스 하나를 만들 수 있어야 함
        if self.data.min_fetch_bars < policy::MIN_FEATURE_BARS {
            return Err(ConfigError::ValidationError(format!(
                "min_fetch_bars({})는 특징 계산 최소 봉 개수({}) 이상이어야 합니다",
                self.data.min_fetch_bars,
                policy::MIN_FEATURE_BARS
            )));
        }
        if self.data.min_fetch_bars < WARMUP_ROWS + self.model.sequence_length {
            return Err(ConfigError::ValidationError(format!(
                "min_fetch_bars({}) - 워밍업 행({}) < sequence_length({}): 추론 시 시퀀스를 만들 수 없습니다",
                self.data.min_fetch_bars, WARMUP_ROWS, self.model.sequence_length
            )));
        }
        if self.data.lookback_days <= 0 {
            return Err(ConfigError::ValidationError(
                "lookback_days는 양수여야 합니다".to_string(),
            ));
        }

        // 학습 설정 검증
        if self.training.start_date >= self.training.end_date {
            return Err(ConfigError::ValidationError(
                "start_date는 end_date보다 이전이어야 합니다".to_string(),
            ));
        }
        if self.training.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "batch_size는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.training.learning_rate <= 0.0 {
            return Err(ConfigError::ValidationError(
                "learning_rate는 양수여야 합니다".to_string(),
            ));
        }
        if self.training.max_epochs == 0 {
            return Err(ConfigError::ValidationError(
                "max_epochs는 1 이상이어야 합니다".to_string(),
            ));
        }
        if !(0.0 < self.training.lr_factor && self.training.lr_factor < 1.0) {
            return Err(ConfigError::ValidationError(
                "lr_factor는 0과 1 사이여야 합니다".to_string(),
            ));
        }
        if self.training.grad_clip_norm <= 0.0 {
            return Err(ConfigError::ValidationError(
                "grad_clip_norm은 양수여야 합니다".to_string(),
            ));
        }
        if !(0.0 < self.training.validation_split && self.training.validation_split < 1.0) {
            return Err(ConfigError::ValidationError(
                "validation_split은 0과 1 사이여야 합니다".to_string(),
            ));
        }

        Ok(())
    }

    /// 설정을 파일로 저장
    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
