use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::model::features::FeatureSchema;
use crate::model::network::{NetworkConfig, SequenceModel};
use crate::model::scaler::{PriceScaler, ScalerState, StandardScaler};
use crate::utility::errors::{StockcastError, StockcastResult};

pub const WEIGHTS_FILE: &str = "stock_lstm_model.safetensors";
pub const PREPROCESSING_FILE: &str = "preprocessing.json";
pub const MODEL_CONFIG_FILE: &str = "model_config.json";

/// preprocessing.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessing {
    pub feature_scaler: StandardScaler,
    pub price_scaler: PriceScaler,
    pub feature_columns: FeatureSchema,
    pub symbols: Vec<String>,
    pub sequence_length: usize,
}

/// model_config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfigFile {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f64,
    pub sequence_length: usize,
    pub feature_columns: FeatureSchema,
    pub symbols: Vec<String>,
    pub training_date: String,
    pub total_samples: usize,
}

impl ModelConfigFile {
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            input_size: self.input_size,
            hidden_size: self.hidden_size,
            num_layers: self.num_layers,
            dropout: self.dropout,
        }
    }
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> StockcastResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)
        .map_err(|e| StockcastError::io(format!("{} 저장", path.display()), e))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> StockcastResult<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| StockcastError::io(format!("{} 읽기", path.display()), e))?;
    serde_json::from_str(&content).map_err(|e| StockcastError::Serialization {
        data_type: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// 가중치 + 전처리 + 설정 파일을 같은 디렉터리에 저장
pub fn save_artifact(
    dir: &Path,
    varmap: &VarMap,
    config: &ModelConfigFile,
    scalers: &ScalerState,
) -> StockcastResult<()> {
    fs::create_dir_all(dir)
        .map_err(|e| StockcastError::io(format!("{} 생성", dir.display()), e))?;

    varmap.save(dir.join(WEIGHTS_FILE))?;

    let preprocessing = Preprocessing {
        feature_scaler: scalers.feature_scaler.clone(),
        price_scaler: scalers.price_scaler.clone(),
        feature_columns: config.feature_columns.clone(),
        symbols: config.symbols.clone(),
        sequence_length: config.sequence_length,
    };
    write_json(&dir.join(PREPROCESSING_FILE), &preprocessing)?;
    write_json(&dir.join(MODEL_CONFIG_FILE), config)?;

    info!(
        "💾 [save_artifact] 모델 아티팩트 저장 완료: {} (특징 {}개, 시퀀스 {})",
        dir.display(),
        config.feature_columns.len(),
        config.sequence_length
    );
    Ok(())
}

/// 로드된 모델 아티팩트 (읽기 전용)
pub struct ModelArtifact {
    config: ModelConfigFile,
    scalers: ScalerState,
    model: SequenceModel,
}

impl ModelArtifact {
    /// 세 파일을 함께 로드하고 서로 일치하는지 검증
    pub fn load(dir: &Path, device: &Device) -> StockcastResult<Self> {
        debug!("🔄 [ModelArtifact::load] 아티팩트 로드 시작: {}", dir.display());

        let config: ModelConfigFile = read_json(&dir.join(MODEL_CONFIG_FILE))?;
        let preprocessing: Preprocessing = read_json(&dir.join(PREPROCESSING_FILE))?;

        Self::cross_validate(&config, &preprocessing)?;

        let mut varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let model = SequenceModel::new(config.network_config(), vb)?;

        let weights_path = dir.join(WEIGHTS_FILE);
        if !weights_path.exists() {
            return Err(StockcastError::artifact_mismatch(
                "weights",
                format!("가중치 파일이 없습니다: {}", weights_path.display()),
            ));
        }
        varmap.load(&weights_path).map_err(|e| {
            StockcastError::artifact_mismatch(
                "weights",
                format!("가중치가 모델 구조와 맞지 않습니다: {}", e),
            )
        })?;

        info!(
            "✅ [ModelArtifact::load] 모델 로드 완료: {} (hidden {}, layers {}, 시퀀스 {}, 특징 {}개)",
            dir.display(),
            config.hidden_size,
            config.num_layers,
            config.sequence_length,
            config.input_size
        );

        Ok(Self {
            scalers: ScalerState {
                feature_scaler: preprocessing.feature_scaler,
                price_scaler: preprocessing.price_scaler,
            },
            config,
            model,
        })
    }

    fn cross_validate(config: &ModelConfigFile, prep: &Preprocessing) -> StockcastResult<()> {
        // 알 수 없는 컬럼 이름 거부
        FeatureSchema::from_columns(config.feature_columns.columns().to_vec())?;
        // 추론 때 계산하는 특징과 이름, 순서가 같아야 함
        config.feature_columns.ensure_matches(&FeatureSchema::standard())?;

        if config.sequence_length != prep.sequence_length {
            return Err(StockcastError::artifact_mismatch(
                "sequence_length",
                format!(
                    "{} {} != {} {}",
                    MODEL_CONFIG_FILE, config.sequence_length, PREPROCESSING_FILE, prep.sequence_length
                ),
            ));
        }
        if config.sequence_length == 0 {
            return Err(StockcastError::artifact_mismatch("sequence_length", "0"));
        }
        prep.feature_columns.ensure_matches(&config.feature_columns)?;

        if config.input_size != config.feature_columns.len() {
            return Err(StockcastError::artifact_mismatch(
                "input_size",
                format!(
                    "input_size {} != 특징 {}개",
                    config.input_size,
                    config.feature_columns.len()
                ),
            ));
        }
        if prep.feature_scaler.n_features() != config.input_size
            || prep.feature_scaler.scale.len() != config.input_size
        {
            return Err(StockcastError::artifact_mismatch(
                "feature_scaler",
                format!(
                    "스케일러 컬럼 {}개 != input_size {}",
                    prep.feature_scaler.n_features(),
                    config.input_size
                ),
            ));
        }
        if config.symbols != prep.symbols {
            warn!(
                "⚠️ [ModelArtifact::load] 두 파일의 학습 종목 목록이 다릅니다 ({}개 vs {}개)",
                config.symbols.len(),
                prep.symbols.len()
            );
        }
        Ok(())
    }

    pub fn config(&self) -> &ModelConfigFile {
        &self.config
    }

    pub fn scalers(&self) -> &ScalerState {
        &self.scalers
    }

    pub fn model(&self) -> &SequenceModel {
        &self.model
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.config.feature_columns
    }

    pub fn sequence_length(&self) -> usize {
        self.config.sequence_length
    }

    pub fn symbols(&self) -> &[String] {
        &self.config.symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn n_features() -> usize {
        FeatureSchema::standard().len()
    }

    fn tiny_config(hidden: usize) -> ModelConfigFile {
        ModelConfigFile {
            input_size: n_features(),
            hidden_size: hidden,
            num_layers: 1,
            dropout: 0.1,
            sequence_length: 4,
            feature_columns: FeatureSchema::standard(),
            symbols: vec!["AAPL".to_string()],
            training_date: "2024-06-01T00:00:00".to_string(),
            total_samples: 10,
        }
    }

    fn scalers() -> ScalerState {
        let features = Array2::from_shape_fn((3, n_features()), |(i, j)| (i * j) as f64 + i as f64);
        ScalerState::fit(&features, &Array1::from(vec![10.0, 20.0, 15.0])).unwrap()
    }

    fn window() -> Array2<f32> {
        Array2::from_elem((4, n_features()), 0.5)
    }

    fn write_artifact(dir: &Path, config: &ModelConfigFile) -> f32 {
        let (varmap, model) = SequenceModel::init(config.network_config(), &Device::Cpu).unwrap();
        save_artifact(dir, &varmap, config, &scalers()).unwrap();
        model.predict(&window()).unwrap()
    }

    #[test]
    fn test_save_and_load_preserves_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = tiny_config(4);
        let before = write_artifact(dir.path(), &config);

        let artifact = ModelArtifact::load(dir.path(), &Device::Cpu).unwrap();
        assert_eq!(artifact.config(), &config);
        assert_eq!(artifact.scalers(), &scalers());
        let after = artifact.model().predict(&window()).unwrap();
        assert_eq!(before.to_bits(), after.to_bits());
    }

    #[test]
    fn test_sequence_length_disagreement() {
        let dir = tempfile::tempdir().unwrap();
        let config = tiny_config(4);
        write_artifact(dir.path(), &config);

        let path = dir.path().join(PREPROCESSING_FILE);
        let mut prep: Preprocessing = read_json(&path).unwrap();
        prep.sequence_length = 5;
        write_json(&path, &prep).unwrap();

        let err = ModelArtifact::load(dir.path(), &Device::Cpu).err().unwrap();
        assert!(matches!(err, StockcastError::ArtifactMismatch { ref field, .. } if field == "sequence_length"));
    }

    #[test]
    fn test_weights_shape_disagreement() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), &tiny_config(4));

        // 설정만 hidden 8로 바꾸면 가중치 형태가 맞지 않음
        write_json(&dir.path().join(MODEL_CONFIG_FILE), &tiny_config(8)).unwrap();

        let err = ModelArtifact::load(dir.path(), &Device::Cpu).err().unwrap();
        assert!(matches!(err, StockcastError::ArtifactMismatch { ref field, .. } if field == "weights"));
    }

    #[test]
    fn test_reordered_columns_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), &tiny_config(4));

        // 두 파일이 서로는 일치하지만 컬럼 순서가 표준과 다름
        let mut columns = FeatureSchema::standard().columns().to_vec();
        columns.swap(0, 1);
        let swapped = FeatureSchema::from_columns(columns).unwrap();

        let config_path = dir.path().join(MODEL_CONFIG_FILE);
        let mut config: ModelConfigFile = read_json(&config_path).unwrap();
        config.feature_columns = swapped.clone();
        write_json(&config_path, &config).unwrap();

        let prep_path = dir.path().join(PREPROCESSING_FILE);
        let mut prep: Preprocessing = read_json(&prep_path).unwrap();
        prep.feature_columns = swapped;
        write_json(&prep_path, &prep).unwrap();

        let err = ModelArtifact::load(dir.path(), &Device::Cpu).err().unwrap();
        assert!(matches!(err, StockcastError::ArtifactMismatch { ref field, .. } if field == "feature_columns"));
    }
}
