use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{error, info};

use crate::model::artifact::ModelConfigFile;
use crate::model::predictor::Predictor;
use crate::utility::apis::MarketDataApi;
use crate::utility::config::DataConfig;
use crate::utility::errors::{StockcastError, StockcastResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub device: Option<String>,
    pub model_config: Option<ModelConfigFile>,
}

/// 시작 루틴에서 만들어 참조로 넘기는 예측기 핸들
/// 요청은 Arc 스냅샷을 받아 쓰고, 재로딩은 새 아티팩트 로드가 성공했을 때만 교체한다
#[derive(Default)]
pub struct PredictorHandle {
    inner: RwLock<Option<Arc<Predictor>>>,
}

impl PredictorHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 아티팩트를 로드해서 교체. 실패하면 기존 예측기가 계속 서비스된다
    pub fn load(
        &self,
        artifact_dir: &Path,
        api: Arc<dyn MarketDataApi>,
        data_config: &DataConfig,
    ) -> StockcastResult<()> {
        match Predictor::load(artifact_dir, api, data_config) {
            Ok(predictor) => {
                self.install(predictor)?;
                info!(
                    "✅ [PredictorHandle::load] 예측기 교체 완료: {}",
                    artifact_dir.display()
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    "❌ [PredictorHandle::load] 아티팩트 로드 실패, 기존 모델 유지: {}",
                    e
                );
                Err(e)
            }
        }
    }

    pub fn install(&self, predictor: Predictor) -> StockcastResult<()> {
        let mut slot = self
            .inner
            .write()
            .map_err(|_| StockcastError::general("PredictorHandle 잠금이 오염되었습니다"))?;
        *slot = Some(Arc::new(predictor));
        Ok(())
    }

    /// 현재 예측기 스냅샷. 로드 전이면 ModelNotLoaded
    pub fn current(&self) -> StockcastResult<Arc<Predictor>> {
        let slot = self
            .inner
            .read()
            .map_err(|_| StockcastError::general("PredictorHandle 잠금이 오염되었습니다"))?;
        slot.clone().ok_or(StockcastError::ModelNotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_ok()
    }

    pub fn health(&self) -> HealthStatus {
        match self.current() {
            Ok(predictor) => {
                let info = predictor.model_info();
                HealthStatus {
                    status: "healthy".to_string(),
                    model_loaded: true,
                    device: Some(info.device),
                    model_config: Some(info.model_config),
                }
            }
            Err(_) => HealthStatus {
                status: "unavailable".to_string(),
                model_loaded: false,
                device: None,
                model_config: None,
            },
        }
    }
}
