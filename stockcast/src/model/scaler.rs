use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::utility::errors::{StockcastError, StockcastResult};
use crate::utility::policy::PRICE_RANGE;

/// 컬럼별 표준화 (평균 0, 모표준편차 1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(matrix: &Array2<f64>) -> StockcastResult<Self> {
        if matrix.nrows() == 0 || matrix.ncols() == 0 {
            return Err(StockcastError::validation(
                "feature_matrix",
                "빈 행렬로는 스케일러를 학습할 수 없습니다",
            ));
        }

        let mean = matrix
            .mean_axis(Axis(0))
            .ok_or_else(|| StockcastError::validation("feature_matrix", "평균 계산 실패"))?;
        let std = matrix.std_axis(Axis(0), 0.0);

        Ok(Self {
            mean: mean.to_vec(),
            // 분산이 0인 컬럼은 스케일 1
            scale: std.iter().map(|s| if *s == 0.0 { 1.0 } else { *s }).collect(),
        })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, matrix: &Array2<f64>) -> StockcastResult<Array2<f64>> {
        if matrix.ncols() != self.n_features() {
            return Err(StockcastError::artifact_mismatch(
                "feature_scaler",
                format!(
                    "컬럼 수 불일치: 입력 {} != 학습 {}",
                    matrix.ncols(),
                    self.n_features()
                ),
            ));
        }
        let mean = Array1::from(self.mean.clone());
        let scale = Array1::from(self.scale.clone());
        Ok((matrix - &mean) / &scale)
    }
}

/// 종가 min-max 스케일링 ([0, 1])
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceScaler {
    pub data_min: f64,
    pub data_max: f64,
    pub scale: f64,
    pub min: f64,
}

impl PriceScaler {
    pub fn fit(targets: &Array1<f64>) -> StockcastResult<Self> {
        if targets.is_empty() {
            return Err(StockcastError::validation(
                "targets",
                "빈 타깃으로는 가격 스케일러를 학습할 수 없습니다",
            ));
        }
        let data_min = targets.iter().copied().fold(f64::INFINITY, f64::min);
        let data_max = targets.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = data_max - data_min;
        let (lo, hi) = PRICE_RANGE;
        let scale = (hi - lo) / if range == 0.0 { 1.0 } else { range };

        Ok(Self {
            data_min,
            data_max,
            scale,
            min: lo - data_min * scale,
        })
    }

    pub fn transform(&self, price: f64) -> f64 {
        price * self.scale + self.min
    }

    pub fn transform_all(&self, prices: &Array1<f64>) -> Array1<f64> {
        prices.mapv(|p| self.transform(p))
    }

    pub fn inverse_transform(&self, scaled: f64) -> f64 {
        (scaled - self.min) / self.scale
    }
}

/// 학습 1회당 한 번 학습되는 특징/가격 스케일러 쌍
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub feature_scaler: StandardScaler,
    pub price_scaler: PriceScaler,
}

impl ScalerState {
    /// 전 종목을 합친 특징 행렬과 타깃으로 학습
    pub fn fit(features: &Array2<f64>, targets: &Array1<f64>) -> StockcastResult<Self> {
        Ok(Self {
            feature_scaler: StandardScaler::fit(features)?,
            price_scaler: PriceScaler::fit(targets)?,
        })
    }

    pub fn transform(&self, features: &Array2<f64>) -> StockcastResult<Array2<f64>> {
        self.feature_scaler.transform(features)
    }

    pub fn transform_targets(&self, targets: &Array1<f64>) -> Array1<f64> {
        self.price_scaler.transform_all(targets)
    }

    pub fn inverse_transform_price(&self, scaled: f64) -> f64 {
        self.price_scaler.inverse_transform(scaled)
    }
}
