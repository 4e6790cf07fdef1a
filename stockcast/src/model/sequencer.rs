use ndarray::{s, concatenate, Array1, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::utility::errors::{StockcastError, StockcastResult};

/// (윈도우, 타깃) 묶음. inputs: (N, L, F), targets: (N)
#[derive(Debug, Clone)]
pub struct SequenceSet {
    pub inputs: Array3<f32>,
    pub targets: Array1<f32>,
}

impl SequenceSet {
    pub fn empty(sequence_length: usize, n_features: usize) -> Self {
        Self {
            inputs: Array3::zeros((0, sequence_length, n_features)),
            targets: Array1::zeros(0),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn sequence_length(&self) -> usize {
        self.inputs.shape()[1]
    }

    pub fn n_features(&self) -> usize {
        self.inputs.shape()[2]
    }

    /// 종목별 묶음을 이어 붙임
    pub fn concat(sets: &[SequenceSet]) -> StockcastResult<Self> {
        let first = sets
            .first()
            .ok_or_else(|| StockcastError::validation("sequences", "합칠 시퀀스가 없습니다"))?;
        let inputs: Vec<_> = sets.iter().map(|s| s.inputs.view()).collect();
        let targets: Vec<_> = sets.iter().map(|s| s.targets.view()).collect();
        if sets.len() == 1 {
            return Ok(first.clone());
        }
        Ok(Self {
            inputs: concatenate(Axis(0), &inputs)?,
            targets: concatenate(Axis(0), &targets)?,
        })
    }

    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            inputs: self.inputs.select(Axis(0), indices),
            targets: self.targets.select(Axis(0), indices),
        }
    }

    /// 시드 고정 셔플 후 (학습, 검증) 분할
    pub fn shuffle_split(&self, validation_fraction: f64, seed: u64) -> (Self, Self) {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_val = ((self.len() as f64) * validation_fraction).round() as usize;
        let n_train = self.len() - n_val.min(self.len());
        let (train_idx, val_idx) = indices.split_at(n_train);
        (self.select(train_idx), self.select(val_idx))
    }
}

/// 학습용 시퀀스: i >= L 마다 [i-L, i) 윈도우와 i번째 타깃
pub fn make_sequences(
    scaled_features: &Array2<f64>,
    scaled_targets: &Array1<f64>,
    sequence_length: usize,
) -> StockcastResult<SequenceSet> {
    let n = scaled_features.nrows();
    let f = scaled_features.ncols();
    if scaled_targets.len() != n {
        return Err(StockcastError::validation(
            "targets",
            format!("특징 행 {}개와 타깃 {}개의 길이가 다릅니다", n, scaled_targets.len()),
        ));
    }
    if sequence_length == 0 {
        return Err(StockcastError::validation("sequence_length", "0일 수 없습니다"));
    }
    if n <= sequence_length {
        return Ok(SequenceSet::empty(sequence_length, f));
    }

    let count = n - sequence_length;
    let mut inputs = Array3::<f32>::zeros((count, sequence_length, f));
    let mut targets = Array1::<f32>::zeros(count);
    for (k, i) in (sequence_length..n).enumerate() {
        let window = scaled_features.slice(s![i - sequence_length..i, ..]);
        inputs
            .slice_mut(s![k, .., ..])
            .assign(&window.mapv(|v| v as f32));
        targets[k] = scaled_targets[i] as f32;
    }

    Ok(SequenceSet { inputs, targets })
}

/// 추론용 마지막 윈도우 (L × F)
pub fn make_last_window(
    symbol: &str,
    scaled_features: &Array2<f64>,
    sequence_length: usize,
) -> StockcastResult<Array2<f32>> {
    let n = scaled_features.nrows();
    if n < sequence_length || sequence_length == 0 {
        return Err(StockcastError::feature_insufficient(
            symbol,
            format!(
                "특징 행 {}개로는 길이 {} 시퀀스를 만들 수 없습니다",
                n, sequence_length
            ),
        ));
    }
    Ok(scaled_features
        .slice(s![n - sequence_length.., ..])
        .mapv(|v| v as f32))
}
