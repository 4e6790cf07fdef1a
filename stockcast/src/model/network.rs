use candle_core::{DType, Device, Tensor};
use candle_nn::rnn::{lstm, LSTMConfig, LSTM, RNN};
use candle_nn::{batch_norm, linear, BatchNorm, BatchNormConfig, Dropout, Linear, Module, ModuleT};
use candle_nn::{VarBuilder, VarMap};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::utility::errors::{StockcastError, StockcastResult};

/// 네트워크 구조 하이퍼파라미터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub dropout: f64,
}

/// 양방향 LSTM 한 층. 정방향/역방향 출력을 시점마다 이어 붙인다.
struct BiLstmLayer {
    fwd: LSTM,
    bwd: LSTM,
}

impl BiLstmLayer {
    fn new(layer_idx: usize, in_dim: usize, hidden: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let cfg = || LSTMConfig {
            layer_idx,
            ..Default::default()
        };
        Ok(Self {
            fwd: lstm(in_dim, hidden, cfg(), vb.pp("fwd"))?,
            bwd: lstm(in_dim, hidden, cfg(), vb.pp("bwd"))?,
        })
    }

    /// (batch, seq, in) → (batch, seq, 2 * hidden)
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let fwd_states = self.fwd.seq(xs)?;
        let fwd = self.fwd.states_to_tensor(&fwd_states)?;

        let reversed = reverse_time(xs)?;
        let bwd_states = self.bwd.seq(&reversed)?;
        let bwd = reverse_time(&self.bwd.states_to_tensor(&bwd_states)?)?;

        Tensor::cat(&[&fwd, &bwd], 2)
    }
}

/// 시간 축(dim 1) 뒤집기
fn reverse_time(xs: &Tensor) -> candle_core::Result<Tensor> {
    let seq_len = xs.dim(1)?;
    let idx: Vec<u32> = (0..seq_len as u32).rev().collect();
    let idx = Tensor::new(idx.as_slice(), xs.device())?;
    xs.index_select(&idx, 1)
}

struct RegressionHead {
    dropout: Dropout,
    fc1: Linear,
    bn1: BatchNorm,
    fc2: Linear,
    bn2: BatchNorm,
    out: Linear,
}

impl RegressionHead {
    fn new(hidden: usize, dropout: f64, vb: VarBuilder) -> candle_core::Result<Self> {
        let half = (hidden / 2).max(1);
        Ok(Self {
            dropout: Dropout::new(dropout as f32),
            fc1: linear(2 * hidden, hidden, vb.pp("fc1"))?,
            bn1: batch_norm(hidden, BatchNormConfig::default(), vb.pp("bn1"))?,
            fc2: linear(hidden, half, vb.pp("fc2"))?,
            bn2: batch_norm(half, BatchNormConfig::default(), vb.pp("bn2"))?,
            out: linear(half, 1, vb.pp("out"))?,
        })
    }

    fn forward_t(&self, xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let xs = self.dropout.forward_t(xs, train)?;
        let xs = self.fc1.forward(&xs)?;
        let xs = self.bn1.forward_t(&xs, train)?.gelu_erf()?;
        let xs = self.dropout.forward_t(&xs, train)?;
        let xs = self.fc2.forward(&xs)?;
        let xs = self.bn2.forward_t(&xs, train)?.relu()?;
        let xs = self.dropout.forward_t(&xs, train)?;
        self.out.forward(&xs)
    }
}

/// 다층 양방향 LSTM 인코더 + 회귀 헤드
pub struct SequenceModel {
    config: NetworkConfig,
    layers: Vec<BiLstmLayer>,
    layer_dropout: Dropout,
    head: RegressionHead,
    device: Device,
}

impl SequenceModel {
    pub fn new(config: NetworkConfig, vb: VarBuilder) -> StockcastResult<Self> {
        if config.input_size == 0 || config.hidden_size == 0 || config.num_layers == 0 {
            return Err(StockcastError::validation(
                "network_config",
                format!("잘못된 네트워크 구조: {:?}", config),
            ));
        }

        let device = vb.device().clone();
        let enc = vb.pp("encoder");
        let mut layers = Vec::with_capacity(config.num_layers);
        for i in 0..config.num_layers {
            let in_dim = if i == 0 {
                config.input_size
            } else {
                2 * config.hidden_size
            };
            layers.push(BiLstmLayer::new(
                i,
                in_dim,
                config.hidden_size,
                enc.pp(format!("l{}", i)),
            )?);
        }

        let head = RegressionHead::new(config.hidden_size, config.dropout, vb.pp("head"))?;

        Ok(Self {
            layer_dropout: Dropout::new(config.dropout as f32),
            config,
            layers,
            head,
            device,
        })
    }

    /// 새 VarMap에 파라미터를 만들고 모델 생성
    pub fn init(config: NetworkConfig, device: &Device) -> StockcastResult<(VarMap, Self)> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let model = Self::new(config, vb)?;
        Ok((varmap, model))
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// (batch, seq, features) → (batch, 1)
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
        let mut xs = xs.clone();
        let last_layer = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            xs = layer.forward(&xs)?;
            if i < last_layer {
                xs = self.layer_dropout.forward_t(&xs, train)?;
            }
        }

        let seq_len = xs.dim(1)?;
        let last = xs.narrow(1, seq_len - 1, 1)?.squeeze(1)?;
        self.head.forward_t(&last, train)
    }

    /// ndarray 배치를 입력 텐서로 변환
    pub fn batch_tensor(&self, inputs: &Array3<f32>) -> StockcastResult<Tensor> {
        let (b, l, f) = inputs.dim();
        Ok(Tensor::from_iter(inputs.iter().copied(), &self.device)?.reshape((b, l, f))?)
    }

    /// 추론 모드 단일 윈도우 예측 (스케일된 가격)
    pub fn predict(&self, window: &Array2<f32>) -> StockcastResult<f32> {
        let (l, f) = window.dim();
        if f != self.config.input_size {
            return Err(StockcastError::artifact_mismatch(
                "input_size",
                format!("입력 특징 {}개 != 모델 {}개", f, self.config.input_size),
            ));
        }
        let xs = Tensor::from_iter(window.iter().copied(), &self.device)?.reshape((1, l, f))?;
        let out = self.forward_t(&xs, false)?.flatten_all()?.to_vec1::<f32>()?;
        out.first()
            .copied()
            .ok_or_else(|| StockcastError::tensor("predict", "빈 출력"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> NetworkConfig {
        NetworkConfig {
            input_size: 5,
            hidden_size: 8,
            num_layers: 2,
            dropout: 0.2,
        }
    }

    #[test]
    fn test_forward_shape() {
        let device = Device::Cpu;
        let (_varmap, model) = SequenceModel::init(tiny_config(), &device).unwrap();
        let xs = Tensor::randn(0f32, 1.0, (4, 7, 5), &device).unwrap();

        let train_out = model.forward_t(&xs, true).unwrap();
        assert_eq!(train_out.dims(), &[4, 1]);

        let eval_out = model.forward_t(&xs, false).unwrap();
        assert_eq!(eval_out.dims(), &[4, 1]);
    }

    #[test]
    fn test_inference_is_deterministic() {
        let device = Device::Cpu;
        let (_varmap, model) = SequenceModel::init(tiny_config(), &device).unwrap();
        let window = Array2::from_shape_fn((7, 5), |(i, j)| (i as f32 * 0.1) - (j as f32 * 0.05));

        let a = model.predict(&window).unwrap();
        let b = model.predict(&window).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_parameter_names_are_stable() {
        let device = Device::Cpu;
        let (varmap, _model) = SequenceModel::init(tiny_config(), &device).unwrap();
        let data = varmap.data().lock().unwrap();

        for name in [
            "encoder.l0.fwd.weight_ih_l0",
            "encoder.l0.bwd.weight_hh_l0",
            "encoder.l1.fwd.bias_ih_l1",
            "head.fc1.weight",
            "head.bn1.running_mean",
            "head.bn2.running_var",
            "head.out.bias",
        ] {
            assert!(data.contains_key(name), "missing parameter {}", name);
        }

        // 2층 인코더의 입력 크기는 2 * hidden
        let w = data.get("encoder.l1.fwd.weight_ih_l1").unwrap();
        assert_eq!(w.dims(), &[4 * 8, 2 * 8]);
    }

    #[test]
    fn test_wrong_window_width_is_rejected() {
        let device = Device::Cpu;
        let (_varmap, model) = SequenceModel::init(tiny_config(), &device).unwrap();
        let err = model.predict(&Array2::zeros((7, 4))).unwrap_err();
        assert!(matches!(err, StockcastError::ArtifactMismatch { .. }));
    }
}
