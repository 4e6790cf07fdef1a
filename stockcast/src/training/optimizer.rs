//! AdamW optimizer with persistable moment state.
//!
//! Update rule (decoupled weight decay):
//! ```text
//! m = beta1 * m + (1 - beta1) * g
//! v = beta2 * v + (1 - beta2) * g^2
//! m_hat = m / (1 - beta1^t)
//! v_hat = v / (1 - beta2^t)
//! theta = theta * (1 - lr * wd) - lr * m_hat / (sqrt(v_hat) + eps)
//! ```
//! Parameters without a gradient (batch-norm running statistics) are left untouched.

use candle_core::backprop::GradStore;
use candle_core::{DType, Tensor, Var};
use candle_nn::{Optimizer, VarMap};
use std::collections::HashMap;
use std::path::Path;

use crate::utility::errors::{StockcastError, StockcastResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamWParams {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub weight_decay: f64,
}

impl Default for AdamWParams {
    fn default() -> Self {
        Self {
            lr: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 1e-4,
        }
    }
}

struct ParamState {
    name: String,
    var: Var,
    first_moment: Var,
    second_moment: Var,
}

pub struct AdamW {
    params: AdamWParams,
    states: Vec<ParamState>,
    step_t: usize,
}

/// VarMap 파라미터를 이름순으로 정렬해서 반환
pub fn named_vars(varmap: &VarMap) -> StockcastResult<Vec<(String, Var)>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| StockcastError::general("VarMap 잠금이 오염되었습니다"))?;
    let mut vars: Vec<(String, Var)> = data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    vars.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(vars)
}

impl AdamW {
    pub fn from_named(vars: Vec<(String, Var)>, params: AdamWParams) -> candle_core::Result<Self> {
        let states = vars
            .into_iter()
            .filter(|(_, var)| var.dtype().is_float())
            .map(|(name, var)| {
                let first_moment = Var::zeros(var.shape(), var.dtype(), var.device())?;
                let second_moment = Var::zeros(var.shape(), var.dtype(), var.device())?;
                Ok(ParamState {
                    name,
                    var,
                    first_moment,
                    second_moment,
                })
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self {
            params,
            states,
            step_t: 0,
        })
    }

    pub fn from_varmap(varmap: &VarMap, params: AdamWParams) -> StockcastResult<Self> {
        Ok(Self::from_named(named_vars(varmap)?, params)?)
    }

    pub fn params(&self) -> &AdamWParams {
        &self.params
    }

    pub fn step_count(&self) -> usize {
        self.step_t
    }

    pub fn vars(&self) -> Vec<Var> {
        self.states.iter().map(|s| s.var.clone()).collect()
    }

    /// 1차/2차 모멘트를 safetensors로 저장 ("m.{name}", "v.{name}")
    pub fn save_state(&self, path: &Path) -> StockcastResult<()> {
        let mut tensors: HashMap<String, Tensor> = HashMap::new();
        for state in &self.states {
            tensors.insert(format!("m.{}", state.name), state.first_moment.as_tensor().clone());
            tensors.insert(format!("v.{}", state.name), state.second_moment.as_tensor().clone());
        }
        tensors.insert(
            "step".to_string(),
            Tensor::new(&[self.step_t as f32], &candle_core::Device::Cpu)?,
        );
        candle_core::safetensors::save(&tensors, path)?;
        Ok(())
    }

    pub fn load_state(&mut self, path: &Path) -> StockcastResult<()> {
        let device = self
            .states
            .first()
            .map(|s| s.var.device().clone())
            .unwrap_or(candle_core::Device::Cpu);
        let tensors = candle_core::safetensors::load(path, &device)?;

        for state in &self.states {
            for (prefix, moment) in [("m", &state.first_moment), ("v", &state.second_moment)] {
                let key = format!("{}.{}", prefix, state.name);
                let tensor = tensors.get(&key).ok_or_else(|| {
                    StockcastError::artifact_mismatch("optimizer_state", format!("{} 없음", key))
                })?;
                moment.set(tensor).map_err(|e| {
                    StockcastError::artifact_mismatch("optimizer_state", format!("{}: {}", key, e))
                })?;
            }
        }
        if let Some(step) = tensors.get("step") {
            let step = step.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
            self.step_t = step.first().copied().unwrap_or(0.0) as usize;
        }
        Ok(())
    }
}

impl Optimizer for AdamW {
    type Config = AdamWParams;

    fn new(vars: Vec<Var>, params: AdamWParams) -> candle_core::Result<Self> {
        let named = vars
            .into_iter()
            .enumerate()
            .map(|(i, v)| (format!("param{}", i), v))
            .collect();
        Self::from_named(named, params)
    }

    fn step(&mut self, grads: &GradStore) -> candle_core::Result<()> {
        self.step_t += 1;
        let AdamWParams {
            lr,
            beta1,
            beta2,
            eps,
            weight_decay,
        } = self.params;
        let scale_m = 1.0 / (1.0 - beta1.powi(self.step_t as i32));
        let scale_v = 1.0 / (1.0 - beta2.powi(self.step_t as i32));

        for state in &self.states {
            let theta = &state.var;
            let Some(g) = grads.get(theta) else {
                continue;
            };
            let next_m = ((state.first_moment.as_tensor() * beta1)? + (g * (1.0 - beta1))?)?;
            let next_v = ((state.second_moment.as_tensor() * beta2)? + (g.sqr()? * (1.0 - beta2))?)?;
            let m_hat = (&next_m * scale_m)?;
            let v_hat = (&next_v * scale_v)?;
            let decayed = (theta.as_tensor() * (1.0 - lr * weight_decay))?;
            let update = (m_hat / (v_hat.sqrt()? + eps)?)?;
            let next_theta = (decayed - (update * lr)?)?;

            state.first_moment.set(&next_m)?;
            state.second_moment.set(&next_v)?;
            theta.set(&next_theta)?;
        }
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.params.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.params.lr = lr;
    }
}

/// 전체 기울기 L2 노름을 max_norm 이하로 조정하고 조정 전 노름을 반환
pub fn clip_grad_norm(grads: &mut GradStore, vars: &[Var], max_norm: f64) -> StockcastResult<f64> {
    let mut total = 0.0f64;
    for var in vars {
        if let Some(g) = grads.get(var) {
            total += g.sqr()?.sum_all()?.to_dtype(DType::F64)?.to_scalar::<f64>()?;
        }
    }
    let norm = total.sqrt();

    let coef = max_norm / (norm + 1e-6);
    if coef < 1.0 {
        for var in vars {
            let scaled = match grads.get(var) {
                Some(g) => (g * coef)?,
                None => continue,
            };
            grads.insert(var, scaled);
        }
    }
    Ok(norm)
}
