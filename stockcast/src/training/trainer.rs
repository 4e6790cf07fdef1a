use candle_core::Tensor;
use candle_nn::{Optimizer, VarMap};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::model::artifact::write_json;
use crate::model::network::SequenceModel;
use crate::model::sequencer::SequenceSet;
use crate::training::optimizer::{clip_grad_norm, AdamW, AdamWParams};
use crate::training::scheduler::{EarlyStopDecision, EarlyStopping, PlateauScheduler};
use crate::utility::config::TrainingConfig;
use crate::utility::errors::{StockcastError, StockcastResult};

pub const CHECKPOINT_FILE: &str = "checkpoint.safetensors";
pub const CHECKPOINT_OPTIMIZER_FILE: &str = "checkpoint_optimizer.safetensors";
pub const CHECKPOINT_META_FILE: &str = "checkpoint.json";

/// 학습 루프 하이퍼파라미터
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerConfig {
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub max_epochs: usize,
    pub early_stopping_patience: usize,
    pub lr_patience: usize,
    pub lr_factor: f64,
    pub min_learning_rate: f64,
    pub grad_clip_norm: f64,
    pub seed: u64,
    pub show_progress: bool,
}

impl From<&TrainingConfig> for TrainerConfig {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            learning_rate: config.learning_rate,
            weight_decay: config.weight_decay,
            max_epochs: config.max_epochs,
            early_stopping_patience: config.early_stopping_patience,
            lr_patience: config.lr_patience,
            lr_factor: config.lr_factor,
            min_learning_rate: config.min_learning_rate,
            grad_clip_norm: config.grad_clip_norm,
            seed: config.seed,
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EarlyStop,
    MaxEpochs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub learning_rate: f64,
    /// 지금까지의 최저 검증 손실
    pub best_val_loss: f64,
}

/// checkpoint.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub epoch: usize,
    pub val_loss: f64,
    pub train_loss: f64,
    pub learning_rate: f64,
    pub step: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub best_val_loss: f64,
    pub best_epoch: usize,
    pub epochs_run: usize,
    pub stop_reason: StopReason,
    pub history: Vec<EpochRecord>,
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// 학습 후 최적 체크포인트 가중치를 varmap에 복원한다
    pub fn train(
        &self,
        model: &SequenceModel,
        varmap: &mut VarMap,
        train_set: &SequenceSet,
        val_set: &SequenceSet,
        checkpoint_dir: &Path,
    ) -> StockcastResult<TrainingReport> {
        self.check_inputs(train_set, val_set)?;
        fs::create_dir_all(checkpoint_dir)
            .map_err(|e| StockcastError::io(format!("{} 생성", checkpoint_dir.display()), e))?;
        // 이전 실행의 체크포인트 제거
        remove_stale_checkpoint(checkpoint_dir)?;

        let params = AdamWParams {
            lr: self.config.learning_rate,
            weight_decay: self.config.weight_decay,
            ..Default::default()
        };
        let mut optimizer = AdamW::from_varmap(varmap, params)?;
        let vars = optimizer.vars();
        let mut scheduler = PlateauScheduler::new(
            self.config.lr_factor,
            self.config.lr_patience,
            self.config.min_learning_rate,
        );
        let mut stopper = EarlyStopping::new(self.config.early_stopping_patience);
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        info!(
            "🚀 [Trainer::train] 학습 시작 - 학습 {}개, 검증 {}개, 배치 {}, 최대 {} 에포크",
            train_set.len(),
            val_set.len(),
            self.config.batch_size,
            self.config.max_epochs
        );

        let pb = self.progress_bar();
        let mut history = Vec::new();
        let mut stop_reason = StopReason::MaxEpochs;
        let mut checkpoint_written = false;

        for epoch in 1..=self.config.max_epochs {
            let batches = train_batches(train_set.len(), self.config.batch_size, &mut rng);

            let mut loss_sum = 0.0;
            for (b, indices) in batches.iter().enumerate() {
                let batch = train_set.select(indices);
                let xs = model.batch_tensor(&batch.inputs)?;
                let ys = Tensor::from_iter(batch.targets.iter().copied(), model.device())?
                    .reshape((indices.len(), 1))?;

                let preds = model.forward_t(&xs, true)?;
                let loss = candle_nn::loss::mse(&preds, &ys)?;
                let loss_value = loss.to_scalar::<f32>()? as f64;
                if !loss_value.is_finite() {
                    pb.abandon();
                    return Err(StockcastError::TrainingDivergence {
                        epoch,
                        batch: b + 1,
                        loss: loss_value,
                    });
                }

                let mut grads = loss.backward()?;
                let grad_norm = clip_grad_norm(&mut grads, &vars, self.config.grad_clip_norm)?;
                optimizer.step(&grads)?;
                loss_sum += loss_value;
                debug!(
                    "[Trainer::train] 에포크 {} 배치 {}/{} - loss {:.6}, grad norm {:.4}",
                    epoch,
                    b + 1,
                    batches.len(),
                    loss_value,
                    grad_norm
                );
            }
            let train_loss = loss_sum / batches.len() as f64;
            let val_loss = self.evaluate(model, val_set)?;
            if !val_loss.is_finite() {
                pb.abandon();
                return Err(StockcastError::validation(
                    "val_loss",
                    format!("에포크 {} 검증 손실이 유한하지 않습니다: {}", epoch, val_loss),
                ));
            }
            let learning_rate = optimizer.learning_rate();

            let decision = stopper.update(epoch, val_loss);
            if decision == EarlyStopDecision::Improved {
                let info = CheckpointInfo {
                    epoch,
                    val_loss,
                    train_loss,
                    learning_rate,
                    step: optimizer.step_count(),
                };
                write_checkpoint(checkpoint_dir, varmap, &optimizer, &info)?;
                checkpoint_written = true;
            }

            history.push(EpochRecord {
                epoch,
                train_loss,
                val_loss,
                learning_rate,
                best_val_loss: stopper.best(),
            });
            pb.inc(1);
            pb.set_message(format!("train {:.5} / val {:.5}", train_loss, val_loss));
            info!(
                "📈 [Trainer::train] 에포크 {}/{} - train {:.6}, val {:.6}, lr {:.2e}{}",
                epoch,
                self.config.max_epochs,
                train_loss,
                val_loss,
                learning_rate,
                if decision == EarlyStopDecision::Improved {
                    " (개선, 체크포인트 저장)"
                } else {
                    ""
                }
            );

            if decision == EarlyStopDecision::Stop {
                info!(
                    "⏹️ [Trainer::train] 조기 종료 - {} 에포크 동안 개선 없음",
                    self.config.early_stopping_patience
                );
                stop_reason = StopReason::EarlyStop;
                break;
            }

            let next_lr = scheduler.step(val_loss, learning_rate);
            optimizer.set_learning_rate(next_lr);
        }
        pb.finish_with_message("학습 완료");

        if checkpoint_written {
            varmap.load(checkpoint_dir.join(CHECKPOINT_FILE)).map_err(|e| {
                StockcastError::artifact_mismatch("checkpoint", format!("최적 가중치 복원 실패: {}", e))
            })?;
            info!(
                "✅ [Trainer::train] 최적 가중치 복원 - 에포크 {}, val {:.6}",
                stopper.best_epoch(),
                stopper.best()
            );
        } else {
            warn!("⚠️ [Trainer::train] 저장된 체크포인트가 없어 마지막 가중치를 사용합니다");
        }

        Ok(TrainingReport {
            best_val_loss: stopper.best(),
            best_epoch: stopper.best_epoch(),
            epochs_run: history.len(),
            stop_reason,
            history,
        })
    }

    /// 검증 손실: 배치별 MSE 평균 (드롭아웃 끔)
    pub fn evaluate(&self, model: &SequenceModel, set: &SequenceSet) -> StockcastResult<f64> {
        if set.is_empty() {
            return Err(StockcastError::validation("validation_set", "검증 데이터가 비어 있습니다"));
        }
        let indices: Vec<usize> = (0..set.len()).collect();
        let mut loss_sum = 0.0;
        let mut batches = 0usize;
        for chunk in indices.chunks(self.config.batch_size.max(1)) {
            let batch = set.select(chunk);
            let xs = model.batch_tensor(&batch.inputs)?;
            let ys = Tensor::from_iter(batch.targets.iter().copied(), model.device())?
                .reshape((chunk.len(), 1))?;
            let preds = model.forward_t(&xs, false)?;
            loss_sum += candle_nn::loss::mse(&preds, &ys)?.to_scalar::<f32>()? as f64;
            batches += 1;
        }
        Ok(loss_sum / batches as f64)
    }

    fn check_inputs(&self, train_set: &SequenceSet, val_set: &SequenceSet) -> StockcastResult<()> {
        if self.config.batch_size == 0 {
            return Err(StockcastError::validation("batch_size", "0일 수 없습니다"));
        }
        if self.config.max_epochs == 0 {
            return Err(StockcastError::validation("max_epochs", "0일 수 없습니다"));
        }
        // 배치 정규화 학습에는 배치당 2개 이상이 필요
        if train_set.len() < 2 {
            return Err(StockcastError::validation(
                "train_set",
                format!("학습 시퀀스가 {}개입니다 (최소 2개 필요)", train_set.len()),
            ));
        }
        if val_set.is_empty() {
            return Err(StockcastError::validation("validation_set", "검증 데이터가 비어 있습니다"));
        }
        if train_set.n_features() != val_set.n_features()
            || train_set.sequence_length() != val_set.sequence_length()
        {
            return Err(StockcastError::validation(
                "validation_set",
                "학습/검증 시퀀스 형태가 다릅니다",
            ));
        }
        Ok(())
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(self.config.max_epochs as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} 에포크 ({eta}) {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}

/// 시드 셔플 후 배치 분할. 마지막 배치가 1개면 앞 배치에 합친다
fn train_batches(n: usize, batch_size: usize, rng: &mut StdRng) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    let mut batches: Vec<Vec<usize>> = indices.chunks(batch_size.max(1)).map(|c| c.to_vec()).collect();
    if batches.len() > 1 && batches.last().map(|b| b.len()) == Some(1) {
        if let Some(last) = batches.pop() {
            if let Some(prev) = batches.last_mut() {
                prev.extend(last);
            }
        }
    }
    batches
}

fn remove_stale_checkpoint(dir: &Path) -> StockcastResult<()> {
    for file in [CHECKPOINT_FILE, CHECKPOINT_OPTIMIZER_FILE, CHECKPOINT_META_FILE] {
        let path = dir.join(file);
        match fs::remove_file(&path) {
            Ok(()) => debug!("🗑️ [Trainer::checkpoint] 이전 체크포인트 삭제: {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StockcastError::io(format!("{} 삭제", path.display()), e)),
        }
    }
    Ok(())
}

fn write_checkpoint(
    dir: &Path,
    varmap: &VarMap,
    optimizer: &AdamW,
    info: &CheckpointInfo,
) -> StockcastResult<()> {
    varmap.save(dir.join(CHECKPOINT_FILE))?;
    optimizer.save_state(&dir.join(CHECKPOINT_OPTIMIZER_FILE))?;
    write_json(&dir.join(CHECKPOINT_META_FILE), info)?;
    debug!(
        "💾 [Trainer::checkpoint] 에포크 {} 체크포인트 저장 (val {:.6})",
        info.epoch, info.val_loss
    );
    Ok(())
}
