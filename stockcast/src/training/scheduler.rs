use tracing::info;

/// 검증 손실이 정체되면 학습률을 줄이는 스케줄러
/// 상대 임계값 기준으로 개선 여부를 판단하고, patience를 넘긴 뒤 factor만큼 곱한다
#[derive(Debug, Clone)]
pub struct PlateauScheduler {
    factor: f64,
    patience: usize,
    threshold: f64,
    min_lr: f64,
    best: f64,
    bad_epochs: usize,
}

impl PlateauScheduler {
    pub fn new(factor: f64, patience: usize, min_lr: f64) -> Self {
        Self {
            factor,
            patience,
            threshold: 1e-4,
            min_lr,
            best: f64::INFINITY,
            bad_epochs: 0,
        }
    }

    /// 에포크 검증 손실을 반영하고 새 학습률을 반환
    pub fn step(&mut self, val_loss: f64, current_lr: f64) -> f64 {
        if val_loss < self.best * (1.0 - self.threshold) {
            self.best = val_loss;
            self.bad_epochs = 0;
            return current_lr;
        }

        self.bad_epochs += 1;
        if self.bad_epochs > self.patience {
            self.bad_epochs = 0;
            let new_lr = (current_lr * self.factor).max(self.min_lr);
            if new_lr < current_lr {
                info!(
                    "📉 [PlateauScheduler::step] 학습률 감소: {:.2e} → {:.2e}",
                    current_lr, new_lr
                );
            }
            return new_lr;
        }
        current_lr
    }

    pub fn bad_epochs(&self) -> usize {
        self.bad_epochs
    }
}

/// 조기 종료 판정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyStopDecision {
    Improved,
    Waiting,
    Stop,
}

/// 최저 검증 손실을 추적. 엄격히 작아져야 개선으로 본다
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best: f64,
    best_epoch: usize,
    counter: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            best_epoch: 0,
            counter: 0,
        }
    }

    pub fn update(&mut self, epoch: usize, val_loss: f64) -> EarlyStopDecision {
        if val_loss < self.best {
            self.best = val_loss;
            self.best_epoch = epoch;
            self.counter = 0;
            return EarlyStopDecision::Improved;
        }

        self.counter += 1;
        if self.counter >= self.patience {
            EarlyStopDecision::Stop
        } else {
            EarlyStopDecision::Waiting
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plateau_reduces_after_patience() {
        let mut scheduler = PlateauScheduler::new(0.5, 2, 0.0);
        let mut lr = 0.001;

        lr = scheduler.step(1.0, lr);
        assert_eq!(lr, 0.001);

        // 정체 3번째 에포크에서 감소 (patience 초과)
        lr = scheduler.step(1.0, lr);
        lr = scheduler.step(1.0, lr);
        assert_eq!(lr, 0.001);
        lr = scheduler.step(1.0, lr);
        assert_eq!(lr, 0.0005);
        assert_eq!(scheduler.bad_epochs(), 0);
    }

    #[test]
    fn test_plateau_ignores_tiny_improvement() {
        let mut scheduler = PlateauScheduler::new(0.5, 0, 0.0);
        let lr = scheduler.step(1.0, 0.01);
        assert_eq!(lr, 0.01);
        // 상대 1e-4 미만 개선은 정체로 처리
        let lr = scheduler.step(0.99999, lr);
        assert_eq!(lr, 0.005);
    }

    #[test]
    fn test_plateau_respects_min_lr() {
        let mut scheduler = PlateauScheduler::new(0.1, 0, 1e-4);
        scheduler.step(1.0, 1e-3);
        let lr = scheduler.step(2.0, 1e-3);
        assert_eq!(lr, 1e-4);
        let lr = scheduler.step(2.0, lr);
        assert_eq!(lr, 1e-4);
    }

    #[test]
    fn test_early_stopping_counts_non_improving_epochs() {
        let mut stopper = EarlyStopping::new(3);
        assert_eq!(stopper.update(0, 1.0), EarlyStopDecision::Improved);
        assert_eq!(stopper.update(1, 0.5), EarlyStopDecision::Improved);
        // 같은 값은 개선이 아님
        assert_eq!(stopper.update(2, 0.5), EarlyStopDecision::Waiting);
        assert_eq!(stopper.update(3, 0.7), EarlyStopDecision::Waiting);
        assert_eq!(stopper.update(4, 0.6), EarlyStopDecision::Stop);
        assert_eq!(stopper.best(), 0.5);
        assert_eq!(stopper.best_epoch(), 1);
    }
}
