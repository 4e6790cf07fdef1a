pub mod optimizer;
pub mod pipeline;
pub mod scheduler;
pub mod trainer;

pub use optimizer::{clip_grad_norm, AdamW, AdamWParams};
pub use pipeline::{SkippedSymbol, TrainingPipeline, TrainingSummary};
pub use scheduler::{EarlyStopDecision, EarlyStopping, PlateauScheduler};
pub use trainer::{CheckpointInfo, EpochRecord, StopReason, Trainer, TrainerConfig, TrainingReport};
