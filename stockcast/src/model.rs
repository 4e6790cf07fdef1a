pub mod artifact;
pub mod features;
pub mod handle;
pub mod network;
pub mod predictor;
pub mod scaler;
pub mod sequencer;

// 자주 쓰는 타입 재수출
pub use artifact::{save_artifact, ModelArtifact, ModelConfigFile, Preprocessing};
pub use features::{FeatureEngine, FeatureSchema, FeatureTable};
pub use handle::{HealthStatus, PredictorHandle};
pub use network::{NetworkConfig, SequenceModel};
pub use predictor::{ModelInfo, Predictor, SupportedSymbols};
pub use scaler::{PriceScaler, ScalerState, StandardScaler};
pub use sequencer::{make_last_window, make_sequences, SequenceSet};
