pub mod bar;
pub mod prediction;

pub use bar::DailyBar;
pub use prediction::{
    BatchPredictionReport, BatchPredictionRequest, FailureReport, Prediction, PredictionOutcome,
    PredictionRequest, Signal, StockInfo, StockInfoOutcome, StockInfoRequest,
};
