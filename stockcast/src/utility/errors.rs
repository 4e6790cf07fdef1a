use serde::{Deserialize, Serialize};
use thiserror::Error;

/// stockcast 시스템의 모든 오류 타입을 정의하는 enum
/// 각 오류는 구체적인 컨텍스트 정보를 포함하여 호출자가 구조화된 형태로 처리할 수 있게 함
#[derive(Error, Debug)]
pub enum StockcastError {
    /// 시세 조회 실패 또는 최소 봉 개수 미달
    #[error("데이터 없음: {symbol} - {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// 특징 계산 후 행이 부족하거나 지표 계산이 퇴화한 경우
    #[error("특징 부족: {symbol} - {reason}")]
    FeatureInsufficient { symbol: String, reason: String },

    /// 가중치/스케일러/설정 간 형태 불일치
    #[error("아티팩트 불일치: {field} - {reason}")]
    ArtifactMismatch { field: String, reason: String },

    /// 학습 중 손실이 유한하지 않음
    #[error("학습 발산: epoch {epoch} batch {batch} 손실 {loss}")]
    TrainingDivergence { epoch: usize, batch: usize, loss: f64 },

    /// 아티팩트가 로드되기 전에 추론 요청
    #[error("모델이 로드되지 않았습니다")]
    ModelNotLoaded,

    /// 데이터베이스 관련 오류
    #[error("데이터베이스 오류: {operation} - {reason}")]
    Database { operation: String, reason: String },

    /// 설정 관련 오류 (config.rs의 ConfigError와 연동)
    #[error("설정 오류: {0}")]
    Config(#[from] crate::utility::config::ConfigError),

    /// 일반적인 I/O 오류
    #[error("I/O 오류: {operation} - {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON 직렬화/역직렬화 오류
    #[error("직렬화 오류: {data_type} - {reason}")]
    Serialization { data_type: String, reason: String },

    /// 텐서 연산 오류 (candle)
    #[error("텐서 오류: {operation} - {reason}")]
    Tensor { operation: String, reason: String },

    /// 유효성 검증 오류
    #[error("유효성 검증 실패: {field} - {reason}")]
    Validation { field: String, reason: String },

    /// 일반적인 오류 (기타)
    #[error("오류: {message}")]
    General { message: String },
}

/// stockcast에서 사용하는 Result 타입 별칭
pub type StockcastResult<T> = Result<T, StockcastError>;

/// 호출자에게 노출되는 오류 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DataUnavailable,
    FeatureInsufficient,
    ArtifactMismatch,
    TrainingDivergence,
    ModelNotLoaded,
    Internal,
}

impl StockcastError {
    /// 데이터 없음 오류를 간편하게 생성하는 헬퍼 함수
    pub fn data_unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// 특징 부족 오류를 간편하게 생성하는 헬퍼 함수
    pub fn feature_insufficient(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FeatureInsufficient {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// 아티팩트 불일치 오류를 간편하게 생성하는 헬퍼 함수
    pub fn artifact_mismatch(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ArtifactMismatch {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// 데이터베이스 오류를 간편하게 생성하는 헬퍼 함수
    pub fn database(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// 데이터베이스 쿼리 관련 오류를 생성하는 헬퍼 함수
    pub fn database_query(message: impl Into<String>) -> Self {
        Self::Database {
            operation: "쿼리 실행".to_string(),
            reason: message.into(),
        }
    }

    pub fn tensor(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Tensor {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// 파일 I/O 오류에 작업 설명을 붙이는 헬퍼 함수
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// 일반적인 오류를 생성하는 헬퍼 함수
    pub fn general(message: impl Into<String>) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// 구조화된 응답에 실릴 오류 분류
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DataUnavailable { .. } => ErrorKind::DataUnavailable,
            Self::FeatureInsufficient { .. } => ErrorKind::FeatureInsufficient,
            Self::ArtifactMismatch { .. } => ErrorKind::ArtifactMismatch,
            Self::TrainingDivergence { .. } => ErrorKind::TrainingDivergence,
            Self::ModelNotLoaded => ErrorKind::ModelNotLoaded,
            _ => ErrorKind::Internal,
        }
    }

    /// 배치 처리에서 종목 단위로 복구 가능한 오류인지 여부
    /// 데이터/특징 단계 오류만 복구 가능하고, 나머지는 세션 전체에 치명적
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DataUnavailable { .. } | Self::FeatureInsufficient { .. }
        )
    }
}

/// Rusqlite 데이터베이스 오류를 StockcastError로 변환
impl From<rusqlite::Error> for StockcastError {
    fn from(error: rusqlite::Error) -> Self {
        let operation = match &error {
            rusqlite::Error::SqliteFailure(_, _) => "SQL 실행",
            rusqlite::Error::InvalidParameterName(_) => "매개변수 검증",
            rusqlite::Error::InvalidPath(_) => "경로 확인",
            rusqlite::Error::InvalidColumnIndex(_) => "컬럼 인덱스",
            rusqlite::Error::InvalidColumnName(_) => "컬럼 이름",
            rusqlite::Error::InvalidColumnType(_, _, _) => "컬럼 타입",
            _ => "데이터베이스 작업",
        };

        StockcastError::Database {
            operation: operation.to_string(),
            reason: error.to_string(),
        }
    }
}

/// std::io::Error를 StockcastError로 변환
impl From<std::io::Error> for StockcastError {
    fn from(error: std::io::Error) -> Self {
        StockcastError::Io {
            operation: "파일 I/O".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for StockcastError {
    fn from(error: serde_json::Error) -> Self {
        StockcastError::Serialization {
            data_type: "JSON".to_string(),
            reason: error.to_string(),
        }
    }
}

/// candle 텐서 오류를 StockcastError로 변환
impl From<candle_core::Error> for StockcastError {
    fn from(error: candle_core::Error) -> Self {
        StockcastError::Tensor {
            operation: "candle".to_string(),
            reason: error.to_string(),
        }
    }
}

impl From<ndarray::ShapeError> for StockcastError {
    fn from(error: ndarray::ShapeError) -> Self {
        StockcastError::Tensor {
            operation: "ndarray 형태 변환".to_string(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = StockcastError::data_unavailable("AAPL", "40개 봉만 조회됨");
        assert_eq!(error.to_string(), "데이터 없음: AAPL - 40개 봉만 조회됨");
    }

    #[test]
    fn test_error_kind_and_recoverability() {
        let recoverable = [
            StockcastError::data_unavailable("AAPL", "x"),
            StockcastError::feature_insufficient("AAPL", "x"),
        ];
        for error in &recoverable {
            assert!(error.is_recoverable());
        }

        let fatal = [
            StockcastError::artifact_mismatch("sequence_length", "60 != 30"),
            StockcastError::TrainingDivergence {
                epoch: 1,
                batch: 3,
                loss: f64::NAN,
            },
            StockcastError::ModelNotLoaded,
        ];
        for error in &fatal {
            assert!(!error.is_recoverable());
        }

        assert_eq!(fatal[2].kind(), ErrorKind::ModelNotLoaded);
        assert_eq!(
            StockcastError::general("boom").kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::DataUnavailable)
            .expect("ErrorKind should serialize");
        assert_eq!(json, "\"data_unavailable\"");
    }

    #[test]
    fn test_result_type() {
        fn test_function() -> StockcastResult<i32> {
            Ok(42)
        }

        assert_eq!(test_function().expect("Test function should succeed"), 42);
    }
}
