//! 학습과 추론이 공유하는 정책 상수
//!
//! 두 경로가 같은 값을 보도록 여기 한 곳에만 둔다. 설정 파일의 기본값도 이 값을 사용한다.

/// 종목 하나를 사용하기 위한 최소 조회 봉 개수
pub const MIN_FETCH_BARS: usize = 100;

/// 특징 계산을 시작하기 위한 최소 봉 개수
pub const MIN_FEATURE_BARS: usize = 50;

/// 모델 입력 시퀀스 길이 (거래일)
pub const DEFAULT_SEQUENCE_LENGTH: usize = 60;

/// 추론 시 조회하는 달력 기준 일수
pub const LOOKBACK_CALENDAR_DAYS: i64 = 200;

/// 가격 스케일러 출력 범위
pub const PRICE_RANGE: (f64, f64) = (0.0, 1.0);

/// 학습/검증 분할 시드
pub const DEFAULT_SEED: u64 = 42;

/// 기본 학습 종목 (대형주 36개)
pub const DEFAULT_SYMBOLS: [&str; 36] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "META", "NVDA", "NFLX", "JPM", "V", "JNJ", "WMT",
    "PG", "UNH", "DIS", "HD", "MA", "BAC", "ADBE", "CRM", "PYPL", "INTC", "CMCSA", "VZ", "ABT",
    "PFE", "KO", "CSCO", "XOM", "TMO", "ABBV", "ACN", "AVGO", "TXN", "COST", "QCOM",
];
