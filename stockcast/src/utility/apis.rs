pub mod db_api;
pub mod memory_api;

pub use db_api::DbApi;
pub use memory_api::MemoryApi;

use chrono::NaiveDate;

use crate::utility::errors::StockcastResult;
use crate::utility::types::DailyBar;

/// 일봉 시세 조회 인터페이스
/// 학습 파이프라인과 예측기가 같은 구현을 공유한다
pub trait MarketDataApi: Send + Sync {
    /// [start, end] 구간 일봉을 날짜 오름차순으로 반환
    /// 종목이 없으면 빈 벡터 또는 DataUnavailable
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> StockcastResult<Vec<DailyBar>>;
}
