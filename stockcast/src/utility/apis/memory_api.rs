use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::utility::apis::MarketDataApi;
use crate::utility::errors::{StockcastError, StockcastResult};
use crate::utility::types::DailyBar;

/// 프로세스 내 일봉 저장소 (테스트/데모용)
#[derive(Default)]
pub struct MemoryApi {
    bars: RwLock<HashMap<String, Vec<DailyBar>>>,
}

impl MemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// 종목 일봉 교체. 날짜 오름차순으로 정렬해서 보관
    pub fn insert(&self, symbol: impl Into<String>, bars: Vec<DailyBar>) -> StockcastResult<()> {
        let mut map = self
            .bars
            .write()
            .map_err(|_| StockcastError::general("MemoryApi 잠금이 오염되었습니다"))?;
        map.insert(symbol.into(), sorted(bars));
        Ok(())
    }

    /// 생성 직후 등록용. 소유권이 있으므로 잠금 없이 기록
    pub fn with_symbol(mut self, symbol: impl Into<String>, bars: Vec<DailyBar>) -> Self {
        let map = match self.bars.get_mut() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.insert(symbol.into(), sorted(bars));
        self
    }
}

fn sorted(mut bars: Vec<DailyBar>) -> Vec<DailyBar> {
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    bars
}

impl MarketDataApi for MemoryApi {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StockcastResult<Vec<DailyBar>> {
        let map = self
            .bars
            .read()
            .map_err(|_| StockcastError::general("MemoryApi 잠금이 오염되었습니다"))?;

        let bars = map
            .get(symbol)
            .ok_or_else(|| StockcastError::data_unavailable(symbol, "등록되지 않은 종목"))?;

        Ok(bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .copied()
            .collect())
    }
}
