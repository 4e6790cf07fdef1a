use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::utility::apis::MarketDataApi;
use crate::utility::errors::{StockcastError, StockcastResult};
use crate::utility::types::bar::{date_to_key, key_to_date, DailyBar};

/// 일봉 DB 조회 API - 종목별 테이블(date, open, high, low, close, volume)
pub struct DbApi {
    daily_db_connection: Mutex<Connection>,
}

impl DbApi {
    pub fn open(path: impl AsRef<Path>) -> StockcastResult<Self> {
        let path = path.as_ref();
        debug!("🔄 [DbApi::open] 일봉 DB 연결 시작: {}", path.display());

        let connection = Connection::open(path)
            .map_err(|e| StockcastError::database("일봉 DB 연결", e.to_string()))?;
        Self::optimize_database(&connection)?;

        info!("✅ [DbApi::open] 일봉 DB 연결 성공: {}", path.display());

        Ok(Self {
            daily_db_connection: Mutex::new(connection),
        })
    }

    /// 메모리 DB (테스트용)
    pub fn in_memory() -> StockcastResult<Self> {
        let connection = Connection::open_in_memory()
            .map_err(|e| StockcastError::database("메모리 DB 생성", e.to_string()))?;
        Ok(Self {
            daily_db_connection: Mutex::new(connection),
        })
    }

    /// 데이터베이스 성능 설정
    fn optimize_database(db: &Connection) -> StockcastResult<()> {
        // WAL 모드는 파일 DB에서만 의미가 있음
        db.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
        db.execute_batch("PRAGMA cache_size=10000;")?;
        db.execute_batch("PRAGMA temp_store=MEMORY;")?;
        db.execute_batch("PRAGMA synchronous=NORMAL;")?;

        debug!("✅ [DbApi::optimize_database] DB 최적화 설정 완료");
        Ok(())
    }

    fn lock(&self) -> StockcastResult<std::sync::MutexGuard<'_, Connection>> {
        self.daily_db_connection
            .lock()
            .map_err(|_| StockcastError::database("DB 잠금", "연결 뮤텍스가 오염되었습니다"))
    }

    /// 테이블명은 종목 코드 그대로 사용하므로 허용 문자만 통과
    fn table_name(symbol: &str) -> StockcastResult<String> {
        let valid = !symbol.is_empty()
            && symbol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
        if !valid {
            return Err(StockcastError::validation(
                "symbol",
                format!("테이블명으로 사용할 수 없는 종목 코드: {}", symbol),
            ));
        }
        Ok(symbol.to_string())
    }

    fn table_exists(conn: &Connection, table: &str) -> StockcastResult<bool> {
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type='table' AND name=?",
                [table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// 종목 테이블을 만들고 일봉을 덮어쓰기 저장
    pub fn store_bars(&self, symbol: &str, bars: &[DailyBar]) -> StockcastResult<usize> {
        let table = Self::table_name(symbol)?;
        let mut conn = self.lock()?;

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (
                date INTEGER PRIMARY KEY,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL
            );",
            table
        ))?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO \"{}\" (date, open, high, low, close, volume) VALUES (?, ?, ?, ?, ?, ?)",
                table
            ))?;
            for bar in bars {
                stmt.execute(params![
                    bar.date_key(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ])?;
            }
        }
        tx.commit()?;

        debug!(
            "💾 [DbApi::store_bars] {} 일봉 {}개 저장",
            symbol,
            bars.len()
        );
        Ok(bars.len())
    }

    /// DB에 있는 종목 목록
    pub fn list_symbols(&self) -> StockcastResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let symbols = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(symbols)
    }
}

impl MarketDataApi for DbApi {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StockcastResult<Vec<DailyBar>> {
        let table = Self::table_name(symbol)?;
        let conn = self.lock()?;

        if !Self::table_exists(&conn, &table)? {
            return Err(StockcastError::data_unavailable(
                symbol,
                "일봉 DB에 해당 종목 테이블이 없습니다",
            ));
        }

        let query = format!(
            "SELECT date, open, high, low, close, volume FROM \"{}\" WHERE date >= ? AND date <= ? ORDER BY date",
            table
        );
        let mut stmt = conn.prepare(&query).map_err(|e| {
            StockcastError::database_query(format!(
                "SQL 준비 실패: {} (테이블: {}) - {}",
                query, table, e
            ))
        })?;

        let rows = stmt.query_map(params![date_to_key(start), date_to_key(end)], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
            ))
        })?;

        let mut bars = Vec::new();
        for row in rows {
            let (key, open, high, low, close, volume) = row?;
            match key_to_date(key) {
                Some(date) => bars.push(DailyBar::new(date, open, high, low, close, volume)),
                None => warn!("⚠️ [DbApi::fetch] {} 잘못된 날짜 키 무시: {}", symbol, key),
            }
        }

        debug!(
            "📊 [DbApi::fetch] {} {}~{} 일봉 {}개 조회",
            symbol,
            start,
            end,
            bars.len()
        );
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(y: i32, m: u32, d: u32, close: f64) -> DailyBar {
        let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        DailyBar::new(date, close - 1.0, close + 1.0, close - 2.0, close, 1000.0)
    }

    #[test]
    fn test_store_and_fetch_range() {
        let api = DbApi::in_memory().unwrap();
        let bars = vec![
            bar(2024, 1, 2, 10.0),
            bar(2024, 1, 3, 11.0),
            bar(2024, 1, 4, 12.0),
        ];
        assert_eq!(api.store_bars("AAPL", &bars).unwrap(), 3);

        let fetched = api
            .fetch(
                "AAPL",
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            )
            .unwrap();
        assert_eq!(fetched, bars[1..].to_vec());
    }

    #[test]
    fn test_store_overwrites_same_date() {
        let api = DbApi::in_memory().unwrap();
        api.store_bars("MSFT", &[bar(2024, 1, 2, 10.0)]).unwrap();
        api.store_bars("MSFT", &[bar(2024, 1, 2, 20.0)]).unwrap();

        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let fetched = api.fetch("MSFT", d, d).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].close, 20.0);
        assert_eq!(api.list_symbols().unwrap(), vec!["MSFT".to_string()]);
    }

    #[test]
    fn test_missing_table_is_data_unavailable() {
        let api = DbApi::in_memory().unwrap();
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let err = api.fetch("NOPE", d, d).unwrap_err();
        assert!(matches!(err, StockcastError::DataUnavailable { .. }));
    }

    #[test]
    fn test_rejects_unsafe_symbol() {
        let api = DbApi::in_memory().unwrap();
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let err = api.fetch("A\"; DROP TABLE x;--", d, d).unwrap_err();
        assert!(matches!(err, StockcastError::Validation { .. }));
    }
}
