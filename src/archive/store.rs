//! SQLite-backed trade ledger
//!
//! Every call opens the database, does its work and drops the connection
//! before returning, so the file is never held open across poll cycles.
//! A batch insert shares one connection and one transaction.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::types::{Side, TradeRecord};

/// Ledger capabilities the archive synchronizer needs
pub trait LedgerStore {
    /// Most recently stored record of `namespace`
    fn get_last(&self, namespace: &str) -> EngineResult<Option<TradeRecord>>;

    /// Insert keyed by order id; returns false when the id is already stored
    fn put_if_absent(&self, namespace: &str, record: &TradeRecord) -> EngineResult<bool>;

    /// Insert `records` in order, skipping stored ids; returns how many were
    /// inserted. Stops at the first failure.
    fn put_batch(&self, namespace: &str, records: &[TradeRecord]) -> EngineResult<usize> {
        let mut inserted = 0;
        for record in records {
            if self.put_if_absent(namespace, record)? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Up to `limit` records, newest first
    fn scan_reverse(&self, namespace: &str, limit: usize) -> EngineResult<Vec<TradeRecord>>;
}

pub struct SqliteLedger {
    path: PathBuf,
}

impl SqliteLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open once and create the schema; used as the startup check
    pub fn probe(&self) -> EngineResult<()> {
        self.connect().map(|_| ())
    }

    fn connect(&self) -> EngineResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                 seq        INTEGER PRIMARY KEY AUTOINCREMENT,
                 namespace  TEXT    NOT NULL,
                 order_id   TEXT    NOT NULL,
                 time_ns    INTEGER NOT NULL,
                 side       TEXT    NOT NULL,
                 price      TEXT    NOT NULL,
                 amount     TEXT    NOT NULL,
                 fee        TEXT    NOT NULL,
                 cost       TEXT    NOT NULL,
                 profit     INTEGER NOT NULL,
                 UNIQUE(namespace, order_id)
             );",
        )?;
        Ok(conn)
    }
}

const SELECT_COLUMNS: &str = "SELECT order_id, time_ns, side, price, amount, fee, cost, profit FROM trades";

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TradeRecord> {
    let side: String = row.get(2)?;
    Ok(TradeRecord {
        order_id: row.get(0)?,
        // every i64 nanosecond count maps to a valid instant
        time: DateTime::<Utc>::from_timestamp_nanos(row.get(1)?),
        side: Side::parse(&side).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown side {side:?}").into(),
            )
        })?,
        price: decimal_column(row, 3)?,
        amount: decimal_column(row, 4)?,
        fee: decimal_column(row, 5)?,
        cost: decimal_column(row, 6)?,
        profit: row.get::<_, i64>(7)? != 0,
    })
}

fn insert(conn: &Connection, namespace: &str, record: &TradeRecord) -> EngineResult<bool> {
    if record.order_id.is_empty() {
        return Err(EngineError::Storage("refusing to store a record without order id".into()));
    }
    let time_ns = record.time.timestamp_nanos_opt().ok_or_else(|| {
        EngineError::Storage(format!("trade time {} is outside the storable range", record.time))
    })?;
    let changed = conn.execute(
        "INSERT OR IGNORE INTO trades
             (namespace, order_id, time_ns, side, price, amount, fee, cost, profit)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            namespace,
            record.order_id,
            time_ns,
            record.side.as_str(),
            record.price.to_string(),
            record.amount.to_string(),
            record.fee.to_string(),
            record.cost.to_string(),
            record.profit as i64,
        ],
    )?;
    Ok(changed == 1)
}

impl LedgerStore for SqliteLedger {
    fn get_last(&self, namespace: &str) -> EngineResult<Option<TradeRecord>> {
        let conn = self.connect()?;
        let record = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE namespace = ?1 ORDER BY seq DESC LIMIT 1"),
                params![namespace],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn put_if_absent(&self, namespace: &str, record: &TradeRecord) -> EngineResult<bool> {
        let conn = self.connect()?;
        insert(&conn, namespace, record)
    }

    fn put_batch(&self, namespace: &str, records: &[TradeRecord]) -> EngineResult<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for record in records {
            if insert(&tx, namespace, record)? {
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn scan_reverse(&self, namespace: &str, limit: usize) -> EngineResult<Vec<TradeRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE namespace = ?1 ORDER BY seq DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![namespace, limit as i64], record_from_row)?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn record(id: &str, secs: i64) -> TradeRecord {
        TradeRecord {
            order_id: id.into(),
            time: Utc.timestamp_opt(secs, 0).unwrap(),
            side: Side::Sell,
            price: dec!(27123.4),
            amount: dec!(0.01234567),
            fee: dec!(0.87),
            cost: dec!(334.85),
            profit: true,
        }
    }

    fn ids(ledger: &SqliteLedger, namespace: &str) -> Vec<String> {
        ledger
            .scan_reverse(namespace, 10)
            .unwrap()
            .into_iter()
            .map(|r| r.order_id)
            .collect()
    }

    #[test]
    fn test_record_round_trips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::new(dir.path().join("ledger.db"));
        let stored = record("A1", 100);

        assert!(ledger.put_if_absent("BTC/USD", &stored).unwrap());
        assert_eq!(ledger.get_last("BTC/USD").unwrap(), Some(stored));
    }

    #[test]
    fn test_sub_millisecond_time_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::new(dir.path().join("ledger.db"));
        let stored = TradeRecord {
            time: Utc.timestamp_opt(100, 123_456_789).unwrap(),
            ..record("A1", 0)
        };

        ledger.put_if_absent("BTC/USD", &stored).unwrap();
        assert_eq!(ledger.get_last("BTC/USD").unwrap(), Some(stored));
    }

    #[test]
    fn test_unstorable_time_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::new(dir.path().join("ledger.db"));
        let far = TradeRecord {
            time: Utc.with_ymd_and_hms(2300, 1, 1, 0, 0, 0).unwrap(),
            ..record("A1", 0)
        };
        assert!(matches!(
            ledger.put_if_absent("BTC/USD", &far),
            Err(EngineError::Storage(_))
        ));
        assert_eq!(ledger.get_last("BTC/USD").unwrap(), None);
    }

    #[test]
    fn test_put_if_absent_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::new(dir.path().join("ledger.db"));

        assert!(ledger.put_if_absent("BTC/USD", &record("A1", 100)).unwrap());
        let mut changed = record("A1", 100);
        changed.price = dec!(1);
        assert!(!ledger.put_if_absent("BTC/USD", &changed).unwrap());
        assert_eq!(ledger.get_last("BTC/USD").unwrap().unwrap().price, dec!(27123.4));
    }

    #[test]
    fn test_batch_inserts_in_order_and_skips_stored() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::new(dir.path().join("ledger.db"));
        ledger.put_if_absent("BTC/USD", &record("A1", 100)).unwrap();

        let batch = [record("A1", 100), record("A2", 110), record("A3", 120)];
        assert_eq!(ledger.put_batch("BTC/USD", &batch).unwrap(), 2);
        assert_eq!(ids(&ledger, "BTC/USD"), vec!["A3", "A2", "A1"]);
    }

    #[test]
    fn test_failed_batch_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::new(dir.path().join("ledger.db"));
        let batch = [record("A1", 100), record("", 110)];
        assert!(matches!(
            ledger.put_batch("BTC/USD", &batch),
            Err(EngineError::Storage(_))
        ));
        assert_eq!(ledger.get_last("BTC/USD").unwrap(), None);
    }

    #[test]
    fn test_scan_reverse_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::new(dir.path().join("ledger.db"));
        for (i, id) in ["A1", "A2", "A3"].iter().enumerate() {
            ledger.put_if_absent("BTC/USD", &record(id, 100 + i as i64)).unwrap();
        }
        ledger.put_if_absent("ETH/USD", &record("E1", 500)).unwrap();

        let newest: Vec<_> = ledger
            .scan_reverse("BTC/USD", 2)
            .unwrap()
            .into_iter()
            .map(|r| r.order_id)
            .collect();
        assert_eq!(newest, vec!["A3", "A2"]);
        assert_eq!(ledger.get_last("ETH/USD").unwrap().unwrap().order_id, "E1");
    }

    #[test]
    fn test_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::new(dir.path().join("empty.db"));
        ledger.probe().unwrap();
        assert_eq!(ledger.get_last("BTC/USD").unwrap(), None);
        assert!(ledger.scan_reverse("BTC/USD", 40).unwrap().is_empty());
    }

    #[test]
    fn test_unopenable_path_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SqliteLedger::new(dir.path().join("missing").join("ledger.db"));
        assert!(matches!(ledger.probe(), Err(EngineError::Storage(_))));
    }
}
