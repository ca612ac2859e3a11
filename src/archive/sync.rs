//! Incremental trade archive synchronization
//!
//! `update` walks the exchange's trade history newest to oldest until it meets
//! the last record already in the ledger, then stores the new trades oldest
//! first so the ledger's insertion order stays chronological. Writes are
//! insert-if-absent, so re-running after a failure is always safe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::archive::store::LedgerStore;
use crate::error::EngineResult;
use crate::types::{Side, TradeRecord};

/// Exchange status filter for archived orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveStatus {
    Done,
    PartiallyDone,
}

impl ArchiveStatus {
    /// Filter value on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveStatus::Done => "d",
            ArchiveStatus::PartiallyDone => "cd",
        }
    }
}

impl std::fmt::Display for ArchiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveStatus::Done => write!(f, "done"),
            ArchiveStatus::PartiallyDone => write!(f, "partially-done"),
        }
    }
}

/// Source of the exchange's trade history
#[allow(async_fn_in_trait)]
pub trait ArchiveSource {
    /// Trades with `status` since `since`, newest first. `profit` is ignored.
    async fn fetch_archive(
        &self,
        status: ArchiveStatus,
        since: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<TradeRecord>>;
}

/// What one `update` run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub fetched: usize,
    pub inserted: usize,
    /// Newer records that were already present
    pub skipped: usize,
    pub up_to_date: bool,
}

/// Whether `trade` improved on `previous`: more quote received on a sell,
/// more base bought on a buy
pub fn is_profit(trade: &TradeRecord, previous: Option<&TradeRecord>) -> bool {
    let (prev_cost, prev_amount) = previous
        .map(|p| (p.cost, p.amount))
        .unwrap_or_default();
    match trade.side {
        Side::Sell => trade.cost > prev_cost,
        Side::Buy => trade.amount > prev_amount,
    }
}

pub struct TradeArchiveSync<S: LedgerStore> {
    store: S,
    namespace: String,
    page_size: usize,
}

impl<S: LedgerStore> TradeArchiveSync<S> {
    pub fn new(store: S, namespace: impl Into<String>, page_size: usize) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            page_size,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Most recent record (`last`) or one page of history, newest first
    pub fn view(&self, last: bool) -> EngineResult<Vec<TradeRecord>> {
        let limit = if last { 1 } else { self.page_size };
        self.store.scan_reverse(&self.namespace, limit)
    }

    /// Reconcile the ledger with the exchange for one status filter
    pub async fn update<A: ArchiveSource>(
        &self,
        source: &A,
        status: ArchiveStatus,
    ) -> EngineResult<SyncReport> {
        let last_stored = self.store.get_last(&self.namespace)?;
        let mut remote = source
            .fetch_archive(status, last_stored.as_ref().map(|r| r.time))
            .await?;
        remote.sort_by(|a, b| b.time.cmp(&a.time));

        let mut report = SyncReport {
            fetched: remote.len(),
            ..Default::default()
        };

        let boundary = last_stored.as_ref().map(|r| r.order_id.as_str());
        if remote.is_empty() || remote.first().map(|r| r.order_id.as_str()) == boundary {
            debug!("archive ({}) already up to date", status);
            report.up_to_date = true;
            return Ok(report);
        }

        let fresh: Vec<TradeRecord> = remote
            .into_iter()
            .take_while(|r| Some(r.order_id.as_str()) != boundary)
            .collect();

        // Oldest first: a write failure leaves a prefix that the next
        // update resumes from
        let mut previous = last_stored;
        let mut batch = Vec::with_capacity(fresh.len());
        for mut trade in fresh.into_iter().rev() {
            trade.profit = is_profit(&trade, previous.as_ref());
            previous = Some(trade.clone());
            batch.push(trade);
        }
        report.inserted = self.store.put_batch(&self.namespace, &batch)?;
        report.skipped = batch.len() - report.inserted;

        info!(
            "archive ({}) synced: {} fetched, {} stored, {} already present",
            status, report.fetched, report.inserted, report.skipped
        );
        Ok(report)
    }
}
