//! The cooperative poll loop
//!
//! One cycle, in order:
//! 1. Ticker and archive refresh when their cadence comes up
//! 2. Open orders (and balances when flat): fill detection, auto-trade advice
//! 3. One operator event, if any arrived within the idle timeout. A cycle
//!    that handled input ends here.
//! 4. Order book: tally sampling, queued skips, lock resolution, kicking,
//!    rendering
//!
//! Every call is awaited in sequence. Errors are logged with their category
//! and the stage keeps its previous state.

use tracing::{debug, info, warn};

use super::advisor::advise;
use super::commands;
use super::context::SessionContext;
use super::input::{InputEvent, InputSource};
use super::present::{Alert, Presenter};
use crate::archive::{ArchiveSource, ArchiveStatus, LedgerStore, TradeArchiveSync};
use crate::engine::{OrderBookView, OrderCommand, SampleOutcome, SubmitAck};
use crate::error::{EngineError, EngineResult};
use crate::exchange::{AccountData, MarketData, OrderGateway};
use crate::types::{Balance, OpenOrder, Side};

/// Whether a vanished order was executed rather than cancelled, judged by
/// the balance it would have consumed
pub fn was_filled(order: &OpenOrder, balance: &Balance) -> bool {
    match order.side {
        Side::Sell => balance.base < order.amount,
        Side::Buy => balance.quote < order.cost(),
    }
}

pub struct Session<'a, M, G, L: LedgerStore, P> {
    ctx: SessionContext,
    market: &'a M,
    account: &'a G,
    archive: TradeArchiveSync<L>,
    presenter: P,
}

impl<'a, M, G, L, P> Session<'a, M, G, L, P>
where
    M: MarketData,
    G: AccountData + OrderGateway + ArchiveSource,
    L: LedgerStore,
    P: Presenter,
{
    pub fn new(
        ctx: SessionContext,
        market: &'a M,
        account: &'a G,
        archive: TradeArchiveSync<L>,
        presenter: P,
    ) -> Self {
        Self {
            ctx,
            market,
            account,
            archive,
            presenter,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Seed range, tally boards and the ledger before the first cycle
    pub async fn startup(&mut self) {
        if let Err(e) = self.refresh_ticker().await {
            warn!("{} error fetching ticker at startup: {}", e.kind(), e);
        }
        self.sync_archive(&[ArchiveStatus::Done, ArchiveStatus::PartiallyDone])
            .await;
    }

    /// Poll forever; termination is external
    pub async fn run<I: InputSource>(&mut self, input: &mut I) {
        loop {
            self.cycle(input).await;
        }
    }

    pub async fn cycle<I: InputSource>(&mut self, input: &mut I) {
        self.ctx.cycle += 1;
        let n = self.ctx.cycle;

        if self.ctx.range.is_none() || self.ctx.config.is_ticker_cycle(n) {
            if let Err(e) = self.refresh_ticker().await {
                warn!("{} error refreshing ticker: {}", e.kind(), e);
            }
        }
        if self.ctx.config.is_archive_cycle(n) {
            self.sync_archive(&[ArchiveStatus::Done]).await;
        }

        let orders_ok = match self.poll_orders().await {
            Ok(()) => true,
            Err(e) => {
                warn!("{} error polling orders, skipping book: {}", e.kind(), e);
                false
            }
        };

        if let Some(event) = input.next_event(self.ctx.config.idle_timeout()).await {
            self.handle_event(event).await;
            return;
        }

        if orders_ok {
            if let Err(e) = self.book_stage().await {
                warn!("{} error in book cycle: {}", e.kind(), e);
            }
        }
    }

    async fn refresh_ticker(&mut self) -> EngineResult<()> {
        let ticker = self.market.ticker().await?;
        if let Some(alert) = self.ctx.apply_range(ticker.range()) {
            self.raise(alert);
        }
        self.ctx.last_price = Some(self.market.last_price().await?);
        Ok(())
    }

    /// Update the ledger for each status, then reload the last trade
    async fn sync_archive(&mut self, statuses: &[ArchiveStatus]) {
        for &status in statuses {
            match self.archive.update(self.account, status).await {
                Ok(report) => debug!("archive ({}): {:?}", status, report),
                Err(e) => {
                    warn!("{} error syncing archive ({}): {}", e.kind(), status, e);
                    break;
                }
            }
        }
        self.refresh_last_trade();
    }

    fn refresh_last_trade(&mut self) {
        match self.archive.view(true) {
            Ok(mut records) => self.ctx.last_trade = records.pop(),
            Err(e) => warn!("{} error reading last trade: {}", e.kind(), e),
        }
    }

    async fn poll_orders(&mut self) -> EngineResult<()> {
        let orders = self.account.open_orders().await?;
        if orders.len() > 1 {
            debug!("{} open orders, following the first", orders.len());
        }
        let vanished = self.ctx.follower.observe(orders.into_iter().next());
        if self.ctx.follower.order().is_some() {
            self.ctx.suggestion = None;
            return Ok(());
        }

        let balance = self.account.balance().await?;
        self.ctx.balance = Some(balance);

        if let Some(order) = vanished {
            if was_filled(&order, &balance) {
                self.raise(Alert::Filled(order));
                self.sync_archive(&[ArchiveStatus::Done, ArchiveStatus::PartiallyDone])
                    .await;
            } else {
                self.raise(Alert::Cancelled(order));
            }
        }

        let suggestion = self
            .ctx
            .estimator
            .as_ref()
            .and_then(|estimator| advise(&self.ctx.config, estimator, &self.ctx.book, &balance));
        if suggestion != self.ctx.suggestion {
            if let Some(command) = &suggestion {
                info!("auto-trade suggestion: {}", command);
            }
            self.ctx.suggestion = suggestion.clone();
        }
        if let Some(command) = suggestion.filter(|_| self.ctx.config.auto_place) {
            self.submit(command).await;
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: InputEvent) {
        debug!("input: {:?}", event);
        match self.apply_event(event).await {
            Ok(Some(command)) => self.submit(command).await,
            Ok(None) => {}
            Err(e) => {
                warn!("{} error handling input: {}", e.kind(), e);
                self.presenter.notice(&format!("rejected: {}", e));
            }
        }
    }

    async fn apply_event(&mut self, event: InputEvent) -> EngineResult<Option<OrderCommand>> {
        match event {
            InputEvent::RepriceUp => commands::reprice(&mut self.ctx, true),
            InputEvent::RepriceDown => commands::reprice(&mut self.ctx, false),
            InputEvent::CancelOrUnlock => commands::cancel_or_unlock(&mut self.ctx),
            InputEvent::SetSkip(skip) => {
                commands::queue_skip(&mut self.ctx, skip);
                Ok(None)
            }
            InputEvent::SetLock(depth) => {
                commands::set_lock(&mut self.ctx, depth);
                Ok(None)
            }
            InputEvent::EnterPrice(price) => {
                let balance = if self.ctx.follower.order().is_none() {
                    let balance = self.account.balance().await?;
                    self.ctx.balance = Some(balance);
                    Some(balance)
                } else {
                    None
                };
                commands::enter_price(&mut self.ctx, price, balance).map(Some)
            }
            InputEvent::ToggleHistory { refresh } => {
                if refresh {
                    self.sync_archive(&[ArchiveStatus::Done, ArchiveStatus::PartiallyDone])
                        .await;
                }
                let records = self.archive.view(false)?;
                self.presenter.history(&records);
                Ok(None)
            }
        }
    }

    async fn book_stage(&mut self) -> EngineResult<()> {
        let raw = self.market.order_book().await?;
        let book = OrderBookView::from_snapshot(&raw);

        if let Some(estimator) = self.ctx.estimator.as_mut() {
            let [buy, sell] = estimator.observe(&book);
            for (side, outcome) in [(Side::Buy, buy), (Side::Sell, sell)] {
                if let Some(SampleOutcome::Locked(price)) = outcome {
                    self.raise(Alert::TargetLocked { side, price });
                }
            }
        }
        self.ctx.book = book;

        if let Some(skip) = self.ctx.pending_skip.take() {
            match commands::skip_command(&mut self.ctx, skip) {
                Ok(command) => self.submit(command).await,
                Err(e) => warn!("{} error applying skip {}: {}", e.kind(), skip, e),
            }
        }

        self.follow_lock().await;
        let model = self.ctx.render_model();
        self.presenter.render(&model);
        Ok(())
    }

    async fn follow_lock(&mut self) {
        let Some(side) = self.ctx.follower.order().map(|o| o.side) else {
            return;
        };
        if !self.ctx.lock.is_enabled() {
            return;
        }
        let lock_price = match self.ctx.lock.refresh(self.ctx.book.ladder(side)) {
            Ok(price) => price,
            Err(e) => {
                debug!("lock not resolved: {}", e);
                return;
            }
        };

        let outcome = self.ctx.follower.follow(&mut self.ctx.lock, lock_price);
        if outcome.kicks == 0 {
            return;
        }
        if let Some(price) = self.ctx.follower.order().map(|o| o.price) {
            self.raise(Alert::Kicked {
                side,
                price,
                kicks: outcome.kicks,
            });
        }
        // Only the final reprice matters; earlier ones are superseded
        if let Some(command) = outcome.commands.last().cloned() {
            self.submit(command).await;
        }
    }

    async fn submit(&mut self, command: OrderCommand) {
        match self.account.submit(&command).await {
            Ok(ack) => {
                match &ack {
                    SubmitAck::Accepted(_) => info!("submitted {}", command),
                    SubmitAck::Rejected(reason) => {
                        self.presenter.notice(&format!("{} rejected: {}", command, reason));
                    }
                }
                self.ctx.follower.acknowledge(&command, &ack);
            }
            Err(e) => self.report_submit_error(&command, e),
        }
    }

    fn report_submit_error(&mut self, command: &OrderCommand, e: EngineError) {
        warn!("{} error submitting {}: {}", e.kind(), command, e);
        self.presenter.notice(&format!("{} failed: {}", command, e));
    }

    fn raise(&mut self, alert: Alert) {
        info!("{}", alert);
        self.presenter.alert(&alert);
    }
}
