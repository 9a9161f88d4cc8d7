//! Parallel intra-epoch batch matching: a fixed worker pool runs one
//! market's matching pass per task, followed by a deterministic,
//! single-threaded merge of the resulting trades (spec §5 concurrency
//! model). Settlement and liquidation stay on the epoch driver's own
//! thread, consuming the merged trade list in order.
//!
//! Grounded on the teacher's per-book abstraction (`book.rs`) generalized
//! from one market to N; the worker-pool/per-task-timeout pattern has no
//! teacher counterpart (the teacher drives a single market on the caller's
//! thread) and is grounded on the pack convention of reaching for `rayon`
//! for exactly this kind of embarrassingly-parallel fan-out.

use crate::book::{OrderBook, OrderBookWalker};
use crate::config::EngineConfig;
use crate::decimal::Price;
use crate::error::{AdmissionError, EpochError, OrderLookupError};
use crate::ids::{MarketId, OrderId};
use crate::ledger::Ledger;
use crate::market::MarketParams;
use crate::matching::{DefaultMatchingEngine, MatchingEngine};
use crate::order::Order;
use crate::sync::EngineEventSink;
use crate::trade::Trade;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Collects trades produced by a single market's matching pass so they can
/// be merged deterministically once every worker has finished.
#[derive(Default)]
struct CollectingSink {
    trades: Mutex<Vec<Trade>>,
}

impl EngineEventSink for CollectingSink {
    fn trade_settled(&self, trade: &Trade) {
        self.trades.lock().expect("collecting sink mutex poisoned").push(trade.clone());
    }
}

/// One market's registered book and admission policy.
struct MarketWorkspace {
    market: MarketParams,
    book: Arc<dyn OrderBookWalker>,
}

/// Orders rejected during admission, paired with why.
pub type RejectedPlacement = (Order, AdmissionError);

/// Result of one batch pass: the deterministically merged trades plus any
/// orders that failed admission.
pub struct BatchReport {
    pub trades: Vec<Trade>,
    pub rejected: Vec<RejectedPlacement>,
    /// Markets whose worker missed its deadline or panicked; their batch
    /// contribution for this pass was dropped (spec §5, §7 `Busy`/timeout).
    pub failed_markets: Vec<(MarketId, EpochError)>,
}

/// Drives per-market matching across a fixed worker pool (spec §5, default
/// `worker_count` 16 workers, `worker_timeout_s` 10).
pub struct BatchEngine {
    markets: HashMap<MarketId, MarketWorkspace>,
    pool: rayon::ThreadPool,
    config: EngineConfig,
}

impl BatchEngine {
    pub fn new(config: EngineConfig) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count)
            .build()
            .expect("failed to build matching worker pool");
        BatchEngine {
            markets: HashMap::new(),
            pool,
            config,
        }
    }

    pub fn register_market(&mut self, market: MarketParams, book: Arc<dyn OrderBookWalker>) {
        self.markets.insert(market.market_id, MarketWorkspace { market, book });
    }

    pub fn market_params(&self, market_id: MarketId) -> Option<&MarketParams> {
        self.markets.get(&market_id).map(|w| &w.market)
    }

    pub fn registered_markets(&self) -> Vec<MarketId> {
        self.markets.keys().copied().collect()
    }

    /// Cancels an order by id. The message surface (spec §6) carries only
    /// the order id, not its market, so every registered market's book is
    /// tried until one recognizes the id.
    pub fn cancel_order(&self, order_id: OrderId) -> Result<(), OrderLookupError> {
        let mut last_err = OrderLookupError::NotFound(order_id);
        for workspace in self.markets.values() {
            match workspace.book.remove(order_id) {
                Ok(()) => return Ok(()),
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }

    /// Modifies a resting order's price, trying every registered market's
    /// book in turn (see [`Self::cancel_order`]).
    pub fn update_order(&self, order_id: OrderId, new_price: Price, now_microseconds: u64) -> Result<(), OrderLookupError> {
        let mut last_err = OrderLookupError::NotFound(order_id);
        for workspace in self.markets.values() {
            match workspace.book.update_order(order_id, new_price, now_microseconds) {
                Ok(()) => return Ok(()),
                Err(err) => last_err = err,
            }
        }
        Err(last_err)
    }

    /// Admits and inserts every placement against `ledger` (admission reads
    /// shared account/position state, so this stays sequential on the
    /// caller's thread — spec §5 notes only the matching pass itself is
    /// parallel), then runs matching for every touched market concurrently
    /// and merges the resulting trades by `(market_id, trade_id)`.
    pub fn run_batch(&self, ledger: &Ledger, placements: Vec<Order>) -> BatchReport {
        let mut rejected = Vec::new();
        let mut touched: Vec<MarketId> = Vec::new();

        for mut order in placements {
            let Some(workspace) = self.markets.get(&order.market_id) else {
                rejected.push((order.clone(), AdmissionError::UnknownMarket(order.market_id)));
                continue;
            };
            let engine = DefaultMatchingEngine::new(Arc::clone(&workspace.book), workspace.market.clone());
            match engine.create_order(&mut order, ledger) {
                Ok(()) => {
                    if !touched.contains(&order.market_id) {
                        touched.push(order.market_id);
                    }
                }
                Err(err) => rejected.push((order, err)),
            }
        }

        let timeout = Duration::from_secs(self.config.worker_timeout_s);
        let outcomes: Vec<(MarketId, Result<Vec<Trade>, EpochError>)> = self.pool.install(|| {
            touched
                .par_iter()
                .map(|market_id| {
                    let workspace = &self.markets[market_id];
                    let trades = run_market_with_timeout(
                        Arc::clone(&workspace.book),
                        workspace.market.clone(),
                        timeout,
                    );
                    (*market_id, trades)
                })
                .collect()
        });

        let mut trades = Vec::new();
        let mut failed_markets = Vec::new();
        for (market_id, outcome) in outcomes {
            match outcome {
                Ok(mut market_trades) => trades.append(&mut market_trades),
                Err(err) => failed_markets.push((market_id, err)),
            }
        }
        trades.sort_by(|a, b| a.market_id.cmp(&b.market_id).then(a.trade_id.cmp(&b.trade_id)));

        BatchReport { trades, rejected, failed_markets }
    }
}

/// Runs one market's matching pass on a dedicated OS thread so a hung or
/// panicking market can be abandoned without blocking the rest of the
/// batch — `rayon::Scope` has no native per-task deadline, so the deadline
/// is enforced with a channel the pool thread waits on instead.
fn run_market_with_timeout(
    book: Arc<dyn OrderBookWalker>,
    market: MarketParams,
    timeout: Duration,
) -> Result<Vec<Trade>, EpochError> {
    let market_id = market.market_id;
    let (done_tx, done_rx) = mpsc::channel();

    std::thread::spawn(move || {
        let sink = CollectingSink::default();
        let engine = DefaultMatchingEngine::new(book, market);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.match_orders(&sink);
            sink.trades.into_inner().expect("collecting sink mutex poisoned")
        }));
        let _ = done_tx.send(outcome.ok());
    });

    match done_rx.recv_timeout(timeout) {
        Ok(Some(trades)) => Ok(trades),
        Ok(None) => Err(EpochError::WorkerPanicked(market_id)),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(EpochError::WorkerTimeout(market_id)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(EpochError::WorkerPanicked(market_id)),
    }
}
