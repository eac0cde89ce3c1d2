//! Public engine surface.
//!
//! [`Orderbook`] wraps the book core behind a single mutex and owns the one
//! background thread that cancels GoodForDay orders at session close. Every
//! public operation holds the lock for its full duration (admission,
//! matching, aggregate updates and post-match cleanup happen in one critical
//! section), so operations submitted from a thread are observed by every
//! later reader in submission order.
//!
//! The pruner waits on a condition variable tied to the same mutex; the lock
//! is released for the duration of the wait. Teardown signals shutdown,
//! notifies the wait and joins the thread before the book is dropped.

use crate::book::{Book, OrderbookLevelInfos};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::order::{Order, OrderId, OrderModify};
use crate::session::{SessionError, SessionSchedule};
use crate::trade::Trades;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

struct Shared {
    book: Mutex<Book>,
    shutdown: AtomicBool,
    shutdown_signal: Condvar,
    schedule: SessionSchedule,
    clock: Arc<dyn Clock>,
}

/// Thread-safe order book engine: the in-process programmatic surface.
pub struct Orderbook {
    shared: Arc<Shared>,
    pruner: Option<JoinHandle<()>>,
}

impl Orderbook {
    /// Engine on the system clock with the default session schedule.
    pub fn new() -> Self {
        Orderbook::with_clock(SessionSchedule::default(), Arc::new(SystemClock))
    }

    /// Engine configured from an [`EngineConfig`].
    pub fn from_config(config: &EngineConfig) -> Result<Self, SessionError> {
        Ok(Orderbook::with_clock(
            SessionSchedule::from_config(&config.session)?,
            Arc::new(SystemClock),
        ))
    }

    /// Engine with an injected clock, for deterministic session-close tests.
    pub fn with_clock(schedule: SessionSchedule, clock: Arc<dyn Clock>) -> Self {
        let shared = Arc::new(Shared {
            book: Mutex::new(Book::new()),
            shutdown: AtomicBool::new(false),
            shutdown_signal: Condvar::new(),
            schedule,
            clock,
        });

        let pruner = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("gfd-pruner".to_string())
                .spawn(move || prune_good_for_day(&shared))
                .expect("could not spawn the day-order pruner")
        };

        Orderbook {
            shared,
            pruner: Some(pruner),
        }
    }

    /// Submit an order; returns the trades it produced immediately.
    /// Pre-admission rejections and duplicate ids return an empty list.
    pub fn add_order(&self, order: Order) -> Trades {
        let id = order.id();
        let trades = self.shared.book.lock().add(order);
        debug!(id, produced = trades.len(), "order submitted");
        trades
    }

    /// Cancel one resting order. Unknown ids are a no-op.
    pub fn cancel_order(&self, id: OrderId) {
        self.shared.book.lock().cancel(id);
        debug!(id, "order cancelled");
    }

    /// Cancel a batch under a single hold of the lock, so a group
    /// cancellation becomes visible at once.
    pub fn cancel_orders(&self, ids: &[OrderId]) {
        let mut book = self.shared.book.lock();
        for &id in ids {
            book.cancel(id);
        }
    }

    /// Amend a resting order; returns the trades of the re-admission pass.
    /// The original type is preserved, time priority is not.
    pub fn modify_order(&self, amendment: OrderModify) -> Trades {
        let trades = self.shared.book.lock().modify(amendment);
        debug!(id = amendment.id, produced = trades.len(), "order amended");
        trades
    }

    /// Number of resting orders across both sides.
    pub fn size(&self) -> usize {
        self.shared.book.lock().len()
    }

    /// Consistent by-value snapshot of both sides' aggregated levels,
    /// bids descending and asks ascending.
    pub fn level_infos(&self) -> OrderbookLevelInfos {
        self.shared.book.lock().level_infos()
    }
}

impl Default for Orderbook {
    fn default() -> Self {
        Orderbook::new()
    }
}

impl Drop for Orderbook {
    fn drop(&mut self) {
        {
            // Holding the lock pairs the store with the pruner's pre-wait
            // check, so the notification cannot fall between them.
            let _book = self.shared.book.lock();
            self.shared.shutdown.store(true, Ordering::Release);
            self.shared.shutdown_signal.notify_one();
        }
        if let Some(pruner) = self.pruner.take() {
            if pruner.join().is_err() {
                warn!("day-order pruner panicked before shutdown");
            }
        }
    }
}

/// Session-close loop: wait until the next close plus the grace buffer, scan
/// for resting GoodForDay orders, then cancel them as one batch. A shutdown
/// notification ends the loop from any wait.
fn prune_good_for_day(shared: &Shared) {
    loop {
        let wait = shared.schedule.until_close(shared.clock.now());

        let ids = {
            let mut book = shared.book.lock();
            if shared.shutdown.load(Ordering::Acquire) {
                return;
            }
            let timed_out = shared
                .shutdown_signal
                .wait_for(&mut book, wait)
                .timed_out();
            if shared.shutdown.load(Ordering::Acquire) || !timed_out {
                return;
            }
            book.good_for_day_ids()
        };

        if ids.is_empty() {
            continue;
        }
        info!(count = ids.len(), "session close: cancelling good-for-day orders");
        let mut book = shared.book.lock();
        for &id in &ids {
            book.cancel(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use crate::order::{OrderType, Side};
    use std::time::{Duration, Instant};
    use time::macros::{datetime, time};

    fn gtc(id: OrderId, side: Side, price: i64, quantity: u64) -> Order {
        Order::new(OrderType::GoodTillCancel, id, side, price, quantity)
    }

    #[test]
    fn public_surface_round_trip() {
        let engine = Orderbook::new();

        assert!(engine.add_order(gtc(1, Side::Buy, 100, 10)).is_empty());
        let trades = engine.add_order(gtc(2, Side::Sell, 100, 4));
        assert_eq!(trades.len(), 1);
        assert_eq!(engine.size(), 1);

        let infos = engine.level_infos();
        assert_eq!(infos.bids[0].price, 100);
        assert_eq!(infos.bids[0].quantity, 6);
        assert!(infos.asks.is_empty());

        assert!(engine
            .modify_order(OrderModify::new(1, Side::Buy, 101, 6))
            .is_empty());
        assert_eq!(engine.level_infos().bids[0].price, 101);

        engine.cancel_order(1);
        assert_eq!(engine.size(), 0);
    }

    #[test]
    fn batch_cancel_clears_the_group() {
        let engine = Orderbook::new();
        engine.add_order(gtc(1, Side::Buy, 100, 5));
        engine.add_order(gtc(2, Side::Buy, 99, 5));
        engine.add_order(gtc(3, Side::Sell, 105, 5));

        engine.cancel_orders(&[1, 3, 42]);
        assert_eq!(engine.size(), 1, "unknown ids in a batch are no-ops");
    }

    #[test]
    fn submissions_from_multiple_threads_all_land() {
        let engine = Arc::new(Orderbook::new());
        let mut handles = Vec::new();
        for t in 0u64..4 {
            let engine = Arc::clone(&engine);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    // disjoint prices per thread keep the book uncrossed
                    engine.add_order(gtc(t * 1_000 + i, Side::Buy, 10 + t as i64, 1));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("submitter thread panicked");
        }
        assert_eq!(engine.size(), 200);
    }

    #[test]
    fn pruner_cancels_day_orders_at_session_close() {
        let clock = SimulatedClock::at(datetime!(2024-03-15 15:59:59 UTC));
        let schedule = SessionSchedule::new(time!(16:00), time::Duration::milliseconds(50));
        let engine = Orderbook::with_clock(schedule, Arc::new(clock));

        engine.add_order(gtc(1, Side::Buy, 100, 5));
        engine.add_order(Order::new(OrderType::GoodForDay, 2, Side::Buy, 99, 5));
        engine.add_order(Order::new(OrderType::GoodForDay, 3, Side::Sell, 105, 5));
        assert_eq!(engine.size(), 3);

        // close is ~1.05s of real wait away from the frozen clock
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.size() != 1 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(25));
        }

        assert_eq!(engine.size(), 1, "day orders should be gone after the close");
        let infos = engine.level_infos();
        assert_eq!(infos.bids[0].price, 100, "the GoodTillCancel order survives");
        assert!(infos.asks.is_empty());
    }

    #[test]
    fn teardown_joins_a_waiting_pruner_promptly() {
        let started = Instant::now();
        {
            // default schedule: the next close is up to a day away
            let engine = Orderbook::new();
            engine.add_order(Order::new(OrderType::GoodForDay, 1, Side::Buy, 100, 5));
        }
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "drop must not wait for the session close"
        );
    }
}
