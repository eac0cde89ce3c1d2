//! Limit order book core.
//!
//! A price-time priority book built on two BTreeMaps of price levels (bids
//! read from the back for the highest price, asks from the front for the
//! lowest). Each level maintains a FIFO queue of resting orders via indices
//! into a Slab, linked prev/next within the level, so a cancel reached
//! through the id index unlinks in O(1) and no other handle is disturbed.
//! Every level carries its aggregate (order count, total remaining quantity)
//! updated on the same paths that mutate the queue; the aggregates alone
//! drive the full-fill feasibility test and the level snapshot.
//!
//! Admission policy lives here too: market orders are repriced to the far
//! touch of the opposite side, FillAndKill orders are rejected unless a cross
//! is available, FillOrKill orders are rejected unless the opposite book can
//! absorb them entirely. Rejections and duplicate ids are expected market
//! conditions and produce an empty trade list, never an error. An internal
//! inconsistency (over-fill, a resting order without a level) is a bug in the
//! engine and panics with the offending order id.

use crate::order::{Order, OrderId, OrderModify, OrderType, Price, Quantity, Side};
use crate::trade::{Trade, TradeInfo, Trades};
use slab::Slab;
use std::cmp;
use std::collections::{BTreeMap, HashMap};
use time::OffsetDateTime;

/// Aggregated view of a single price level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LevelInfo {
    pub price: Price,
    /// Total remaining quantity across the level's resting orders.
    pub quantity: Quantity,
}

/// A by-value snapshot of both sides' aggregated levels.
#[derive(Debug, Clone)]
pub struct OrderbookLevelInfos {
    /// Bid levels in descending price order.
    pub bids: Vec<LevelInfo>,
    /// Ask levels in ascending price order.
    pub asks: Vec<LevelInfo>,
}

/// A single price level: the FIFO queue bounds plus the level aggregate.
#[derive(Debug, Default)]
struct PriceLevel {
    head: Option<usize>,
    tail: Option<usize>,
    total_quantity: Quantity,
    order_count: usize,
}

impl PriceLevel {
    /// Append a node to the back of the queue and fold it into the aggregate.
    fn push(&mut self, nodes: &mut Slab<OrderNode>, idx: usize) {
        match self.tail {
            Some(tail) => {
                nodes[tail].next = Some(idx);
                nodes[idx].prev = Some(tail);
                self.tail = Some(idx);
            }
            None => {
                self.head = Some(idx);
                self.tail = Some(idx);
            }
        }

        self.total_quantity += nodes[idx].order.remaining_quantity();
        self.order_count += 1;
    }

    /// Unlink a node from the queue, deducting its remaining quantity from
    /// the aggregate. The node must currently be linked in this level.
    fn unlink(&mut self, nodes: &mut Slab<OrderNode>, idx: usize) {
        let prev = nodes[idx].prev;
        let next = nodes[idx].next;

        if let Some(p) = prev {
            nodes[p].next = next;
        } else {
            self.head = next;
        }
        if let Some(n) = next {
            nodes[n].prev = prev;
        } else {
            self.tail = prev;
        }
        nodes[idx].prev = None;
        nodes[idx].next = None;

        self.total_quantity -= nodes[idx].order.remaining_quantity();
        self.order_count -= 1;
    }

    /// Deduct matched quantity from the aggregate without touching the queue.
    fn reduce(&mut self, quantity: Quantity) {
        self.total_quantity -= quantity;
    }
}

/// Node for an individual order, stored in the slab and linked within its
/// price level's FIFO queue.
#[derive(Debug)]
struct OrderNode {
    order: Order,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Price-time priority order book. Unsynchronized; [`crate::engine::Orderbook`]
/// wraps it behind the engine lock for shared use.
#[derive(Debug, Default)]
pub struct Book {
    bids: BTreeMap<Price, PriceLevel>,
    asks: BTreeMap<Price, PriceLevel>,
    nodes: Slab<OrderNode>,
    index: HashMap<OrderId, usize>,
}

impl Book {
    pub fn new() -> Self {
        Book::default()
    }

    /// Number of resting orders across both sides.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.last_key_value().map(|(price, _)| *price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first_key_value().map(|(price, _)| *price)
    }

    /// Admit an order and return the trades it produced immediately.
    ///
    /// A duplicate id, a market order against an empty opposite side, a
    /// FillAndKill with no cross available, and a FillOrKill the opposite
    /// book cannot absorb are all rejected with an empty trade list and
    /// leave the book untouched.
    pub fn add(&mut self, mut order: Order) -> Trades {
        if self.index.contains_key(&order.id()) {
            return Vec::new();
        }

        match order.order_type() {
            OrderType::Market => {
                // Park the order at the far touch of the opposite side so it
                // sweeps every resting level, then treat it as a limit.
                let far_touch = match order.side() {
                    Side::Buy => self.asks.last_key_value().map(|(price, _)| *price),
                    Side::Sell => self.bids.first_key_value().map(|(price, _)| *price),
                };
                match far_touch {
                    Some(price) => order.to_good_till_cancel(price),
                    None => return Vec::new(),
                }
            }
            OrderType::FillAndKill => {
                if !self.can_match(order.side(), order.price()) {
                    return Vec::new();
                }
            }
            OrderType::FillOrKill => {
                if !self.can_fully_fill(order.side(), order.price(), order.remaining_quantity()) {
                    return Vec::new();
                }
            }
            OrderType::GoodTillCancel | OrderType::GoodForDay => {}
        }

        self.insert(order);
        self.match_orders()
    }

    /// Cancel a resting order. Unknown ids are a no-op.
    pub fn cancel(&mut self, id: OrderId) {
        if let Some(&idx) = self.index.get(&id) {
            self.remove_node(idx);
        }
    }

    /// Amend a resting order: the original type is preserved, time priority
    /// is not. Unknown ids return an empty trade list.
    pub fn modify(&mut self, amendment: OrderModify) -> Trades {
        let Some(&idx) = self.index.get(&amendment.id) else {
            return Vec::new();
        };

        let order_type = self.nodes[idx].order.order_type();
        self.remove_node(idx);
        self.add(amendment.to_order(order_type))
    }

    /// Aggregated levels on both sides: bids descending, asks ascending.
    pub fn level_infos(&self) -> OrderbookLevelInfos {
        OrderbookLevelInfos {
            bids: self
                .bids
                .iter()
                .rev()
                .map(|(price, level)| LevelInfo {
                    price: *price,
                    quantity: level.total_quantity,
                })
                .collect(),
            asks: self
                .asks
                .iter()
                .map(|(price, level)| LevelInfo {
                    price: *price,
                    quantity: level.total_quantity,
                })
                .collect(),
        }
    }

    /// Ids of every resting GoodForDay order, for the session-close pruner.
    pub fn good_for_day_ids(&self) -> Vec<OrderId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.order.order_type() == OrderType::GoodForDay)
            .map(|(_, node)| node.order.id())
            .collect()
    }

    /// Whether an order on `side` at `price` would cross the opposite touch.
    fn can_match(&self, side: Side, price: Price) -> bool {
        match side {
            Side::Buy => self.best_ask().is_some_and(|best| price >= best),
            Side::Sell => self.best_bid().is_some_and(|best| price <= best),
        }
    }

    /// Walk the opposite side's aggregates from the best price outward,
    /// accumulating marketable quantity until `quantity` is covered. Reads
    /// only the level aggregates, so the cost is the number of levels
    /// examined, not the number of orders.
    fn can_fully_fill(&self, side: Side, price: Price, quantity: Quantity) -> bool {
        let mut available: Quantity = 0;
        match side {
            Side::Buy => {
                for (level_price, level) in self.asks.iter() {
                    if *level_price > price {
                        break;
                    }
                    available += level.total_quantity;
                    if available >= quantity {
                        return true;
                    }
                }
            }
            Side::Sell => {
                for (level_price, level) in self.bids.iter().rev() {
                    if *level_price < price {
                        break;
                    }
                    available += level.total_quantity;
                    if available >= quantity {
                        return true;
                    }
                }
            }
        }

        false
    }

    /// Append the order to the tail of its price level and record its handle
    /// in the id index.
    fn insert(&mut self, order: Order) {
        let side = order.side();
        let price = order.price();
        let id = order.id();

        let idx = self.nodes.insert(OrderNode {
            order,
            prev: None,
            next: None,
        });
        self.index.insert(id, idx);
        let level = match side {
            Side::Buy => self.bids.entry(price).or_default(),
            Side::Sell => self.asks.entry(price).or_default(),
        };
        level.push(&mut self.nodes, idx);
    }

    /// Unlink a node from its level, erase the level if it emptied, and drop
    /// the node from the slab and the id index in the same step.
    fn remove_node(&mut self, idx: usize) -> Order {
        let side = self.nodes[idx].order.side();
        let price = self.nodes[idx].order.price();
        let id = self.nodes[idx].order.id();

        let level = match side {
            Side::Buy => self.bids.get_mut(&price),
            Side::Sell => self.asks.get_mut(&price),
        };
        let level = level
            .unwrap_or_else(|| panic!("order {id} rests on a price level missing from the book"));
        level.unlink(&mut self.nodes, idx);
        if level.order_count == 0 {
            match side {
                Side::Buy => self.bids.remove(&price),
                Side::Sell => self.asks.remove(&price),
            };
        }

        let node = self.nodes.remove(idx);
        self.index.remove(&node.order.id());
        node.order
    }

    /// Cross the book: while the best bid meets the best ask, pair the two
    /// queue heads, trade the smaller of the two remainders, remove exhausted
    /// orders and emptied levels, and emit one trade per pairing. Afterwards
    /// a FillAndKill left at the top of either side is cancelled: admission
    /// never lets one rest, so anything found here is an unfilled remainder.
    fn match_orders(&mut self) -> Trades {
        let mut trades = Vec::new();

        loop {
            let Some(bid_price) = self.best_bid() else {
                break;
            };
            let Some(ask_price) = self.best_ask() else {
                break;
            };
            if bid_price < ask_price {
                break;
            }

            let bid_idx = self.bids[&bid_price].head.expect("non-empty level has a head");
            let ask_idx = self.asks[&ask_price].head.expect("non-empty level has a head");
            let quantity = cmp::min(
                self.nodes[bid_idx].order.remaining_quantity(),
                self.nodes[ask_idx].order.remaining_quantity(),
            );

            // Both remainders and both level aggregates shrink in the same step.
            self.nodes[bid_idx].order.fill(quantity);
            self.nodes[ask_idx].order.fill(quantity);
            self.bids.get_mut(&bid_price).unwrap().reduce(quantity);
            self.asks.get_mut(&ask_price).unwrap().reduce(quantity);

            trades.push(Trade {
                bid: TradeInfo {
                    order_id: self.nodes[bid_idx].order.id(),
                    price: bid_price,
                    quantity,
                },
                ask: TradeInfo {
                    order_id: self.nodes[ask_idx].order.id(),
                    price: ask_price,
                    quantity,
                },
                timestamp: OffsetDateTime::now_utc(),
            });

            if self.nodes[bid_idx].order.is_filled() {
                self.remove_node(bid_idx);
            }
            if self.nodes[ask_idx].order.is_filled() {
                self.remove_node(ask_idx);
            }
        }

        if let Some(id) = self.resting_fill_and_kill(Side::Buy) {
            self.cancel(id);
        }
        if let Some(id) = self.resting_fill_and_kill(Side::Sell) {
            self.cancel(id);
        }

        trades
    }

    /// Id of the order at the head of `side`'s best level, if it is a
    /// FillAndKill.
    fn resting_fill_and_kill(&self, side: Side) -> Option<OrderId> {
        let level = match side {
            Side::Buy => self.bids.last_key_value().map(|(_, level)| level)?,
            Side::Sell => self.asks.first_key_value().map(|(_, level)| level)?,
        };
        let idx = level.head.expect("non-empty level has a head");
        let order = &self.nodes[idx].order;
        (order.order_type() == OrderType::FillAndKill).then(|| order.id())
    }
}
