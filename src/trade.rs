//! Trade records produced by the matching engine.
//!
//! Each pairing of a resting bid and ask produces one [`Trade`]. No trade
//! price is synthesized: both sides' resting limit prices are recorded
//! separately, along with the quantity executed in that step and a UTC
//! timestamp.

use crate::order::{OrderId, Price, Quantity};
use time::OffsetDateTime;

/// One side of an execution.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TradeInfo {
    /// Id of the order filled on this side of the pairing.
    pub order_id: OrderId,
    /// That order's resting limit price.
    pub price: Price,
    /// Executed quantity, identical on both sides of the trade.
    pub quantity: Quantity,
}

/// A single execution between a resting bid and a resting ask.
#[derive(Debug, Clone)]
pub struct Trade {
    /// Bid-side fill record.
    pub bid: TradeInfo,
    /// Ask-side fill record.
    pub ask: TradeInfo,
    /// UTC timestamp when the pairing was generated.
    pub timestamp: OffsetDateTime,
}

/// Trades produced by a single public operation, in pairing order.
pub type Trades = Vec<Trade>;
