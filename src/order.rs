#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// Lifetime and execution policy attached to an order at submission.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OrderType {
    GoodTillCancel,
    FillAndKill,
    FillOrKill,
    GoodForDay,
    Market,
}

pub type OrderId = u64;
pub type Price = i64; // ticks
pub type Quantity = u64;

/// A single order. Identity (id, side, initial quantity) is fixed at
/// construction; the remaining quantity shrinks as fills execute, and a
/// market order is repriced to a limit exactly once during admission.
#[derive(Debug, Clone)]
pub struct Order {
    order_type: OrderType,
    id: OrderId,
    side: Side,
    price: Price,
    initial_quantity: Quantity,
    remaining_quantity: Quantity,
}

impl Order {
    pub fn new(
        order_type: OrderType,
        id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Order {
            order_type,
            id,
            side,
            price,
            initial_quantity: quantity,
            remaining_quantity: quantity,
        }
    }

    /// A market order carries no limit price of its own; admission resolves
    /// one before the order ever reaches a price level.
    pub fn market(id: OrderId, side: Side, quantity: Quantity) -> Self {
        Order::new(OrderType::Market, id, side, 0, quantity)
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn initial_quantity(&self) -> Quantity {
        self.initial_quantity
    }

    pub fn remaining_quantity(&self) -> Quantity {
        self.remaining_quantity
    }

    pub fn filled_quantity(&self) -> Quantity {
        self.initial_quantity - self.remaining_quantity
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_quantity == 0
    }

    /// Execute `quantity` units against this order.
    pub fn fill(&mut self, quantity: Quantity) {
        assert!(
            quantity <= self.remaining_quantity,
            "order {} cannot be filled for more than its remaining quantity",
            self.id
        );
        self.remaining_quantity -= quantity;
    }

    /// Resolve a market order to the given limit price, converting it to
    /// GoodTillCancel. One-way and one-shot.
    pub fn to_good_till_cancel(&mut self, price: Price) {
        assert!(
            self.order_type == OrderType::Market,
            "order {} is not a market order and cannot be repriced",
            self.id
        );
        self.price = price;
        self.order_type = OrderType::GoodTillCancel;
    }
}

/// Amendment request for a resting order. Applying one is an atomic
/// cancel-then-add: the replacement keeps the original order's type but
/// joins the back of its price level's queue.
#[derive(Debug, Copy, Clone)]
pub struct OrderModify {
    pub id: OrderId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
}

impl OrderModify {
    pub fn new(id: OrderId, side: Side, price: Price, quantity: Quantity) -> Self {
        OrderModify {
            id,
            side,
            price,
            quantity,
        }
    }

    /// Build the replacement order under the preserved `order_type`.
    pub fn to_order(&self, order_type: OrderType) -> Order {
        Order::new(order_type, self.id, self.side, self.price, self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_decrements_remaining_and_tracks_filled() {
        let mut order = Order::new(OrderType::GoodTillCancel, 1, Side::Buy, 100, 10);
        order.fill(4);
        assert_eq!(order.remaining_quantity(), 6, "remaining after partial fill");
        assert_eq!(order.filled_quantity(), 4, "filled after partial fill");
        assert!(!order.is_filled());

        order.fill(6);
        assert_eq!(order.remaining_quantity(), 0);
        assert!(order.is_filled(), "order should be filled once remaining is 0");
    }

    #[test]
    #[should_panic(expected = "cannot be filled for more than its remaining quantity")]
    fn overfill_panics() {
        let mut order = Order::new(OrderType::GoodTillCancel, 7, Side::Sell, 100, 3);
        order.fill(4);
    }

    #[test]
    fn market_order_converts_to_good_till_cancel_once() {
        let mut order = Order::market(2, Side::Buy, 5);
        assert_eq!(order.order_type(), OrderType::Market);
        order.to_good_till_cancel(105);
        assert_eq!(order.order_type(), OrderType::GoodTillCancel);
        assert_eq!(order.price(), 105);
    }

    #[test]
    #[should_panic(expected = "is not a market order")]
    fn repricing_a_limit_order_panics() {
        let mut order = Order::new(OrderType::GoodTillCancel, 3, Side::Buy, 100, 5);
        order.to_good_till_cancel(101);
    }

    #[test]
    fn amendment_builds_replacement_under_preserved_type() {
        let amendment = OrderModify::new(9, Side::Sell, 250, 12);
        let order = amendment.to_order(OrderType::GoodForDay);
        assert_eq!(order.id(), 9);
        assert_eq!(order.order_type(), OrderType::GoodForDay);
        assert_eq!(order.price(), 250);
        assert_eq!(order.remaining_quantity(), 12);
    }
}
