use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::trade::Trade;

static ORDER_ID_GEN: AtomicU64 = AtomicU64::new(1);

/// Globally unique, monotonically assigned order identifier.
///
/// A random UUID cannot satisfy "monotonically assigned" per the data
/// model, so order ids are a process-wide counter rather than `Uuid`.
pub type OrderId = u64;

pub fn next_order_id() -> OrderId {
    ORDER_ID_GEN.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
    MarginBuy,
    ShortSell,
}

impl Side {
    pub fn is_buy_side(&self) -> bool {
        matches!(self, Side::Buy | Side::MarginBuy)
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
            Side::MarginBuy => Side::ShortSell,
            Side::ShortSell => Side::MarginBuy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Offset {
    None,
    Open,
    Close,
    CloseToday,
    CloseYesterday,
}

impl Offset {
    pub fn is_close(&self) -> bool {
        matches!(
            self,
            Offset::Close | Offset::CloseToday | Offset::CloseYesterday
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingNew,
    Active,
    PendingCancel,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Terminal set = {FILLED, CANCELLED, REJECTED}. PENDING_CANCEL is a
    /// transient intention, not terminal.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

/// Mutable object with identity. Invariants:
/// `filled_quantity <= quantity`, `avg_price >= 0`, and once `status` is
/// terminal no further mutation occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    /// Parent order id for a split/child order; `None` for ordinary orders.
    /// Carried for wire-contract parity with `get_state`'s
    /// `secondary_order_id` key — nothing in this engine currently splits
    /// an order into children.
    pub secondary_order_id: Option<OrderId>,
    pub broker_id: String,
    pub order_book_id: String,
    pub side: Side,
    #[serde(rename = "position_effect")]
    pub offset: Offset,
    pub quantity: u64,
    pub filled_quantity: u64,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub limit_price: Decimal,
    pub frozen_price: Decimal,
    pub avg_price: Decimal,
    pub transaction_cost: Decimal,
    pub status: OrderStatus,
    pub calendar_dt: NaiveDateTime,
    pub trading_dt: NaiveDateTime,
    pub message: String,
}

impl Order {
    pub fn new(
        broker_id: String,
        order_book_id: String,
        side: Side,
        offset: Offset,
        quantity: u64,
        order_type: OrderType,
        limit_price: Decimal,
        calendar_dt: NaiveDateTime,
        trading_dt: NaiveDateTime,
    ) -> Self {
        let frozen_price = match order_type {
            OrderType::Limit => limit_price,
            OrderType::Market => Decimal::ZERO,
        };
        Self {
            order_id: next_order_id(),
            secondary_order_id: None,
            broker_id,
            order_book_id,
            side,
            offset,
            quantity,
            filled_quantity: 0,
            order_type,
            limit_price,
            frozen_price,
            avg_price: Decimal::ZERO,
            transaction_cost: Decimal::ZERO,
            status: OrderStatus::PendingNew,
            calendar_dt,
            trading_dt,
            message: String::new(),
        }
    }

    pub fn unfilled_quantity(&self) -> u64 {
        self.quantity - self.filled_quantity
    }

    pub fn is_final(&self) -> bool {
        self.status.is_final()
    }

    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }

    pub fn price(&self) -> Decimal {
        match self.order_type {
            OrderType::Market => Decimal::ZERO,
            OrderType::Limit => self.frozen_price,
        }
    }

    pub fn activate(&mut self) {
        if !self.is_final() {
            self.status = OrderStatus::Active;
        }
    }

    pub fn set_frozen_price(&mut self, price: Decimal) {
        self.frozen_price = price;
    }

    /// Apply a trade fill: weighted-average price recompute, commission and
    /// tax added to `transaction_cost`, status advanced to FILLED once
    /// fully filled.
    pub fn fill(&mut self, trade: &Trade) {
        let prior_filled = Decimal::from(self.filled_quantity);
        let trade_qty = Decimal::from(trade.amount);
        let total_filled = prior_filled + trade_qty;
        self.avg_price = if total_filled.is_zero() {
            Decimal::ZERO
        } else {
            (self.avg_price * prior_filled + trade.price * trade_qty) / total_filled
        };
        self.filled_quantity += trade.amount;
        self.transaction_cost += trade.commission + trade.tax;
        if self.unfilled_quantity() == 0 {
            self.status = OrderStatus::Filled;
        }
    }

    pub fn mark_rejected(&mut self, reason: impl Into<String>) {
        if !self.is_final() {
            self.status = OrderStatus::Rejected;
            self.message = reason.into();
        }
    }

    pub fn mark_cancelled(&mut self, reason: impl Into<String>) {
        if !self.is_final() {
            self.status = OrderStatus::Cancelled;
            self.message = reason.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn sample_order() -> Order {
        Order::new(
            "broker-1".into(),
            "000001.XSHE".into(),
            Side::Buy,
            Offset::None,
            1000,
            OrderType::Market,
            Decimal::ZERO,
            dt(),
            dt(),
        )
    }

    #[test]
    fn order_ids_are_monotonic() {
        let a = sample_order();
        let b = sample_order();
        assert!(b.order_id > a.order_id);
    }

    #[test]
    fn fill_updates_weighted_average_and_status() {
        let mut order = sample_order();
        order.activate();
        let trade = Trade::new(
            order.order_id,
            order.order_book_id.clone(),
            dt(),
            dt(),
            Decimal::new(10, 0),
            600,
            Side::Buy,
            Offset::None,
            Decimal::new(3, 0),
            Decimal::ZERO,
            0,
            Decimal::ZERO,
        );
        order.fill(&trade);
        assert_eq!(order.filled_quantity, 600);
        assert_eq!(order.status, OrderStatus::Active);

        let trade2 = Trade::new(
            order.order_id,
            order.order_book_id.clone(),
            dt(),
            dt(),
            Decimal::new(11, 0),
            400,
            Side::Buy,
            Offset::None,
            Decimal::new(3, 0),
            Decimal::ZERO,
            0,
            Decimal::ZERO,
        );
        order.fill(&trade2);
        assert_eq!(order.filled_quantity, 1000);
        assert_eq!(order.status, OrderStatus::Filled);
        // weighted avg: (10*600 + 11*400) / 1000 = 10.4
        assert_eq!(order.avg_price, Decimal::new(104, 1));
    }

    #[test]
    fn wire_contract_uses_position_effect_and_type_keys() {
        let order = sample_order();
        let json: serde_json::Value = serde_json::to_value(&order).unwrap();
        assert!(json.get("position_effect").is_some());
        assert!(json.get("offset").is_none());
        assert_eq!(json["type"], "MARKET");
        assert_eq!(json["side"], "BUY");
        assert_eq!(json["status"], "PENDING_NEW");
    }

    #[test]
    fn terminal_orders_do_not_mutate() {
        let mut order = sample_order();
        order.mark_rejected("miss market data");
        assert_eq!(order.status, OrderStatus::Rejected);
        order.mark_cancelled("should be ignored");
        assert_eq!(order.status, OrderStatus::Rejected);
    }
}
