use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::{Offset, OrderId, Side};

static TRADE_ID_GEN: AtomicU64 = AtomicU64::new(1);

pub type TradeId = u64;

fn next_trade_id() -> TradeId {
    TRADE_ID_GEN.fetch_add(1, Ordering::Relaxed)
}

/// Immutable fill event produced by the matching engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub order_id: OrderId,
    pub order_book_id: String,
    pub match_dt: NaiveDateTime,
    pub trading_dt: NaiveDateTime,
    pub price: Decimal,
    pub amount: u64,
    pub side: Side,
    pub offset: Offset,
    pub commission: Decimal,
    pub tax: Decimal,
    pub close_today_amount: u64,
    pub frozen_price: Decimal,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: OrderId,
        order_book_id: String,
        match_dt: NaiveDateTime,
        trading_dt: NaiveDateTime,
        price: Decimal,
        amount: u64,
        side: Side,
        offset: Offset,
        commission: Decimal,
        tax: Decimal,
        close_today_amount: u64,
        frozen_price: Decimal,
    ) -> Self {
        Self {
            trade_id: next_trade_id(),
            order_id,
            order_book_id,
            match_dt,
            trading_dt,
            price,
            amount,
            side,
            offset,
            commission,
            tax,
            close_today_amount,
            frozen_price,
        }
    }

    pub fn transaction_cost(&self) -> Decimal {
        self.commission + self.tax
    }

    pub fn notional(&self) -> Decimal {
        self.price * Decimal::from(self.amount)
    }

    /// The idempotence key `backward_trade_set` tracks.
    pub fn exec_id(&self) -> TradeId {
        self.trade_id
    }
}
