use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Five-level bid/ask book snapshot, embedded in `Tick`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Handicap {
    pub bid_price: [Decimal; 5],
    pub bid_volume: [u64; 5],
    pub ask_price: [Decimal; 5],
    pub ask_volume: [u64; 5],
}

impl Handicap {
    pub fn best_bid(&self) -> Decimal {
        self.bid_price[0]
    }

    pub fn best_ask(&self) -> Decimal {
        self.ask_price[0]
    }

    pub fn best_bid_volume(&self) -> u64 {
        self.bid_volume[0]
    }

    pub fn best_ask_volume(&self) -> u64 {
        self.ask_volume[0]
    }
}

impl Default for Handicap {
    fn default() -> Self {
        Self {
            bid_price: [Decimal::ZERO; 5],
            bid_volume: [0; 5],
            ask_price: [Decimal::ZERO; 5],
            ask_volume: [0; 5],
        }
    }
}

/// Point-in-time market snapshot. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub order_book_id: String,
    pub datetime: NaiveDateTime,
    pub last: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub prev_close: Decimal,
    pub prev_settlement: Decimal,
    pub volume: u64,
    pub total_turnover: Decimal,
    pub open_interest: u64,
    pub limit_up: Decimal,
    pub limit_down: Decimal,
    pub book: Handicap,
}

impl Tick {
    pub fn best_own_price(&self, side: crate::order::Side) -> Decimal {
        match side {
            crate::order::Side::Buy | crate::order::Side::MarginBuy => self.book.best_bid(),
            crate::order::Side::Sell | crate::order::Side::ShortSell => self.book.best_ask(),
        }
    }

    pub fn best_counterparty_price(&self, side: crate::order::Side) -> Decimal {
        match side {
            crate::order::Side::Buy | crate::order::Side::MarginBuy => self.book.best_ask(),
            crate::order::Side::Sell | crate::order::Side::ShortSell => self.book.best_bid(),
        }
    }
}
