use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::{Offset, Side};
use crate::trade::Trade;

fn weighted_avg(prior_price: Decimal, prior_qty: u64, trade_price: Decimal, trade_qty: u64) -> Decimal {
    let total = prior_qty + trade_qty;
    if total == 0 {
        return Decimal::ZERO;
    }
    (prior_price * Decimal::from(prior_qty) + trade_price * Decimal::from(trade_qty)) / Decimal::from(total)
}

/// Per-(account, order_book_id) position state. Long and short exposure
/// are each split into an `old` bucket (carried from a prior settlement)
/// and a `today` bucket (opened during the current session) — futures
/// bookkeeping requires the split to price commission and close-today
/// accounting correctly; stock accounts only ever populate the buy side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub order_book_id: String,
    pub buy_old: u64,
    pub buy_today: u64,
    pub sell_old: u64,
    pub sell_today: u64,
    pub buy_avg_open_price: Decimal,
    pub sell_avg_open_price: Decimal,
    pub margin: Decimal,
    pub realized_pnl: Decimal,
    pub last_price: Decimal,
}

impl Position {
    pub fn new(order_book_id: String) -> Self {
        Self {
            order_book_id,
            buy_old: 0,
            buy_today: 0,
            sell_old: 0,
            sell_today: 0,
            buy_avg_open_price: Decimal::ZERO,
            sell_avg_open_price: Decimal::ZERO,
            margin: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            last_price: Decimal::ZERO,
        }
    }

    pub fn buy_quantity(&self) -> u64 {
        self.buy_old + self.buy_today
    }

    pub fn sell_quantity(&self) -> u64 {
        self.sell_old + self.sell_today
    }

    pub fn is_flat(&self) -> bool {
        self.buy_quantity() == 0 && self.sell_quantity() == 0
    }

    pub fn update_last_price(&mut self, price: Decimal) {
        self.last_price = price;
    }

    /// How much of a closing order of `amount` lots, on the given closing
    /// side, would be drawn from the `today` bucket. Today is closed
    /// before old, matching a close-today-first convention; `Offset`
    /// distinctions beyond that are resolved by the caller splitting the
    /// order before it reaches matching.
    pub fn cal_close_today_amount(&self, closing_side: Side, amount: u64) -> u64 {
        match closing_side {
            Side::Sell | Side::ShortSell => amount.min(self.buy_today),
            Side::Buy | Side::MarginBuy => amount.min(self.sell_today),
        }
    }

    fn calc_margin(&self, contract_multiplier: Decimal, margin_rate: Decimal) -> Decimal {
        let qty = Decimal::from(self.buy_quantity() + self.sell_quantity());
        qty * self.last_price * contract_multiplier * margin_rate
    }

    pub fn holding_pnl(&self, contract_multiplier: Decimal) -> Decimal {
        let buy = (self.last_price - self.buy_avg_open_price)
            * Decimal::from(self.buy_quantity())
            * contract_multiplier;
        let sell = (self.sell_avg_open_price - self.last_price)
            * Decimal::from(self.sell_quantity())
            * contract_multiplier;
        buy + sell
    }

    pub fn market_value(&self) -> Decimal {
        self.last_price * Decimal::from(self.buy_quantity())
    }

    /// Apply a trade to this position. Returns the cash delta the owning
    /// account should apply: for futures, `-delta_margin + realized_delta`;
    /// for stock/non-futures, `-notional` on buy and `+notional` on sell.
    pub fn apply_trade(
        &mut self,
        trade: &Trade,
        contract_multiplier: Decimal,
        margin_rate: Decimal,
        is_future: bool,
    ) -> Decimal {
        if !is_future {
            return self.apply_trade_stock(trade);
        }

        let margin_before = self.calc_margin(contract_multiplier, margin_rate);
        let mut realized_delta = Decimal::ZERO;

        match trade.offset {
            Offset::Open => match trade.side {
                Side::Buy | Side::MarginBuy => {
                    self.buy_avg_open_price =
                        weighted_avg(self.buy_avg_open_price, self.buy_today, trade.price, trade.amount);
                    self.buy_today += trade.amount;
                }
                Side::Sell | Side::ShortSell => {
                    self.sell_avg_open_price =
                        weighted_avg(self.sell_avg_open_price, self.sell_today, trade.price, trade.amount);
                    self.sell_today += trade.amount;
                }
            },
            Offset::Close | Offset::CloseToday | Offset::CloseYesterday => {
                let qty = Decimal::from(trade.amount);
                match trade.side {
                    Side::Sell | Side::ShortSell => {
                        let today_close = trade.close_today_amount.min(self.buy_today);
                        let old_close = trade.amount - today_close;
                        self.buy_today -= today_close;
                        self.buy_old -= old_close;
                        realized_delta = (trade.price - self.buy_avg_open_price) * qty * contract_multiplier;
                    }
                    Side::Buy | Side::MarginBuy => {
                        let today_close = trade.close_today_amount.min(self.sell_today);
                        let old_close = trade.amount - today_close;
                        self.sell_today -= today_close;
                        self.sell_old -= old_close;
                        realized_delta = (self.sell_avg_open_price - trade.price) * qty * contract_multiplier;
                    }
                }
                self.realized_pnl += realized_delta;
            }
            Offset::None => {}
        }

        self.last_price = trade.price;
        let margin_after = self.calc_margin(contract_multiplier, margin_rate);
        self.margin = margin_after;
        -(margin_after - margin_before) + realized_delta
    }

    fn apply_trade_stock(&mut self, trade: &Trade) -> Decimal {
        match trade.side {
            Side::Buy | Side::MarginBuy => {
                self.buy_avg_open_price =
                    weighted_avg(self.buy_avg_open_price, self.buy_today, trade.price, trade.amount);
                self.buy_today += trade.amount;
                self.last_price = trade.price;
                -trade.notional()
            }
            Side::Sell | Side::ShortSell => {
                let today_close = trade.amount.min(self.buy_today);
                let old_close = trade.amount - today_close;
                self.buy_today -= today_close;
                self.buy_old -= old_close;
                let qty = Decimal::from(trade.amount);
                self.realized_pnl += (trade.price - self.buy_avg_open_price) * qty;
                self.last_price = trade.price;
                trade.notional()
            }
        }
    }

    /// End-of-session roll: promotes `today` into `old`, re-marks the
    /// average open price to the settlement price, and zeroes the daily
    /// realized PnL bucket.
    pub fn apply_settlement(
        &mut self,
        settle_price: Decimal,
        contract_multiplier: Decimal,
        margin_rate: Decimal,
    ) {
        self.buy_old += self.buy_today;
        self.buy_today = 0;
        self.sell_old += self.sell_today;
        self.sell_today = 0;
        if self.buy_quantity() > 0 {
            self.buy_avg_open_price = settle_price;
        }
        if self.sell_quantity() > 0 {
            self.sell_avg_open_price = settle_price;
        }
        self.last_price = settle_price;
        self.realized_pnl = Decimal::ZERO;
        self.margin = self.calc_margin(contract_multiplier, margin_rate);
    }
}
