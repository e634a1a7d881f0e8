use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AccountError, QxResult};
use crate::instrument::Instrument;
use crate::order::{Offset, Order, OrderId, Side};
use crate::position::Position;
use crate::trade::{Trade, TradeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Stock,
    Future,
}

fn margin_of(quantity: u64, price: Decimal, contract_multiplier: Decimal, margin_rate: Decimal) -> Decimal {
    Decimal::from(quantity) * price * contract_multiplier * margin_rate
}

/// Cash, frozen cash, positions, and the idempotence guard shared by both
/// account kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub account_type: AccountType,
    pub positions: HashMap<String, Position>,
    pub total_cash: Decimal,
    pub frozen_cash: Decimal,
    pub transaction_cost: Decimal,
    pub backward_trade_set: HashSet<TradeId>,
}

impl Account {
    pub fn new(account_id: String, account_type: AccountType, starting_cash: Decimal) -> Self {
        Self {
            account_id,
            account_type,
            positions: HashMap::new(),
            total_cash: starting_cash,
            frozen_cash: Decimal::ZERO,
            transaction_cost: Decimal::ZERO,
            backward_trade_set: HashSet::new(),
        }
    }

    pub fn cash(&self) -> Decimal {
        self.total_cash - self.frozen_cash
    }

    pub fn market_value(&self) -> Decimal {
        self.positions.values().map(Position::market_value).sum()
    }

    pub fn margin(&self) -> Decimal {
        self.positions.values().map(|p| p.margin).sum()
    }

    pub fn holding_pnl(&self, multiplier_of: impl Fn(&str) -> Decimal + Copy) -> Decimal {
        self.positions
            .values()
            .map(|p| p.holding_pnl(multiplier_of(&p.order_book_id)))
            .sum()
    }

    pub fn daily_realized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    pub fn total_value(&self, multiplier_of: impl Fn(&str) -> Decimal + Copy) -> Decimal {
        match self.account_type {
            AccountType::Stock => self.total_cash + self.market_value(),
            AccountType::Future => {
                self.total_cash + self.margin() + self.holding_pnl(multiplier_of)
            }
        }
    }

    pub fn position(&self, order_book_id: &str) -> QxResult<&Position> {
        self.positions
            .get(order_book_id)
            .ok_or_else(|| AccountError::PositionNotFound {
                order_book_id: order_book_id.to_string(),
            }
            .into())
    }

    pub fn position_mut_or_insert(&mut self, order_book_id: &str) -> &mut Position {
        self.positions
            .entry(order_book_id.to_string())
            .or_insert_with(|| Position::new(order_book_id.to_string()))
    }

    fn frozen_cash_of_order(&self, order: &Order, instrument: &Instrument) -> Decimal {
        match self.account_type {
            AccountType::Future if order.offset == Offset::Open => margin_of(
                order.unfilled_quantity(),
                order.price().max(order.frozen_price),
                instrument.contract_multiplier,
                instrument.margin_rate,
            ),
            AccountType::Stock if order.side.is_buy_side() && order.offset == Offset::None => {
                Decimal::from(order.unfilled_quantity()) * order.price().max(order.frozen_price)
            }
            _ => Decimal::ZERO,
        }
    }

    pub fn on_order_pending_new(&mut self, order: &Order, instrument: &Instrument) {
        self.frozen_cash += self.frozen_cash_of_order(order, instrument);
    }

    pub fn on_order_released(&mut self, order: &Order, instrument: &Instrument) {
        self.frozen_cash -= self.frozen_cash_of_order(order, instrument);
        if self.frozen_cash < Decimal::ZERO {
            self.frozen_cash = Decimal::ZERO;
        }
    }

    /// Apply a trade idempotently: replaying the same `exec_id` after a
    /// restore is a no-op.
    pub fn on_trade(&mut self, trade: &Trade, instrument: &Instrument) {
        if self.backward_trade_set.contains(&trade.exec_id()) {
            return;
        }
        let is_future = matches!(self.account_type, AccountType::Future);
        let position = self.position_mut_or_insert(&trade.order_book_id);
        let delta_cash = position.apply_trade(
            trade,
            instrument.contract_multiplier,
            instrument.margin_rate,
            is_future,
        );
        self.total_cash += delta_cash - trade.transaction_cost();
        self.transaction_cost += trade.transaction_cost();

        let frozen_release = match self.account_type {
            AccountType::Future if trade.offset == Offset::Open => margin_of(
                trade.amount,
                trade.frozen_price,
                instrument.contract_multiplier,
                instrument.margin_rate,
            ),
            AccountType::Stock if trade.offset == Offset::None && trade.side == Side::Buy => {
                Decimal::from(trade.amount) * trade.frozen_price
            }
            _ => Decimal::ZERO,
        };
        self.frozen_cash -= frozen_release;
        if self.frozen_cash < Decimal::ZERO {
            self.frozen_cash = Decimal::ZERO;
        }

        self.backward_trade_set.insert(trade.exec_id());
    }

    /// End-of-session settlement. `de_listed` and `settle_price_of` let the
    /// caller consult per-instrument metadata without this type depending
    /// on a data source directly.
    pub fn settle(
        &mut self,
        settle_price_of: impl Fn(&str) -> Decimal,
        de_listed: impl Fn(&str) -> bool,
        multiplier_of: impl Fn(&str) -> Decimal + Copy,
        margin_rate_of: impl Fn(&str) -> Decimal,
    ) {
        let mut to_drop = Vec::new();
        for (order_book_id, position) in self.positions.iter_mut() {
            if de_listed(order_book_id) && !position.is_flat() {
                tracing::warn!(order_book_id, "de-listed position force-closed at settlement");
                to_drop.push(order_book_id.clone());
                continue;
            }
            if position.is_flat() {
                to_drop.push(order_book_id.clone());
                continue;
            }
            if matches!(self.account_type, AccountType::Future) {
                position.apply_settlement(
                    settle_price_of(order_book_id),
                    multiplier_of(order_book_id),
                    margin_rate_of(order_book_id),
                );
            }
        }
        for id in to_drop {
            self.positions.remove(&id);
        }

        if matches!(self.account_type, AccountType::Future) {
            let total_value = self.total_value(multiplier_of);
            self.total_cash = total_value - self.margin() - self.holding_pnl(multiplier_of);
            if total_value <= Decimal::ZERO {
                tracing::error!(account = %self.account_id, %total_value, "account blown at settlement");
                self.positions.clear();
                self.total_cash = Decimal::ZERO;
                self.frozen_cash = Decimal::ZERO;
            }
        }
        self.backward_trade_set.clear();
    }

    pub fn fast_forward_frozen_cash(
        &mut self,
        open_orders: &[Order],
        instrument_of: impl Fn(&str) -> Instrument,
    ) {
        self.frozen_cash = open_orders
            .iter()
            .filter(|o| !o.is_final())
            .map(|o| self.frozen_cash_of_order(o, &instrument_of(&o.order_book_id)))
            .sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn future_instrument() -> Instrument {
        Instrument {
            order_book_id: "IF2009".into(),
            instrument_type: crate::instrument::InstrumentType::Future,
            exchange: crate::instrument::Exchange::CFFEX,
            tick_size: Decimal::new(1, 1),
            round_lot: 1,
            contract_multiplier: Decimal::from(10),
            margin_rate: Decimal::new(1, 1),
            listed_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            de_listed_date: None,
            underlying_symbol: None,
        }
    }

    #[test]
    fn trade_applied_twice_is_idempotent() {
        let mut account = Account::new("acct-1".into(), AccountType::Future, Decimal::from(100_000));
        let instrument = future_instrument();
        let trade = Trade::new(
            1,
            "IF2009".into(),
            dt(),
            dt(),
            Decimal::new(3000, 0),
            2,
            Side::Buy,
            Offset::Open,
            Decimal::ZERO,
            Decimal::ZERO,
            0,
            Decimal::new(3000, 0),
        );
        account.on_trade(&trade, &instrument);
        let cash_after_first = account.total_cash;
        account.on_trade(&trade, &instrument);
        assert_eq!(account.total_cash, cash_after_first);
    }

    #[test]
    fn cash_equals_total_minus_frozen() {
        let account = Account::new("acct-1".into(), AccountType::Stock, Decimal::from(1000));
        assert_eq!(account.cash(), Decimal::from(1000));
    }
}
