use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::{Account, AccountType};
use crate::error::{AccountError, QxResult};
use crate::position::Position;

/// Union of accounts (one per `AccountType`) plus valuation state pegged
/// to the start of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub accounts: HashMap<AccountType, Account>,
    pub start_date: NaiveDate,
    pub units: Decimal,
    pub static_unit_net_value: Decimal,
}

impl Portfolio {
    pub fn new(start_date: NaiveDate, units: Decimal) -> Self {
        Self {
            accounts: HashMap::new(),
            start_date,
            units,
            static_unit_net_value: Decimal::ONE,
        }
    }

    pub fn add_account(&mut self, account: Account) {
        self.accounts.insert(account.account_type, account);
    }

    pub fn account(&self, account_type: AccountType) -> Option<&Account> {
        self.accounts.get(&account_type)
    }

    pub fn account_mut(&mut self, account_type: AccountType) -> Option<&mut Account> {
        self.accounts.get_mut(&account_type)
    }

    pub fn stock_account(&self) -> Option<&Account> {
        self.account(AccountType::Stock)
    }

    pub fn future_account(&self) -> Option<&Account> {
        self.account(AccountType::Future)
    }

    /// `Σ account.total_value`. The source this was ported from iterates
    /// `accounts.items()` (key/value tuples) here, which silently drops
    /// the correct sum; this sums `.values()` as the prose definition
    /// requires.
    pub fn total_value(&self, multiplier_of: impl Fn(&str) -> Decimal + Copy) -> Decimal {
        self.accounts
            .values()
            .map(|a| a.total_value(multiplier_of))
            .sum()
    }

    pub fn cash(&self) -> Decimal {
        self.accounts.values().map(Account::cash).sum()
    }

    pub fn frozen_cash(&self) -> Decimal {
        self.accounts.values().map(|a| a.frozen_cash).sum()
    }

    pub fn market_value(&self) -> Decimal {
        self.accounts.values().map(Account::market_value).sum()
    }

    pub fn transaction_cost(&self) -> Decimal {
        self.accounts.values().map(|a| a.transaction_cost).sum()
    }

    /// Looks a position up across every account. Returns
    /// `AccountError::PositionNotFound` on a miss rather than silently
    /// returning nothing, per the fixed `MixedPositions` behavior.
    pub fn position(&self, order_book_id: &str) -> QxResult<&Position> {
        self.accounts
            .values()
            .find_map(|a| a.positions.get(order_book_id))
            .ok_or_else(|| {
                AccountError::PositionNotFound {
                    order_book_id: order_book_id.to_string(),
                }
                .into()
            })
    }

    pub fn unit_net_value(&self, multiplier_of: impl Fn(&str) -> Decimal + Copy) -> Decimal {
        if self.units.is_zero() {
            return Decimal::ZERO;
        }
        self.total_value(multiplier_of) / self.units
    }

    /// Snapshots `static_unit_net_value` at the start of a trading
    /// session; called from the `PRE_BEFORE_TRADING`-equivalent hook.
    pub fn snapshot_static_unit_net_value(&mut self, multiplier_of: impl Fn(&str) -> Decimal + Copy) {
        self.static_unit_net_value = self.unit_net_value(multiplier_of);
    }

    pub fn daily_returns(&self, multiplier_of: impl Fn(&str) -> Decimal + Copy) -> Decimal {
        if self.static_unit_net_value.is_zero() {
            return Decimal::ZERO;
        }
        self.unit_net_value(multiplier_of) / self.static_unit_net_value - Decimal::ONE
    }

    pub fn total_returns(&self, multiplier_of: impl Fn(&str) -> Decimal + Copy) -> Decimal {
        if self.units.is_zero() {
            return Decimal::ZERO;
        }
        self.unit_net_value(multiplier_of) - Decimal::ONE
    }

    pub fn annualized_returns(
        &self,
        elapsed_days: u32,
        multiplier_of: impl Fn(&str) -> Decimal + Copy,
    ) -> Option<f64> {
        if elapsed_days == 0 {
            return None;
        }
        let unv: f64 = self.unit_net_value(multiplier_of).try_into().ok()?;
        if unv <= 0.0 {
            return None;
        }
        let exponent = 365.0 / elapsed_days as f64;
        Some(unv.powf(exponent) - 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_value_sums_every_account_value() {
        let mut portfolio = Portfolio::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), Decimal::from(1_000_000));
        portfolio.add_account(Account::new("stock".into(), AccountType::Stock, Decimal::from(500_000)));
        portfolio.add_account(Account::new("future".into(), AccountType::Future, Decimal::from(500_000)));

        let total = portfolio.total_value(|_| Decimal::ONE);
        assert_eq!(total, Decimal::from(1_000_000));
    }

    #[test]
    fn missing_position_raises_not_found() {
        let mut portfolio = Portfolio::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), Decimal::from(1));
        portfolio.add_account(Account::new("stock".into(), AccountType::Stock, Decimal::from(1)));
        let result = portfolio.position("NOPE");
        assert!(result.is_err());
    }
}
