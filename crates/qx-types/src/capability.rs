//! Capability interfaces the simulation core calls out through. Concrete
//! collaborators (CSV/SQL loaders, Redis-backed stores, live pricing feeds)
//! live outside this crate; the core only ever holds a `Box<dyn Trait>`.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::bar::{Bar, MarketSnapshot};
use crate::error::QxResult;
use crate::order::Side;
use crate::trade::Trade;

/// Bar/tick aggregation period a `DataSource` is asked to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Tick,
    Minute,
    Day,
}

/// Abstract read of bars/ticks/calendar. Grounded on spec §6's `DataSource`
/// capability; concrete loaders (CSV, shelve, SQL) are out of scope and are
/// never implemented against this trait inside this crate.
pub trait DataSource: Send + Sync {
    fn get_bar(&self, order_book_id: &str, dt: NaiveDateTime, frequency: Frequency) -> Option<Bar>;

    fn get_settle_price(&self, order_book_id: &str, date: NaiveDate) -> Option<Decimal>;

    fn history_bars(
        &self,
        order_book_id: &str,
        count: usize,
        frequency: Frequency,
        dt: NaiveDateTime,
    ) -> Vec<Bar>;

    fn current_snapshot(
        &self,
        order_book_id: &str,
        frequency: Frequency,
        dt: NaiveDateTime,
    ) -> Option<MarketSnapshot>;

    fn get_trading_minutes_for(&self, order_book_id: &str, trading_dt: NaiveDate) -> Vec<NaiveDateTime>;

    fn available_data_range(&self, frequency: Frequency) -> Option<(NaiveDateTime, NaiveDateTime)>;

    fn get_merge_ticks(
        &self,
        order_book_ids: &[String],
        trading_date: NaiveDate,
        last_dt: Option<NaiveDateTime>,
    ) -> Vec<MarketSnapshot>;
}

/// Key/value persistence backend. `None` means absent, not an error —
/// persistence failures surface as `PersistError` from the caller, not
/// from this trait.
pub trait StoreProvider: Send + Sync {
    fn store(&self, key: &str, value: &[u8]) -> QxResult<()>;
    fn load(&self, key: &str) -> QxResult<Option<Vec<u8>>>;
}

/// Deal-price determination, pluggable per the configured `MatchingType`.
pub trait DealDecider: Send + Sync {
    fn deal_price(&self, order_book_id: &str, side: Side, market: &MarketSnapshot) -> Option<Decimal>;
}

/// Buys pay up, sells pay down; magnitude is policy-defined.
pub trait SlippageDecider: Send + Sync {
    fn trade_price(&self, side: Side, deal_price: Decimal) -> Decimal;
}

/// Commission policy. Stateful implementations (the stock per-order
/// minimum ledger) take `&mut self`.
pub trait CommissionDecider: Send + Sync {
    fn commission(&mut self, trade: &Trade, contract_multiplier: Decimal) -> Decimal;
}

/// Tax policy: stock sells are taxed, futures never are.
pub trait TaxDecider: Send + Sync {
    fn tax(&self, trade: &Trade) -> Decimal;
}

/// Matching price source, selected via `EngineConfig::Matching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MatchingType {
    CurrentBarClose,
    NextBarOpen,
    NextTickLast,
    NextTickBestOwn,
    NextTickBestCounterparty,
}

/// Commission computation mode for futures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CommissionType {
    ByMoney,
    ByVolume,
}

/// Hedge classification a futures commission schedule is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HedgeType {
    Speculation,
    Arbitrage,
    Hedge,
}
