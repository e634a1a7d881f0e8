use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregated OHLCV window. Immutable; carries the order_book_id of the
/// instrument it describes rather than an owned `Instrument` (the engine
/// looks instruments up by id through the `DataSource` capability).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub order_book_id: String,
    pub datetime: NaiveDateTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub total_turnover: Decimal,
    pub settlement: Decimal,
    pub prev_settlement: Decimal,
    pub open_interest: u64,
    pub limit_up: Decimal,
    pub limit_down: Decimal,
}

impl Bar {
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }
}

/// Either shape of a market snapshot as it flows through the replay
/// pipeline and into the matching engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketSnapshot {
    Tick(crate::tick::Tick),
    Bar(Bar),
}

impl MarketSnapshot {
    pub fn order_book_id(&self) -> &str {
        match self {
            MarketSnapshot::Tick(t) => &t.order_book_id,
            MarketSnapshot::Bar(b) => &b.order_book_id,
        }
    }

    pub fn datetime(&self) -> NaiveDateTime {
        match self {
            MarketSnapshot::Tick(t) => t.datetime,
            MarketSnapshot::Bar(b) => b.datetime,
        }
    }

    pub fn last_price(&self) -> Decimal {
        match self {
            MarketSnapshot::Tick(t) => t.last,
            MarketSnapshot::Bar(b) => b.close,
        }
    }

    pub fn limit_up(&self) -> Decimal {
        match self {
            MarketSnapshot::Tick(t) => t.limit_up,
            MarketSnapshot::Bar(b) => b.limit_up,
        }
    }

    pub fn limit_down(&self) -> Decimal {
        match self {
            MarketSnapshot::Tick(t) => t.limit_down,
            MarketSnapshot::Bar(b) => b.limit_down,
        }
    }

    /// Traded volume attributed to this snapshot, used by the volume-cap
    /// matching policy.
    pub fn volume(&self) -> u64 {
        match self {
            MarketSnapshot::Tick(t) => t.volume,
            MarketSnapshot::Bar(b) => b.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn typical_price_is_hlc_over_three() {
        let bar = Bar {
            order_book_id: "IF2009".into(),
            datetime: NaiveDate::from_ymd_opt(2020, 9, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            open: Decimal::new(3000, 0),
            high: Decimal::new(3010, 0),
            low: Decimal::new(2990, 0),
            close: Decimal::new(3005, 0),
            volume: 1000,
            total_turnover: Decimal::ZERO,
            settlement: Decimal::ZERO,
            prev_settlement: Decimal::ZERO,
            open_interest: 0,
            limit_up: Decimal::ZERO,
            limit_down: Decimal::ZERO,
        };
        assert_eq!(bar.typical_price(), Decimal::new(3005, 0));
    }
}
