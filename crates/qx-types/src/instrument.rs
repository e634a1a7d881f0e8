use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange an instrument is listed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    SSE,
    SZSE,
    CFFEX,
    SHFE,
    DCE,
    CZCE,
    INE,
    Other,
}

/// Broad instrument category. Only `Stock` and `Future` carry concrete
/// commission/tax/margin policies in this engine; the remaining variants
/// are recognized by the data model but have no decider implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    Stock,
    Future,
    Option,
    Index,
}

/// Static contract metadata. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub order_book_id: String,
    pub instrument_type: InstrumentType,
    pub exchange: Exchange,
    pub tick_size: Decimal,
    pub round_lot: u64,
    pub contract_multiplier: Decimal,
    pub margin_rate: Decimal,
    pub listed_date: NaiveDate,
    pub de_listed_date: Option<NaiveDate>,
    pub underlying_symbol: Option<String>,
}

impl Instrument {
    pub fn is_de_listed(&self, as_of: NaiveDate) -> bool {
        match self.de_listed_date {
            Some(d) => as_of >= d,
            None => false,
        }
    }

    pub fn is_listed_date(&self, as_of: NaiveDate) -> bool {
        as_of == self.listed_date
    }

    pub fn is_future(&self) -> bool {
        matches!(self.instrument_type, InstrumentType::Future)
    }

    pub fn is_stock(&self) -> bool {
        matches!(self.instrument_type, InstrumentType::Stock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Instrument {
        Instrument {
            order_book_id: "000001.XSHE".into(),
            instrument_type: InstrumentType::Stock,
            exchange: Exchange::SZSE,
            tick_size: Decimal::new(1, 2),
            round_lot: 100,
            contract_multiplier: Decimal::ONE,
            margin_rate: Decimal::ZERO,
            listed_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            de_listed_date: None,
            underlying_symbol: None,
        }
    }

    #[test]
    fn not_de_listed_when_no_date_set() {
        let inst = sample();
        assert!(!inst.is_de_listed(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
    }

    #[test]
    fn de_listed_on_or_after_date() {
        let mut inst = sample();
        inst.de_listed_date = Some(NaiveDate::from_ymd_opt(2020, 6, 1).unwrap());
        assert!(inst.is_de_listed(NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()));
        assert!(!inst.is_de_listed(NaiveDate::from_ymd_opt(2020, 5, 31).unwrap()));
    }
}
