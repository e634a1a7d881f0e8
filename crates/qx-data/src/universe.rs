//! Run-scoped subscription state. Grounded on
//! `original_source/core/structure/Universe.py` and `RunInfo.py`, trimmed
//! of their filesystem-backed data-source duties (covered by `DataSource`
//! instead) down to the ordered-set-of-symbols shape spec §3 names.

use chrono::NaiveDateTime;
use indexmap::IndexSet;
use qx_types::MarketInfoType;

/// Immutable ordered set of instrument identifiers subscribed for a run.
/// Ordering is preserved from first insertion, matching the original's
/// `OrderedDict`-backed symbol registration and giving the broker a stable
/// tie-break order for `MARKET_CHECK`'s argmin selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    symbols: IndexSet<String>,
}

impl Universe {
    pub fn new() -> Self {
        Self { symbols: IndexSet::new() }
    }

    pub fn from_symbols(symbols: impl IntoIterator<Item = String>) -> Self {
        Self { symbols: symbols.into_iter().collect() }
    }

    pub fn subscribe(&mut self, order_book_id: impl Into<String>) {
        self.symbols.insert(order_book_id.into());
    }

    pub fn contains(&self, order_book_id: &str) -> bool {
        self.symbols.contains(order_book_id)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

/// Start/end time and market-info-type a broker is constructed from.
/// Grounded on `original_source/core/structure/RunInfo.py`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub universe: Universe,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub market_info_type: Option<MarketInfoType>,
}

impl RunInfo {
    pub fn new(start_time: NaiveDateTime, end_time: NaiveDateTime) -> Self {
        Self {
            universe: Universe::new(),
            start_time,
            end_time,
            market_info_type: None,
        }
    }

    pub fn subscribe(&mut self, order_book_id: impl Into<String>) {
        self.universe.subscribe(order_book_id);
    }

    pub fn set_market_type(&mut self, market_info_type: MarketInfoType) {
        self.market_info_type = Some(market_info_type);
    }
}
