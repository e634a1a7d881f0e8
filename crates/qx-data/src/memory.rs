//! Reference `DataSource`/`StoreProvider` implementations backed by plain
//! in-memory collections. These exist for tests and as the adapter a real
//! loader (CSV/SQL/shelve) would replace — concrete loaders are explicitly
//! out of scope (spec §1).

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use qx_types::{
    Bar, DataSource, Frequency, MarketSnapshot, QxResult, StoreProvider, Tick,
};

/// All bars/ticks/settlement prices for one instrument, keyed by datetime.
#[derive(Debug, Default, Clone)]
struct InstrumentSeries {
    bars: BTreeMap<NaiveDateTime, Bar>,
    ticks: BTreeMap<NaiveDateTime, Tick>,
    settle_prices: BTreeMap<NaiveDate, Decimal>,
}

/// `DataSource` over data supplied up front (e.g. by a test fixture or a
/// loader running outside this crate). Never reaches out to disk or a
/// network — that capability boundary is exactly what spec §1 keeps out of
/// the core.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    series: RwLock<HashMap<String, InstrumentSeries>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bar(&self, bar: Bar) {
        let mut series = self.series.write();
        series
            .entry(bar.order_book_id.clone())
            .or_default()
            .bars
            .insert(bar.datetime, bar);
    }

    pub fn push_tick(&self, tick: Tick) {
        let mut series = self.series.write();
        series
            .entry(tick.order_book_id.clone())
            .or_default()
            .ticks
            .insert(tick.datetime, tick);
    }

    pub fn set_settle_price(&self, order_book_id: &str, date: NaiveDate, price: Decimal) {
        let mut series = self.series.write();
        series
            .entry(order_book_id.to_string())
            .or_default()
            .settle_prices
            .insert(date, price);
    }
}

impl DataSource for InMemoryDataSource {
    fn get_bar(&self, order_book_id: &str, dt: NaiveDateTime, _frequency: Frequency) -> Option<Bar> {
        self.series.read().get(order_book_id)?.bars.get(&dt).cloned()
    }

    fn get_settle_price(&self, order_book_id: &str, date: NaiveDate) -> Option<Decimal> {
        self.series.read().get(order_book_id)?.settle_prices.get(&date).copied()
    }

    fn history_bars(
        &self,
        order_book_id: &str,
        count: usize,
        _frequency: Frequency,
        dt: NaiveDateTime,
    ) -> Vec<Bar> {
        let series = self.series.read();
        let Some(instrument_series) = series.get(order_book_id) else {
            return Vec::new();
        };
        let mut bars: Vec<Bar> = instrument_series
            .bars
            .range(..=dt)
            .map(|(_, bar)| bar.clone())
            .collect();
        if bars.len() > count {
            bars.drain(0..bars.len() - count);
        }
        bars
    }

    fn current_snapshot(
        &self,
        order_book_id: &str,
        frequency: Frequency,
        dt: NaiveDateTime,
    ) -> Option<MarketSnapshot> {
        let series = self.series.read();
        let instrument_series = series.get(order_book_id)?;
        match frequency {
            Frequency::Tick => instrument_series.ticks.get(&dt).cloned().map(MarketSnapshot::Tick),
            _ => instrument_series.bars.get(&dt).cloned().map(MarketSnapshot::Bar),
        }
    }

    fn get_trading_minutes_for(&self, order_book_id: &str, trading_dt: NaiveDate) -> Vec<NaiveDateTime> {
        let series = self.series.read();
        let Some(instrument_series) = series.get(order_book_id) else {
            return Vec::new();
        };
        instrument_series
            .bars
            .keys()
            .filter(|dt| dt.date() == trading_dt)
            .copied()
            .collect()
    }

    fn available_data_range(&self, frequency: Frequency) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let series = self.series.read();
        let mut earliest: Option<NaiveDateTime> = None;
        let mut latest: Option<NaiveDateTime> = None;
        for instrument_series in series.values() {
            let keys: Vec<NaiveDateTime> = match frequency {
                Frequency::Tick => instrument_series.ticks.keys().copied().collect(),
                _ => instrument_series.bars.keys().copied().collect(),
            };
            for dt in keys {
                earliest = Some(earliest.map_or(dt, |e| e.min(dt)));
                latest = Some(latest.map_or(dt, |l| l.max(dt)));
            }
        }
        earliest.zip(latest)
    }

    fn get_merge_ticks(
        &self,
        order_book_ids: &[String],
        trading_date: NaiveDate,
        last_dt: Option<NaiveDateTime>,
    ) -> Vec<MarketSnapshot> {
        let series = self.series.read();
        let mut merged: Vec<(NaiveDateTime, MarketSnapshot)> = Vec::new();
        for order_book_id in order_book_ids {
            let Some(instrument_series) = series.get(order_book_id) else {
                continue;
            };
            for (dt, tick) in instrument_series.ticks.iter() {
                if dt.date() != trading_date {
                    continue;
                }
                if let Some(last) = last_dt {
                    if *dt <= last {
                        continue;
                    }
                }
                merged.push((*dt, MarketSnapshot::Tick(tick.clone())));
            }
        }
        merged.sort_by_key(|(dt, _)| *dt);
        merged.into_iter().map(|(_, snapshot)| snapshot).collect()
    }
}

/// `StoreProvider` over a process-local map. Round-trips bytes exactly;
/// useful for persistence-helper tests without a real key/value backend.
#[derive(Debug, Default)]
pub struct InMemoryStoreProvider {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreProvider for InMemoryStoreProvider {
    fn store(&self, key: &str, value: &[u8]) -> QxResult<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> QxResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }
}
