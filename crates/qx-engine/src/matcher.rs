//! The matching engine. Grounded on `original_source/mod/matcher/Base.py`'s
//! `match()` — spec §9's fix to the two conflicting `match` signatures on
//! `BaseMatcher` adopts the single contract implemented here:
//! `match_orders(market_snapshot, open_orders)`.

use rust_decimal::Decimal;

use qx_types::{
    CommissionDecider, DealDecider, Instrument, MarketSnapshot, MatchingConfig, Order, OrderType,
    Position, SlippageDecider, TaxDecider, Trade,
};

/// Bundles the pluggable deal/slippage/commission/tax policies with the
/// volume/price/liquidity toggles from `EngineConfig::Matching`. One
/// instance per instrument kind (stock vs future) is typical, since the
/// deciders differ between the two.
pub struct MatchingEngine {
    pub config: MatchingConfig,
    pub deal_decider: Box<dyn DealDecider>,
    pub slippage_decider: Box<dyn SlippageDecider>,
    pub commission_decider: Box<dyn CommissionDecider>,
    pub tax_decider: Box<dyn TaxDecider>,
}

impl MatchingEngine {
    /// Matches `open_orders` (already filtered to `market`'s instrument)
    /// against a single snapshot, mutating each order's fill state in
    /// place and returning the trades produced, in submission order.
    /// `position` supplies the close-today split for futures; `None` is
    /// fine for instruments that never close (or for stock, which has no
    /// close-today concept).
    pub fn match_orders(
        &mut self,
        market: &MarketSnapshot,
        open_orders: &mut [Order],
        instrument: &Instrument,
        position: Option<&Position>,
    ) -> Vec<Trade> {
        let mut trades = Vec::new();
        let mut cumulative_fill: u64 = 0;

        for order in open_orders.iter_mut() {
            if order.is_final() || !order.is_active() {
                continue;
            }

            let last_price = market.last_price();
            if last_price <= Decimal::ZERO {
                if instrument.is_listed_date(market.datetime().date()) {
                    order.mark_rejected("cannot trade on listed date");
                } else {
                    order.mark_rejected("miss market data");
                }
                continue;
            }

            let Some(deal_price) = self.deal_decider.deal_price(&order.order_book_id, order.side, market) else {
                continue;
            };

            if order.order_type == OrderType::Limit {
                if order.side.is_buy_side() && order.limit_price < deal_price {
                    continue;
                }
                if !order.side.is_buy_side() && order.limit_price > deal_price {
                    continue;
                }
            }

            if self.config.updown_price_limit {
                let limit_up = market.limit_up();
                let limit_down = market.limit_down();
                if order.side.is_buy_side() && limit_up > Decimal::ZERO && deal_price >= limit_up {
                    if order.order_type == OrderType::Limit {
                        continue;
                    }
                    order.mark_rejected("limit_up");
                    continue;
                }
                if !order.side.is_buy_side() && limit_down > Decimal::ZERO && deal_price <= limit_down {
                    if order.order_type == OrderType::Limit {
                        continue;
                    }
                    order.mark_rejected("limit_down");
                    continue;
                }
            }

            if self.config.liquidity_limit {
                if let MarketSnapshot::Tick(tick) = market {
                    let illiquid = if order.side.is_buy_side() {
                        tick.book.best_ask_volume() == 0
                    } else {
                        tick.book.best_bid_volume() == 0
                    };
                    if illiquid {
                        if order.order_type == OrderType::Limit {
                            continue;
                        }
                        order.mark_rejected("no counterparty liquidity");
                        continue;
                    }
                }
            }

            let mut fill_qty = order.unfilled_quantity();
            let mut capped = false;
            if self.config.volume_limit {
                let available = available_volume(
                    market.volume(),
                    self.config.volume_percent,
                    cumulative_fill,
                    instrument.round_lot,
                );
                if available == 0 {
                    if order.order_type == OrderType::Market {
                        order.mark_cancelled("volume cap exhausted");
                    }
                    continue;
                }
                if fill_qty > available {
                    fill_qty = available;
                    capped = true;
                }
            }

            let close_today_amount = if instrument.is_future() && order.offset.is_close() {
                position.map(|p| p.cal_close_today_amount(order.side, fill_qty)).unwrap_or(0)
            } else {
                0
            };

            let trade_price = self.slippage_decider.trade_price(order.side, deal_price);

            let mut trade = Trade::new(
                order.order_id,
                order.order_book_id.clone(),
                market.datetime(),
                market.datetime(),
                trade_price,
                fill_qty,
                order.side,
                order.offset,
                Decimal::ZERO,
                Decimal::ZERO,
                close_today_amount,
                order.frozen_price,
            );
            trade.commission = self.commission_decider.commission(&trade, instrument.contract_multiplier);
            trade.tax = self.tax_decider.tax(&trade);

            order.fill(&trade);
            cumulative_fill += fill_qty;

            if capped && order.order_type == OrderType::Market && order.unfilled_quantity() > 0 {
                order.mark_cancelled("volume cap exhausted");
            }

            trades.push(trade);
        }

        trades
    }
}

/// `floor((volume · volume_percent − already_filled) / round_lot) · round_lot`,
/// clamped to zero.
fn available_volume(bar_volume: u64, volume_percent: f64, already_filled: u64, round_lot: u64) -> u64 {
    if round_lot == 0 {
        return 0;
    }
    let cap = bar_volume as f64 * volume_percent - already_filled as f64;
    if cap <= 0.0 {
        return 0;
    }
    let lots = (cap / round_lot as f64).floor();
    if lots <= 0.0 {
        0
    } else {
        lots as u64 * round_lot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deciders::{ConfiguredDealDecider, PercentSlippage, StockCommission, StockTax};
    use chrono::NaiveDate;
    use qx_types::{Exchange, InstrumentType, MatchingType, Offset, Side};
    use rust_decimal_macros::dec;

    fn dt() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 2).unwrap().and_hms_opt(9, 30, 0).unwrap()
    }

    fn stock_instrument() -> Instrument {
        Instrument {
            order_book_id: "000001.XSHE".into(),
            instrument_type: InstrumentType::Stock,
            exchange: Exchange::SZSE,
            tick_size: dec!(0.01),
            round_lot: 100,
            contract_multiplier: Decimal::ONE,
            margin_rate: Decimal::ZERO,
            listed_date: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            de_listed_date: None,
            underlying_symbol: None,
        }
    }

    fn bar(close: Decimal, volume: u64) -> MarketSnapshot {
        MarketSnapshot::Bar(qx_types::Bar {
            order_book_id: "000001.XSHE".into(),
            datetime: dt(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
            total_turnover: Decimal::ZERO,
            settlement: Decimal::ZERO,
            prev_settlement: Decimal::ZERO,
            open_interest: 0,
            limit_up: Decimal::ZERO,
            limit_down: Decimal::ZERO,
        })
    }

    fn engine() -> MatchingEngine {
        MatchingEngine {
            config: MatchingConfig { updown_price_limit: true, liquidity_limit: true, volume_limit: true, volume_percent: 0.25 },
            deal_decider: Box::new(ConfiguredDealDecider { matching_type: MatchingType::CurrentBarClose }),
            slippage_decider: Box::new(PercentSlippage { rate: Decimal::ZERO }),
            commission_decider: Box::new(StockCommission::new(dec!(0.0008), dec!(5))),
            tax_decider: Box::new(StockTax { rate: dec!(0.001) }),
        }
    }

    fn market_order(qty: u64, side: Side) -> Order {
        let mut order = Order::new(
            "broker-1".into(),
            "000001.XSHE".into(),
            side,
            Offset::None,
            qty,
            OrderType::Market,
            Decimal::ZERO,
            dt(),
            dt(),
        );
        order.activate();
        order
    }

    #[test]
    fn single_market_buy_with_adequate_liquidity_fills_completely() {
        let mut matcher = engine();
        let instrument = stock_instrument();
        let market = bar(dec!(10.0), 1_000_000);
        let mut orders = vec![market_order(1000, Side::Buy)];

        let trades = matcher.match_orders(&market, &mut orders, &instrument, None);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, dec!(10.0));
        assert_eq!(trades[0].commission, dec!(8));
        assert_eq!(trades[0].tax, Decimal::ZERO);
        assert_eq!(orders[0].status, qx_types::OrderStatus::Filled);
    }

    #[test]
    fn limit_order_below_market_is_skipped_and_stays_active() {
        let mut matcher = engine();
        let instrument = stock_instrument();
        let market = bar(dec!(10.0), 1_000_000);
        let mut order = Order::new(
            "broker-1".into(),
            "000001.XSHE".into(),
            Side::Buy,
            Offset::None,
            100,
            OrderType::Limit,
            dec!(9.5),
            dt(),
            dt(),
        );
        order.set_frozen_price(dec!(9.5));
        order.activate();
        let mut orders = vec![order];

        let trades = matcher.match_orders(&market, &mut orders, &instrument, None);

        assert!(trades.is_empty());
        assert_eq!(orders[0].status, qx_types::OrderStatus::Active);
    }

    #[test]
    fn valid_price_on_listed_date_still_fills() {
        let mut matcher = engine();
        let mut instrument = stock_instrument();
        instrument.listed_date = dt().date();
        let market = bar(dec!(10.0), 1_000_000);
        let mut orders = vec![market_order(1000, Side::Buy)];

        let trades = matcher.match_orders(&market, &mut orders, &instrument, None);

        assert_eq!(trades.len(), 1);
        assert_eq!(orders[0].status, qx_types::OrderStatus::Filled);
    }

    #[test]
    fn missing_price_on_listed_date_is_rejected_with_listed_date_reason() {
        let mut matcher = engine();
        let mut instrument = stock_instrument();
        instrument.listed_date = dt().date();
        let market = bar(Decimal::ZERO, 1_000_000);
        let mut orders = vec![market_order(1000, Side::Buy)];

        let trades = matcher.match_orders(&market, &mut orders, &instrument, None);

        assert!(trades.is_empty());
        assert_eq!(orders[0].status, qx_types::OrderStatus::Rejected);
        assert_eq!(orders[0].message, "cannot trade on listed date");
    }

    #[test]
    fn market_buy_at_limit_up_is_rejected() {
        let mut matcher = engine();
        let instrument = stock_instrument();
        let mut market = bar(dec!(11.0), 1_000_000);
        if let MarketSnapshot::Bar(b) = &mut market {
            b.limit_up = dec!(11.0);
        }
        let mut orders = vec![market_order(100, Side::Buy)];

        let trades = matcher.match_orders(&market, &mut orders, &instrument, None);

        assert!(trades.is_empty());
        assert_eq!(orders[0].status, qx_types::OrderStatus::Rejected);
        assert_eq!(orders[0].message, "limit_up");
    }

    #[test]
    fn volume_cap_partially_fills_then_cancels_market_order() {
        let mut matcher = engine();
        let instrument = stock_instrument();
        // cap = floor(1000*0.25/100)*100 = 200
        let market = bar(dec!(10.0), 1000);
        let mut orders = vec![market_order(500, Side::Buy)];

        let trades = matcher.match_orders(&market, &mut orders, &instrument, None);

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].amount, 200);
        assert_eq!(orders[0].status, qx_types::OrderStatus::Cancelled);
        assert_eq!(orders[0].filled_quantity, 200);
    }
}
