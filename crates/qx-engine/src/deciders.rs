//! Pluggable commission, tax, and slippage policies, plus the deal-price
//! decider that resolves a `MatchingType` against a market snapshot.
//! Stock policies grounded on `original_source/mod/matcher/SSE_SZSE.py`;
//! future policies on `original_source/mod/matcher/CFFEX.py`.

use std::collections::HashMap;

use rust_decimal::Decimal;

use qx_types::{
    CommissionDecider, CommissionType, DealDecider, MarketSnapshot, MatchingType, OrderId,
    Offset, Side, SlippageDecider, TaxDecider, Trade,
};

/// Resolves a trade price from the configured `MatchingType` against the
/// market snapshot currently being processed.
pub struct ConfiguredDealDecider {
    pub matching_type: MatchingType,
}

impl DealDecider for ConfiguredDealDecider {
    fn deal_price(&self, order_book_id: &str, side: Side, market: &MarketSnapshot) -> Option<Decimal> {
        if market.order_book_id() != order_book_id {
            return None;
        }
        match (self.matching_type, market) {
            (MatchingType::CurrentBarClose, MarketSnapshot::Bar(bar)) => Some(bar.close),
            (MatchingType::NextBarOpen, MarketSnapshot::Bar(bar)) => Some(bar.open),
            (MatchingType::NextTickLast, MarketSnapshot::Tick(tick)) => Some(tick.last),
            (MatchingType::NextTickBestOwn, MarketSnapshot::Tick(tick)) => Some(tick.best_own_price(side)),
            (MatchingType::NextTickBestCounterparty, MarketSnapshot::Tick(tick)) => {
                Some(tick.best_counterparty_price(side))
            }
            _ => None,
        }
    }
}

/// Flat-rate slippage: buys pay up, sells pay down, by `rate` of the deal
/// price.
pub struct PercentSlippage {
    pub rate: Decimal,
}

impl SlippageDecider for PercentSlippage {
    fn trade_price(&self, side: Side, deal_price: Decimal) -> Decimal {
        if side.is_buy_side() {
            deal_price * (Decimal::ONE + self.rate)
        } else {
            deal_price * (Decimal::ONE - self.rate)
        }
    }
}

/// China-stock commission: `rate * notional`, subject to a per-order
/// minimum consumed by the first trade(s) of that order. Grounded on
/// `CSCommission.get_commission`.
#[derive(Debug, Default)]
pub struct StockCommission {
    pub rate: Decimal,
    pub min_commission: Decimal,
    remaining_min: HashMap<OrderId, Decimal>,
}

impl StockCommission {
    pub fn new(rate: Decimal, min_commission: Decimal) -> Self {
        Self { rate, min_commission, remaining_min: HashMap::new() }
    }
}

impl CommissionDecider for StockCommission {
    fn commission(&mut self, trade: &Trade, multiplier: Decimal) -> Decimal {
        let remaining = *self.remaining_min.get(&trade.order_id).unwrap_or(&self.min_commission);
        let cost = trade.price * Decimal::from(trade.amount) * self.rate * multiplier;
        if cost > remaining {
            self.remaining_min.insert(trade.order_id, Decimal::ZERO);
            if remaining == self.min_commission {
                cost
            } else {
                cost - remaining
            }
        } else {
            let charge = if remaining == self.min_commission {
                self.min_commission
            } else {
                Decimal::ZERO
            };
            self.remaining_min.insert(trade.order_id, remaining - cost);
            charge
        }
    }
}

/// China-stock stamp tax: sell side only. Grounded on `CSTax`.
pub struct StockTax {
    pub rate: Decimal,
}

impl TaxDecider for StockTax {
    fn tax(&self, trade: &Trade) -> Decimal {
        if matches!(trade.side, Side::Sell | Side::ShortSell) {
            trade.notional() * self.rate
        } else {
            Decimal::ZERO
        }
    }
}

/// Per-offset commission ratios for a futures contract, grounded on
/// `CFCommission`.
#[derive(Debug, Clone, Copy)]
pub struct FutureCommissionRatios {
    pub commission_type: CommissionType,
    pub open_ratio: Decimal,
    pub close_ratio: Decimal,
    pub close_today_ratio: Decimal,
    pub hedge_multiplier: Decimal,
}

pub struct FutureCommission {
    pub ratios: FutureCommissionRatios,
}

impl CommissionDecider for FutureCommission {
    fn commission(&mut self, trade: &Trade, multiplier: Decimal) -> Decimal {
        let qty = Decimal::from(trade.amount);
        let close_today = Decimal::from(trade.close_today_amount);
        let close_old = qty - close_today;
        let base = match self.ratios.commission_type {
            CommissionType::ByMoney => {
                let notional_of = |q: Decimal| trade.price * q * multiplier;
                if trade.offset == Offset::Open {
                    notional_of(qty) * self.ratios.open_ratio
                } else {
                    notional_of(close_old) * self.ratios.close_ratio
                        + notional_of(close_today) * self.ratios.close_today_ratio
                }
            }
            CommissionType::ByVolume => {
                if trade.offset == Offset::Open {
                    qty * self.ratios.open_ratio
                } else {
                    close_old * self.ratios.close_ratio + close_today * self.ratios.close_today_ratio
                }
            }
        };
        base * self.ratios.hedge_multiplier
    }
}

/// Futures tax is always zero. Grounded on `CFTax`.
pub struct FutureTax;

impl TaxDecider for FutureTax {
    fn tax(&self, _trade: &Trade) -> Decimal {
        Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn dt() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 2).unwrap().and_hms_opt(9, 30, 0).unwrap()
    }

    fn trade(order_id: OrderId, price: Decimal, amount: u64, side: Side) -> Trade {
        Trade::new(order_id, "000001.XSHE".into(), dt(), dt(), price, amount, side, Offset::None, Decimal::ZERO, Decimal::ZERO, 0, Decimal::ZERO)
    }

    #[test]
    fn stock_commission_collects_minimum_across_first_trades_then_rate_based() {
        let mut commission = StockCommission::new(dec!(0.0008), dec!(5));
        // 1000 shares @ 1.0 => cost = 0.8, below the 5 minimum: charges the floor upfront.
        let first = commission.commission(&trade(1, dec!(1.0), 1000, Side::Buy), Decimal::ONE);
        assert_eq!(first, dec!(5));
        // 1000 shares @ 10.0 => cost = 8.0 > remaining (5 - 0.8 = 4.2): charges the excess.
        let second = commission.commission(&trade(1, dec!(10.0), 1000, Side::Buy), Decimal::ONE);
        assert_eq!(second, dec!(8.0) - (dec!(5) - dec!(0.8)));
    }

    #[test]
    fn stock_commission_charges_full_cost_when_first_trade_exceeds_minimum() {
        let mut commission = StockCommission::new(dec!(0.0008), dec!(5));
        let charged = commission.commission(&trade(1, dec!(10.0), 1000, Side::Buy), Decimal::ONE);
        assert_eq!(charged, dec!(8.0));
    }

    #[test]
    fn stock_tax_applies_only_to_sells() {
        let tax = StockTax { rate: dec!(0.001) };
        let buy = tax.tax(&trade(1, dec!(10.0), 1000, Side::Buy));
        let sell = tax.tax(&trade(1, dec!(10.0), 1000, Side::Sell));
        assert_eq!(buy, Decimal::ZERO);
        assert_eq!(sell, dec!(10.0));
    }

    #[test]
    fn percent_slippage_pays_up_on_buy_and_down_on_sell() {
        let slippage = PercentSlippage { rate: dec!(0.001) };
        assert_eq!(slippage.trade_price(Side::Buy, dec!(100)), dec!(100.1));
        assert_eq!(slippage.trade_price(Side::Sell, dec!(100)), dec!(99.9));
    }
}
