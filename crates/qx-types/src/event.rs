use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::bar::MarketSnapshot;
use crate::order::{Order, OrderId};
use crate::trade::Trade;

/// Closed catalogue of wire-stable event names. The bus's handler table is
/// a map from this enum to an ordered handler list it owns; there is no
/// mutable global routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    InstConnect,
    InstSubscribe,
    InstStart,
    InstStop,
    MarketCheck,
    MarketSend,
    Order,
    Trade,
    DoPersist,
    DoRecord,
    SysTimer,
    SysStart,
    SysHoldSet,
    SysHoldCancel,
    SysStop,
    SysUniverseChange,
    BeforeTrading,
    Bar,
    Tick,
    AfterTrading,
    Settlement,
    OrderPendingNew,
    OrderCreationReject,
    OrderCancellationPass,
    OrderUnsolicitedUpdate,
    PostBeforeTrading,
    PostAfterTrading,
    PostBar,
    PostSettlement,
}

/// Heterogeneous event payload. `event_type()` must agree with the
/// `EventType` used to publish/dispatch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    MarketSend {
        broker_id: String,
        market: MarketSnapshot,
    },
    Order(Order),
    Trade {
        account_id: String,
        trade: Trade,
        order_id: OrderId,
    },
    OrderLifecycle {
        account_id: String,
        order_id: OrderId,
        reason: String,
    },
    Timer {
        at: NaiveDateTime,
    },
    Settlement {
        trading_date: chrono::NaiveDate,
    },
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventObject {
    pub event_type: EventType,
    pub payload: EventPayload,
}

impl EventObject {
    pub fn new(event_type: EventType, payload: EventPayload) -> Self {
        Self { event_type, payload }
    }
}
