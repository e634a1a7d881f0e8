//! Explicit replacement for the original's `Environment` singleton (spec
//! §9's redesign flag): components hold a reference to this value rather
//! than reaching for a global. Built once and passed into constructors.

use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::RwLock;
use qx_data::Universe;

use crate::bus::EventBus;

/// Current trading/calendar datetime, a handle to the event bus, and the
/// active universe — the three things the original's `Environment`
/// singleton exposed that components actually needed.
pub struct EngineContext {
    pub bus: Arc<EventBus>,
    pub universe: Universe,
    clock: RwLock<NaiveDateTime>,
}

impl EngineContext {
    pub fn new(bus: Arc<EventBus>, universe: Universe, start: NaiveDateTime) -> Self {
        Self {
            bus,
            universe,
            clock: RwLock::new(start),
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        *self.clock.read()
    }

    pub fn advance_to(&self, dt: NaiveDateTime) {
        *self.clock.write() = dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn dt(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap().and_hms_opt(9, 30, 0).unwrap()
    }

    #[test]
    fn advance_to_moves_the_clock_forward() {
        let bus = Arc::new(EventBus::new(Duration::from_secs(1), Duration::from_millis(100)));
        let context = EngineContext::new(bus, Universe::new(), dt(1));
        assert_eq!(context.now(), dt(1));
        context.advance_to(dt(2));
        assert_eq!(context.now(), dt(2));
    }
}
