//! Single in-process event queue with cooperative, single-threaded
//! dispatch. Grounded on `original_source/core/EventBus.py`: an ordered
//! handler table keyed by event type, a FIFO queue, and two timer threads
//! alongside the dispatcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::error;

use qx_types::{EventObject, EventPayload, EventType};

/// A handler returns `true` to halt propagation to subsequent handlers
/// registered for the same event type (spec §4.1's `stop=true`).
pub type Handler = Box<dyn FnMut(&EventObject) -> bool + Send>;

/// Cooperative, single-threaded event dispatcher with two auxiliary timer
/// threads. Handlers for one event type run in registration order on the
/// dispatch thread; no two handlers ever run concurrently, so business
/// logic (account/position state) needs no locking of its own.
pub struct EventBus {
    queue_tx: Sender<EventObject>,
    queue_rx: Receiver<EventObject>,
    handlers: Mutex<HashMap<EventType, Vec<Handler>>>,
    active: Arc<AtomicBool>,
    system_timer_interval: Duration,
    market_timer_interval: Duration,
    dispatch_thread: Mutex<Option<JoinHandle<()>>>,
    system_timer_thread: Mutex<Option<JoinHandle<()>>>,
    market_timer_thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// `system_timer_interval` defaults to 1s, `market_timer_interval` to
    /// 100ms per spec §4.1.
    pub fn new(system_timer_interval: Duration, market_timer_interval: Duration) -> Self {
        let (queue_tx, queue_rx) = unbounded();
        Self {
            queue_tx,
            queue_rx,
            handlers: Mutex::new(HashMap::new()),
            active: Arc::new(AtomicBool::new(false)),
            system_timer_interval,
            market_timer_interval,
            dispatch_thread: Mutex::new(None),
            system_timer_thread: Mutex::new(None),
            market_timer_thread: Mutex::new(None),
        }
    }

    /// Append a handler to the end of an event type's list.
    pub fn add_listener(&self, event_type: EventType, handler: Handler) {
        self.handlers.lock().entry(event_type).or_default().push(handler);
    }

    /// Insert a handler at the front of an event type's list.
    pub fn prepend_listener(&self, event_type: EventType, handler: Handler) {
        self.handlers.lock().entry(event_type).or_default().insert(0, handler);
    }

    pub fn put(&self, event: EventObject) {
        // An unbounded MPSC send only fails once the receiver is dropped,
        // which only happens after `stop()`; a late publish is then a
        // harmless no-op rather than a panic.
        let _ = self.queue_tx.send(event);
    }

    fn sender(&self) -> Sender<EventObject> {
        self.queue_tx.clone()
    }

    /// Idempotent. Spawns the dispatch worker and the two timer threads.
    pub fn start(self: &Arc<Self>) {
        if self.active.swap(true, Ordering::SeqCst) {
            return;
        }

        let receiver = self.queue_rx.clone();
        let bus = Arc::clone(self);
        let active = Arc::clone(&self.active);
        *self.dispatch_thread.lock() = Some(thread::spawn(move || {
            while active.load(Ordering::SeqCst) {
                match receiver.recv_timeout(Duration::from_secs(1)) {
                    Ok(event) => bus.dispatch(&event),
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
        }));

        let sys_sender = self.sender();
        let sys_active = Arc::clone(&self.active);
        let sys_interval = self.system_timer_interval;
        *self.system_timer_thread.lock() = Some(thread::spawn(move || {
            while sys_active.load(Ordering::SeqCst) {
                let _ = sys_sender.send(EventObject::new(
                    EventType::SysTimer,
                    EventPayload::Timer { at: Utc::now().naive_utc() },
                ));
                thread::sleep(sys_interval);
            }
        }));

        let market_sender = self.sender();
        let market_active = Arc::clone(&self.active);
        let market_interval = self.market_timer_interval;
        *self.market_timer_thread.lock() = Some(thread::spawn(move || {
            while market_active.load(Ordering::SeqCst) {
                let _ = market_sender.send(EventObject::new(EventType::MarketCheck, EventPayload::Empty));
                thread::sleep(market_interval);
            }
        }));
    }

    /// Idempotent. Signals all three threads to stop and joins them; does
    /// not drain remaining queued events.
    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.system_timer_thread.lock().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.market_timer_thread.lock().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.dispatch_thread.lock().take() {
            let _ = handle.join();
        }
    }

    fn dispatch(&self, event: &EventObject) {
        // Handlers are taken out from under the lock so a handler that
        // itself registers a new listener (or publishes further events)
        // cannot deadlock against `handlers`.
        let mut handlers = self.handlers.lock();
        let Some(list) = handlers.get_mut(&event.event_type) else {
            return;
        };
        for handler in list.iter_mut() {
            let stop = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(event)))
                .unwrap_or_else(|panic| {
                    error!(?event.event_type, ?panic, "event handler panicked; event considered delivered");
                    false
                });
            if stop {
                break;
            }
        }
    }
}
