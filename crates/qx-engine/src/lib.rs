//! Event bus, market replay broker, matching engine, account bookkeeping,
//! and persistence for the simulation core. Grounded throughout on
//! `original_source/core/EventBus.py`, `original_source/core/Broker.py`,
//! `original_source/core/account/Future.py` (order submission/settlement
//! wiring), `original_source/mod/data/PersistProvider.py`, and
//! `original_source/mod/matcher/` for the pluggable deciders; `qx-types`
//! carries the immutable data model this crate operates on.

pub mod broker;
pub mod bus;
pub mod context;
pub mod deciders;
pub mod matcher;
pub mod persist;
pub mod simulation;

pub use broker::{Broker, Feed};
pub use bus::{EventBus, Handler};
pub use context::EngineContext;
pub use matcher::MatchingEngine;
pub use persist::{JsonPersistable, Persistable, PersistHelper};
pub use simulation::Simulation;
