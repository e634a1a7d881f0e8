//! The `DataSource`/`StoreProvider` capability surface (defined in
//! `qx-types`) plus an in-memory implementation of each, used by tests and
//! as the reference adapter a real loader would replace. Concrete loaders
//! (CSV, SQL, shelve-equivalents) are explicitly out of scope (spec §1).

pub mod memory;
pub mod universe;

pub use memory::*;
pub use universe::*;
