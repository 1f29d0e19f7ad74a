//! Derived view engine for the Agenda CRM core
//!
//! Every function in this crate is a pure computation over a cache
//! snapshot plus explicit parameters: filtered schedules, financial
//! ledgers, growth trends, client recency classification and birthday
//! detection. Nothing here mutates state or performs I/O; the cache store
//! calls in with its current collections and republishes the results.

pub mod clients;
pub mod conflict;
pub mod ledger;
pub mod range;
pub mod stats;
pub mod time;

pub use clients::{Activity, ClientView};
pub use conflict::{has_conflict, SlotRequest};
pub use ledger::LedgerFilter;
pub use range::{DateRange, DateSpan};
pub use stats::StatsSummary;
