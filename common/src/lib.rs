// Shared low-level building blocks for the matching engine:
// scalar types, the SPSC ring, monotonic timing, deferred logging,
// and raw TCP wrappers.

pub mod logging;
pub mod net;
pub mod spsc;
pub mod time;
pub mod types;

pub use types::{AccountId, OrderId, OrderType, Price, Side, Volume};
