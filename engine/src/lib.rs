//! Single-instrument limit-order-book matching engine.
//!
//! Orders arrive as fixed-size binary frames over TCP, cross an SPSC ring
//! onto the matcher thread, and are applied to an in-memory book that
//! keeps price-time priority on both sides. The book stores orders in a
//! slab pool with stable addresses, chains them through intrusive
//! per-level FIFOs, and resolves cancels through an open-addressed id
//! lookup.

pub mod order_book;
pub mod order_pool;
pub mod order_server;
pub mod protocol;
pub mod telemetry;
pub mod tick_ladder;
