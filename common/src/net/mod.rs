//! Networking utilities for the order ingress path.
//!
//! Thin TCP wrappers over socket2 with pre-allocated buffers and
//! fine-grained socket control.

pub mod tcp;

pub use tcp::{TcpListener, TcpSocket};
