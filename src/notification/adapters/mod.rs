//! Adapter implementations for notification ports.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
