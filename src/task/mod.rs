//! Task lifecycle management.
//!
//! Tasks move through a validated status machine. Closure and extension
//! requests are raised by task holders and resolved by approvers, with the
//! task and request updated together. Every meaningful change publishes a
//! notification event. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
