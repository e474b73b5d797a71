//! Adapters for the task context ports.

pub mod memory;
