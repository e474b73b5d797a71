//! Unit tests for the task module.
//!
//! Tests are organised by concern: the status machine, request rules, the
//! lifecycle and request services, and the reminder scheduler.

mod support;
