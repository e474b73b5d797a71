//! Unit tests for the notification module.

mod support;
