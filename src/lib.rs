//! Taskwarden: task lifecycle and notification engine.
//!
//! The crate manages tasks through a validated state machine, runs the
//! closure and extension request workflow, and delivers notifications to
//! every interested user through an event-driven pipeline.
//!
//! # Architecture
//!
//! Taskwarden follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (in-memory, database)
//!
//! # Modules
//!
//! - [`task`]: Task state machine, request workflow, reminders and scheduling
//! - [`notification`]: Event publishing, fan-out and per-user inboxes
//! - [`config`]: Layered runtime configuration
//! - [`telemetry`]: Tracing subscriber setup
//! - [`error`]: Error classification shared by every service

pub mod config;
pub mod error;
pub mod notification;
pub mod task;
pub mod telemetry;
