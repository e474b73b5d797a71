//! Step definitions for task request behaviour tests.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
