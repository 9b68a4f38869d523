//! Core types shared across ormx facilities
//!
//! - **Correlation**: `SessionId` for tagging a unit of work in logs
//! - **Schema constants**: canonical structured-log field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::SessionId;
