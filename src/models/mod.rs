//! Data models for the wealth tracker application.
//!
//! These models match the frontend TypeScript interfaces exactly for seamless interoperability.

mod asset;
mod snapshot;
mod user;

pub use asset::*;
pub use snapshot::*;
pub use user::*;
