//! Database record structures matching table schemas.

pub mod plans;
pub mod reservations;
pub mod schedule;
pub mod sessions;
pub mod submissions;
pub mod subscriptions;
pub mod users;
