pub mod payments;
pub mod reservations;
pub mod schedule;
pub mod sessions;
pub mod subscriptions;
