//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection`, so it composes with either a
//! pooled connection (read-only paths) or a transaction (every mutating
//! service call). The booking service always goes through a transaction; the
//! partial unique indexes on `reservations` are the authoritative arbiter for
//! concurrent seat acquisition, and repositories surface those violations as
//! [`crate::db::errors::DbError::UniqueViolation`] for the service layer to
//! translate into conflict codes.

pub mod plans;
pub mod reservations;
pub mod schedule;
pub mod sessions;
pub mod submissions;
pub mod subscriptions;
pub mod users;

pub use plans::Plans;
pub use reservations::Reservations;
pub use schedule::Schedule;
pub use sessions::Sessions;
pub use submissions::Submissions;
pub use subscriptions::Subscriptions;
pub use users::Users;
