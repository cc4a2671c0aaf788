//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`UserId`]: studio member or admin account
//! - [`SessionId`]: one scheduled class instance
//! - [`ReservationId`]: one bed booking within a session
//! - [`WorkPeriodId`]: admin-defined generation window within a weekday
//! - [`PlanId`] / [`SubscriptionId`] / [`SubmissionId`]: subscription lifecycle entities

use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type SessionId = Uuid;
pub type ReservationId = Uuid;
pub type WorkPeriodId = Uuid;
pub type PlanId = Uuid;
pub type SubscriptionId = Uuid;
pub type SubmissionId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}
