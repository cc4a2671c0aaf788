//! Session-cancellation event fan-out.
//!
//! Delivery (push, SMS, email) belongs to an external collaborator; the
//! engine's contract is to emit one structured event per affected account
//! holder when an admin cancels a session. Events are emitted after the
//! cancellation transaction commits, so a delivery failure can never roll
//! back a booking change.

use crate::db::models::reservations::ReservationDBResponse;
use crate::db::models::sessions::SessionDBResponse;
use crate::types::{SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCanceledEvent {
    pub session_id: SessionId,
    pub session_title: String,
    pub starts_at: DateTime<Utc>,
    pub user_id: UserId,
    pub bed_number: i32,
}

/// Emit one `SessionCanceled` event per account holder whose reservation
/// was released. Guest reservations have no account to notify and are
/// skipped.
pub fn session_canceled(session: &SessionDBResponse, released: &[ReservationDBResponse]) -> Vec<SessionCanceledEvent> {
    let events: Vec<SessionCanceledEvent> = released
        .iter()
        .filter_map(|reservation| {
            reservation.user_id.map(|user_id| SessionCanceledEvent {
                session_id: session.id,
                session_title: session.title.clone(),
                starts_at: session.starts_at,
                user_id,
                bed_number: reservation.bed_number,
            })
        })
        .collect();

    for event in &events {
        tracing::info!(
            session_id = %event.session_id,
            user_id = %event.user_id,
            starts_at = %event.starts_at,
            "SessionCanceled event"
        );
    }

    events
}
