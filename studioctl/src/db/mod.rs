//! Database layer: typed models, per-entity repositories, and error
//! classification.
//!
//! Repositories operate on `&mut PgConnection` rather than a pool so they
//! compose inside transactions. All booking invariants that must hold under
//! concurrency are enforced by database constraints, not application checks;
//! the handlers translate constraint violations into domain errors.

pub mod errors;
pub mod handlers;
pub mod models;
