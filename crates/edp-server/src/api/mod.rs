//! HTTP control surface
//!
//! Thin pass-throughs to the ETL engine. No pipeline logic lives here; the
//! handlers plumb parameters, delegate, and map errors onto statuses.

pub mod response;
pub mod routes;

pub use routes::{router, AppState};
