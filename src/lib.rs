//! Offline-first sync backend for utility-meter readings and bills.
//!
//! Clients push locally created or edited records to `/api/v1/sync/push`
//! and fetch everything that changed since their last checkpoint from
//! `/api/v1/sync/pull`.

use serde::Serialize;

pub mod app;
pub mod auth;
pub mod bills;
pub mod config;
pub mod error;
pub mod readings;
pub mod seed;
pub mod state;
pub mod store;
pub mod sync;
pub mod tenant;
pub mod validate;

pub use state::AppState;

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}
