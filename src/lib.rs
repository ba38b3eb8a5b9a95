//! agrosystem - crop management REST service
//!
//! Crops carry their location, applied inputs and irrigation entries as
//! embedded sub-documents; field tracking lives in its own collection.
//! Around that aggregate sit the account-bound services (users, supplies,
//! activities) and the open record services (alerts, soil history).
//!
//! ## Architecture
//!
//! ```text
//! hyper server -> routes -> CropManager / Services -> DocumentStore
//!                                  |                     |-- MongoDB
//!                                  +-- ReferenceResolver +-- in-memory
//! ```
//!
//! Every operation answers with an [`outcome::Outcome`] envelope
//! (`OK`, `ERROR` or `INFO`).

pub mod auth;
pub mod config;
pub mod crops;
pub mod db;
pub mod outcome;
pub mod resolver;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;
pub mod validation;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{AgroError, Result};
