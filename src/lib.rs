//! calltrack: a shared call-center tracker.
//!
//! Three tables (calls, progress follow-ups and document uploads) are kept
//! by the server as whole JSON collections in sled. Clients replace a table
//! wholesale on every change; the server then tells every connected client
//! over a websocket which table changed so they can reload it.
//!
//! - [`api`]: the axum server (REST routes, `/ws`, health)
//! - [`client`]: gateway, per-table controllers and the change listener
//! - [`records`]: the table schemas
//! - [`scheduler`]: next-contact computation for progress rows
//! - [`sheet`]: xlsx import and export
//! - [`storage`]: whole-table persistence
//! - [`sync`]: change notification protocol and broadcaster
//! - [`view`]: search, filter, sort and paging of a table

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod records;
pub mod scheduler;
pub mod sheet;
pub mod storage;
pub mod sync;
pub mod view;

pub use error::{AppError, AppResult};
