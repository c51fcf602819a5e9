//! HTTP API for the hospital records backend.
//!
//! `api_router()` returns a composable `Router`. Protected routes go
//! through Auth → Audit → Handler; `/health`, `/register` and `/token*`
//! skip auth.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;
pub mod views;

pub use router::api_router;
pub use server::{start_server, start_server_on, ApiServer, ServerError, ServerSession};
pub use types::ApiContext;
