//! The status HTTP surface: usage text, version and health check.

mod error;
mod handlers;
mod routes;
mod server;

pub use error::{StatusError, StatusResult};
pub use handlers::{HEALTHY_BODY, USAGE, healthcheck, home, version, version_line};
pub use routes::create_router;
pub use server::StatusServer;
