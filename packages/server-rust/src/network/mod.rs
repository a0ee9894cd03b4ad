//! HTTP surface: configuration, router assembly, request binding, and
//! shutdown control.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::NetworkConfig;
pub use handlers::AppState;
pub use middleware::{apply_http_layers, REQUEST_ID_HEADER};
pub use module::NetworkModule;
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
