//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → dispatcher.rs (snapshot, select, count, forward)
//!     → request.rs (URI rewrite, header cleanup)
//!     → client.rs (pooled upstream client)
//!     → response.rs (header cleanup, connection release, error mapping)
//!     → Send to client
//! ```

pub mod client;
pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{DispatchError, Dispatcher};
pub use request::{X_FORWARDED_FOR, X_REQUEST_ID};
pub use server::HttpServer;
