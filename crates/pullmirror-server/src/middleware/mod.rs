//! Middleware stack for the HTTP server.
//!
//! - `RequestIdLayer`: generates or propagates `x-request-id`
//! - `LoggingLayer`: structured request logging

mod logging;
mod request_id;

pub use logging::{LoggingLayer, LoggingMiddleware};
pub use request_id::{REQUEST_ID_HEADER, RequestId, RequestIdLayer, RequestIdMiddleware};
