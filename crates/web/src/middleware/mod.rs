//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. Method override (rewrite `POST ?_method=DELETE` before routing)
//! 3. `TraceLayer` (request tracing)
//! 4. Request ID (add unique ID to each request)

pub mod method_override;
pub mod request_id;

pub use method_override::override_method;
pub use request_id::request_id_middleware;
