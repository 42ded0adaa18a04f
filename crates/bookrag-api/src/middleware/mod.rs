//! HTTP middleware

pub mod rate_limit;
pub mod security_headers;
pub mod timing;

pub use rate_limit::{rate_limit_middleware, IpRateLimiter};
pub use security_headers::security_headers_middleware;
pub use timing::timing_middleware;
