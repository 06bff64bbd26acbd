pub mod auth;
pub mod rate_limit;
pub mod security_headers;

pub use auth::{AuthMiddleware, RequireRole};
pub use rate_limit::{LoginRateLimit, LoginRateLimiter};
pub use security_headers::SecurityHeaders;
